//! Crate-level tests spanning the store, sources and pipeline.
