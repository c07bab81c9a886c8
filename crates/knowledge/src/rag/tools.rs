//! The closed set of retrieval tools offered to the router model.

use crate::types::Category;
use juris_llm::ToolSpec;
use serde::{Deserialize, Serialize};

/// Argument every search tool takes.
pub const QUERY_ARG: &str = "query";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchTool {
    #[serde(rename = "search_statutes")]
    Statutes,
    #[serde(rename = "search_cases")]
    Cases,
    #[serde(rename = "search_regulations")]
    Regulations,
}

impl SearchTool {
    pub const ALL: [SearchTool; 3] = [SearchTool::Statutes, SearchTool::Cases, SearchTool::Regulations];

    /// Function name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            SearchTool::Statutes => "search_statutes",
            SearchTool::Cases => "search_cases",
            SearchTool::Regulations => "search_regulations",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn category(&self) -> Category {
        match self {
            SearchTool::Statutes => Category::Statute,
            SearchTool::Cases => Category::Case,
            SearchTool::Regulations => Category::Regulation,
        }
    }

    /// When the model should use this tool.
    pub fn description(&self) -> &'static str {
        match self {
            SearchTool::Statutes => {
                "Searches through bare acts and statutes related to Indian criminal law. Use this \
                 when the question is about laws, sections, or legal provisions from acts like IPC \
                 (Indian Penal Code), CrPC (Criminal Procedure Code), Evidence Act, etc."
            }
            SearchTool::Cases => {
                "Searches through criminal court judgments and case law. Use this when the \
                 question asks about precedents, judicial interpretations, or specific court \
                 rulings in criminal matters."
            }
            SearchTool::Regulations => {
                "Searches through government regulations and rules related to criminal law. Use \
                 this for questions about regulatory compliance, administrative rules, or \
                 government notifications in the criminal law domain."
            }
        }
    }

    /// One-line summary for the router's system prompt.
    fn summary(&self) -> &'static str {
        match self {
            SearchTool::Statutes => "For IPC, CrPC, Evidence Act sections",
            SearchTool::Cases => "For court judgments and precedents",
            SearchTool::Regulations => "For government rules and regulations",
        }
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec::with_string_arg(
            self.name(),
            self.description(),
            QUERY_ARG,
            "Focused search query for this collection",
        )
    }
}

/// Tool specs offered with the routing request.
pub fn tool_specs() -> Vec<ToolSpec> {
    SearchTool::ALL.iter().map(SearchTool::spec).collect()
}

/// Manifest lines rendered into the router prompt.
pub fn manifest_text() -> String {
    SearchTool::ALL
        .iter()
        .map(|t| format!("- {}: {}", t.name(), t.summary()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for tool in SearchTool::ALL {
            assert_eq!(SearchTool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(SearchTool::from_name("search_web"), None);
    }

    #[test]
    fn test_categories() {
        assert_eq!(SearchTool::Statutes.category(), Category::Statute);
        assert_eq!(SearchTool::Cases.category(), Category::Case);
        assert_eq!(SearchTool::Regulations.category(), Category::Regulation);
    }

    #[test]
    fn test_spec_requires_query() {
        let spec = SearchTool::Cases.spec();
        assert_eq!(spec.name, "search_cases");
        assert_eq!(spec.parameters["required"][0], "query");
    }

    #[test]
    fn test_manifest_lists_every_tool() {
        let manifest = manifest_text();
        assert_eq!(manifest.lines().count(), 3);
        assert!(manifest.starts_with("- search_statutes: For IPC"));
        assert_eq!(tool_specs().len(), 3);
    }

    #[test]
    fn test_serializes_as_wire_name() {
        let json = serde_json::to_string(&SearchTool::Regulations).unwrap();
        assert_eq!(json, "\"search_regulations\"");
    }
}
