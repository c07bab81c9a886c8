//! Prompt loader for built-in and workspace YAML prompt definitions.

use crate::types::PromptDefinition;
use juris_core::{AppError, AppResult};
use std::path::Path;

/// Directory (relative to the workspace) holding prompt overrides.
const PROMPTS_DIR: &str = ".juris/prompts";

/// IDs of the prompts compiled into the binary.
pub const BUILTIN_PROMPT_IDS: [&str; 3] = ["router.default", "citations.default", "compose.default"];

fn builtin_source(prompt_id: &str) -> Option<&'static str> {
    match prompt_id {
        "router.default" => Some(include_str!("../prompts/router.default.yml")),
        "citations.default" => Some(include_str!("../prompts/citations.default.yml")),
        "compose.default" => Some(include_str!("../prompts/compose.default.yml")),
        _ => None,
    }
}

/// Load one of the built-in prompt definitions.
pub fn builtin_prompt(prompt_id: &str) -> AppResult<PromptDefinition> {
    let source = builtin_source(prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown built-in prompt: {}", prompt_id)))?;

    let definition: PromptDefinition = serde_yaml::from_str(source).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse built-in prompt {}: {}",
            prompt_id, e
        ))
    })?;

    validate_prompt(&definition)?;
    Ok(definition)
}

/// Load a prompt definition by ID.
///
/// A file named `<id>.yml` in `.juris/prompts/` under the workspace takes
/// precedence; otherwise the built-in definition with the same ID is used.
///
/// # Arguments
/// * `workspace_path` - Root workspace directory containing `.juris/`
/// * `prompt_id` - Prompt identifier (e.g., "router.default")
///
/// # Example
/// ```no_run
/// use juris_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let workspace = Path::new(".");
/// let prompt = load_prompt(workspace, "compose.default")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(PROMPTS_DIR)
        .join(format!("{}.yml", prompt_id));

    if !prompt_file.exists() {
        tracing::debug!("No override at {:?}, using built-in {}", prompt_file, prompt_id);
        return builtin_prompt(prompt_id);
    }

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// List all available prompt IDs: built-ins plus workspace overrides.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = BUILTIN_PROMPT_IDS.iter().map(|s| s.to_string()).collect();

    let prompts_dir = workspace_path.join(PROMPTS_DIR);
    if prompts_dir.exists() {
        for entry in walkdir::WalkDir::new(&prompts_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    prompt_ids.push(stem.to_string());
                }
            }
        }
    }

    prompt_ids.sort();
    prompt_ids.dedup();
    Ok(prompt_ids)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.api_version.is_empty() {
        return Err(AppError::Prompt(
            "Prompt apiVersion cannot be empty".to_string(),
        ));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
