//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use juris_core::{AppError, AppResult};
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Renders the system template (if any) and the user template with the same
/// variables. Missing variables render as empty strings.
///
/// # Example
/// ```no_run
/// use juris_prompt::{build_prompt, builtin_prompt};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt("router.default")?;
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "What is Section 302 IPC?".to_string());
///
/// let built = build_prompt(&def, &vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: &HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let handlebars = registry();

    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(&handlebars, template, variables))
        .transpose()?;

    let user = render_template(&handlebars, &definition.template, variables)?;

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        variables.keys().cloned().collect(),
    ))
}

fn registry() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();

    // Prompts are plain text; legal excerpts must pass through untouched
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
}

/// Render a Handlebars template with variables.
fn render_template(
    handlebars: &Handlebars<'_>,
    template: &str,
    variables: &HashMap<String, String>,
) -> AppResult<String> {
    handlebars
        .render_template(template, variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
