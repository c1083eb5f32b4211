use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tera::Tera;

/// Maximum template file size (1MB)
const MAX_TEMPLATE_SIZE: u64 = 1024 * 1024;

/// Which prompt message an external template renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TemplateKind {
    /// System message; no variables required
    System,
    /// Human message; must place the chunk text
    Human,
}

impl TemplateKind {
    const fn required_variables(self) -> &'static [&'static str] {
        match self {
            Self::System => &[],
            Self::Human => &["input"],
        }
    }
}

/// Variables templates commonly use
const OPTIONAL_VARIABLES: &[&str] = &["language", "custom"];

/// Validates external Tera prompt templates
pub(crate) struct TemplateValidator;

impl TemplateValidator {
    /// Validates an external template file
    ///
    /// Checks that the file exists, is at most 1MB, is not blank, compiles
    /// with Tera and references the variables its kind requires.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file is missing or unreadable, and a
    /// validation error for every other failed check.
    pub(crate) fn validate_template(path: &Path, kind: TemplateKind) -> Result<()> {
        if !path.exists() {
            return Err(Error::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "Template file not found"),
            ));
        }

        if !path.is_file() {
            return Err(Error::template_validation(
                path.to_string_lossy(),
                "Path is not a file",
            ));
        }

        let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
        if metadata.len() > MAX_TEMPLATE_SIZE {
            return Err(Error::template_validation(
                path.to_string_lossy(),
                format!(
                    "Template file too large: {} bytes (max: {} bytes)",
                    metadata.len(),
                    MAX_TEMPLATE_SIZE
                ),
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::validate_source(&content, kind)
            .map_err(|message| Error::template_validation(path.to_string_lossy(), message))
    }

    /// Validates template source text, returning a reason on failure.
    pub(crate) fn validate_source(content: &str, kind: TemplateKind) -> std::result::Result<(), String> {
        if content.trim().is_empty() {
            return Err("Template file is empty".to_string());
        }

        let mut temp_tera = Tera::default();
        temp_tera
            .add_raw_template("validation", content)
            .map_err(|e| format!("Template syntax error: {e}"))?;

        let missing: Vec<&str> = kind
            .required_variables()
            .iter()
            .filter(|var| !references(content, var))
            .copied()
            .collect();

        if !missing.is_empty() {
            return Err(format!(
                "Template is missing required variables: {}. \
                Human templates must place the chunk text with {{{{ ctx.input }}}}.",
                missing.join(", ")
            ));
        }

        for var in OPTIONAL_VARIABLES {
            if !references(content, var) {
                tracing::debug!("Template does not use optional variable: {}", var);
            }
        }

        Ok(())
    }
}

/// Heuristic check for `ctx.<var>` or a bare `{{ <var>` reference.
fn references(content: &str, var: &str) -> bool {
    let patterns = [
        format!("ctx.{var}"),
        format!("{{{{{var} "),
        format!("{{{{ {var} "),
        format!("{{{{ {var}}}}}"),
    ];

    patterns.iter().any(|pattern| content.contains(pattern))
}
