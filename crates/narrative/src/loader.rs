//! Template loader for built-in and workspace narrative templates.

use crate::types::{NarrativeKind, NarrativeTemplate};
use samarth_core::{AppError, AppResult};
use std::path::Path;

const BUILTIN_LOOKUP: &str = include_str!("../templates/lookup.yml");
const BUILTIN_COMPARISON: &str = include_str!("../templates/comparison.yml");
const BUILTIN_TREND: &str = include_str!("../templates/trend.yml");
const BUILTIN_CORRELATION: &str = include_str!("../templates/correlation.yml");
const BUILTIN_UNAVAILABLE: &str = include_str!("../templates/unavailable.yml");

/// Parse the built-in template for `kind`.
pub fn builtin_template(kind: NarrativeKind) -> AppResult<NarrativeTemplate> {
    let source = match kind {
        NarrativeKind::Lookup => BUILTIN_LOOKUP,
        NarrativeKind::Comparison => BUILTIN_COMPARISON,
        NarrativeKind::Trend => BUILTIN_TREND,
        NarrativeKind::Correlation => BUILTIN_CORRELATION,
        NarrativeKind::Unavailable => BUILTIN_UNAVAILABLE,
    };

    let definition: NarrativeTemplate = serde_yaml::from_str(source).map_err(|e| {
        AppError::Template(format!("Built-in {} template is invalid: {}", kind, e))
    })?;
    validate_template(&definition, kind)?;
    Ok(definition)
}

/// Load a workspace override for `kind`, if one exists.
///
/// Overrides live at `<templates_dir>/<kind>.yml`.
///
/// # Example
/// ```no_run
/// use samarth_narrative::{load_override, NarrativeKind};
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// if let Some(template) = load_override(Path::new(".samarth/templates"), NarrativeKind::Trend)? {
///     println!("Using override: {}", template.title);
/// }
/// # Ok(())
/// # }
/// ```
pub fn load_override(templates_dir: &Path, kind: NarrativeKind) -> AppResult<Option<NarrativeTemplate>> {
    let template_file = templates_dir.join(format!("{}.yml", kind));

    if !template_file.exists() {
        return Ok(None);
    }

    tracing::debug!("Loading template override from: {:?}", template_file);

    let contents = std::fs::read_to_string(&template_file).map_err(|e| {
        AppError::Template(format!(
            "Failed to read template file {:?}: {}",
            template_file, e
        ))
    })?;

    let definition: NarrativeTemplate = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Template(format!(
            "Failed to parse template YAML {:?}: {}",
            template_file, e
        ))
    })?;

    validate_template(&definition, kind)?;

    tracing::info!("Loaded template override: {} ({})", definition.id, definition.title);

    Ok(Some(definition))
}

/// List the kinds that have a workspace override file.
pub fn list_overrides(templates_dir: &Path) -> Vec<NarrativeKind> {
    if !templates_dir.exists() {
        return Vec::new();
    }

    let mut kinds: Vec<NarrativeKind> = walkdir::WalkDir::new(templates_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("yml"))
        .filter_map(|e| {
            let stem = e.path().file_stem()?.to_str()?.to_string();
            let kind = NarrativeKind::parse(&stem);
            if kind.is_none() {
                tracing::warn!("Ignoring template file with unknown kind: {:?}", e.path());
            }
            kind
        })
        .collect();

    kinds.sort();
    kinds
}

/// Validate a template definition.
fn validate_template(def: &NarrativeTemplate, expected: NarrativeKind) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Template("Template ID cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Template(format!(
            "Template {} has an empty body",
            def.id
        )));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Template(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    if def.kind != expected {
        return Err(AppError::Template(format!(
            "Template {} declares kind '{}' but is registered as '{}'",
            def.id, def.kind, expected
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_override(dir: &Path, kind: &str, body: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(format!("{}.yml", kind)), body).unwrap();
    }

    #[test]
    fn test_all_builtins_parse() {
        for kind in NarrativeKind::ALL {
            let template = builtin_template(kind).unwrap();
            assert_eq!(template.kind, kind);
        }
    }

    #[test]
    fn test_missing_override_is_none() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_override(temp_dir.path(), NarrativeKind::Lookup)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_load_valid_override() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            "trend",
            "id: custom.trend\ntitle: Custom\napiVersion: \"1.0\"\nkind: trend\ntemplate: \"Trend: {{headline}}\"\n",
        );

        let template = load_override(temp_dir.path(), NarrativeKind::Trend)
            .unwrap()
            .unwrap();
        assert_eq!(template.id, "custom.trend");
    }

    #[test]
    fn test_override_with_wrong_kind_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            "lookup",
            "id: x\ntitle: X\napiVersion: \"1.0\"\nkind: trend\ntemplate: \"x\"\n",
        );

        assert!(load_override(temp_dir.path(), NarrativeKind::Lookup).is_err());
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), "comparison", "invalid: yaml: content:");

        assert!(load_override(temp_dir.path(), NarrativeKind::Comparison).is_err());
    }

    #[test]
    fn test_list_overrides() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), "trend", "x");
        write_override(temp_dir.path(), "lookup", "x");
        write_override(temp_dir.path(), "notes", "x");

        assert_eq!(
            list_overrides(temp_dir.path()),
            vec![NarrativeKind::Lookup, NarrativeKind::Trend]
        );
    }
}
