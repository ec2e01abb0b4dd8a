//! Narrative builder: compiles templates once and renders answers.

use crate::loader::{builtin_template, load_override};
use crate::types::{NarrativeContext, NarrativeKind, NarrativeTemplate, RenderedNarrative};
use handlebars::Handlebars;
use samarth_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::path::Path;

/// Compiled templates for every narrative kind.
#[derive(Debug)]
pub struct TemplateSet {
    registry: Handlebars<'static>,
    templates: BTreeMap<NarrativeKind, (NarrativeTemplate, bool)>,
}

impl TemplateSet {
    /// Built-in templates only.
    pub fn builtin() -> AppResult<Self> {
        Self::assemble(|kind| Ok((builtin_template(kind)?, false)))
    }

    /// Built-in templates, replaced by any override under `templates_dir`.
    pub fn load(templates_dir: &Path) -> AppResult<Self> {
        Self::assemble(|kind| match load_override(templates_dir, kind)? {
            Some(template) => Ok((template, true)),
            None => Ok((builtin_template(kind)?, false)),
        })
    }

    fn assemble(
        mut source: impl FnMut(NarrativeKind) -> AppResult<(NarrativeTemplate, bool)>,
    ) -> AppResult<Self> {
        let mut registry = Handlebars::new();

        // Plain text output
        registry.register_escape_fn(handlebars::no_escape);

        let mut templates = BTreeMap::new();
        for kind in NarrativeKind::ALL {
            let (template, overridden) = source(kind)?;
            registry
                .register_template_string(kind.as_str(), &template.template)
                .map_err(|e| {
                    AppError::Template(format!("Failed to register template {}: {}", template.id, e))
                })?;
            templates.insert(kind, (template, overridden));
        }

        Ok(Self {
            registry,
            templates,
        })
    }

    pub fn template(&self, kind: NarrativeKind) -> Option<&NarrativeTemplate> {
        self.templates.get(&kind).map(|(template, _)| template)
    }

    /// Render `kind` with `context`.
    ///
    /// A workspace override that fails to render is replaced by the built-in
    /// template for the same kind.
    pub fn render(&self, kind: NarrativeKind, context: &NarrativeContext) -> AppResult<RenderedNarrative> {
        let (template, overridden) = self.templates.get(&kind).ok_or_else(|| {
            AppError::Template(format!("No template registered for {}", kind))
        })?;

        tracing::debug!("Rendering narrative template: {}", template.id);

        match self.registry.render(kind.as_str(), context) {
            Ok(rendered) => Ok(RenderedNarrative {
                text: tidy(&rendered),
                template_id: template.id.clone(),
                overridden: *overridden,
            }),
            Err(e) if *overridden => {
                tracing::warn!(
                    "Template override {} failed to render, using built-in: {}",
                    template.id,
                    e
                );
                self.render_builtin(kind, context)
            }
            Err(e) => Err(AppError::Template(format!("Failed to render template: {}", e))),
        }
    }

    fn render_builtin(&self, kind: NarrativeKind, context: &NarrativeContext) -> AppResult<RenderedNarrative> {
        let builtin = builtin_template(kind)?;
        let rendered = self
            .registry
            .render_template(&builtin.template, context)
            .map_err(|e| AppError::Template(format!("Failed to render template: {}", e)))?;

        Ok(RenderedNarrative {
            text: tidy(&rendered),
            template_id: builtin.id,
            overridden: false,
        })
    }
}

/// Trim trailing spaces and collapse runs of blank lines left by block helpers.
fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.lines().map(str::trim_end) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NarrativeRow;
    use std::fs;
    use tempfile::TempDir;

    fn context() -> NarrativeContext {
        NarrativeContext {
            question: "Compare rice production in Maharashtra and Punjab".to_string(),
            headline: "Punjab produced more rice than Maharashtra.".to_string(),
            scope: "Rice in Maharashtra and Punjab".to_string(),
            rows: vec![
                NarrativeRow {
                    label: "Maharashtra".to_string(),
                    value: "223,000".to_string(),
                    unit: "tonnes".to_string(),
                    source: "[1]".to_string(),
                },
                NarrativeRow {
                    label: "Punjab".to_string(),
                    value: "280,000".to_string(),
                    unit: "tonnes".to_string(),
                    source: "[2]".to_string(),
                },
            ],
            findings: vec!["Punjab's total is 1.26 times Maharashtra's.".to_string()],
            caveats: Vec::new(),
        }
    }

    #[test]
    fn test_render_comparison() {
        let set = TemplateSet::builtin().unwrap();
        let rendered = set.render(NarrativeKind::Comparison, &context()).unwrap();

        assert!(rendered.text.starts_with("Punjab produced more rice"));
        assert!(rendered.text.contains("- Maharashtra: 223,000 tonnes [1]"));
        assert!(rendered.text.contains("- Punjab: 280,000 tonnes [2]"));
        assert!(!rendered.text.contains("Caveats"));
        assert!(!rendered.text.contains("\n\n\n"));
        assert!(!rendered.overridden);
    }

    #[test]
    fn test_caveats_rendered_when_present() {
        let set = TemplateSet::builtin().unwrap();
        let mut ctx = context();
        ctx.caveats.push("Punjab figures are fallback estimates.".to_string());

        let rendered = set.render(NarrativeKind::Lookup, &ctx).unwrap();
        assert!(rendered.text.contains("Caveats:"));
        assert!(rendered.text.contains("- Punjab figures are fallback estimates."));
    }

    #[test]
    fn test_text_is_not_html_escaped() {
        let set = TemplateSet::builtin().unwrap();
        let mut ctx = context();
        ctx.headline = "Ministry of Agriculture & Farmers Welfare <data>".to_string();

        let rendered = set.render(NarrativeKind::Lookup, &ctx).unwrap();
        assert!(rendered.text.contains("& Farmers Welfare <data>"));
    }

    #[test]
    fn test_unavailable_mentions_question() {
        let set = TemplateSet::builtin().unwrap();
        let rendered = set.render(NarrativeKind::Unavailable, &context()).unwrap();

        assert!(rendered.text.contains("No data is currently available"));
        assert!(rendered.text.contains("Compare rice production"));
    }

    #[test]
    fn test_workspace_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("lookup.yml"),
            "id: custom.lookup\ntitle: Custom\napiVersion: \"1.0\"\nkind: lookup\ntemplate: \"ANSWER: {{headline}}\"\n",
        )
        .unwrap();

        let set = TemplateSet::load(temp_dir.path()).unwrap();
        let rendered = set.render(NarrativeKind::Lookup, &context()).unwrap();

        assert_eq!(rendered.text, "ANSWER: Punjab produced more rice than Maharashtra.");
        assert!(rendered.overridden);
        assert_eq!(rendered.template_id, "custom.lookup");

        let trend = set.render(NarrativeKind::Trend, &context()).unwrap();
        assert!(!trend.overridden);
    }

    #[test]
    fn test_override_render_error_uses_builtin() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("comparison.yml"),
            "id: custom.comparison\ntitle: Custom\napiVersion: \"1.0\"\nkind: comparison\ntemplate: \"{{shout headline}}\"\n",
        )
        .unwrap();

        // Compiles, but `shout` is not a registered helper
        let set = TemplateSet::load(temp_dir.path()).unwrap();
        let rendered = set.render(NarrativeKind::Comparison, &context()).unwrap();

        assert!(rendered.text.starts_with("Punjab produced more rice"));
        assert_eq!(rendered.template_id, builtin_template(NarrativeKind::Comparison).unwrap().id);
        assert!(!rendered.overridden);
    }

    #[test]
    fn test_broken_override_fails_to_load() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("trend.yml"),
            "id: bad\ntitle: Bad\napiVersion: \"1.0\"\nkind: trend\ntemplate: \"{{#each rows}}\"\n",
        )
        .unwrap();

        assert!(TemplateSet::load(temp_dir.path()).is_err());
    }

    #[test]
    fn test_tidy_collapses_blank_lines() {
        assert_eq!(tidy("\n\na  \n\n\n\nb\n\n"), "a\n\nb");
    }
}
