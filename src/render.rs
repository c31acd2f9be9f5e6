//! Template rendering on top of minijinja.
//!
//! Every render compiles the template text fresh against a one-shot
//! environment. Compilation and evaluation failures are kept apart so the
//! error reporter can show the template source for syntax errors and the
//! full context for runtime errors.

use crate::error::BuildError;
use serde_json::{Map, Value};
use std::{fs, path::PathBuf};

/// Renders template strings and template files from the templates directory.
#[derive(Debug)]
pub struct Renderer {
    templates_dir: PathBuf,
}

impl Renderer {
    pub fn new(templates_dir: PathBuf) -> Self {
        Self { templates_dir }
    }

    /// Render a template string against a context.
    pub fn render(&self, template: &str, context: &Map<String, Value>) -> Result<String, BuildError> {
        let env = minijinja::Environment::new();
        let tmpl = env
            .template_from_str(template)
            .map_err(|source| BuildError::TemplateCreate {
                template: template.to_owned(),
                source,
            })?;
        tmpl.render(context)
            .map_err(|source| BuildError::TemplateRender {
                template: template.to_owned(),
                context: Value::Object(context.clone()),
                source,
            })
    }

    /// Render a template file (by name, relative to the templates directory).
    pub fn render_file(
        &self,
        name: &str,
        context: &Map<String, Value>,
    ) -> Result<String, BuildError> {
        let path = self.templates_dir.join(name);
        let template = fs::read_to_string(&path).map_err(|source| BuildError::Io {
            context: "failed to read template",
            path,
            source,
        })?;
        self.render(&template, context)
    }
}

/// Merge context layers left to right; later layers overwrite earlier keys.
pub fn merge_contexts(
    layers: impl IntoIterator<Item = Map<String, Value>>,
) -> Map<String, Value> {
    let mut merged = Map::new();
    for layer in layers {
        merged.extend(layer);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn renders_string_with_context() {
        let renderer = Renderer::new(PathBuf::from("unused"));
        let context = obj(json!({"name": "world"}));
        let out = renderer.render("hello {{ name }}", &context).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn syntax_error_is_create_failure() {
        let renderer = Renderer::new(PathBuf::from("unused"));
        let err = renderer.render("{% broken", &Map::new()).unwrap_err();
        assert!(matches!(err, BuildError::TemplateCreate { .. }));
    }

    #[test]
    fn runtime_error_is_render_failure_with_context() {
        let renderer = Renderer::new(PathBuf::from("unused"));
        let context = obj(json!({"n": 5}));
        let err = renderer
            .render("{% for x in n %}{% endfor %}", &context)
            .unwrap_err();
        match err {
            BuildError::TemplateRender { context, .. } => {
                assert_eq!(context["n"], 5);
            }
            other => panic!("expected render failure, got {other:?}"),
        }
    }

    #[test]
    fn missing_template_file_is_io_error() {
        let renderer = Renderer::new(PathBuf::from("/nonexistent"));
        let err = renderer.render_file("nope.html.jinja", &Map::new()).unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }

    #[test]
    fn merge_later_layers_win() {
        let merged = merge_contexts([
            obj(json!({"a": 1, "b": 1})),
            obj(json!({"b": 2, "c": 2})),
            obj(json!({"c": 3})),
        ]);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
        assert_eq!(merged["c"], 3);
    }
}
