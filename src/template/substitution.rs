//! Variable substitution engine for templates
//!
//! References take the form `{{ path.to.value }}`. Each dot-separated segment
//! selects an object key, or an array index when the current value is an
//! array. `\{{` produces a literal `{{`, and `\\{{` produces a literal
//! backslash followed by a resolved reference. An unterminated, empty or
//! brace-containing reference is copied to the output unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What an unresolved reference renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Replace with an empty string
    #[default]
    Empty,
    /// Leave the `{{...}}` placeholder in place
    Keep,
}

/// A stateless text renderer shared by every field of every template.
pub trait Render: Send + Sync {
    fn render(&self, template: &str, variables: &Value) -> String;
}

impl<F> Render for F
where
    F: Fn(&str, &Value) -> String + Send + Sync,
{
    fn render(&self, template: &str, variables: &Value) -> String {
        self(template, variables)
    }
}

/// `{{path}}` substitution against a JSON variable context
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstitutionRenderer {
    unresolved: UnresolvedPolicy,
}

impl SubstitutionRenderer {
    pub fn new(unresolved: UnresolvedPolicy) -> Self {
        Self { unresolved }
    }
}

impl Render for SubstitutionRenderer {
    fn render(&self, template: &str, variables: &Value) -> String {
        substitute_string(template, variables, self.unresolved)
    }
}

/// Substitute `{{path}}` references in a single string
pub fn substitute_string(template: &str, variables: &Value, unresolved: UnresolvedPolicy) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let bytes = rest.as_bytes();
        let escaped = start > 0 && bytes[start - 1] == b'\\';
        let backslash_literal = escaped && start > 1 && bytes[start - 2] == b'\\';

        // `\{{` is an escaped opening brace pair
        if escaped && !backslash_literal {
            result.push_str(&rest[..start - 1]);
            result.push_str("{{");
            rest = &rest[start + 2..];
            continue;
        }

        // `\\{{` keeps one backslash and still opens a reference
        if backslash_literal {
            result.push_str(&rest[..start - 1]);
        } else {
            result.push_str(&rest[..start]);
        }
        let after_open = &rest[start + 2..];

        let Some(end) = after_open.find("}}") else {
            result.push_str(&rest[start..]);
            return result;
        };

        let placeholder = &rest[start..start + 2 + end + 2];
        let path = after_open[..end].trim();

        match parse_path(path) {
            Some(segments) => match lookup(variables, &segments) {
                Some(value) => push_value(&mut result, value),
                None => {
                    if unresolved == UnresolvedPolicy::Keep {
                        result.push_str(placeholder);
                    }
                }
            },
            None => result.push_str(placeholder),
        }

        rest = &after_open[end + 2..];
    }

    result.push_str(rest);
    result
}

/// Render every string inside a JSON tree, keeping keys and non-string
/// scalars as they are.
pub fn render_tree<R: Render + ?Sized>(renderer: &R, value: &Value, variables: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(renderer.render(s, variables)),
        Value::Array(arr) => Value::Array(
            arr.iter()
                .map(|v| render_tree(renderer, v, variables))
                .collect(),
        ),
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(key, val)| (key.clone(), render_tree(renderer, val, variables)))
                .collect(),
        ),
        // Numbers, booleans, null are passed through as-is
        _ => value.clone(),
    }
}

fn parse_path(path: &str) -> Option<Vec<&str>> {
    if path.is_empty() {
        return None;
    }
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();
    if segments
        .iter()
        .any(|s| s.is_empty() || s.contains(['{', '}']))
    {
        return None;
    }
    Some(segments)
}

fn lookup<'a>(variables: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments.iter().try_fold(variables, |current, segment| match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(arr) => segment.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    })
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Null => {}
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        // For arrays and objects, use JSON representation
        _ => out.push_str(&value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, variables: &Value) -> String {
        SubstitutionRenderer::default().render(template, variables)
    }

    #[test]
    fn test_substitute_simple() {
        let variables = json!({ "name": "World" });
        assert_eq!(render("Hello, {{name}}!", &variables), "Hello, World!");
    }

    #[test]
    fn test_substitute_multiple() {
        let variables = json!({
            "order_id": "ORD-123",
            "carrier": "FedEx"
        });

        assert_eq!(
            render(
                "Your order {{order_id}} is being delivered by {{carrier}} ({{order_id}})",
                &variables
            ),
            "Your order ORD-123 is being delivered by FedEx (ORD-123)"
        );
    }

    #[test]
    fn test_substitute_dot_path() {
        let variables = json!({
            "user": { "first_name": "Ada", "address": { "city": "London" } }
        });

        assert_eq!(
            render("{{user.first_name}} from {{ user.address.city }}", &variables),
            "Ada from London"
        );
    }

    #[test]
    fn test_substitute_array_index() {
        let variables = json!({ "items": [{ "sku": "A1" }, { "sku": "B2" }] });
        assert_eq!(render("{{items.1.sku}}", &variables), "B2");
        assert_eq!(render("[{{items.5.sku}}]", &variables), "[]");
    }

    #[test]
    fn test_substitute_scalar_variables() {
        let variables = json!({
            "count": 42,
            "ratio": 0.5,
            "active": true,
            "nothing": null,
            "tags": ["a", "b"]
        });

        assert_eq!(
            render("{{count}}|{{ratio}}|{{active}}|{{nothing}}|{{tags}}", &variables),
            "42|0.5|true||[\"a\",\"b\"]"
        );
    }

    #[test]
    fn test_unresolved_renders_empty_by_default() {
        let variables = json!({ "user": { "name": "Ada" } });
        assert_eq!(render("Hi {{user.email}}!", &variables), "Hi !");
        assert_eq!(render("Hi {{missing}}!", &variables), "Hi !");
    }

    #[test]
    fn test_unresolved_kept_when_configured() {
        let renderer = SubstitutionRenderer::new(UnresolvedPolicy::Keep);
        let variables = json!({ "name": "Ada" });
        assert_eq!(
            renderer.render("{{name}} {{ user.email }}", &variables),
            "Ada {{ user.email }}"
        );
    }

    #[test]
    fn test_non_object_context_resolves_nothing() {
        assert_eq!(render("a{{b}}c", &json!("scalar")), "ac");
    }

    #[test]
    fn test_malformed_references_are_literal() {
        let variables = json!({ "a": "x" });
        assert_eq!(render("{{}} and {{a..b}}", &variables), "{{}} and {{a..b}}");
        assert_eq!(render("open {{a", &variables), "open {{a");
        assert_eq!(render("{{{a}}}", &variables), "{{{a}}}");
        assert_eq!(render("{{ {{a}} }}", &variables), "{{ {{a}} }}");
    }

    #[test]
    fn test_escaped_braces() {
        let variables = json!({ "name": "Ada" });
        assert_eq!(
            render("\\{{name}} is {{name}}", &variables),
            "{{name}} is Ada"
        );
        assert_eq!(render(r"C:\\{{name}}", &variables), r"C:\Ada");
        assert_eq!(render(r"a\b {{name}}", &variables), r"a\b Ada");
    }

    #[test]
    fn test_multibyte_text_preserved() {
        let variables = json!({ "name": "Zoë" });
        assert_eq!(render("¡Hola {{name}}! ✓", &variables), "¡Hola Zoë! ✓");
    }

    #[test]
    fn test_render_tree_nested() {
        let template = json!({
            "notification": {
                "title": "Hello {{name}}",
                "data": { "user_id": "{{user_id}}", "retries": 3 }
            },
            "items": ["{{name}}", false]
        });

        let variables = json!({ "name": "Alice", "user_id": "user-123" });

        let result = render_tree(&SubstitutionRenderer::default(), &template, &variables);
        assert_eq!(result["notification"]["title"], "Hello Alice");
        assert_eq!(result["notification"]["data"]["user_id"], "user-123");
        assert_eq!(result["notification"]["data"]["retries"], 3);
        assert_eq!(result["items"], json!(["Alice", false]));
    }

    #[test]
    fn test_render_tree_keeps_keys_literal() {
        let template = json!({ "{{name}}": "{{name}}" });
        let result = render_tree(
            &SubstitutionRenderer::default(),
            &template,
            &json!({ "name": "k" }),
        );
        assert_eq!(result, json!({ "{{name}}": "k" }));
    }

    #[test]
    fn test_closure_renderer() {
        let upper = |text: &str, _: &Value| text.to_uppercase();
        assert_eq!(upper.render("abc", &json!({})), "ABC");
    }
}
