//! Renders access strategy URL templates.
//!
//! Templates are written with Go `text/template` actions, e.g.
//! `https://{{.Workspace.Name}}-{{b32encode .Workspace.Namespace}}.example.com/`.
//! Each action is rewritten into an equivalent minijinja expression and the
//! result is rendered with strict undefined handling, so an unknown field or
//! function fails the whole render.
//!
//! Only field references, literals, function calls and pipelines are
//! supported. Control actions (`if`, `range`, ...) and variables are rejected.
//!
//! Spec fields are reachable by both their JSON name (`displayName`) and their
//! exported Go name (`DisplayName`). Unset fields render as an empty string,
//! as does `index` on a map without the key.

use crate::encoding::encode_b32;
use minijinja::{value::ValueKind, Environment, UndefinedBehavior, Value};
use serde::Serialize;
use workspace_connection_k8s_api::{ObjectMeta, Workspace, WorkspaceAccessStrategy};

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template syntax error: {0}")]
    Syntax(String),

    #[error("unsupported template action: {0}")]
    Unsupported(String),

    #[error("failed to render template: {0}")]
    Render(#[from] minijinja::Error),

    #[error("failed to build template context: {0}")]
    Context(#[from] serde_json::Error),
}

pub struct TemplateEngine {
    env: Environment<'static>,
}

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "end", "range", "with", "define", "template", "block", "break", "continue",
];

enum Token<'t> {
    Word(&'t str),
    Pipe,
}

/// Renders a bearer-auth URL template for a workspace.
pub fn render_bearer_auth_url(
    template: &str,
    workspace: &Workspace,
    strategy: &WorkspaceAccessStrategy,
) -> Result<String, TemplateError> {
    let ctx = bearer_auth_context(workspace, strategy)?;
    TemplateEngine::new().render(template, ctx)
}

/// Builds the values a bearer-auth template may reference.
pub fn bearer_auth_context(
    workspace: &Workspace,
    strategy: &WorkspaceAccessStrategy,
) -> Result<serde_json::Value, TemplateError> {
    Ok(serde_json::json!({
        "Workspace": object_context(&workspace.metadata, &workspace.spec)?,
        "AccessStrategy": object_context(&strategy.metadata, &strategy.spec)?,
    }))
}

fn object_context(
    meta: &ObjectMeta,
    spec: &impl Serialize,
) -> Result<serde_json::Value, serde_json::Error> {
    Ok(serde_json::json!({
        "Name": meta.name.as_deref().unwrap_or_default(),
        "Namespace": meta.namespace.as_deref().unwrap_or_default(),
        "UID": meta.uid.as_deref().unwrap_or_default(),
        "Labels": meta.labels.clone().unwrap_or_default(),
        "Annotations": meta.annotations.clone().unwrap_or_default(),
        "Spec": with_exported_names(serde_json::to_value(spec)?),
    }))
}

fn with_exported_names(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Json::Null => Json::String(String::new()),
        Json::Array(items) => items.into_iter().map(with_exported_names).collect(),
        Json::Object(fields) => {
            let mut out = serde_json::Map::with_capacity(fields.len() * 2);
            for (key, value) in fields {
                let value = with_exported_names(value);
                let exported = exported_name(&key);
                if exported != key {
                    out.entry(exported).or_insert_with(|| value.clone());
                }
                out.insert(key, value);
            }
            Json::Object(out)
        }
        value => value,
    }
}

fn exported_name(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

// === impl TemplateEngine ===

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_function("b32encode", b32encode);
        env.add_filter("b32encode", b32encode);
        env.add_function("index", index);
        Self { env }
    }

    pub fn render(&self, template: &str, ctx: impl Serialize) -> Result<String, TemplateError> {
        let source = translate(template)?;
        Ok(self.env.render_str(&source, ctx)?)
    }
}

fn b32encode(value: String) -> String {
    encode_b32(&value)
}

fn index(value: Value, key: Value) -> Result<Value, minijinja::Error> {
    let item = value.get_item(&key)?;
    if item.is_undefined() && value.kind() == ValueKind::Map {
        return Ok(Value::from(""));
    }
    Ok(item)
}

// === translation ===

fn translate(template: &str) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        push_text(&mut out, &rest[..start]);
        let action = &rest[start + 2..];
        let end = find_action_end(action)
            .ok_or_else(|| TemplateError::Syntax(format!("unclosed action in {template:?}")))?;
        out.push_str(&translate_action(&action[..end])?);
        rest = &action[end + 2..];
    }
    push_text(&mut out, rest);
    Ok(out)
}

/// Literal text must not be interpreted by minijinja.
fn push_text(out: &mut String, text: &str) {
    if text.contains("{%") || text.contains("{#") {
        out.push_str("{% raw %}");
        out.push_str(text);
        out.push_str("{% endraw %}");
    } else {
        out.push_str(text);
    }
}

/// Finds the closing `}}` of an action, skipping over quoted strings and
/// comments.
fn find_action_end(action: &str) -> Option<usize> {
    let skip = if action.starts_with("- /*") { 2 } else { 0 };
    if action[skip..].starts_with("/*") {
        let close = action[skip..].find("*/")? + skip + 2;
        return action[close..].find("}}").map(|i| i + close);
    }

    let bytes = action.as_bytes();
    let mut quote = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' && q != b'`' {
                    i += 2;
                    continue;
                }
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'`' | b'\'' => quote = Some(b),
                b'}' if bytes.get(i + 1) == Some(&b'}') => return Some(i),
                _ => {}
            },
        }
        i += 1;
    }
    None
}

fn translate_action(inner: &str) -> Result<String, TemplateError> {
    let (trim_left, inner) = match inner.strip_prefix('-') {
        Some(rest) if rest.starts_with(char::is_whitespace) => (true, rest),
        _ => (false, inner),
    };
    let (trim_right, inner) = match inner.strip_suffix('-') {
        Some(rest) if rest.ends_with(char::is_whitespace) => (true, rest),
        _ => (false, inner),
    };
    let open = if trim_left { "{{-" } else { "{{" };
    let close = if trim_right { "-}}" } else { "}}" };

    let body = inner.trim();
    if body.starts_with("/*") {
        if !body.ends_with("*/") {
            return Err(TemplateError::Syntax(format!("unclosed comment {body:?}")));
        }
        if trim_left || trim_right {
            return Ok(format!("{open} '' {close}"));
        }
        return Ok(String::new());
    }

    Ok(format!("{open} {} {close}", translate_pipeline(body)?))
}

fn translate_pipeline(body: &str) -> Result<String, TemplateError> {
    let mut commands = Vec::new();
    let mut current = Vec::new();
    for token in tokenize(body)? {
        match token {
            Token::Pipe => commands.push(std::mem::take(&mut current)),
            Token::Word(word) => current.push(word),
        }
    }
    commands.push(current);

    if commands.iter().any(Vec::is_empty) {
        return Err(TemplateError::Syntax(format!("missing command in {body:?}")));
    }
    let Some((head, filters)) = commands.split_first() else {
        return Err(TemplateError::Syntax(format!("empty action {body:?}")));
    };

    if let Some(keyword) = head.first().filter(|w| CONTROL_KEYWORDS.contains(w)) {
        return Err(TemplateError::Unsupported(format!("{keyword:?} actions")));
    }

    let mut expr = translate_head(head)?;
    for filter in filters {
        let (name, args) = match filter.split_first() {
            Some((name, args)) if function_name(name).is_some() => (*name, args),
            _ => {
                return Err(TemplateError::Syntax(format!(
                    "non-function in pipeline {body:?}"
                )))
            }
        };
        expr.push_str(" | ");
        expr.push_str(name);
        if !args.is_empty() {
            expr.push('(');
            expr.push_str(&translate_args(args)?);
            expr.push(')');
        }
    }
    Ok(expr)
}

fn translate_head(words: &[&str]) -> Result<String, TemplateError> {
    let Some((first, args)) = words.split_first() else {
        return Err(TemplateError::Syntax("empty command".to_string()));
    };
    if let Some(name) = function_name(first) {
        return Ok(format!("{name}({})", translate_args(args)?));
    }
    let operand = translate_operand(first)?;
    if !args.is_empty() {
        return Err(TemplateError::Syntax(format!(
            "can't give argument to non-function {first:?}"
        )));
    }
    Ok(operand)
}

fn translate_args(args: &[&str]) -> Result<String, TemplateError> {
    Ok(args
        .iter()
        .map(|arg| translate_operand(arg))
        .collect::<Result<Vec<_>, _>>()?
        .join(", "))
}

fn translate_operand(word: &str) -> Result<String, TemplateError> {
    if let Some(path) = word.strip_prefix('.') {
        if path.is_empty() {
            return Err(TemplateError::Unsupported("the dot cursor".to_string()));
        }
        if !path.split('.').all(is_identifier) {
            return Err(TemplateError::Syntax(format!("invalid field path {word:?}")));
        }
        return Ok(path.to_string());
    }

    if word.starts_with('$') {
        return Err(TemplateError::Unsupported(format!("variable {word}")));
    }
    if word.starts_with('"') {
        return Ok(word.to_string());
    }
    if let Some(raw) = word.strip_prefix('`').and_then(|w| w.strip_suffix('`')) {
        return Ok(serde_json::Value::String(raw.to_string()).to_string());
    }
    if word.starts_with('\'') {
        return Err(TemplateError::Unsupported(format!("character constant {word}")));
    }

    match word {
        "true" | "false" => return Ok(word.to_string()),
        "nil" => return Ok("none".to_string()),
        _ => {}
    }
    if word.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+')
        && word.parse::<f64>().is_ok()
    {
        return Ok(word.to_string());
    }

    if let Some(name) = function_name(word) {
        return Ok(format!("{name}()"));
    }
    Err(TemplateError::Syntax(format!("unexpected {word:?}")))
}

fn function_name(word: &str) -> Option<&str> {
    if matches!(word, "true" | "false" | "nil") || !is_identifier(word) {
        return None;
    }
    Some(word)
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn tokenize(body: &str) -> Result<Vec<Token<'_>>, TemplateError> {
    let bytes = body.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b if b.is_ascii_whitespace() => i += 1,
            b'|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            b'(' | b')' => {
                return Err(TemplateError::Unsupported(format!(
                    "parenthesized pipeline in {body:?}"
                )))
            }
            b'"' | b'`' | b'\'' => {
                let end = scan_quoted(bytes, i).ok_or_else(|| {
                    TemplateError::Syntax(format!("unterminated quoted string in {body:?}"))
                })?;
                tokens.push(Token::Word(&body[i..end]));
                i = end;
            }
            _ => {
                let start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'|' | b'(' | b')' | b'"' | b'`' | b'\'')
                {
                    i += 1;
                }
                tokens.push(Token::Word(&body[start..i]));
            }
        }
    }
    Ok(tokens)
}

fn scan_quoted(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'\\' && quote != b'`' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{mk_strategy, mk_workspace, with_strategy};

    fn render(template: &str) -> Result<String, TemplateError> {
        let ws = mk_workspace("default", "myworkspace", Some("Public"), None);
        let mut ws = with_strategy(ws, "web", Some("shared"));
        ws.metadata.labels = Some(maplit::btreemap! {
            "app.kubernetes.io/name".to_string() => "jupyter".to_string(),
        });
        let strategy = mk_strategy("shared", "web", Some(template));
        render_bearer_auth_url(template, &ws, &strategy)
    }

    #[test]
    fn field_references() {
        assert_eq!(render("{{.Workspace.Name}}").unwrap(), "myworkspace");
        assert_eq!(render("{{ .Workspace.Namespace }}").unwrap(), "default");
        assert_eq!(render("{{.Workspace.UID}}").unwrap(), "myworkspace-uid");
        assert_eq!(render("{{.AccessStrategy.Name}}").unwrap(), "web");
        assert_eq!(render("{{.AccessStrategy.Namespace}}").unwrap(), "shared");
        assert_eq!(render("{{.Workspace.Spec.displayName}}").unwrap(), "myworkspace");
    }

    #[test]
    fn b32encode_call_and_pipeline() {
        assert_eq!(
            render("{{b32encode .Workspace.Namespace}}").unwrap(),
            "mrswmylvnr2a"
        );
        assert_eq!(
            render("{{.Workspace.Namespace | b32encode}}").unwrap(),
            "mrswmylvnr2a"
        );
        assert_eq!(render("{{b32encode `default`}}").unwrap(), "mrswmylvnr2a");
        assert_eq!(render(r#"{{b32encode "default"}}"#).unwrap(), "mrswmylvnr2a");
    }

    #[test]
    fn bearer_auth_url() {
        let template =
            "https://{{.Workspace.Name}}-{{b32encode .Workspace.Namespace}}.example.com/bearer-auth";
        assert_eq!(
            render(template).unwrap(),
            "https://myworkspace-mrswmylvnr2a.example.com/bearer-auth"
        );
        assert_eq!(render(template).unwrap(), render(template).unwrap());
    }

    #[test]
    fn index_function() {
        assert_eq!(
            render(r#"{{index .Workspace.Labels "app.kubernetes.io/name"}}"#).unwrap(),
            "jupyter"
        );
    }

    #[test]
    fn unset_spec_fields_render_empty() {
        assert_eq!(
            render("https://x.example.com/{{.Workspace.Spec.image}}/bearer-auth").unwrap(),
            "https://x.example.com//bearer-auth"
        );
        assert_eq!(render("a{{.Workspace.Spec.desiredStatus}}b").unwrap(), "ab");
        assert_eq!(render("a{{.Workspace.Spec.TemplateRef}}b").unwrap(), "ab");
        assert_eq!(render(r#"a{{index .Workspace.Labels "missing"}}b"#).unwrap(), "ab");
    }

    #[test]
    fn exported_spec_field_names() {
        assert_eq!(render("{{.Workspace.Spec.DisplayName}}").unwrap(), "myworkspace");
        assert_eq!(render("{{.Workspace.Spec.AccessType}}").unwrap(), "Public");
        assert_eq!(render("{{.Workspace.Spec.AccessStrategy.Name}}").unwrap(), "web");
        assert_eq!(render("{{.Workspace.Spec.accessStrategy.name}}").unwrap(), "web");
        assert!(render("{{.AccessStrategy.Spec.BearerAuthURLTemplate}}").is_ok());
    }

    #[test]
    fn trim_markers_and_comments() {
        assert_eq!(render("a {{- .Workspace.Name -}} b").unwrap(), "amyworkspaceb");
        assert_eq!(render("a{{/* note */}}b").unwrap(), "ab");
        assert_eq!(render("{{.Workspace.Name}}/{#literal").unwrap(), "myworkspace/{#literal");
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(
            render("https://example.com/static/").unwrap(),
            "https://example.com/static/"
        );
    }

    #[test]
    fn unknown_field_fails() {
        assert!(matches!(
            render("https://{{.Workspace.Bogus}}.example.com"),
            Err(TemplateError::Render(_))
        ));
        assert!(matches!(
            render("{{.Workspace.Bogus.Deeper}}"),
            Err(TemplateError::Render(_))
        ));
    }

    #[test]
    fn unknown_function_fails() {
        assert!(render("{{nope .Workspace.Name}}").is_err());
        assert!(render("{{.Workspace.Name | nope}}").is_err());
    }

    #[test]
    fn bad_syntax_fails() {
        for template in [
            "{{.Workspace.Name",
            "{{.Workspace..Name}}",
            "{{}}",
            "{{.Workspace.Name |}}",
            "{{.Workspace.Name .Workspace.Namespace}}",
            r#"{{b32encode "unterminated}}"#,
            "{{.Workspace.Name | .Workspace.Namespace}}",
        ] {
            assert!(
                matches!(render(template), Err(TemplateError::Syntax(_))),
                "{template}"
            );
        }
    }

    #[test]
    fn control_actions_are_rejected() {
        for template in [
            "{{if .Workspace.Name}}x{{end}}",
            "{{range .Workspace.Labels}}{{end}}",
            "{{$x := .Workspace.Name}}",
            "{{.}}",
            "{{b32encode (.Workspace.Name)}}",
        ] {
            assert!(
                matches!(render(template), Err(TemplateError::Unsupported(_))),
                "{template}"
            );
        }
    }
}
