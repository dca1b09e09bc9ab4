use std::collections::BTreeMap;

/// The identity on whose behalf a request is evaluated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Subject {
    pub username: String,
    pub groups: Vec<String>,
    pub uid: Option<String>,
    pub extra: BTreeMap<String, Vec<String>>,
}

// === impl Subject ===

impl Subject {
    pub fn from_username(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }
}

/// Escapes a header-supplied username as the body of a JSON string.
///
/// The username is otherwise left untouched, so an owner annotation written
/// with the same escaping compares equal.
pub fn sanitize_username(raw: &str) -> String {
    let quoted = serde_json::Value::String(raw.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
