use crate::core::subject::{sanitize_username, Subject};
use hyper::http::{request::Parts, HeaderMap};
use percent_encoding::percent_decode_str;

const REMOTE_USER: &str = "x-remote-user";
const REMOTE_GROUP: &str = "x-remote-group";
const REMOTE_EXTRA_PREFIX: &str = "x-remote-extra-";
const USER: &str = "x-user";

/// How much an identity can be trusted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trust {
    /// Established by an authenticating layer in front of this server.
    Verified,
    /// Read from request headers that nothing vouches for.
    Header,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSubject {
    pub subject: Subject,
    pub trust: Trust,
}

/// Determines the subject a request is made on behalf of.
///
/// A `Subject` placed in the request extensions always wins. Front-proxy
/// headers are honored as verified only when the server is configured to
/// trust them; otherwise the user headers are read as a lower-trust username.
pub fn resolve_subject(parts: &Parts, trust_request_headers: bool) -> Option<ResolvedSubject> {
    if let Some(subject) = parts.extensions.get::<Subject>() {
        return Some(ResolvedSubject {
            subject: subject.clone(),
            trust: Trust::Verified,
        });
    }

    if trust_request_headers {
        if let Some(subject) = front_proxy_subject(&parts.headers) {
            return Some(ResolvedSubject {
                subject,
                trust: Trust::Verified,
            });
        }
    }

    let username = [USER, REMOTE_USER]
        .into_iter()
        .find_map(|name| header_str(&parts.headers, name))?;
    tracing::debug!(user = %username, "Using unverified identity from request headers");
    Some(ResolvedSubject {
        subject: Subject::from_username(sanitize_username(username)),
        trust: Trust::Header,
    })
}

fn front_proxy_subject(headers: &HeaderMap) -> Option<Subject> {
    let username = header_str(headers, REMOTE_USER)?;

    let groups = headers
        .get_all(REMOTE_GROUP)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(String::from)
        .collect();

    let mut subject = Subject {
        username: sanitize_username(username),
        groups,
        ..Default::default()
    };
    for (name, value) in headers {
        let Some(key) = name.as_str().strip_prefix(REMOTE_EXTRA_PREFIX) else {
            continue;
        };
        let Ok(value) = value.to_str() else {
            continue;
        };
        let key = percent_decode_str(key).decode_utf8_lossy().to_lowercase();
        subject.extra.entry(key).or_default().push(value.to_string());
    }
    Some(subject)
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut req = Request::builder().uri("/");
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[test]
    fn extension_subject_wins() {
        let mut parts = parts(&[("X-User", "mallory")]);
        parts.extensions.insert(Subject::from_username("alice"));
        let resolved = resolve_subject(&parts, false).unwrap();
        assert_eq!(resolved.subject.username, "alice");
        assert_eq!(resolved.trust, Trust::Verified);
    }

    #[test]
    fn trusted_front_proxy_headers() {
        let parts = parts(&[
            ("X-Remote-User", "alice"),
            ("X-Remote-Group", "team-a"),
            ("X-Remote-Group", "system:authenticated"),
            ("X-Remote-Extra-Scopes", "read"),
            ("X-Remote-Extra-Scopes", "write"),
            ("X-Remote-Extra-Acme.com%2Fproject", "p-0"),
        ]);
        let resolved = resolve_subject(&parts, true).unwrap();
        assert_eq!(resolved.trust, Trust::Verified);
        assert_eq!(
            resolved.subject,
            Subject {
                username: "alice".to_string(),
                groups: vec!["team-a".to_string(), "system:authenticated".to_string()],
                uid: None,
                extra: maplit::btreemap! {
                    "scopes".to_string() => vec!["read".to_string(), "write".to_string()],
                    "acme.com/project".to_string() => vec!["p-0".to_string()],
                },
            }
        );
    }

    #[test]
    fn untrusted_headers_fall_back_to_username() {
        let parts = parts(&[("X-Remote-User", "alice"), ("X-Remote-Group", "admins")]);
        let resolved = resolve_subject(&parts, false).unwrap();
        assert_eq!(resolved.trust, Trust::Header);
        assert_eq!(resolved.subject, Subject::from_username("alice"));
    }

    #[test]
    fn x_user_preferred_over_remote_user() {
        let parts = parts(&[("X-User", "bob"), ("X-Remote-User", "alice")]);
        let resolved = resolve_subject(&parts, false).unwrap();
        assert_eq!(resolved.subject.username, "bob");
        assert_eq!(resolved.trust, Trust::Header);
    }

    #[test]
    fn header_usernames_are_sanitized() {
        let parts = parts(&[("X-User", r#"al"ice"#)]);
        let resolved = resolve_subject(&parts, false).unwrap();
        assert_eq!(resolved.subject.username, r#"al\"ice"#);
    }

    #[test]
    fn no_identity() {
        assert_eq!(resolve_subject(&parts(&[]), false), None);
        assert_eq!(resolve_subject(&parts(&[]), true), None);
        assert_eq!(resolve_subject(&parts(&[("X-User", " ")]), false), None);
    }
}
