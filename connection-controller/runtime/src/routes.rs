//! Maps request paths onto handlers.
//!
//! Routes are matched in registration order. Namespaced routes match paths of
//! the form `<api prefix>/namespaces/<namespace>/<resource>` exactly.

use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct Router<H> {
    namespaced_prefix: String,
    routes: Vec<Route<H>>,
}

#[derive(Clone, Debug)]
enum Route<H> {
    Exact { path: String, handler: H },
    Namespaced { resources: BTreeMap<String, H> },
}

/// The outcome of matching a path against a [`Router`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch<H> {
    Exact(H),
    Namespaced { handler: H, namespace: String },
    MissingNamespace,
    NotFound,
}

// === impl Router ===

impl<H: Clone> Router<H> {
    pub fn new(api_prefix: &str) -> Self {
        let prefix = normalize(api_prefix);
        Self {
            namespaced_prefix: format!("{}/namespaces/", prefix.trim_end_matches('/')),
            routes: Vec::new(),
        }
    }

    pub fn register_route(&mut self, path: &str, handler: H) {
        self.routes.push(Route::Exact {
            path: normalize(path),
            handler,
        });
    }

    pub fn register_namespaced_routes<R>(&mut self, resources: impl IntoIterator<Item = (R, H)>)
    where
        R: Into<String>,
    {
        let resources = resources
            .into_iter()
            .map(|(name, handler)| (name.into(), handler))
            .collect();
        self.routes.push(Route::Namespaced { resources });
    }

    pub fn dispatch(&self, path: &str) -> Dispatch<H> {
        for route in &self.routes {
            match route {
                Route::Exact { path: p, handler } if p == path => {
                    return Dispatch::Exact(handler.clone());
                }
                Route::Exact { .. } => {}
                Route::Namespaced { resources } => {
                    if let Some(dispatch) = self.dispatch_namespaced(path, resources) {
                        return dispatch;
                    }
                }
            }
        }
        Dispatch::NotFound
    }

    fn dispatch_namespaced(
        &self,
        path: &str,
        resources: &BTreeMap<String, H>,
    ) -> Option<Dispatch<H>> {
        let Some(rest) = path.strip_prefix(self.namespaced_prefix.as_str()) else {
            if path == self.namespaced_prefix.trim_end_matches('/') {
                return Some(Dispatch::MissingNamespace);
            }
            return None;
        };

        let mut segments = rest.split('/');
        let namespace = segments.next().unwrap_or_default();
        if namespace.is_empty() {
            return Some(Dispatch::MissingNamespace);
        }

        let handler = match (segments.next(), segments.next()) {
            (Some(resource), None) => resources.get(resource),
            _ => None,
        };
        Some(match handler {
            Some(handler) => Dispatch::Namespaced {
                handler: handler.clone(),
                namespace: namespace.to_string(),
            },
            None => Dispatch::NotFound,
        })
    }
}

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
