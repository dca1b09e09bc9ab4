#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod authz;
pub mod connection;
pub mod encoding;
mod store;
pub mod subject;
pub mod template;
pub mod vscode;
pub mod web_ui;

#[cfg(test)]
mod test_util;

pub use self::{
    authz::{AccessCheck, AuthorizeSubject, Decision, Permission, PermissionChecker},
    connection::{Backends, ConnectionConfig, ConnectionType, ConnectionUrlError},
    store::ResourceStore,
    subject::Subject,
    vscode::{SessionInfo, StartSession},
    web_ui::{SignToken, TokenScope},
};
pub use workspace_connection_k8s_api as k8s;
