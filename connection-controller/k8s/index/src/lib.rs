//! Workspace Connection Resource Index
//!
//! Connection requests read three kinds of cluster resources, all of them
//! namespaced:
//!
//! - A `Workspace` carries the access type and owner annotation consulted by
//!   every permission check, and optionally references an access strategy.
//! - A `WorkspaceAccessStrategy` holds the bearer-auth URL template used for
//!   browser connections. It may live in a different namespace than the
//!   workspaces that reference it.
//! - Each `Pod` labeled with `workspace.jupyter.org/workspace-name` backs a
//!   workspace. Its UID identifies the tunnel target for remote IDE sessions.
//!
//! The index is fed by watches and read concurrently by request handlers.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod index;


pub use self::index::{Index, SharedIndex};
