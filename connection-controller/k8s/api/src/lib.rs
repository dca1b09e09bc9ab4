#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod access_strategy;
pub mod connection;
pub mod workspace;

pub use self::{
    access_strategy::{WorkspaceAccessStrategy, WorkspaceAccessStrategySpec},
    workspace::{
        AccessStrategyRef, AccessType, Workspace, WorkspaceSpec, OWNER_ANNOTATION,
        WORKSPACE_NAME_LABEL,
    },
};
pub use k8s_openapi::{
    api::core::v1::Pod,
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
pub use kube::ResourceExt;
