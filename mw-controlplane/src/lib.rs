//! The control-plane library: reconciliation, config merging, mTLS lifecycle,
//! and static-config editing, wired together by the `mw-controlplane` binary.

pub mod config;
pub mod configproxy;
pub mod datasource;
pub mod error;
pub mod http;
pub mod model;
pub mod mtls;
pub mod plugins;
pub mod reconciler;
pub mod staticconfig;
pub mod store;
