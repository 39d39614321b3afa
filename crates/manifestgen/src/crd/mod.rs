//! Third party custom resources which are generated for some targets.
//!
//! Only the fields the generator sets are modelled. Everything else can be added through
//! resource fragments.

pub mod deployment_config;
pub mod knative;
pub mod route;
pub mod service_binding;
pub mod service_monitor;
