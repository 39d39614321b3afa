//! Compiles declarative application descriptors into validated and ordered Kubernetes manifests.
//!
//! The stages of a build are [`synth`], [`merge`], [`pipeline::validate`] and
//! [`pipeline::order`], driven by [`pipeline::Generator`]. [`output`] renders and writes the
//! results.
pub mod builder;
pub mod config;
pub mod crd;
pub mod descriptor;
pub mod kvp;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod resource;
pub mod synth;
pub mod target;
pub mod validation;

pub use ::k8s_openapi;
pub use ::kube;
