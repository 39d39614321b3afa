//! This crate contains YAML helpers used by the manifestgen library and the command line tool.

pub mod manifest;
pub mod yaml;
