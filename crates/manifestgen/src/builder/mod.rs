//! Builders for the Kubernetes objects which make up the generated manifests.

pub mod meta;
pub mod pod;

/// Kubernetes uses `i32` for counts and durations, descriptors use unsigned integers.
pub(crate) fn saturating_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
