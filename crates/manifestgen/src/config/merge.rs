use std::collections::{BTreeMap, btree_map};

use crate::descriptor::{
    AppConfig, AutoscalingSpec, BuildInfo, ConcurrencyPolicy, ImageSpec, IngressSpec, JobSpec,
    MetricsSpec, PodSecurityContextSpec, ProbeSpec, Probes, PullPolicy, RbacRequest,
    RegistryCredentials, ResourcesSpec, RestartPolicy, RouteSpec, ServiceType, WorkloadKind,
};

/// A type that can be merged with itself.
///
/// Used to layer a per-target section of a descriptor file over its base section, where the
/// per-target values take precedence.
///
/// # Example
///
/// ```
/// # use manifestgen::{config::merge::Merge, descriptor::ResourcesSpec};
/// let mut resources = ResourcesSpec {
///     cpu_limit: Some("2".to_owned()),
///     ..ResourcesSpec::default()
/// };
/// resources.merge(&ResourcesSpec {
///     cpu_limit: Some("1".to_owned()),
///     memory_limit: Some("1Gi".to_owned()),
///     ..ResourcesSpec::default()
/// });
/// assert_eq!(resources.cpu_limit.as_deref(), Some("2"));
/// assert_eq!(resources.memory_limit.as_deref(), Some("1Gi"));
/// ```
///
/// # Options
///
/// A field should be [`Option`]al if it is [`Atomic`] (for example: [`u32`]) or an enum.
/// Composite objects should generally *not* be optional, so that their fields are merged one by
/// one.
pub trait Merge {
    /// Merge with `defaults`, preferring values from `self` if they are set there
    fn merge(&mut self, defaults: &Self);
}

impl<T: Merge> Merge for Box<T> {
    fn merge(&mut self, defaults: &Self) {
        T::merge(self, defaults);
    }
}

impl<K: Ord + Clone, V: Merge + Clone> Merge for BTreeMap<K, V> {
    fn merge(&mut self, defaults: &Self) {
        for (k, default_v) in defaults {
            match self.entry(k.clone()) {
                btree_map::Entry::Occupied(mut entry) => {
                    entry.get_mut().merge(default_v);
                }
                btree_map::Entry::Vacant(entry) => {
                    entry.insert(default_v.clone());
                }
            }
        }
    }
}

/// A present string always wins, so label and annotation values in an override replace the base.
impl Merge for String {
    fn merge(&mut self, _defaults: &Self) {}
}

/// Moving version of [`Merge::merge`]
pub fn merge<T: Merge>(mut overrides: T, defaults: &T) -> T {
    overrides.merge(defaults);
    overrides
}

/// A marker trait for types that are merged atomically (as one single value) rather than
/// trying to merge each field individually
pub trait Atomic: Clone {}
impl Atomic for u32 {}
impl Atomic for bool {}
impl Atomic for String {}
impl Atomic for PullPolicy {}
impl Atomic for RegistryCredentials {}
impl Atomic for ProbeSpec {}
impl Atomic for ServiceType {}
impl Atomic for WorkloadKind {}
impl Atomic for ConcurrencyPolicy {}
impl Atomic for RestartPolicy {}
impl Atomic for RbacRequest {}
impl Atomic for IngressSpec {}
impl Atomic for RouteSpec {}
impl Atomic for AutoscalingSpec {}
impl Atomic for MetricsSpec {}
impl Atomic for PodSecurityContextSpec {}
/// Lists replace each other, they are never concatenated.
impl<T: Clone> Atomic for Vec<T> {}

impl<T: Atomic> Merge for Option<T> {
    fn merge(&mut self, defaults: &Self) {
        if self.is_none() {
            *self = defaults.clone();
        }
    }
}

impl Merge for ImageSpec {
    fn merge(&mut self, defaults: &Self) {
        self.registry.merge(&defaults.registry);
        self.group.merge(&defaults.group);
        self.name.merge(&defaults.name);
        self.tag.merge(&defaults.tag);
        self.pull_policy.merge(&defaults.pull_policy);
        if self.pull_secrets.is_empty() {
            self.pull_secrets.clone_from(&defaults.pull_secrets);
        }
        self.registry_credentials
            .merge(&defaults.registry_credentials);
    }
}

impl Merge for Probes {
    fn merge(&mut self, defaults: &Self) {
        self.liveness.merge(&defaults.liveness);
        self.readiness.merge(&defaults.readiness);
        self.startup.merge(&defaults.startup);
    }
}

impl Merge for ResourcesSpec {
    fn merge(&mut self, defaults: &Self) {
        self.cpu_request.merge(&defaults.cpu_request);
        self.cpu_limit.merge(&defaults.cpu_limit);
        self.memory_request.merge(&defaults.memory_request);
        self.memory_limit.merge(&defaults.memory_limit);
    }
}

impl Merge for JobSpec {
    fn merge(&mut self, defaults: &Self) {
        self.schedule.merge(&defaults.schedule);
        self.time_zone.merge(&defaults.time_zone);
        self.concurrency_policy.merge(&defaults.concurrency_policy);
        self.restart_policy.merge(&defaults.restart_policy);
        self.parallelism.merge(&defaults.parallelism);
        self.completions.merge(&defaults.completions);
        self.backoff_limit.merge(&defaults.backoff_limit);
        self.active_deadline_seconds
            .merge(&defaults.active_deadline_seconds);
        self.ttl_seconds_after_finished
            .merge(&defaults.ttl_seconds_after_finished);
    }
}

impl Merge for AppConfig {
    fn merge(&mut self, defaults: &Self) {
        self.config_map.merge(&defaults.config_map);
        self.secret.merge(&defaults.secret);
    }
}

impl Merge for BuildInfo {
    fn merge(&mut self, defaults: &Self) {
        self.commit_id.merge(&defaults.commit_id);
        self.vcs_uri.merge(&defaults.vcs_uri);
        self.build_timestamp.merge(&defaults.build_timestamp);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{Merge, merge};
    use crate::descriptor::{ImageSpec, JobSpec, PullPolicy};

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Accumulator(u8);
    impl Merge for Accumulator {
        fn merge(&mut self, defaults: &Self) {
            self.0 += defaults.0;
        }
    }

    #[test]
    fn merge_option() {
        assert_eq!(merge(Some(1_u32), &Some(2)), Some(1));
        assert_eq!(merge(None, &Some(2_u32)), Some(2));
        assert_eq!(merge(None::<u32>, &None), None);
    }

    #[test]
    fn merge_btreemap() {
        assert_eq!(
            merge(
                BTreeMap::from([(1, Accumulator(1)), (2, Accumulator(2))]),
                &BTreeMap::from([(2, Accumulator(10)), (3, Accumulator(30))])
            ),
            BTreeMap::from([(1, Accumulator(1)), (2, Accumulator(12)), (3, Accumulator(30))])
        );
    }

    #[test]
    fn string_values_in_overrides_win() {
        let merged = merge(
            BTreeMap::from([("team".to_owned(), "payments".to_owned())]),
            &BTreeMap::from([
                ("team".to_owned(), "platform".to_owned()),
                ("tier".to_owned(), "backend".to_owned()),
            ]),
        );
        assert_eq!(merged["team"], "payments");
        assert_eq!(merged["tier"], "backend");
    }

    #[test]
    fn merge_image_fieldwise() {
        let merged = merge(
            ImageSpec {
                pull_policy: Some(PullPolicy::Never),
                ..ImageSpec::default()
            },
            &ImageSpec {
                registry: Some("quay.io".to_owned()),
                pull_policy: Some(PullPolicy::Always),
                pull_secrets: vec!["quay".to_owned()],
                ..ImageSpec::default()
            },
        );

        assert_eq!(merged.registry.as_deref(), Some("quay.io"));
        assert_eq!(merged.pull_policy, Some(PullPolicy::Never));
        assert_eq!(merged.pull_secrets, ["quay"]);
    }

    #[test]
    fn merge_job_keeps_the_base_schedule() {
        let merged = merge(
            JobSpec {
                backoff_limit: Some(1),
                ..JobSpec::default()
            },
            &JobSpec {
                schedule: Some("0 3 * * *".to_owned()),
                backoff_limit: Some(6),
                ..JobSpec::default()
            },
        );

        assert_eq!(merged.schedule.as_deref(), Some("0 3 * * *"));
        assert_eq!(merged.backoff_limit, Some(1));
    }
}
