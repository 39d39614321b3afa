//! Labels and annotations shared by every generated object.
//!
//! Three sets are derived from a descriptor:
//!
//! - the recommended labels, put on every object and pod template,
//! - the selector labels, a subset used in Service and workload selectors,
//! - the common annotations, user annotations plus build metadata.
//!
//! See <https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/>.
use std::collections::BTreeMap;

use crate::descriptor::ApplicationDescriptor;

mod keys;

pub use keys::*;

/// Label value used for `app.kubernetes.io/version` when the application version is unset.
pub const UNSET_VERSION: &str = "unset";

/// Value of `app.kubernetes.io/managed-by` on every generated object.
pub const MANAGED_BY: &str = "manifestgen";

/// The labels of every generated object.
///
/// User labels are applied last and can therefore override the well-known labels. The version
/// label is left out of idempotent builds.
pub fn recommended_labels(descriptor: &ApplicationDescriptor) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::from([
        (K8S_APP_NAME_KEY.to_owned(), descriptor.name.clone()),
        (K8S_APP_MANAGED_BY_KEY.to_owned(), MANAGED_BY.to_owned()),
    ]);

    if !descriptor.idempotent {
        labels.insert(K8S_APP_VERSION_KEY.to_owned(), version_label(descriptor));
    }
    if let Some(part_of) = &descriptor.part_of {
        labels.insert(K8S_APP_PART_OF_KEY.to_owned(), part_of.clone());
    }

    labels.extend(descriptor.labels.clone());
    labels
}

/// The labels used to select the application pods, a subset of [`recommended_labels`].
///
/// Values are taken from the recommended labels, so user overrides of the name or version label
/// end up in selectors as well. The version label is only included on request, otherwise a
/// version bump would change the immutable selector of an existing Deployment.
pub fn selector_labels(descriptor: &ApplicationDescriptor) -> BTreeMap<String, String> {
    let with_version = descriptor.add_version_to_label_selectors && !descriptor.idempotent;

    recommended_labels(descriptor)
        .into_iter()
        .filter(|(key, _)| match key.as_str() {
            K8S_APP_NAME_KEY => descriptor.add_name_to_label_selectors,
            K8S_APP_VERSION_KEY => with_version,
            _ => false,
        })
        .collect()
}

/// The annotations of every generated object.
pub fn common_annotations(descriptor: &ApplicationDescriptor) -> BTreeMap<String, String> {
    let build = &descriptor.build;
    let mut annotations = BTreeMap::new();

    if let Some(vcs_uri) = &build.vcs_uri {
        annotations.insert(VCS_URI_KEY.to_owned(), vcs_uri.clone());
    }
    if !descriptor.idempotent {
        if let Some(commit_id) = &build.commit_id {
            annotations.insert(COMMIT_ID_KEY.to_owned(), commit_id.clone());
        }
        if let Some(timestamp) = &build.build_timestamp {
            annotations.insert(BUILD_TIMESTAMP_KEY.to_owned(), timestamp.clone());
        }
    }

    annotations.extend(descriptor.annotations.clone());
    annotations
}

fn version_label(descriptor: &ApplicationDescriptor) -> String {
    descriptor
        .version
        .clone()
        .unwrap_or_else(|| UNSET_VERSION.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::BuildInfo;

    fn build_info() -> BuildInfo {
        BuildInfo {
            commit_id: Some("3f2a9c1".to_owned()),
            vcs_uri: Some("https://git.example.com/demo.git".to_owned()),
            build_timestamp: Some("2026-10-16T10:00:00Z".to_owned()),
        }
    }

    #[test]
    fn unset_version_uses_sentinel() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .build()
            .expect("valid descriptor");

        let labels = recommended_labels(&descriptor);
        assert_eq!(labels[K8S_APP_VERSION_KEY], UNSET_VERSION);
        assert_eq!(labels[K8S_APP_NAME_KEY], "demo");
        assert_eq!(labels[K8S_APP_MANAGED_BY_KEY], "manifestgen");
    }

    #[test]
    fn version_is_excluded_from_selectors_by_default() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .version("1.0.0")
            .build()
            .expect("valid descriptor");

        assert_eq!(
            selector_labels(&descriptor),
            BTreeMap::from([(K8S_APP_NAME_KEY.to_owned(), "demo".to_owned())])
        );
    }

    #[test]
    fn version_can_be_added_to_selectors() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .version("1.0.0")
            .add_version_to_label_selectors(true)
            .build()
            .expect("valid descriptor");

        assert_eq!(selector_labels(&descriptor)[K8S_APP_VERSION_KEY], "1.0.0");
    }

    #[test]
    fn idempotent_builds_drop_changing_metadata() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .version("1.0.0")
            .build_info(build_info())
            .idempotent(true)
            .build()
            .expect("valid descriptor");

        assert!(!recommended_labels(&descriptor).contains_key(K8S_APP_VERSION_KEY));
        assert_eq!(
            common_annotations(&descriptor),
            BTreeMap::from([(
                VCS_URI_KEY.to_owned(),
                "https://git.example.com/demo.git".to_owned()
            )])
        );
    }

    #[test]
    fn build_metadata_is_annotated() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .build_info(build_info())
            .with_annotation("team", "payments")
            .build()
            .expect("valid descriptor");

        let annotations = common_annotations(&descriptor);
        assert_eq!(annotations[COMMIT_ID_KEY], "3f2a9c1");
        assert_eq!(annotations[BUILD_TIMESTAMP_KEY], "2026-10-16T10:00:00Z");
        assert_eq!(annotations["team"], "payments");
    }

    #[test]
    fn user_labels_are_applied_last() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .with_label(K8S_APP_MANAGED_BY_KEY, "helm")
            .build()
            .expect("valid descriptor");

        assert_eq!(recommended_labels(&descriptor)[K8S_APP_MANAGED_BY_KEY], "helm");
    }

    #[test]
    fn selectors_follow_overridden_labels() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .version("1.0.0")
            .add_version_to_label_selectors(true)
            .with_label(K8S_APP_NAME_KEY, "shop-api")
            .with_label(K8S_APP_VERSION_KEY, "stable")
            .build()
            .expect("valid descriptor");

        let labels = recommended_labels(&descriptor);
        let selector = selector_labels(&descriptor);
        assert_eq!(
            selector,
            BTreeMap::from([
                (K8S_APP_NAME_KEY.to_owned(), "shop-api".to_owned()),
                (K8S_APP_VERSION_KEY.to_owned(), "stable".to_owned()),
            ])
        );
        for (key, value) in &selector {
            assert_eq!(&labels[key], value);
        }
    }
}
