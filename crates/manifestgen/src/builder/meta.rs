use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// A builder to build [`ObjectMeta`] objects.
///
/// Empty label and annotation maps are left out of the result, so generated objects don't
/// carry `labels: {}`.
#[derive(Clone, Debug, Default)]
pub struct ObjectMetaBuilder {
    name: Option<String>,
    namespace: Option<String>,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
}

impl ObjectMetaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn namespace_opt(&mut self, namespace: impl Into<Option<String>>) -> &mut Self {
        self.namespace = namespace.into();
        self
    }

    /// Replaces a previous label with the same key.
    pub fn with_label(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_labels(&mut self, labels: BTreeMap<String, String>) -> &mut Self {
        self.labels.extend(labels);
        self
    }

    /// Replaces a previous annotation with the same key.
    pub fn with_annotation(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_annotations(&mut self, annotations: BTreeMap<String, String>) -> &mut Self {
        self.annotations.extend(annotations);
        self
    }

    pub fn build(&self) -> ObjectMeta {
        ObjectMeta {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            labels: non_empty(&self.labels),
            annotations: non_empty(&self.annotations),
            ..ObjectMeta::default()
        }
    }
}

fn non_empty(map: &BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!map.is_empty()).then(|| map.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_metadata() {
        let meta = ObjectMetaBuilder::new()
            .name("demo")
            .namespace("apps")
            .with_label("app.kubernetes.io/name", "demo")
            .with_annotation("team", "payments")
            .build();

        assert_eq!(meta.name.as_deref(), Some("demo"));
        assert_eq!(meta.namespace.as_deref(), Some("apps"));
        assert_eq!(
            meta.labels,
            Some(BTreeMap::from([(
                "app.kubernetes.io/name".to_owned(),
                "demo".to_owned()
            )]))
        );
        assert_eq!(
            meta.annotations,
            Some(BTreeMap::from([("team".to_owned(), "payments".to_owned())]))
        );
    }

    #[test]
    fn empty_maps_are_omitted() {
        let meta = ObjectMetaBuilder::new().name("demo").build();

        assert_eq!(meta.labels, None);
        assert_eq!(meta.annotations, None);
        assert_eq!(meta.namespace, None);
    }
}
