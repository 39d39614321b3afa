//! The unit of output: one Kubernetes object, held as an untyped tree.
//!
//! Synthesis builds typed objects and converts them into [`ResourceObject`]s right away, so
//! that fragment merging, validation and ordering can work on any kind, including kinds the
//! generator knows nothing about.
use std::fmt::Display;

use kube::{Resource, core::DynamicObject};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize {kind} {name:?}"))]
    SerializeResource {
        source: serde_json::Error,
        kind: String,
        name: String,
    },

    #[snafu(display("failed to convert {kind} {name:?} into a dynamic object"))]
    ConvertResource {
        source: serde_json::Error,
        kind: String,
        name: String,
    },

    #[snafu(display("{key} is not a valid {kind}"))]
    ParseTypedResource {
        source: kube::core::dynamic::ParseDynamicObjectError,
        key: ResourceKey,
        kind: &'static str,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// Identifies a resource within a manifest set.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ResourceKey {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{kind} ", kind = self.kind)?;
        if let Some(namespace) = &self.namespace {
            write!(f, "{namespace}/")?;
        }
        write!(
            f,
            "{name:?} ({api_version})",
            name = self.name,
            api_version = self.api_version
        )
    }
}

/// A single generated (or user supplied) Kubernetes object.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ResourceObject(DynamicObject);

impl ResourceObject {
    /// Converts a typed object. The `apiVersion` and `kind` are taken from the object itself.
    pub fn from_resource<K>(resource: &K) -> Result<Self>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let kind = K::kind(&()).into_owned();
        let name = resource.meta().name.clone().unwrap_or_default();

        let value = serde_json::to_value(resource).context(SerializeResourceSnafu {
            kind: kind.clone(),
            name: name.clone(),
        })?;
        let object = serde_json::from_value(value).context(ConvertResourceSnafu { kind, name })?;

        Ok(Self(object))
    }

    pub fn from_dynamic(object: DynamicObject) -> Self {
        Self(object)
    }

    pub fn api_version(&self) -> &str {
        self.0
            .types
            .as_ref()
            .map_or("", |types| types.api_version.as_str())
    }

    pub fn kind(&self) -> &str {
        self.0.types.as_ref().map_or("", |types| types.kind.as_str())
    }

    pub fn name(&self) -> &str {
        self.0.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.metadata.namespace.as_deref()
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            api_version: self.api_version().to_owned(),
            kind: self.kind().to_owned(),
            namespace: self.namespace().map(ToOwned::to_owned),
            name: self.name().to_owned(),
        }
    }

    /// Everything besides `apiVersion`, `kind` and `metadata`, for example `spec` or `data`.
    pub fn data(&self) -> &serde_json::Value {
        &self.0.data
    }

    pub fn as_dynamic(&self) -> &DynamicObject {
        &self.0
    }

    pub fn into_dynamic(self) -> DynamicObject {
        self.0
    }

    /// Parses the object into its typed form, failing if the tree doesn't match the schema of
    /// `K`.
    pub fn parse<K>(&self) -> Result<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        self.0
            .clone()
            .try_parse::<K>()
            .with_context(|_| ParseTypedResourceSnafu {
                key: self.key(),
                kind: std::any::type_name::<K>(),
            })
    }

    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.0)
    }

    /// JSON pointer into [`ResourceObject::data`] at which workloads keep their pod spec, [`None`]
    /// for everything else.
    pub fn pod_spec_pointer(&self) -> Option<&'static str> {
        let group = self
            .api_version()
            .rsplit_once('/')
            .map_or("", |(group, _)| group);

        match (group, self.kind()) {
            ("apps", "Deployment" | "StatefulSet")
            | ("batch", "Job")
            | ("apps.openshift.io", "DeploymentConfig")
            | ("serving.knative.dev", "Service") => Some("/spec/template/spec"),
            ("batch", "CronJob") => Some("/spec/jobTemplate/spec/template/spec"),
            _ => None,
        }
    }

    /// Whether this object runs the application, see [`ResourceObject::pod_spec_pointer`].
    pub fn is_workload(&self) -> bool {
        self.pod_spec_pointer().is_some()
    }
}
