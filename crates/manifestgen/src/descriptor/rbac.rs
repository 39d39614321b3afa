use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRuleSpec {
    /// Defaults to the core API group (`""`) when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_groups: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_resource_urls: Vec<String>,

    pub verbs: Vec<String>,
}

impl PolicyRuleSpec {
    pub fn new(
        api_groups: impl IntoIterator<Item = impl Into<String>>,
        resources: impl IntoIterator<Item = impl Into<String>>,
        verbs: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            api_groups: api_groups.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
            verbs: verbs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// A Role or ClusterRole to generate.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSpec {
    pub name: String,

    /// Only used for namespaced roles, defaults to the application namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub rules: Vec<PolicyRuleSpec>,
}

impl RoleSpec {
    pub fn new(name: impl Into<String>, rules: Vec<PolicyRuleSpec>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            labels: BTreeMap::new(),
            rules,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Run the application with this service account. Without any account marked like this,
    /// the first declared account is used.
    #[serde(default)]
    pub use_as_default: bool,
}

impl ServiceAccountSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            labels: BTreeMap::new(),
            use_as_default: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
pub enum SubjectKind {
    #[default]
    ServiceAccount,
    User,
    Group,
}

impl SubjectKind {
    /// Users and groups live in the RBAC API group, service accounts in the core group.
    pub fn api_group(&self) -> Option<&'static str> {
        match self {
            Self::ServiceAccount => None,
            Self::User | Self::Group => Some("rbac.authorization.k8s.io"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSpec {
    pub name: String,

    #[serde(default)]
    pub kind: SubjectKind,

    /// Only meaningful for service accounts. Defaults to the application namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl SubjectSpec {
    pub fn service_account(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SubjectKind::ServiceAccount,
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// A namespaced RoleBinding.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBindingSpec {
    /// Defaults to `<application>-<role>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Defaults to the first declared role, then to the first declared cluster role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,

    /// Whether [`RoleBindingSpec::role_name`] refers to a ClusterRole. Defaults to the kind of
    /// the role bindings fall back to, so with only cluster roles declared it is a ClusterRole.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_wide: Option<bool>,

    /// Defaults to the service account the application runs with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<SubjectSpec>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRoleBindingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    pub role_name: String,

    pub subjects: Vec<SubjectSpec>,
}

/// Requested RBAC objects.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RbacRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_roles: Vec<RoleSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_accounts: Vec<ServiceAccountSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_bindings: Vec<RoleBindingSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_role_bindings: Vec<ClusterRoleBindingSpec>,

    /// Run with an existing service account instead of a generated one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    /// Bind the application service account to the built-in `view` ClusterRole.
    #[serde(default)]
    pub generate_view_binding: bool,
}

impl RbacRequest {
    /// The name of the role a binding falls back to when it doesn't name one, together with
    /// whether it is a ClusterRole.
    pub(crate) fn default_role(&self) -> Option<(&str, bool)> {
        self.roles
            .first()
            .map(|role| (role.name.as_str(), false))
            .or_else(|| {
                self.cluster_roles
                    .first()
                    .map(|role| (role.name.as_str(), true))
            })
    }
}
