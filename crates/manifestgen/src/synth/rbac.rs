use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        core::v1::ServiceAccount,
        rbac::v1::{
            ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject,
        },
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};

use crate::{
    descriptor::{ApplicationDescriptor, PolicyRuleSpec, RoleSpec, SubjectKind, SubjectSpec},
    synth::Context,
};

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Bound by the `<name>-view` RoleBinding.
pub const VIEW_CLUSTER_ROLE: &str = "view";

/// The service account the application pods run as.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EffectiveServiceAccount {
    pub name: String,

    /// The namespace of a declared account. [`None`] means the application namespace.
    pub namespace: Option<String>,

    /// Whether a ServiceAccount object is generated for it, because neither a declared nor an
    /// external account was requested.
    pub generated: bool,
}

impl EffectiveServiceAccount {
    /// An explicitly named account wins, then the declared account marked as default, then the
    /// first declared account. Without any of them an account named after the application is
    /// generated.
    pub fn resolve(descriptor: &ApplicationDescriptor) -> Self {
        let rbac = &descriptor.rbac;

        if let Some(name) = &rbac.service_account {
            return Self {
                name: name.clone(),
                namespace: None,
                generated: false,
            };
        }

        rbac.service_accounts
            .iter()
            .find(|account| account.use_as_default)
            .or_else(|| rbac.service_accounts.first())
            .map_or_else(
                || Self {
                    name: descriptor.name.clone(),
                    namespace: None,
                    generated: true,
                },
                |account| Self {
                    name: account.name.clone(),
                    namespace: account.namespace.clone(),
                    generated: false,
                },
            )
    }
}

pub fn service_accounts(ctx: &Context) -> Vec<ServiceAccount> {
    let declared = ctx
        .descriptor
        .rbac
        .service_accounts
        .iter()
        .map(|account| {
            let mut metadata = ctx.metadata(&account.name);
            if account.namespace.is_some() {
                metadata.namespace.clone_from(&account.namespace);
            }
            extend_labels(&mut metadata, &account.labels);

            ServiceAccount {
                metadata,
                ..ServiceAccount::default()
            }
        });

    let generated = ctx.service_account.generated.then(|| ServiceAccount {
        metadata: ctx.metadata(&ctx.service_account.name),
        ..ServiceAccount::default()
    });

    declared.chain(generated).collect()
}

pub fn roles(ctx: &Context) -> Vec<Role> {
    ctx.descriptor
        .rbac
        .roles
        .iter()
        .map(|role| {
            let mut metadata = ctx.metadata(&role.name);
            if role.namespace.is_some() {
                metadata.namespace.clone_from(&role.namespace);
            }
            extend_labels(&mut metadata, &role.labels);

            Role {
                metadata,
                rules: policy_rules(role),
            }
        })
        .collect()
}

pub fn cluster_roles(ctx: &Context) -> Vec<ClusterRole> {
    ctx.descriptor
        .rbac
        .cluster_roles
        .iter()
        .map(|role| {
            let mut metadata = ctx.cluster_metadata(&role.name);
            extend_labels(&mut metadata, &role.labels);

            ClusterRole {
                metadata,
                rules: policy_rules(role),
                ..ClusterRole::default()
            }
        })
        .collect()
}

/// The requested RoleBindings, or a default binding if none were requested.
///
/// Requested bindings without subjects bind the effective service account. Without any
/// requested binding, the first Role (or the first ClusterRole) is bound to the effective
/// service account. If there is no role at all, the `view` ClusterRole is bound on request.
pub fn role_bindings(ctx: &Context) -> Vec<RoleBinding> {
    let rbac = &ctx.descriptor.rbac;
    let default_role = rbac.default_role();
    let default_cluster_wide = default_role.is_some_and(|(_, cluster_wide)| cluster_wide);

    if rbac.role_bindings.is_empty() {
        return match default_role {
            Some((role, cluster_wide)) => vec![role_binding(
                ctx,
                ctx.name().to_owned(),
                role_ref(role, cluster_wide),
                vec![service_account_subject(ctx)],
            )],
            None if rbac.generate_view_binding => vec![role_binding(
                ctx,
                format!("{name}-{VIEW_CLUSTER_ROLE}", name = ctx.name()),
                role_ref(VIEW_CLUSTER_ROLE, true),
                vec![service_account_subject(ctx)],
            )],
            None => Vec::new(),
        };
    }

    rbac.role_bindings
        .iter()
        .filter_map(|binding| {
            let (role_name, cluster_wide) = match &binding.role_name {
                Some(role_name) => (
                    role_name.as_str(),
                    binding.cluster_wide.unwrap_or(default_cluster_wide),
                ),
                None => default_role?,
            };
            let name = binding
                .name
                .clone()
                .unwrap_or_else(|| format!("{app}-{role_name}", app = ctx.name()));
            let subjects = if binding.subjects.is_empty() {
                vec![service_account_subject(ctx)]
            } else {
                binding
                    .subjects
                    .iter()
                    .map(|subject| to_subject(ctx, subject))
                    .collect()
            };

            let mut binding_object =
                role_binding(ctx, name, role_ref(role_name, cluster_wide), subjects);
            if binding.namespace.is_some() {
                binding_object.metadata.namespace.clone_from(&binding.namespace);
            }
            extend_labels(&mut binding_object.metadata, &binding.labels);
            Some(binding_object)
        })
        .collect()
}

pub fn cluster_role_bindings(ctx: &Context) -> Vec<ClusterRoleBinding> {
    ctx.descriptor
        .rbac
        .cluster_role_bindings
        .iter()
        .map(|binding| {
            let name = binding.name.clone().unwrap_or_else(|| {
                format!("{app}-{role}", app = ctx.name(), role = binding.role_name)
            });
            let mut metadata = ctx.cluster_metadata(name);
            extend_labels(&mut metadata, &binding.labels);

            ClusterRoleBinding {
                metadata,
                role_ref: role_ref(&binding.role_name, true),
                subjects: Some(
                    binding
                        .subjects
                        .iter()
                        .map(|subject| to_subject(ctx, subject))
                        .collect(),
                ),
            }
        })
        .collect()
}

pub(crate) fn role_binding(
    ctx: &Context,
    name: String,
    role_ref: RoleRef,
    subjects: Vec<Subject>,
) -> RoleBinding {
    RoleBinding {
        metadata: ctx.metadata(name),
        role_ref,
        subjects: Some(subjects),
    }
}

pub(crate) fn role_ref(name: &str, cluster_wide: bool) -> RoleRef {
    RoleRef {
        api_group: RBAC_API_GROUP.to_owned(),
        kind: if cluster_wide { "ClusterRole" } else { "Role" }.to_owned(),
        name: name.to_owned(),
    }
}

pub(crate) fn service_account_subject(ctx: &Context) -> Subject {
    let account = &ctx.service_account;
    let mut subject = SubjectSpec::service_account(&account.name);
    subject.namespace.clone_from(&account.namespace);
    to_subject(ctx, &subject)
}

/// ServiceAccount subjects without a namespace live in the namespace of the application.
fn to_subject(ctx: &Context, subject: &SubjectSpec) -> Subject {
    let namespace = match subject.kind {
        SubjectKind::ServiceAccount => subject.namespace.clone().or_else(|| ctx.namespace()),
        SubjectKind::User | SubjectKind::Group => subject.namespace.clone(),
    };

    Subject {
        api_group: subject.kind.api_group().map(ToOwned::to_owned),
        kind: subject.kind.to_string(),
        name: subject.name.clone(),
        namespace,
    }
}

/// Rules without API groups apply to the core group.
fn policy_rules(role: &RoleSpec) -> Option<Vec<PolicyRule>> {
    let non_empty = |values: &Vec<String>| (!values.is_empty()).then(|| values.clone());

    Some(
        role.rules
            .iter()
            .map(|rule: &PolicyRuleSpec| PolicyRule {
                api_groups: Some(if rule.api_groups.is_empty() {
                    vec![String::new()]
                } else {
                    rule.api_groups.clone()
                }),
                resources: non_empty(&rule.resources),
                resource_names: non_empty(&rule.resource_names),
                non_resource_urls: non_empty(&rule.non_resource_urls),
                verbs: rule.verbs.clone(),
            })
            .collect(),
    )
}

fn extend_labels(metadata: &mut ObjectMeta, labels: &BTreeMap<String, String>) {
    if !labels.is_empty() {
        metadata
            .labels
            .get_or_insert_with(Default::default)
            .extend(labels.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::{ClusterRoleBindingSpec, RbacRequest, RoleBindingSpec, ServiceAccountSpec},
        target::DeploymentTarget,
    };

    fn pod_reader() -> RoleSpec {
        RoleSpec::new(
            "pod-reader",
            vec![PolicyRuleSpec::new(Vec::<String>::new(), ["pods"], ["get", "list"])],
        )
    }

    #[test]
    fn generated_service_account_is_named_after_application() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .build()
            .expect("valid descriptor");
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        assert_eq!(
            ctx.service_account,
            EffectiveServiceAccount {
                name: "demo".to_owned(),
                namespace: None,
                generated: true
            }
        );
        let accounts = service_accounts(&ctx);
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].metadata.name.as_deref(), Some("demo"));
    }

    #[test]
    fn external_service_account_is_not_generated() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .service_account("platform-sa")
            .build()
            .expect("valid descriptor");
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        assert!(service_accounts(&ctx).is_empty());
        assert_eq!(ctx.service_account.name, "platform-sa");
    }

    #[test]
    fn default_marked_service_account_wins() {
        let mut default_account = ServiceAccountSpec::new("runner");
        default_account.use_as_default = true;

        let descriptor = ApplicationDescriptor::builder("demo")
            .add_service_account(ServiceAccountSpec::new("first"))
            .add_service_account(default_account)
            .build()
            .expect("valid descriptor");
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        assert_eq!(ctx.service_account.name, "runner");
        assert_eq!(service_accounts(&ctx).len(), 2);
    }

    #[test]
    fn default_binding_targets_first_role() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .namespace("shop")
            .add_role(pod_reader())
            .build()
            .expect("valid descriptor");
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        let bindings = role_bindings(&ctx);
        assert_eq!(bindings.len(), 1);

        let binding = &bindings[0];
        assert_eq!(binding.metadata.name.as_deref(), Some("demo"));
        assert_eq!(binding.role_ref, role_ref("pod-reader", false));
        assert_eq!(
            binding.subjects,
            Some(vec![Subject {
                api_group: None,
                kind: "ServiceAccount".to_owned(),
                name: "demo".to_owned(),
                namespace: Some("shop".to_owned()),
            }])
        );
    }

    #[test]
    fn requested_bindings_get_default_names_and_subject_namespaces() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .namespace("shop")
            .add_cluster_role(pod_reader())
            .add_role_binding(RoleBindingSpec {
                subjects: vec![SubjectSpec::service_account("auditor")],
                ..RoleBindingSpec::default()
            })
            .build()
            .expect("valid descriptor");
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        let bindings = role_bindings(&ctx);
        assert_eq!(bindings[0].metadata.name.as_deref(), Some("demo-pod-reader"));
        assert_eq!(bindings[0].role_ref.kind, "ClusterRole");

        let subjects = bindings[0].subjects.as_ref().expect("subjects are set");
        assert_eq!(subjects[0].namespace.as_deref(), Some("shop"));
    }

    #[test]
    fn declared_service_account_keeps_its_namespace() {
        let mut robot = ServiceAccountSpec::new("robot");
        robot.namespace = Some("tools".to_owned());

        let descriptor = ApplicationDescriptor::builder("demo")
            .namespace("shop")
            .add_role(pod_reader())
            .add_service_account(robot)
            .add_role_binding(RoleBindingSpec {
                name: Some("extra".to_owned()),
                role_name: Some("pod-reader".to_owned()),
                ..RoleBindingSpec::default()
            })
            .build()
            .expect("valid descriptor");
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        let accounts = service_accounts(&ctx);
        assert_eq!(accounts[0].metadata.namespace.as_deref(), Some("tools"));

        let bindings = role_bindings(&ctx);
        assert_eq!(bindings[0].metadata.namespace.as_deref(), Some("shop"));
        assert_eq!(
            bindings[0].subjects,
            Some(vec![Subject {
                api_group: None,
                kind: "ServiceAccount".to_owned(),
                name: "robot".to_owned(),
                namespace: Some("tools".to_owned()),
            }])
        );
    }

    #[test]
    fn named_role_kind_defaults_to_the_declared_role_kind() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .add_cluster_role(pod_reader())
            .add_role_binding(RoleBindingSpec {
                role_name: Some("pod-reader".to_owned()),
                ..RoleBindingSpec::default()
            })
            .add_role_binding(RoleBindingSpec {
                name: Some("local".to_owned()),
                role_name: Some("local-reader".to_owned()),
                cluster_wide: Some(false),
                ..RoleBindingSpec::default()
            })
            .build()
            .expect("valid descriptor");
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        let bindings = role_bindings(&ctx);
        assert_eq!(bindings[0].role_ref, role_ref("pod-reader", true));
        assert_eq!(bindings[1].role_ref, role_ref("local-reader", false));
    }

    #[test]
    fn view_binding_on_request() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .rbac(RbacRequest {
                generate_view_binding: true,
                ..RbacRequest::default()
            })
            .build()
            .expect("valid descriptor");
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        let bindings = role_bindings(&ctx);
        assert_eq!(bindings[0].metadata.name.as_deref(), Some("demo-view"));
        assert_eq!(bindings[0].role_ref, role_ref(VIEW_CLUSTER_ROLE, true));
    }

    #[test]
    fn cluster_scoped_objects_have_no_namespace() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .namespace("shop")
            .add_cluster_role(pod_reader())
            .add_cluster_role_binding(ClusterRoleBindingSpec {
                name: None,
                labels: BTreeMap::new(),
                role_name: "pod-reader".to_owned(),
                subjects: vec![SubjectSpec::service_account("demo")],
            })
            .build()
            .expect("valid descriptor");
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        let roles = cluster_roles(&ctx);
        assert_eq!(roles[0].metadata.namespace, None);
        assert_eq!(
            roles[0].rules.as_ref().expect("rules are set")[0].api_groups,
            Some(vec![String::new()])
        );

        let bindings = cluster_role_bindings(&ctx);
        assert_eq!(bindings[0].metadata.namespace, None);
        assert_eq!(
            bindings[0].subjects.as_ref().expect("subjects are set")[0]
                .namespace
                .as_deref(),
            Some("shop")
        );
    }
}
