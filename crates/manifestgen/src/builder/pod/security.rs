use k8s_openapi::api::core::v1::{PodSecurityContext, SELinuxOptions, Sysctl};

use crate::descriptor::pod::{PodSecurityContextSpec, SeLinuxOptionsSpec};

#[derive(Clone, Debug, Default)]
pub struct PodSecurityContextBuilder {
    pod_security_context: PodSecurityContext,
}

impl PodSecurityContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(&self) -> PodSecurityContext {
        self.pod_security_context.clone()
    }

    pub fn fs_group(&mut self, group: i64) -> &mut Self {
        self.pod_security_context.fs_group = Some(group);
        self
    }

    pub fn fs_group_change_policy(&mut self, policy: impl Into<String>) -> &mut Self {
        self.pod_security_context.fs_group_change_policy = Some(policy.into());
        self
    }

    pub fn run_as_group(&mut self, group: i64) -> &mut Self {
        self.pod_security_context.run_as_group = Some(group);
        self
    }

    pub fn run_as_non_root(&mut self, value: bool) -> &mut Self {
        self.pod_security_context.run_as_non_root = Some(value);
        self
    }

    pub fn run_as_user(&mut self, user: i64) -> &mut Self {
        self.pod_security_context.run_as_user = Some(user);
        self
    }

    pub fn supplemental_groups(&mut self, groups: &[i64]) -> &mut Self {
        self.pod_security_context.supplemental_groups = Some(groups.to_vec());
        self
    }

    pub fn se_linux_options(&mut self, options: &SeLinuxOptionsSpec) -> &mut Self {
        self.pod_security_context.se_linux_options = Some(SELinuxOptions {
            level: options.level.clone(),
            role: options.role.clone(),
            type_: options.type_.clone(),
            user: options.user.clone(),
        });
        self
    }

    pub fn sysctls<'a>(
        &mut self,
        kparams: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> &mut Self {
        self.pod_security_context.sysctls = Some(
            kparams
                .into_iter()
                .map(|(name, value)| Sysctl {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
        );
        self
    }
}

/// Translates the declared settings, leaving unset fields unset.
pub fn build_pod_security_context(spec: &PodSecurityContextSpec) -> PodSecurityContext {
    let mut builder = PodSecurityContextBuilder::new();
    if let Some(user) = spec.run_as_user {
        builder.run_as_user(user);
    }
    if let Some(group) = spec.run_as_group {
        builder.run_as_group(group);
    }
    if let Some(non_root) = spec.run_as_non_root {
        builder.run_as_non_root(non_root);
    }
    if let Some(group) = spec.fs_group {
        builder.fs_group(group);
    }
    if let Some(policy) = spec.fs_group_change_policy {
        builder.fs_group_change_policy(policy.to_string());
    }
    if !spec.supplemental_groups.is_empty() {
        builder.supplemental_groups(&spec.supplemental_groups);
    }
    if let Some(options) = &spec.se_linux_options {
        builder.se_linux_options(options);
    }
    if !spec.sysctls.is_empty() {
        builder.sysctls(&spec.sysctls);
    }
    builder.build()
}
