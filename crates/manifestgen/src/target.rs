use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::descriptor::{PullPolicy, ServiceType, WorkloadKind};

/// A supported output profile. Every target gets its own `<target>.yml` and `<target>.json`.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    IntoStaticStr,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeploymentTarget {
    Kubernetes,
    Openshift,
    Knative,
    Minikube,
    Kind,
}

impl DeploymentTarget {
    /// The file name, without extension, of the generated manifests.
    pub fn file_stem(&self) -> &'static str {
        self.into()
    }

    /// Local clusters, which run images built on the same machine.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Minikube | Self::Kind)
    }

    pub fn default_pull_policy(&self) -> PullPolicy {
        if self.is_local() {
            PullPolicy::IfNotPresent
        } else {
            PullPolicy::Always
        }
    }

    /// [`None`] if the platform creates Services itself.
    pub fn default_service_type(&self) -> Option<ServiceType> {
        match self {
            Self::Knative => None,
            Self::Minikube | Self::Kind => Some(ServiceType::NodePort),
            Self::Kubernetes | Self::Openshift => Some(ServiceType::ClusterIP),
        }
    }

    pub fn default_workload(&self) -> WorkloadKind {
        match self {
            Self::Knative => WorkloadKind::KnativeService,
            _ => WorkloadKind::Deployment,
        }
    }

    pub fn supports_workload(&self, workload: WorkloadKind) -> bool {
        match workload {
            WorkloadKind::DeploymentConfig => *self == Self::Openshift,
            WorkloadKind::KnativeService => *self == Self::Knative,
            _ => *self != Self::Knative,
        }
    }

    /// Whether applications are exposed through an Ingress.
    pub fn supports_ingress(&self) -> bool {
        !matches!(self, Self::Openshift | Self::Knative)
    }

    /// Whether applications are exposed through an OpenShift Route.
    pub fn supports_route(&self) -> bool {
        *self == Self::Openshift
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    #[rstest]
    #[case(DeploymentTarget::Kubernetes, PullPolicy::Always, Some(ServiceType::ClusterIP))]
    #[case(DeploymentTarget::Openshift, PullPolicy::Always, Some(ServiceType::ClusterIP))]
    #[case(DeploymentTarget::Knative, PullPolicy::Always, None)]
    #[case(DeploymentTarget::Minikube, PullPolicy::IfNotPresent, Some(ServiceType::NodePort))]
    #[case(DeploymentTarget::Kind, PullPolicy::IfNotPresent, Some(ServiceType::NodePort))]
    fn target_defaults(
        #[case] target: DeploymentTarget,
        #[case] pull_policy: PullPolicy,
        #[case] service_type: Option<ServiceType>,
    ) {
        assert_eq!(target.default_pull_policy(), pull_policy);
        assert_eq!(target.default_service_type(), service_type);
    }

    #[test]
    fn file_stems_round_trip() {
        for target in DeploymentTarget::iter() {
            assert_eq!(
                DeploymentTarget::from_str(target.file_stem()).expect("known target"),
                target
            );
        }
        assert_eq!(DeploymentTarget::Openshift.file_stem(), "openshift");
    }

    #[rstest]
    #[case(DeploymentTarget::Openshift, WorkloadKind::DeploymentConfig, true)]
    #[case(DeploymentTarget::Kubernetes, WorkloadKind::DeploymentConfig, false)]
    #[case(DeploymentTarget::Knative, WorkloadKind::KnativeService, true)]
    #[case(DeploymentTarget::Knative, WorkloadKind::Deployment, false)]
    #[case(DeploymentTarget::Kind, WorkloadKind::CronJob, true)]
    fn workload_support(
        #[case] target: DeploymentTarget,
        #[case] workload: WorkloadKind,
        #[case] supported: bool,
    ) {
        assert_eq!(target.supports_workload(workload), supported);
    }
}
