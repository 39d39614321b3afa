use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec,
    MetricSpec, MetricTarget, ResourceMetricSource,
};

use crate::{builder::saturating_i32, descriptor::WorkloadKind, synth::Context};

const UTILIZATION: &str = "Utilization";

fn utilization_metric(resource: &str, target: u32) -> MetricSpec {
    MetricSpec {
        type_: "Resource".to_owned(),
        resource: Some(ResourceMetricSource {
            name: resource.to_owned(),
            target: MetricTarget {
                type_: UTILIZATION.to_owned(),
                average_utilization: Some(saturating_i32(target)),
                ..MetricTarget::default()
            },
        }),
        ..MetricSpec::default()
    }
}

/// The object scaled by the autoscaler, [`None`] for workloads which can't be scaled.
fn scale_target(ctx: &Context) -> Option<CrossVersionObjectReference> {
    let (api_version, kind) = match ctx.workload {
        WorkloadKind::Deployment => ("apps/v1", "Deployment"),
        WorkloadKind::StatefulSet => ("apps/v1", "StatefulSet"),
        WorkloadKind::DeploymentConfig => ("apps.openshift.io/v1", "DeploymentConfig"),
        WorkloadKind::Job | WorkloadKind::CronJob | WorkloadKind::KnativeService => return None,
    };

    Some(CrossVersionObjectReference {
        api_version: Some(api_version.to_owned()),
        kind: kind.to_owned(),
        name: ctx.name().to_owned(),
    })
}

/// An `autoscaling/v2` HorizontalPodAutoscaler, if autoscaling is enabled. Knative revisions are
/// scaled through annotations instead.
pub fn horizontal_pod_autoscaler(ctx: &Context) -> Option<HorizontalPodAutoscaler> {
    let autoscaling = ctx
        .descriptor
        .autoscaling
        .as_ref()
        .filter(|autoscaling| autoscaling.enabled)?;
    let scale_target_ref = scale_target(ctx)?;

    let metrics = autoscaling
        .target_cpu_utilization
        .map(|target| utilization_metric("cpu", target))
        .into_iter()
        .chain(
            autoscaling
                .target_memory_utilization
                .map(|target| utilization_metric("memory", target)),
        )
        .collect::<Vec<_>>();

    Some(HorizontalPodAutoscaler {
        metadata: ctx.metadata(ctx.name()),
        spec: Some(HorizontalPodAutoscalerSpec {
            scale_target_ref,
            min_replicas: autoscaling.min_replicas.map(saturating_i32),
            max_replicas: saturating_i32(autoscaling.max_replicas),
            metrics: (!metrics.is_empty()).then_some(metrics),
            ..HorizontalPodAutoscalerSpec::default()
        }),
        ..HorizontalPodAutoscaler::default()
    })
}
