//! Tasks which have to finish before the application starts, like database migrations.
//!
//! A task either runs as a separate Job, which the application pods wait for, or as an init
//! container of the application pods.
use std::collections::BTreeSet;

use k8s_openapi::api::{
    batch::v1::{Job, JobSpec},
    core::v1::Container,
    rbac::v1::{PolicyRule, Role, RoleBinding},
};

use crate::{
    builder::pod::{PodBuilder, container::ContainerBuilder},
    descriptor::{EnvSource, InitTaskMode, InitTaskSpec, RestartPolicy},
    synth::{Context, config, rbac, workload},
};

/// Allows the wait-for init containers to look up the state of Jobs.
pub const VIEW_JOBS_ROLE: &str = "view-jobs";

pub fn job_name(ctx: &Context, task: &InitTaskSpec) -> String {
    format!("{name}-{task}", name = ctx.name(), task = task.name)
}

fn job_tasks<'a>(ctx: &Context<'a>) -> impl Iterator<Item = &'a InitTaskSpec> {
    ctx.descriptor
        .init_tasks
        .iter()
        .filter(|task| task.mode == InitTaskMode::Job)
}

/// The container running the task itself. It uses the application image and environment unless
/// the task brings its own.
fn task_container(ctx: &Context, task: &InitTaskSpec) -> Container {
    let image = task
        .image
        .clone()
        .unwrap_or_else(|| ctx.descriptor.image().to_string());

    let task_env_names = task
        .env
        .iter()
        .filter_map(EnvSource::name)
        .collect::<BTreeSet<_>>();
    let app_env = workload::deduplicate_env(ctx.descriptor.env())
        .into_iter()
        .filter(|source| source.name().is_none_or(|name| !task_env_names.contains(name)))
        .collect::<Vec<_>>();

    let mut container = ContainerBuilder::new(&task.name);
    container
        .image(image)
        .image_pull_policy(ctx.pull_policy().to_string())
        .command(&task.command)
        .args(&task.arguments)
        .add_env_sources(&app_env)
        .add_env_sources(&task.env)
        .sort_env(ctx.descriptor.idempotent);
    container.build()
}

/// Init containers of the application pods: a wait-for container per Job task and the task
/// container itself per init container task, in declaration order.
pub fn init_containers(ctx: &Context) -> Vec<Container> {
    ctx.descriptor
        .init_tasks
        .iter()
        .map(|task| match task.mode {
            InitTaskMode::Job => ContainerBuilder::new(task.container_name())
                .image(&task.wait_for_image)
                .args(&["job".to_owned(), job_name(ctx, task)])
                .build(),
            InitTaskMode::InitContainer => task_container(ctx, task),
        })
        .collect()
}

pub fn jobs(ctx: &Context) -> Vec<Job> {
    job_tasks(ctx)
        .map(|task| {
            let mut pod_builder = PodBuilder::new();
            pod_builder
                .add_container(task_container(ctx, task))
                .service_account_name(&ctx.service_account.name)
                .restart_policy(RestartPolicy::OnFailure.to_string());
            for pull_secret in config::image_pull_secrets(ctx) {
                pod_builder.add_image_pull_secret(pull_secret);
            }

            Job {
                metadata: ctx.metadata(job_name(ctx, task)),
                spec: Some(JobSpec {
                    template: pod_builder.build_template(),
                    ..JobSpec::default()
                }),
                ..Job::default()
            }
        })
        .collect()
}

/// The Role and RoleBinding the wait-for init containers need, if there are Job tasks.
pub fn job_rbac(ctx: &Context) -> Option<(Role, RoleBinding)> {
    job_tasks(ctx).next()?;

    let role = Role {
        metadata: ctx.metadata(VIEW_JOBS_ROLE),
        rules: Some(vec![PolicyRule {
            api_groups: Some(vec!["batch".to_owned()]),
            resources: Some(vec!["jobs".to_owned()]),
            verbs: vec!["get".to_owned()],
            ..PolicyRule::default()
        }]),
    };
    let binding = rbac::role_binding(
        ctx,
        format!("{name}-{VIEW_JOBS_ROLE}", name = ctx.name()),
        rbac::role_ref(VIEW_JOBS_ROLE, false),
        vec![rbac::service_account_subject(ctx)],
    );

    Some((role, binding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::{
            ApplicationDescriptor, ImageSpec, RegistryCredentials,
            workload::DEFAULT_WAIT_FOR_IMAGE,
        },
        target::DeploymentTarget,
    };

    fn descriptor(mode: InitTaskMode) -> ApplicationDescriptor {
        ApplicationDescriptor::builder("demo")
            .version("1.0.0")
            .add_init_task(
                InitTaskSpec::new("migrate")
                    .with_mode(mode)
                    .with_command(["migrate", "--apply"]),
            )
            .build()
            .expect("valid descriptor")
    }

    #[test]
    fn job_tasks_get_a_job_and_a_wait_for_container() {
        let descriptor = descriptor(InitTaskMode::Job);
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        let jobs = jobs(&ctx);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].metadata.name.as_deref(), Some("demo-migrate"));

        let init_containers = init_containers(&ctx);
        assert_eq!(init_containers[0].name, "wait-for-migrate");
        assert_eq!(
            init_containers[0].image.as_deref(),
            Some(DEFAULT_WAIT_FOR_IMAGE)
        );
        assert_eq!(
            init_containers[0].args,
            Some(vec!["job".to_owned(), "demo-migrate".to_owned()])
        );

        let (role, binding) = job_rbac(&ctx).expect("job tasks need RBAC");
        assert_eq!(role.metadata.name.as_deref(), Some(VIEW_JOBS_ROLE));
        assert_eq!(binding.metadata.name.as_deref(), Some("demo-view-jobs"));
        assert_eq!(binding.role_ref.name, VIEW_JOBS_ROLE);
    }

    #[test]
    fn init_container_tasks_run_in_the_application_pod() {
        let descriptor = descriptor(InitTaskMode::InitContainer);
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        assert!(jobs(&ctx).is_empty());
        assert!(job_rbac(&ctx).is_none());

        let init_containers = init_containers(&ctx);
        assert_eq!(init_containers[0].name, "migrate");
        assert_eq!(init_containers[0].image.as_deref(), Some("demo:1.0.0"));
        assert_eq!(
            init_containers[0].command,
            Some(vec!["migrate".to_owned(), "--apply".to_owned()])
        );
    }

    #[test]
    fn job_pods_use_the_generated_pull_secret() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .image(ImageSpec {
                pull_secrets: vec!["shared".to_owned()],
                registry_credentials: Some(RegistryCredentials {
                    username: "robot".to_owned(),
                    password: "s3cret".to_owned(),
                }),
                ..ImageSpec::default()
            })
            .add_init_task(InitTaskSpec::new("migrate"))
            .build()
            .expect("valid descriptor");
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        let pod = jobs(&ctx)
            .remove(0)
            .spec
            .and_then(|spec| spec.template.spec)
            .expect("the Job has a pod spec");
        let pull_secrets = pod
            .image_pull_secrets
            .expect("pull secrets are set")
            .into_iter()
            .map(|reference| reference.name)
            .collect::<Vec<_>>();
        assert_eq!(pull_secrets, ["shared", "demo-pull-secret"]);
    }

    #[test]
    fn task_env_replaces_application_env() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .add_env_var("DB_URL", "postgres://app")
            .add_env_var("LOG_LEVEL", "info")
            .add_init_task(
                InitTaskSpec::new("migrate")
                    .with_env(EnvSource::value("db.url", "postgres://admin")),
            )
            .build()
            .expect("valid descriptor");
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        let container = jobs(&ctx)
            .remove(0)
            .spec
            .and_then(|spec| spec.template.spec)
            .expect("the Job has a pod spec")
            .containers
            .remove(0);
        let env = container
            .env
            .expect("env is set")
            .into_iter()
            .map(|var| (var.name, var.value.unwrap_or_default()))
            .collect::<Vec<_>>();
        assert_eq!(
            env,
            [
                ("LOG_LEVEL".to_owned(), "info".to_owned()),
                ("DB_URL".to_owned(), "postgres://admin".to_owned()),
            ]
        );
    }
}
