use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use clap::{Args, Parser};
use futures::{FutureExt, future::try_join_all};
use manifestgen::{
    config::{self, DescriptorConfig},
    output,
    pipeline::{self, Generator, Manifest},
    target::DeploymentTarget,
};
use snafu::{ResultExt, Snafu};
use strum::IntoEnumIterator;
use tracing::info;

use crate::fragments::Fragments;

mod fragments;
mod logging;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("failed to load the application descriptor"))]
    LoadDescriptor { source: config::Error },

    #[snafu(display("failed to load the fragments"))]
    LoadFragments { source: fragments::Error },

    #[snafu(display("the {target} build was aborted"))]
    JoinTarget {
        source: tokio::task::JoinError,
        target: DeploymentTarget,
    },

    #[snafu(display("failed to resolve the {target} descriptor"))]
    ResolveDescriptor {
        source: config::Error,
        target: DeploymentTarget,
    },

    #[snafu(display("failed to generate the manifests"))]
    Generate { source: pipeline::Error },

    #[snafu(display("failed to write the manifests"))]
    WriteManifests { source: output::Error },
}

#[derive(Debug, Parser)]
#[command(name = "manifestgen", author, version, about)]
enum Command {
    /// Generate the manifests of an application.
    Generate(GenerateArguments),

    /// Print the supported deployment targets.
    Targets,
}

#[derive(Debug, PartialEq, Eq, Args)]
struct GenerateArguments {
    /// The YAML descriptor of the application.
    #[arg(long, short, env = "MANIFESTGEN_DESCRIPTOR")]
    descriptor: PathBuf,

    /// Directory the `<target>.yml` and `<target>.json` files are written to.
    #[arg(long, short, env = "MANIFESTGEN_OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Deployment target to generate manifests for, can be given multiple times.
    #[arg(long = "target", short, value_enum, default_values_t = [DeploymentTarget::Kubernetes])]
    targets: Vec<DeploymentTarget>,

    /// Directory with fragments to merge into the generated resources: `common.yml` for every
    /// target and `<target>.yml` for a single one.
    #[arg(long)]
    fragments: Option<PathBuf>,

    /// Leave out everything which changes between two builds of the same sources.
    #[arg(long)]
    idempotent: bool,

    /// The commit the application was built from.
    #[arg(long, env = "MANIFESTGEN_COMMIT_ID")]
    commit_id: Option<String>,

    /// The repository the application was built from.
    #[arg(long, env = "MANIFESTGEN_VCS_URL")]
    vcs_url: Option<String>,

    /// Record the current time as build timestamp. Has no effect on idempotent builds.
    #[arg(long)]
    build_timestamp: bool,
}

/// Build settings from the command line. They take precedence over every section of the
/// descriptor file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct BuildOverrides {
    idempotent: bool,
    commit_id: Option<String>,
    vcs_url: Option<String>,
    build_timestamp: Option<String>,
}

impl BuildOverrides {
    fn from_arguments(arguments: &GenerateArguments) -> Self {
        Self {
            idempotent: arguments.idempotent,
            commit_id: arguments.commit_id.clone(),
            vcs_url: arguments.vcs_url.clone(),
            build_timestamp: arguments
                .build_timestamp
                .then(|| jiff::Timestamp::now().to_string()),
        }
    }

    fn apply(&self, config: &mut DescriptorConfig) {
        if self.idempotent {
            config.idempotent = Some(true);
        }
        if self.commit_id.is_some() {
            config.build.commit_id.clone_from(&self.commit_id);
        }
        if self.vcs_url.is_some() {
            config.build.vcs_uri.clone_from(&self.vcs_url);
        }
        if self.build_timestamp.is_some() {
            config.build.build_timestamp.clone_from(&self.build_timestamp);
        }
    }
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let command = Command::parse();
    logging::initialize_logging().context(InitializeLoggingSnafu)?;

    match command {
        Command::Generate(arguments) => generate(&arguments).await,
        Command::Targets => {
            for target in DeploymentTarget::iter() {
                println!("{target}");
            }
            Ok(())
        }
    }
}

async fn generate(arguments: &GenerateArguments) -> Result<(), Error> {
    let config = DescriptorConfig::from_file(&arguments.descriptor).context(LoadDescriptorSnafu)?;
    let targets = arguments
        .targets
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();

    let fragments = match &arguments.fragments {
        Some(directory) => Fragments::load(directory, &targets)
            .await
            .context(LoadFragmentsSnafu)?,
        None => Fragments::default(),
    };

    let config = Arc::new(config);
    let fragments = Arc::new(fragments);
    let overrides = Arc::new(BuildOverrides::from_arguments(arguments));

    let builds = targets.iter().map(|&target| {
        let config = Arc::clone(&config);
        let fragments = Arc::clone(&fragments);
        let overrides = Arc::clone(&overrides);
        tokio::task::spawn_blocking(move || build_target(&config, &fragments, &overrides, target))
            .map(move |result| result.context(JoinTargetSnafu { target }))
    });
    let manifests = try_join_all(builds)
        .await?
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    let written = output::write_manifests(&arguments.output_dir, &manifests)
        .context(WriteManifestsSnafu)?;
    info!(
        files = written.len(),
        directory = %arguments.output_dir.display(),
        "generated manifests"
    );

    Ok(())
}

fn build_target(
    config: &DescriptorConfig,
    fragments: &Fragments,
    overrides: &BuildOverrides,
    target: DeploymentTarget,
) -> Result<Manifest, Error> {
    let mut config = config.for_target(target);
    overrides.apply(&mut config);
    let descriptor = config
        .to_descriptor()
        .context(ResolveDescriptorSnafu { target })?;

    let mut generator = Generator::new(&descriptor);
    generator
        .add_fragments(fragments.common.iter().cloned())
        .add_target_fragments(target, fragments.target(target).iter().cloned());
    generator.generate(target).context(GenerateSnafu)
}
