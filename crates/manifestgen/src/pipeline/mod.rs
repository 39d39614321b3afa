//! Runs the stages of one build: synthesis, fragment merge, validation and ordering.
//!
//! ```
//! use manifestgen::{descriptor::ApplicationDescriptor, pipeline::Generator, target::DeploymentTarget};
//!
//! let descriptor = ApplicationDescriptor::builder("demo").build().unwrap();
//! let manifest = Generator::new(&descriptor)
//!     .generate(DeploymentTarget::Kubernetes)
//!     .unwrap();
//!
//! assert_eq!(manifest.resources().len(), 3);
//! ```
use std::collections::BTreeMap;

use snafu::{ResultExt, Snafu};
use tracing::{info, instrument};

use crate::{
    descriptor::ApplicationDescriptor,
    merge,
    resource::ResourceObject,
    synth,
    target::DeploymentTarget,
};

pub mod order;
pub mod validate;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to synthesize the {target} resources"))]
    Synthesize {
        source: synth::Error,
        target: DeploymentTarget,
    },

    #[snafu(display("failed to merge fragments into the {target} resources"))]
    MergeFragments {
        source: merge::Error,
        target: DeploymentTarget,
    },

    #[snafu(display("the {target} resources are invalid"))]
    Validate {
        source: validate::Error,
        target: DeploymentTarget,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// The validated and ordered resources of one target.
#[derive(Clone, Debug)]
pub struct Manifest {
    target: DeploymentTarget,
    resources: Vec<ResourceObject>,
}

impl Manifest {
    pub fn target(&self) -> DeploymentTarget {
        self.target
    }

    pub fn resources(&self) -> &[ResourceObject] {
        &self.resources
    }
}

/// Compiles one descriptor for any number of targets.
///
/// Fragments added with [`Generator::add_fragments`] apply to every target, fragments added with
/// [`Generator::add_target_fragments`] only to their target, after the common ones.
#[derive(Clone, Debug)]
pub struct Generator<'a> {
    descriptor: &'a ApplicationDescriptor,
    common_fragments: Vec<ResourceObject>,
    target_fragments: BTreeMap<DeploymentTarget, Vec<ResourceObject>>,
}

impl<'a> Generator<'a> {
    pub fn new(descriptor: &'a ApplicationDescriptor) -> Self {
        Self {
            descriptor,
            common_fragments: Vec::new(),
            target_fragments: BTreeMap::new(),
        }
    }

    pub fn add_fragments(
        &mut self,
        fragments: impl IntoIterator<Item = ResourceObject>,
    ) -> &mut Self {
        self.common_fragments.extend(fragments);
        self
    }

    pub fn add_target_fragments(
        &mut self,
        target: DeploymentTarget,
        fragments: impl IntoIterator<Item = ResourceObject>,
    ) -> &mut Self {
        self.target_fragments
            .entry(target)
            .or_default()
            .extend(fragments);
        self
    }

    #[instrument(skip(self), fields(application = self.descriptor.name()))]
    pub fn generate(&self, target: DeploymentTarget) -> Result<Manifest> {
        let resources =
            synth::synthesize(self.descriptor, target).context(SynthesizeSnafu { target })?;

        let fragments = self
            .common_fragments
            .iter()
            .chain(self.target_fragments.get(&target).into_iter().flatten())
            .cloned()
            .collect::<Vec<_>>();
        let mut resources =
            merge::apply_fragments(resources, &fragments).context(MergeFragmentsSnafu { target })?;

        validate::validate(&resources).context(ValidateSnafu { target })?;
        order::order(&mut resources);

        info!(resources = resources.len(), "generated manifest");
        Ok(Manifest { target, resources })
    }
}
