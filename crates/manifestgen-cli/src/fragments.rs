//! Loading of user-authored fragments from a directory.
//!
//! `common.yml` applies to every target, `<target>.yml` only to that target. Both are optional.
use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use manifestgen::{resource::ResourceObject, target::DeploymentTarget};
use manifestgen_shared::manifest::parse_documents;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, instrument};

pub const COMMON_FRAGMENTS_FILE: &str = "common.yml";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read the fragment file {}", path.display()))]
    ReadFragmentFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse the fragment file {}", path.display()))]
    ParseFragmentFile {
        source: manifestgen_shared::manifest::Error,
        path: PathBuf,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug, Default)]
pub struct Fragments {
    pub common: Vec<ResourceObject>,
    pub targets: BTreeMap<DeploymentTarget, Vec<ResourceObject>>,
}

impl Fragments {
    #[instrument(skip(targets), fields(directory = %directory.display()))]
    pub async fn load(directory: &Path, targets: &[DeploymentTarget]) -> Result<Self> {
        let mut fragments = Self {
            common: read_fragment_file(&directory.join(COMMON_FRAGMENTS_FILE))
                .await?
                .unwrap_or_default(),
            targets: BTreeMap::new(),
        };

        for &target in targets {
            let path = directory.join(format!("{}.yml", target.file_stem()));
            if let Some(resources) = read_fragment_file(&path).await? {
                fragments.targets.insert(target, resources);
            }
        }

        Ok(fragments)
    }

    pub fn target(&self, target: DeploymentTarget) -> &[ResourceObject] {
        self.targets.get(&target).map_or(&[], Vec::as_slice)
    }
}

async fn read_fragment_file(path: &Path) -> Result<Option<Vec<ResourceObject>>> {
    let manifest = match tokio::fs::read_to_string(path).await {
        Ok(manifest) => manifest,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no fragment file");
            return Ok(None);
        }
        Err(error) => return Err(error).context(ReadFragmentFileSnafu { path }),
    };

    let resources = parse_documents(&manifest)
        .context(ParseFragmentFileSnafu { path })?
        .into_iter()
        .map(ResourceObject::from_dynamic)
        .collect::<Vec<_>>();
    info!(path = %path.display(), fragments = resources.len(), "loaded fragments");

    Ok(Some(resources))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[tokio::test]
    async fn loads_common_and_target_fragments() {
        let directory = tempfile::tempdir().expect("temporary directory");
        std::fs::write(
            directory.path().join(COMMON_FRAGMENTS_FILE),
            indoc! {"
                apiVersion: v1
                kind: ConfigMap
                metadata:
                  name: shared
                ---
                apiVersion: v1
                kind: ConfigMap
                metadata:
                  name: other
            "},
        )
        .expect("writable");
        std::fs::write(
            directory.path().join("kind.yml"),
            indoc! {"
                apiVersion: apps/v1
                kind: Deployment
                metadata:
                  name: demo
                spec:
                  replicas: 1
            "},
        )
        .expect("writable");

        let fragments = Fragments::load(
            directory.path(),
            &[DeploymentTarget::Kubernetes, DeploymentTarget::Kind],
        )
        .await
        .expect("fragments load");

        assert_eq!(fragments.common.len(), 2);
        assert!(fragments.target(DeploymentTarget::Kubernetes).is_empty());
        assert_eq!(fragments.target(DeploymentTarget::Kind)[0].kind(), "Deployment");
    }

    #[tokio::test]
    async fn missing_files_are_skipped() {
        let directory = tempfile::tempdir().expect("temporary directory");
        let fragments = Fragments::load(directory.path(), &[DeploymentTarget::Openshift])
            .await
            .expect("fragments load");

        assert!(fragments.common.is_empty());
        assert!(fragments.targets.is_empty());
    }

    #[tokio::test]
    async fn parse_errors_name_the_file() {
        let directory = tempfile::tempdir().expect("temporary directory");
        std::fs::write(directory.path().join(COMMON_FRAGMENTS_FILE), "metadata: {}\n")
            .expect("writable");

        let error = Fragments::load(directory.path(), &[])
            .await
            .expect_err("the fragment has no kind");
        assert!(matches!(error, Error::ParseFragmentFile { .. }));
        assert!(error.to_string().ends_with("common.yml"));
    }
}
