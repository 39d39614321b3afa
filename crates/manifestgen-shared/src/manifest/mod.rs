//! Parsing of user-authored, multi-document Kubernetes manifests.
use kube::core::DynamicObject;
use serde::Deserialize;
use snafu::{OptionExt, ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to deserialize YAML document #{index}"))]
    DeserializeDocument {
        source: serde_yaml::Error,
        index: usize,
    },

    #[snafu(display("failed to deserialize YAML document #{index} as Kubernetes object"))]
    DeserializeDynamicObject {
        source: serde_yaml::Error,
        index: usize,
    },

    #[snafu(display("YAML document #{index} is missing the apiVersion or kind field"))]
    MissingTypeInformation { index: usize },
}

/// Parses every non-empty document of `manifest` into a [`DynamicObject`].
///
/// Documents which only contain comments or nothing at all are skipped. Every remaining
/// document must carry both `apiVersion` and `kind`. Document indices in errors are zero-based.
pub fn parse_documents(manifest: impl AsRef<str>) -> Result<Vec<DynamicObject>, Error> {
    let mut objects = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(manifest.as_ref()).enumerate() {
        let value =
            serde_yaml::Value::deserialize(document).context(DeserializeDocumentSnafu { index })?;

        if value.is_null() {
            continue;
        }

        let object: DynamicObject =
            serde_yaml::from_value(value).context(DeserializeDynamicObjectSnafu { index })?;
        object
            .types
            .as_ref()
            .filter(|types| !types.api_version.is_empty() && !types.kind.is_empty())
            .context(MissingTypeInformationSnafu { index })?;

        objects.push(object);
    }

    Ok(objects)
}
