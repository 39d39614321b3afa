//! Renders resources as multi-document YAML and as a JSON `List`.
//!
//! Object keys are written in a stable order, `apiVersion`, `kind` and `metadata` first, and
//! resources in the given order, so rendering the same resources twice yields the same bytes.
use serde::Serialize;
use snafu::{ResultExt, Snafu};

use crate::resource::ResourceObject;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to render YAML"))]
    RenderYaml {
        source: manifestgen_shared::yaml::Error,
    },

    #[snafu(display("failed to render JSON"))]
    RenderJson { source: serde_json::Error },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// The `v1` `List` wrapping the resources in JSON output.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct List<'a> {
    api_version: &'static str,
    kind: &'static str,
    items: &'a [ResourceObject],
}

/// Every resource as its own YAML document, introduced by `---`.
pub fn to_yaml(resources: &[ResourceObject]) -> Result<String> {
    manifestgen_shared::yaml::to_multi_document_string(resources).context(RenderYamlSnafu)
}

/// A pretty printed `v1` `List` of all resources, terminated by a newline.
pub fn to_json(resources: &[ResourceObject]) -> Result<String> {
    let list = List {
        api_version: "v1",
        kind: "List",
        items: resources,
    };

    let mut json = serde_json::to_string_pretty(&list).context(RenderJsonSnafu)?;
    json.push('\n');
    Ok(json)
}
