//! YAML output of generated manifests.

use snafu::{ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },

    #[snafu(display("failed to parse bytes as valid UTF-8 string"))]
    ParseUtf8Bytes { source: std::string::FromUtf8Error },
}

/// Options of [`serialize`]. The default writes explicit documents with singleton maps.
#[derive(Clone, Copy, Debug)]
pub struct SerializeOptions {
    /// Start the output with `---`.
    pub explicit_document: bool,

    /// Write enum variants as single-key maps instead of YAML tags.
    pub singleton_map: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            explicit_document: true,
            singleton_map: true,
        }
    }
}

/// Serializes `value` as one YAML document into `writer`.
pub fn serialize<T, W>(value: &T, mut writer: W, options: SerializeOptions) -> Result<()>
where
    T: serde::Serialize,
    W: std::io::Write,
{
    if options.explicit_document {
        writer
            .write_all(b"---\n")
            .context(WriteDocumentSeparatorSnafu)?;
    }

    let mut serializer = serde_yaml::Serializer::new(writer);

    if options.singleton_map {
        serde_yaml::with::singleton_map_recursive::serialize(value, &mut serializer)
            .context(SerializeYamlSnafu)?;
    } else {
        value
            .serialize(&mut serializer)
            .context(SerializeYamlSnafu)?;
    }

    Ok(())
}

/// Serializes every item as its own explicit YAML document and concatenates them.
///
/// An empty iterator produces an empty string.
pub fn to_multi_document_string<'a, T, I>(documents: I) -> Result<String>
where
    T: serde::Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut buffer = Vec::new();

    for document in documents {
        serialize(document, &mut buffer, SerializeOptions::default())?;
    }

    String::from_utf8(buffer).context(ParseUtf8BytesSnafu)
}
