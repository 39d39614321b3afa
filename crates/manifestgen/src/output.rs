//! Writes `<target>.yml` and `<target>.json` for every manifest.
//!
//! All files are first rendered and staged as temporary files in the output directory. They are
//! only moved into place once every file has been staged, so a failed build doesn't leave a
//! partial set of manifests behind.
use std::{
    io::Write,
    path::{Path, PathBuf},
};

use snafu::{ResultExt, Snafu};
use tempfile::NamedTempFile;
use tracing::{info, instrument};

use crate::{pipeline::Manifest, render};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to render the {file_name} manifest"))]
    Render {
        source: render::Error,
        file_name: String,
    },

    #[snafu(display("failed to create the output directory {}", path.display()))]
    CreateOutputDirectory {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to stage {file_name} in {}", directory.display()))]
    StageFile {
        source: std::io::Error,
        file_name: String,
        directory: PathBuf,
    },

    #[snafu(display("failed to write {}", path.display()))]
    PersistFile {
        source: tempfile::PersistError,
        path: PathBuf,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// The file formats written per target.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yml",
            Self::Json => "json",
        }
    }

    fn render(self, manifest: &Manifest) -> Result<String, render::Error> {
        match self {
            Self::Yaml => render::to_yaml(manifest.resources()),
            Self::Json => render::to_json(manifest.resources()),
        }
    }
}

/// The name of the file `manifest` is written to in `format`.
pub fn file_name(manifest: &Manifest, format: Format) -> String {
    format!(
        "{stem}.{extension}",
        stem = manifest.target().file_stem(),
        extension = format.extension()
    )
}

fn stage(directory: &Path, file_name: &str, contents: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .tempfile_in(directory)
        .with_context(|_| StageFileSnafu {
            file_name,
            directory,
        })?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.flush())
        .with_context(|_| StageFileSnafu {
            file_name,
            directory,
        })?;
    Ok(file)
}

/// Writes every manifest into `directory`, creating it if needed. Returns the written paths.
#[instrument(skip(manifests), fields(directory = %directory.display()))]
pub fn write_manifests(directory: &Path, manifests: &[Manifest]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(directory).context(CreateOutputDirectorySnafu { path: directory })?;

    let mut staged = Vec::new();
    for manifest in manifests {
        for format in [Format::Yaml, Format::Json] {
            let file_name = file_name(manifest, format);
            let contents = format.render(manifest).context(RenderSnafu {
                file_name: &file_name,
            })?;
            let file = stage(directory, &file_name, &contents)?;
            staged.push((file, directory.join(file_name)));
        }
    }

    let mut written = Vec::with_capacity(staged.len());
    for (file, path) in staged {
        file.persist(&path)
            .with_context(|_| PersistFileSnafu { path: &path })?;
        info!(path = %path.display(), "wrote manifest");
        written.push(path);
    }
    Ok(written)
}
