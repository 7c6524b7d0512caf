use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

/// Extension of the files holding definition source text.
pub const DEFINITION_FILE_EXTENSION: &str = "telemetry";

/// Directory with definition files. Each file holds any number of
/// `;`-terminated definitions.
#[derive(Debug, Default)]
pub struct DefinitionDir {
    files: Vec<DefinitionFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionFile {
    pub path: PathBuf,
    pub source: String,
}

impl DefinitionDir {
    /// Read every definition file directly in `path`, ordered by file name.
    /// Other files and subdirectories are ignored.
    pub fn load_dir(path: &Path) -> Result<Self, LoadError> {
        if !path.is_dir() {
            return Err(LoadError::PathNotDirectory(path.to_owned()));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(DEFINITION_FILE_EXTENSION) {
                debug!("Skipping `{}`, not a definition file", path.display());
                continue;
            }
            paths.push(path);
        }
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let source = std::fs::read_to_string(&path).map_err(|e| LoadError::ReadFile {
                path: path.clone(),
                source: e,
            })?;
            files.push(DefinitionFile { path, source });
        }

        debug!(
            "Loaded {} definition file(s) from `{}`",
            files.len(),
            path.display()
        );
        Ok(Self { files })
    }

    pub fn files(&self) -> &[DefinitionFile] {
        &self.files
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The provided path `{}` is not a directory", .0.display())]
    PathNotDirectory(PathBuf),

    #[error("IO error occurred while loading the definitions directory. {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to read definition file `{}`. {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
}
