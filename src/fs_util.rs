use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::GdmError;

/// How local source paths are resolved before being sent to the server.
#[derive(Debug, Clone, Copy)]
pub struct SourceOptions {
    pub check_existence: bool,
    pub use_biomaj_env: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            check_existence: true,
            use_biomaj_env: true,
        }
    }
}

/// Resolve each source to an absolute path, optionally checking that the
/// file exists locally. Relative paths are anchored on the BioMAJ bank
/// directory when the BioMAJ environment variables are set.
pub fn resolve_sources(
    sources: &[String],
    options: SourceOptions,
) -> Result<Vec<String>, GdmError> {
    sources
        .iter()
        .map(|source| resolve_source(source, options))
        .collect()
}

pub fn resolve_source(source: &str, options: SourceOptions) -> Result<String, GdmError> {
    let path = Utf8PathBuf::from(source);
    let absolute = if path.is_absolute() {
        path
    } else if let Some(prefix) = biomaj_data_dir().filter(|_| options.use_biomaj_env) {
        prefix.join(path)
    } else {
        let cwd = std::env::current_dir()
            .map_err(|err| GdmError::Filesystem(err.to_string()))?;
        let cwd = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| GdmError::Filesystem("non-utf8 working directory".to_string()))?;
        cwd.join(path)
    };

    if options.check_existence && !exists_with_any_extension(&absolute) {
        return Err(GdmError::FileNotFound(absolute.to_string()));
    }

    Ok(absolute.into_string())
}

/// `$data.dir/$dirversion/$localrelease`, the directory BioMAJ puts the
/// current release of a bank in.
fn biomaj_data_dir() -> Option<Utf8PathBuf> {
    let data_dir = std::env::var("data.dir").ok()?;
    let dirversion = std::env::var("dirversion").ok()?;
    let localrelease = std::env::var("localrelease").ok()?;
    Some(Utf8PathBuf::from(data_dir).join(dirversion).join(localrelease))
}

/// True when the path is a file, or when a sibling `name.<ext>` exists.
/// Index files are often passed by prefix (e.g. a bowtie2 basename).
pub fn exists_with_any_extension(path: &Utf8Path) -> bool {
    if path.is_file() {
        return true;
    }

    let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
        return false;
    };
    let prefix = format!("{file_name}.");

    fs::read_dir(parent.as_std_path())
        .map(|entries| {
            entries.flatten().any(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| name.starts_with(&prefix))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}
