use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GdmError {
    #[error("malformed data table specifier: {0}")]
    InvalidSpec(String),

    #[error("unknown data table name: {0}")]
    UnknownTable(String),

    #[error("a dbkey is required to perform the requested action(s), pass one with --dbkey")]
    MissingDbkey,

    #[error("no library given and $dbname is not set, pass one with --library")]
    MissingLibraryName,

    #[error("source file could not be read: {0}")]
    FileNotFound(String),

    #[error("role not found on the Galaxy server: {0}")]
    RoleNotFound(String),

    #[error("library not found: {0}")]
    LibraryNotFound(String),

    #[error("folder not found in library: {0}")]
    FolderNotFound(String),

    #[error("missing config file at {0}, run `galaxy-dm init` to create it")]
    MissingConfig(PathBuf),

    #[error("refusing to overwrite existing config file at {0}")]
    ConfigExists(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("unknown Galaxy instance '{0}', check spelling or add it to the config file")]
    UnknownInstance(String),

    #[error("could not connect to the Galaxy server: {0}")]
    Connection(String),

    #[error("Galaxy returned status {status}: {message}")]
    GalaxyStatus { status: u16, message: String },

    #[error("unexpected Galaxy response: {0}")]
    InvalidResponse(String),

    #[error("could not connect to the Galaxy server for too long, giving up")]
    ConnectionExhausted,

    #[error("remote job finished in error state\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}")]
    JobFailed { stdout: String, stderr: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
