use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;

/// Failures the engine surfaces to callers. Carried inside `anyhow::Error`;
/// recover the variant with `err.downcast_ref::<InstallError>()`.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("Package not found: {namespace}-{name}")]
    PackageNotFound { namespace: String, name: String },

    #[error("Version {version} of {namespace}-{name} not found")]
    VersionNotFound {
        namespace: String,
        name: String,
        version: String,
    },

    #[error("Failed to fetch {key} from {url}: {reason}")]
    FetchFailed {
        key: String,
        url: String,
        reason: String,
    },

    #[error("Archive for {package} is corrupt: {reason}")]
    ArchiveCorrupt { package: String, reason: String },

    #[error("Failed to {action} {}", path.display())]
    FilesystemFailure {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid dependency string: {dependency}")]
    InvalidDependency { dependency: String },

    #[error("Unknown game version: {identifier}")]
    UnknownGameVersion { identifier: String },

    #[error("Profile at {} is invalid: {reason}", path.display())]
    ProfileInvalid { path: PathBuf, reason: String },
}

impl InstallError {
    pub(crate) fn filesystem(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        InstallError::FilesystemFailure {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Why a cache metadata record was rejected. Only ever logged; the entry is
/// treated as a miss.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CacheMetadataInvalid {
    #[error("expected 2 fields, found {0}")]
    FieldCount(usize),

    #[error("bad timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("bad ttl: {0}")]
    Ttl(#[from] ParseIntError),
}
