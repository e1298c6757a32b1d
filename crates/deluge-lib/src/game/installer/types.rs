use crate::game::packages::MatchKind;
use crate::game::packages::PackageIdentity;
use crate::utils::version::compare_versions;
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

/// Progress reporter trait for installer operations
/// Implementations forward updates to whatever front end is driving the engine
pub trait ProgressReporter: Send + Sync {
    /// Start a new step with optional total steps
    fn start_step(&self, name: &str, total_steps: Option<u32>);

    /// Set a short status message
    fn set_message(&self, message: &str);

    /// Mark operation as complete
    fn done(&self, success: bool, message: Option<&str>);
}

/// A progress reporter that does nothing (silent).
/// Useful for background work or tests.
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn start_step(&self, _name: &str, _total_steps: Option<u32>) {}
    fn set_message(&self, _message: &str) {}
    fn done(&self, _success: bool, _message: Option<&str>) {}
}

/// On-disk layout of the data directory
#[derive(Debug, Clone)]
pub struct DataLayout {
    /// Root data directory
    pub data_dir: PathBuf,
}

impl DataLayout {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Get the path to the package archive cache
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("_data").join("cache")
    }

    /// Get the path to the cached directory listing
    pub fn index_cache_dir(&self) -> PathBuf {
        self.cache_dir().join("index")
    }

    /// Get the path where archives are extracted before merging
    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("_data").join("staging")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir.join("profiles")
    }

    pub fn profile_dir(&self, folder: &str) -> PathBuf {
        self.profiles_dir().join(folder)
    }
}

/// One top-level install call
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub identity: PackageIdentity,

    /// Exact version to install; the newest compatible one when `None`
    pub version: Option<String>,

    /// Game build the package must be compatible with
    pub target_game_version: Option<String>,
}

impl InstallRequest {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identity: PackageIdentity::new(namespace, name),
            version: None,
            target_game_version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_target_game_version(mut self, target: impl Into<String>) -> Self {
        self.target_game_version = Some(target.into());
        self
    }
}

/// The root package resolved to something other than what was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub requested: Option<String>,
    pub resolved: String,
    pub kind: MatchKind,
}

impl Substitution {
    /// Whether the resolved version is older than the requested one.
    pub fn is_downgrade(&self) -> bool {
        self.requested
            .as_deref()
            .map_or(false, |r| compare_versions(&self.resolved, r) == Ordering::Less)
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.requested {
            Some(requested) => {
                let direction = match compare_versions(&self.resolved, requested) {
                    Ordering::Less => "downgraded",
                    Ordering::Greater => "upgraded",
                    Ordering::Equal => "kept",
                };
                write!(f, "{} {} to {} ({})", direction, requested, self.resolved, self.kind)
            }
            None => write!(f, "selected {} ({})", self.resolved, self.kind),
        }
    }
}

/// A dependency that could not be installed under the lenient policy.
#[derive(Debug, Clone)]
pub struct DependencyFailure {
    pub dependency: String,
    pub required_by: String,
    pub error: String,
}

/// Outcome of a top-level install call
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    /// `namespace-name-version` keys, in install order
    pub installed: Vec<String>,

    /// The root package was already installed at the resolved version
    pub already_satisfied: bool,

    pub substitution: Option<Substitution>,

    pub failures: Vec<DependencyFailure>,
}

impl InstallReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolver states, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStage {
    ResolvingVersion,
    CheckAlreadyInstalled,
    CheckSessionGuard,
    Fetching,
    Extracting,
    Installing,
    Recording,
    Recursing,
    Done,
}

impl ResolveStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveStage::ResolvingVersion => "resolving_version",
            ResolveStage::CheckAlreadyInstalled => "check_already_installed",
            ResolveStage::CheckSessionGuard => "check_session_guard",
            ResolveStage::Fetching => "fetching",
            ResolveStage::Extracting => "extracting",
            ResolveStage::Installing => "installing",
            ResolveStage::Recording => "recording",
            ResolveStage::Recursing => "recursing",
            ResolveStage::Done => "done",
        }
    }
}

impl fmt::Display for ResolveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
