pub mod directory;
pub mod matcher;
pub mod types;

pub use directory::{PackageSource, StaticDirectory, ThunderstoreDirectory};
pub use matcher::{MatchKind, VersionMatch, VersionMatcher};
pub use types::*;
