//! Deluge: profile and mod package management for Risk of Rain 2.
//!
//! The engine resolves Thunderstore packages against a game-version
//! compatibility window, caches archives on disk, merges them into a
//! profile's BepInEx tree and walks their dependencies depth-first.

pub mod game;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use game::installer::error::InstallError;
pub use game::installer::types::{DataLayout, InstallReport, InstallRequest};
pub use game::installer::PackageInstaller;
