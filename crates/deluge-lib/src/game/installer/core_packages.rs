//! Installs the loader packages a profile needs before any plugin can run.

use super::error::InstallError;
use super::PackageInstaller;
use crate::game::packages::{PackageCatalog, PackageIdentity, VersionMatcher};
use crate::game::profile::store;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// A loader package and the archive folder copied out of it.
struct CorePackage {
    identity: PackageIdentity,
    version: Option<String>,
    source_folder: &'static str,
    destination: PathBuf,
}

impl PackageInstaller {
    /// Install BepInExPack into the profile root, then the Risk of Rain 2
    /// specific loader fixes its game version calls for. Returns the
    /// `namespace-name-version` keys installed.
    pub async fn install_core_packages(&self, profile_dir: &Path) -> Result<Vec<String>> {
        let profile = store::load(profile_dir)?;
        let game_version = profile
            .game_version
            .as_deref()
            .ok_or_else(|| InstallError::ProfileInvalid {
                path: store::profile_file(profile_dir),
                reason: "no game version set".to_string(),
            })?;
        let descriptor = self.game_versions.get(game_version).ok_or_else(|| {
            InstallError::UnknownGameVersion {
                identifier: game_version.to_string(),
            }
        })?;

        // The sentinel build has no pinned versions; take the newest BepInExPack.
        let mut packages = vec![CorePackage {
            identity: PackageIdentity::new("bbepis", "BepInExPack"),
            version: descriptor.bepinex_version.clone(),
            source_folder: "BepInExPack",
            destination: profile_dir.to_path_buf(),
        }];
        if let Some(version) = &descriptor.fix_plugin_types_serialization_version {
            packages.push(CorePackage {
                identity: PackageIdentity::new("RiskofThunder", "FixPluginTypesSerialization"),
                version: Some(version.clone()),
                source_folder: "BepInEx",
                destination: store::install_root(profile_dir),
            });
        }
        if let Some(version) = &descriptor.ror2_bepinex_pack_version {
            packages.push(CorePackage {
                identity: PackageIdentity::new("RiskofThunder", "RoR2BepInExPack"),
                version: Some(version.clone()),
                source_folder: "BepInEx",
                destination: store::install_root(profile_dir),
            });
        }

        let catalog = self.source.load_catalog().await?;
        let mut installed = Vec::with_capacity(packages.len());
        for package in &packages {
            let key = self.install_core_package(&catalog, package).await?;
            installed.push(key);
        }

        log::info!(
            "[core] Installed {} core package(s) for {} into {:?}",
            installed.len(),
            game_version,
            profile_dir
        );
        Ok(installed)
    }

    async fn install_core_package(&self, catalog: &PackageCatalog, package: &CorePackage) -> Result<String> {
        let (version_number, download_url) = {
            let matcher = VersionMatcher::new(&self.game_versions, &self.config.dlc_rules);
            let found = matcher.resolve_in(catalog, &package.identity, package.version.as_deref(), None)?;
            (
                found.version.version_number.clone(),
                found.version.download_url.clone(),
            )
        };
        let key = package.identity.version_key(&version_number);

        self.reporter.set_message(&format!("Pulling {} Package...", package.identity));
        let bytes = self.cache.fetch(&key, &download_url).await?;

        self.reporter.set_message(&format!("Installing {}...", package.identity));
        let merger = self.merger.clone();
        let identity = package.identity.clone();
        let source_folder = package.source_folder;
        let destination = package.destination.clone();
        tokio::task::spawn_blocking(move || {
            merger.merge_platform(&bytes, source_folder, &destination, &identity)
        })
        .await
        .context("Core package task panicked")??;

        self.reporter
            .set_message(&format!("{} installed successfully!", package.identity));
        Ok(key)
    }
}
