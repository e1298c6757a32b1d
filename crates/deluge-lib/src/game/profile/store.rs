//! Reading and writing `profile.json` and rebuilding the mod list from disk.

use super::types::{InstalledMod, PluginManifest, Profile};
use crate::game::installer::error::InstallError;
use crate::game::metadata::GameVersionCatalog;
use crate::utils::fs::{remove_dir_if_exists, write_atomic};
use crate::utils::sanitize::sanitize_profile_name;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const PROFILE_FILENAME: &str = "profile.json";
const MANIFEST_FILENAME: &str = "manifest.json";

pub fn profile_file(profile_dir: &Path) -> PathBuf {
    profile_dir.join(PROFILE_FILENAME)
}

/// The `BepInEx` folder packages are merged into.
pub fn install_root(profile_dir: &Path) -> PathBuf {
    profile_dir.join("BepInEx")
}

pub fn plugins_dir(profile_dir: &Path) -> PathBuf {
    install_root(profile_dir).join("plugins")
}

pub fn load(profile_dir: &Path) -> Result<Profile> {
    let path = profile_file(profile_dir);
    let raw = fs::read_to_string(&path).map_err(|e| InstallError::ProfileInvalid {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    let profile = serde_json::from_str(raw.trim_start_matches('\u{feff}')).map_err(|e| {
        InstallError::ProfileInvalid {
            path: path.clone(),
            reason: e.to_string(),
        }
    })?;
    Ok(profile)
}

/// Scan `BepInEx/plugins/*/manifest.json`. Folders without a manifest are
/// skipped; unreadable manifests are logged and skipped.
pub fn rebuild_mods_from_disk(profile_dir: &Path) -> Result<Vec<InstalledMod>> {
    let plugins = plugins_dir(profile_dir);
    if !plugins.is_dir() {
        return Ok(Vec::new());
    }

    let mut dirs = Vec::new();
    for entry in fs::read_dir(&plugins).map_err(|e| InstallError::filesystem("read", &plugins, e))? {
        let entry = entry.map_err(|e| InstallError::filesystem("read", &plugins, e))?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();

    let mut mods = Vec::new();
    for dir in dirs {
        let manifest_path = dir.join(MANIFEST_FILENAME);
        if !manifest_path.is_file() {
            continue;
        }
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let manifest = match fs::read_to_string(&manifest_path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| PluginManifest::parse(&raw).map_err(anyhow::Error::from))
        {
            Ok(manifest) => manifest,
            Err(e) => {
                log::warn!("[profile] Skipping unreadable manifest {:?}: {}", manifest_path, e);
                continue;
            }
        };

        match manifest.into_installed(&dir_name) {
            Some(installed) => mods.push(installed),
            None => log::warn!(
                "[profile] Manifest {:?} has no usable name or version, skipping",
                manifest_path
            ),
        }
    }
    Ok(mods)
}

/// Load `profile.json` and replace its mod list with what is on disk.
pub fn load_with_disk_mods(profile_dir: &Path) -> Result<Profile> {
    let mut profile = load(profile_dir)?;
    profile.mods = rebuild_mods_from_disk(profile_dir)?;
    log::debug!(
        "[profile] {:?} has {} mods on disk",
        profile_dir,
        profile.mods.len()
    );
    Ok(profile)
}

pub fn save(profile_dir: &Path, profile: &Profile) -> Result<()> {
    let path = profile_file(profile_dir);
    let json = serde_json::to_vec_pretty(profile).context("Failed to serialize profile")?;
    write_atomic(&path, &json).map_err(|e| InstallError::filesystem("write", &path, e))?;
    Ok(())
}

/// A profile found under the profiles root.
#[derive(Debug, Clone)]
pub struct ProfileEntry {
    /// Folder name, which is what other commands take
    pub folder: String,
    pub path: PathBuf,
    pub profile: Profile,
}

/// Every readable profile under `profiles_root`, sorted by folder name.
pub fn list(profiles_root: &Path) -> Result<Vec<ProfileEntry>> {
    if !profiles_root.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in
        fs::read_dir(profiles_root).map_err(|e| InstallError::filesystem("read", profiles_root, e))?
    {
        let entry = entry.map_err(|e| InstallError::filesystem("read", profiles_root, e))?;
        let path = entry.path();
        if !path.is_dir() || !profile_file(&path).is_file() {
            continue;
        }
        match load(&path) {
            Ok(profile) => entries.push(ProfileEntry {
                folder: entry.file_name().to_string_lossy().to_string(),
                path,
                profile,
            }),
            Err(e) => log::warn!("[profile] Skipping {:?}: {:#}", path, e),
        }
    }
    entries.sort_by(|a, b| a.folder.cmp(&b.folder));
    Ok(entries)
}

/// Create a profile folder under `profiles_root` and write its `profile.json`.
///
/// `game_version` may be a build identifier or an alias such as `sotv`. A
/// folder already holding a profile gets a ` (n)` suffix; a folder without one
/// is merged into, or wiped first when `overwrite` is set.
pub fn create(
    profiles_root: &Path,
    name: &str,
    game_version: &str,
    launch_arguments: &str,
    overwrite: bool,
    catalog: &GameVersionCatalog,
) -> Result<ProfileEntry> {
    let descriptor =
        catalog
            .resolve_alias(game_version)
            .ok_or_else(|| InstallError::UnknownGameVersion {
                identifier: game_version.to_string(),
            })?;

    let base = sanitize_profile_name(name);
    let mut folder = base.clone();
    let mut i = 1;
    while profile_file(&profiles_root.join(&folder)).exists() {
        folder = format!("{base} ({i})");
        i += 1;
    }

    let path = profiles_root.join(&folder);
    if path.exists() && overwrite {
        log::info!("[profile] Overwriting existing folder {:?}", path);
        remove_dir_if_exists(&path).map_err(|e| InstallError::filesystem("remove", &path, e))?;
    }
    fs::create_dir_all(&path).map_err(|e| InstallError::filesystem("create", &path, e))?;

    let mut profile = Profile::new(name.trim(), Some(descriptor.identifier.clone()));
    profile.launch_arguments = launch_arguments.to_string();
    save(&path, &profile)?;

    log::info!("[profile] Created profile {} ({:?})", profile.name, path);
    Ok(ProfileEntry {
        folder,
        path,
        profile,
    })
}
