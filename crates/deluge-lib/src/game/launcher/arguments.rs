use crate::game::installer::error::InstallError;
use crate::game::profile::{store, Profile};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// The BepInEx preloader that Doorstop injects into the game.
pub fn doorstop_target_assembly(profile_dir: &Path) -> PathBuf {
    store::install_root(profile_dir)
        .join("core")
        .join("BepInEx.Preloader.dll")
}

/// Arguments to start the game with `profile`'s BepInEx instead of the one in
/// the game folder, followed by the profile's own arguments.
pub fn build_launch_arguments(profile_dir: &Path, profile: &Profile) -> Result<Vec<String>> {
    let mut args = vec![
        "--doorstop-enabled".to_string(),
        "true".to_string(),
        "--doorstop-target-assembly".to_string(),
        doorstop_target_assembly(profile_dir).to_string_lossy().to_string(),
    ];

    let extra = profile.launch_arguments.trim();
    if !extra.is_empty() {
        let split = shlex::split(extra).ok_or_else(|| InstallError::ProfileInvalid {
            path: store::profile_file(profile_dir),
            reason: format!("unbalanced quotes in launch arguments: {extra}"),
        })?;
        args.extend(split);
    }

    log::debug!("[launcher] Launch arguments: {:?}", args);
    Ok(args)
}
