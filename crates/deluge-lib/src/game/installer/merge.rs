//! Unpacks a package archive and merges it into a profile's BepInEx tree.
//!
//! The steps are modelled as a typestate pipeline so they can only run in
//! order: extract, copy root metadata, merge known buckets, flatten whatever
//! is left, then delete the scratch directory.
//!
//! Every merge extracts into its own temporary directory under the staging
//! root, so concurrent installs of the same package never share scratch space.

use super::config::EngineConfig;
use super::error::InstallError;
use crate::game::packages::PackageIdentity;
use crate::utils::fs::copy_dir_recursive;
use anyhow::Result;
use std::fs;
use std::io::Cursor;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::result::ZipError;

/// Files copied from the archive root into the package's plugin folder.
const ROOT_METADATA_FILES: &[&str] = &["manifest.json", "icon.png", "README.md", "CHANGELOG.md"];

/// Top-level archive folders with a fixed destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    BepInEx,
    Plugins,
    Patchers,
    Monomod,
    Core,
}

impl Bucket {
    pub const ALL: [Bucket; 5] = [
        Bucket::BepInEx,
        Bucket::Plugins,
        Bucket::Patchers,
        Bucket::Monomod,
        Bucket::Core,
    ];

    pub fn folder_name(&self) -> &'static str {
        match self {
            Bucket::BepInEx => "BepInEx",
            Bucket::Plugins => "plugins",
            Bucket::Patchers => "patchers",
            Bucket::Monomod => "monomod",
            Bucket::Core => "core",
        }
    }
}

/// Where one package's files land inside a profile.
#[derive(Debug, Clone)]
pub struct PackageLayout {
    install_root: PathBuf,
    full_name: String,
}

impl PackageLayout {
    pub fn new(install_root: impl Into<PathBuf>, identity: &PackageIdentity) -> Self {
        Self {
            install_root: install_root.into(),
            full_name: identity.full_name(),
        }
    }

    /// `BepInEx` merges straight into the install root; every other bucket
    /// gets a per-package folder.
    pub fn bucket_dir(&self, bucket: Bucket) -> PathBuf {
        match bucket {
            Bucket::BepInEx => self.install_root.clone(),
            other => self
                .install_root
                .join(other.folder_name())
                .join(&self.full_name),
        }
    }

    pub fn plugin_dir(&self) -> PathBuf {
        self.bucket_dir(Bucket::Plugins)
    }

    pub fn monomod_dir(&self) -> PathBuf {
        self.bucket_dir(Bucket::Monomod)
    }
}

/// What a merge put where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub metadata_files: Vec<String>,
    pub buckets: Vec<Bucket>,
    pub flattened_plugins: usize,
    pub flattened_monomod: usize,
}

// Pipeline stages
pub struct Extracted;
pub struct MetadataCopied;
pub struct BucketsMerged;
pub struct Flattened;

pub struct MergePipeline<S> {
    scratch: TempDir,
    layout: PackageLayout,
    package: String,
    copy_metadata: bool,
    summary: MergeSummary,
    _stage: PhantomData<S>,
}

impl<S> MergePipeline<S> {
    fn advance<T>(self) -> MergePipeline<T> {
        MergePipeline {
            scratch: self.scratch,
            layout: self.layout,
            package: self.package,
            copy_metadata: self.copy_metadata,
            summary: self.summary,
            _stage: PhantomData,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }
}

impl MergePipeline<Extracted> {
    pub fn copy_root_metadata(mut self) -> Result<MergePipeline<MetadataCopied>> {
        if !self.copy_metadata {
            log::debug!("[merge] {} has a non-standard layout, skipping root metadata", self.package);
            return Ok(self.advance());
        }

        let plugin_dir = self.layout.plugin_dir();
        for name in ROOT_METADATA_FILES {
            let source = self.scratch.path().join(name);
            if !source.is_file() {
                continue;
            }
            fs::create_dir_all(&plugin_dir)
                .map_err(|e| InstallError::filesystem("create", &plugin_dir, e))?;
            let target = plugin_dir.join(name);
            fs::copy(&source, &target).map_err(|e| InstallError::filesystem("copy", &source, e))?;
            self.summary.metadata_files.push(name.to_string());
        }
        Ok(self.advance())
    }
}

impl MergePipeline<MetadataCopied> {
    /// Copy every known top-level folder to its destination, then delete it
    /// from scratch so the flatten step does not see it again.
    pub fn merge_buckets(mut self) -> Result<MergePipeline<BucketsMerged>> {
        for bucket in Bucket::ALL {
            let Some(source) = find_child_dir(self.scratch.path(), bucket.folder_name())? else {
                continue;
            };
            let target = self.layout.bucket_dir(bucket);
            log::debug!("[merge] {:?} -> {:?}", source, target);
            copy_dir_recursive(&source, &target)
                .map_err(|e| InstallError::filesystem("copy", &source, e))?;
            fs::remove_dir_all(&source).map_err(|e| InstallError::filesystem("remove", &source, e))?;
            self.summary.buckets.push(bucket);
        }
        Ok(self.advance())
    }
}

impl MergePipeline<BucketsMerged> {
    /// Move loose assemblies anywhere in the archive into the package's
    /// `monomod/` (for `*.mm.dll`) or `plugins/` folder.
    pub fn flatten_remainder(mut self) -> Result<MergePipeline<Flattened>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(self.scratch.path()) {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.scratch.path().to_path_buf());
                InstallError::filesystem("walk", path, e.into())
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        for source in files {
            let Some(file_name) = source.file_name() else {
                continue;
            };
            let lower = file_name.to_string_lossy().to_lowercase();
            let target_dir = if lower.ends_with(".mm.dll") {
                self.summary.flattened_monomod += 1;
                self.layout.monomod_dir()
            } else if lower.ends_with(".dll") {
                self.summary.flattened_plugins += 1;
                self.layout.plugin_dir()
            } else {
                continue;
            };

            fs::create_dir_all(&target_dir)
                .map_err(|e| InstallError::filesystem("create", &target_dir, e))?;
            let target = target_dir.join(file_name);
            fs::copy(&source, &target).map_err(|e| InstallError::filesystem("copy", &source, e))?;
            fs::remove_file(&source).map_err(|e| InstallError::filesystem("remove", &source, e))?;
        }
        Ok(self.advance())
    }
}

impl MergePipeline<Flattened> {
    pub fn finish(self) -> Result<MergeSummary> {
        let scratch = self.scratch.path().to_path_buf();
        self.scratch
            .close()
            .map_err(|e| InstallError::filesystem("remove", &scratch, e))?;
        log::debug!("[merge] {} merged: {:?}", self.package, self.summary);
        Ok(self.summary)
    }
}

/// Owns the staging area where archives are extracted before merging.
#[derive(Debug, Clone)]
pub struct InstallMerger {
    staging_root: PathBuf,
    config: EngineConfig,
}

impl InstallMerger {
    pub fn new(staging_root: impl Into<PathBuf>, config: EngineConfig) -> Self {
        Self {
            staging_root: staging_root.into(),
            config,
        }
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// A fresh `<namespace>-<name>-XXXXXX` directory under the staging root,
    /// removed when dropped.
    fn scratch_dir(&self, identity: &PackageIdentity) -> Result<TempDir> {
        fs::create_dir_all(&self.staging_root)
            .map_err(|e| InstallError::filesystem("create", &self.staging_root, e))?;
        let prefix = format!("{}-", identity.full_name());
        let scratch = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&self.staging_root)
            .map_err(|e| InstallError::filesystem("create scratch in", &self.staging_root, e))?;
        Ok(scratch)
    }

    /// Extract `bytes` into a scratch directory private to this merge.
    pub fn unpack(
        &self,
        bytes: &[u8],
        install_root: &Path,
        identity: &PackageIdentity,
    ) -> Result<MergePipeline<Extracted>> {
        let scratch = self.scratch_dir(identity)?;
        self.extract_into(bytes, scratch.path(), identity)?;

        let full_name = identity.full_name();
        Ok(MergePipeline {
            scratch,
            layout: PackageLayout::new(install_root, identity),
            copy_metadata: !self.config.is_non_standard_layout(&full_name),
            package: full_name,
            summary: MergeSummary::default(),
            _stage: PhantomData,
        })
    }

    /// Run the remaining stages on an extracted archive.
    pub fn install(&self, extracted: MergePipeline<Extracted>) -> Result<MergeSummary> {
        extracted
            .copy_root_metadata()?
            .merge_buckets()?
            .flatten_remainder()?
            .finish()
    }

    pub fn merge(
        &self,
        bytes: &[u8],
        install_root: &Path,
        identity: &PackageIdentity,
    ) -> Result<MergeSummary> {
        let extracted = self.unpack(bytes, install_root, identity)?;
        self.install(extracted)
    }

    /// Copy one folder of a loader package (e.g. `BepInExPack/`) into
    /// `destination` as-is, bypassing the plugin layout.
    pub fn merge_platform(
        &self,
        bytes: &[u8],
        source_folder: &str,
        destination: &Path,
        identity: &PackageIdentity,
    ) -> Result<()> {
        let scratch = self.scratch_dir(identity)?;
        self.extract_into(bytes, scratch.path(), identity)?;

        let result: Result<()> = match find_child_dir(scratch.path(), source_folder)? {
            Some(source) => copy_dir_recursive(&source, destination)
                .map_err(|e| InstallError::filesystem("copy", &source, e).into()),
            None => Err(InstallError::ArchiveCorrupt {
                package: identity.full_name(),
                reason: format!("missing {source_folder}/ folder"),
            }
            .into()),
        };

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            log::warn!("[merge] Could not remove scratch {:?}: {}", scratch_path, e);
        }
        result
    }

    fn extract_into(&self, bytes: &[u8], scratch: &Path, identity: &PackageIdentity) -> Result<()> {
        let corrupt = |e: ZipError| -> anyhow::Error {
            match e {
                ZipError::Io(io) => InstallError::filesystem("extract into", scratch, io).into(),
                other => InstallError::ArchiveCorrupt {
                    package: identity.full_name(),
                    reason: other.to_string(),
                }
                .into(),
            }
        };

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;
        log::debug!(
            "[merge] Extracting {} entries for {} into {:?}",
            archive.len(),
            identity,
            scratch
        );
        archive.extract(scratch).map_err(corrupt)?;
        Ok(())
    }
}

/// Case-insensitive lookup of a direct child directory.
fn find_child_dir(parent: &Path, name: &str) -> Result<Option<PathBuf>> {
    let entries = fs::read_dir(parent).map_err(|e| InstallError::filesystem("read", parent, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| InstallError::filesystem("read", parent, e))?;
        if entry.file_name().to_string_lossy().eq_ignore_ascii_case(name) && entry.path().is_dir() {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::zip_bytes;

    fn setup() -> (tempfile::TempDir, InstallMerger, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let merger = InstallMerger::new(tmp.path().join("staging"), EngineConfig::default());
        let root = tmp.path().join("profile/BepInEx");
        (tmp, merger, root)
    }

    fn staging_is_empty(merger: &InstallMerger) -> bool {
        fs::read_dir(merger.staging_root())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[test]
    fn loose_dlls_are_flattened() {
        let (_tmp, merger, root) = setup();
        let id = PackageIdentity::new("Author", "Mod");
        let bytes = zip_bytes(&[
            ("manifest.json", b"{}"),
            ("icon.png", b"png"),
            ("nested/deeper/Mod.dll", b"MZ"),
            ("Mod.Hooks.MM.dll", b"MZ"),
            ("notes.txt", b"ignored"),
        ]);

        let summary = merger.merge(&bytes, &root, &id).unwrap();

        assert!(root.join("plugins/Author-Mod/manifest.json").is_file());
        assert!(root.join("plugins/Author-Mod/icon.png").is_file());
        assert!(root.join("plugins/Author-Mod/Mod.dll").is_file());
        assert!(root.join("monomod/Author-Mod/Mod.Hooks.MM.dll").is_file());
        assert!(!root.join("plugins/Author-Mod/notes.txt").exists());
        assert_eq!(summary.flattened_plugins, 1);
        assert_eq!(summary.flattened_monomod, 1);
        assert!(staging_is_empty(&merger));
    }

    #[test]
    fn known_buckets_keep_their_structure() {
        let (_tmp, merger, root) = setup();
        let id = PackageIdentity::new("Author", "Mod");
        let bytes = zip_bytes(&[
            ("plugins/sub/Mod.dll", b"MZ"),
            ("patchers/Patch.dll", b"MZ"),
            ("BepInEx/config/author.mod.cfg", b"[General]"),
        ]);

        let summary = merger.merge(&bytes, &root, &id).unwrap();

        assert!(root.join("plugins/Author-Mod/sub/Mod.dll").is_file());
        assert!(root.join("patchers/Author-Mod/Patch.dll").is_file());
        assert!(root.join("config/author.mod.cfg").is_file());
        // Bucket contents are not flattened a second time
        assert!(!root.join("plugins/Author-Mod/Patch.dll").exists());
        assert_eq!(summary.flattened_plugins, 0);
        assert_eq!(
            summary.buckets,
            vec![Bucket::BepInEx, Bucket::Plugins, Bucket::Patchers]
        );
    }

    #[test]
    fn non_standard_packages_skip_root_metadata() {
        let (_tmp, merger, root) = setup();
        let id = PackageIdentity::new("bbepis", "BepInExPack");
        let bytes = zip_bytes(&[("manifest.json", b"{}"), ("README.md", b"readme")]);

        let summary = merger.merge(&bytes, &root, &id).unwrap();

        assert!(summary.metadata_files.is_empty());
        assert!(!root.join("plugins/bbepis-BepInExPack").exists());
    }

    #[test]
    fn corrupt_archive_is_typed_error() {
        let (_tmp, merger, root) = setup();
        let err = merger
            .merge(b"definitely not a zip", &root, &PackageIdentity::new("A", "B"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::ArchiveCorrupt { .. })
        ));
    }

    #[test]
    fn leftovers_from_an_interrupted_run_are_not_merged() {
        let (_tmp, merger, root) = setup();
        let id = PackageIdentity::new("Author", "Mod");
        let leftover = merger.staging_root().join("Author-Mod");
        fs::create_dir_all(&leftover).unwrap();
        fs::write(leftover.join("Leftover.dll"), b"old").unwrap();

        merger
            .merge(&zip_bytes(&[("Mod.dll", b"MZ")]), &root, &id)
            .unwrap();

        assert!(root.join("plugins/Author-Mod/Mod.dll").is_file());
        assert!(!root.join("plugins/Author-Mod/Leftover.dll").exists());
    }

    #[test]
    fn interleaved_merges_of_one_package_use_separate_scratch() {
        let (tmp, merger, _root) = setup();
        let id = PackageIdentity::new("Author", "Shared");
        let bytes = zip_bytes(&[("Shared.dll", b"MZ")]);
        let first_root = tmp.path().join("first/BepInEx");
        let second_root = tmp.path().join("second/BepInEx");

        let first = merger.unpack(&bytes, &first_root, &id).unwrap();
        let second = merger.unpack(&bytes, &second_root, &id).unwrap();
        assert_ne!(first.scratch_dir(), second.scratch_dir());

        merger.install(first).unwrap();
        let summary = merger.install(second).unwrap();

        assert_eq!(summary.flattened_plugins, 1);
        assert!(first_root.join("plugins/Author-Shared/Shared.dll").is_file());
        assert!(second_root.join("plugins/Author-Shared/Shared.dll").is_file());
        assert!(staging_is_empty(&merger));
    }

    #[test]
    fn failed_merge_leaves_no_scratch() {
        let (_tmp, merger, root) = setup();
        let _ = merger.merge(b"not a zip", &root, &PackageIdentity::new("A", "B"));
        assert!(staging_is_empty(&merger));
    }

    #[test]
    fn platform_folder_is_copied_verbatim() {
        let (tmp, merger, _root) = setup();
        let id = PackageIdentity::new("bbepis", "BepInExPack");
        let profile = tmp.path().join("profile");
        let bytes = zip_bytes(&[
            ("BepInExPack/winhttp.dll", b"MZ"),
            ("BepInExPack/BepInEx/core/BepInEx.Preloader.dll", b"MZ"),
        ]);

        merger.merge_platform(&bytes, "BepInExPack", &profile, &id).unwrap();

        assert!(profile.join("winhttp.dll").is_file());
        assert!(profile.join("BepInEx/core/BepInEx.Preloader.dll").is_file());
        assert!(staging_is_empty(&merger));
    }

    #[test]
    fn platform_package_without_its_folder_is_corrupt() {
        let (tmp, merger, _root) = setup();
        let id = PackageIdentity::new("bbepis", "BepInExPack");
        let bytes = zip_bytes(&[("Elsewhere/winhttp.dll", b"MZ")]);

        let err = merger
            .merge_platform(&bytes, "BepInExPack", &tmp.path().join("profile"), &id)
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::ArchiveCorrupt { .. })
        ));
        assert!(staging_is_empty(&merger));
    }
}
