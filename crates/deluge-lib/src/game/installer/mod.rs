pub mod cache;
pub mod config;
pub mod core_packages;
pub mod error;
pub mod merge;
pub mod types;


use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::Client;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use crate::game::metadata::GameVersionCatalog;
use crate::game::packages::{
    DependencyRef, MatchKind, PackageCatalog, PackageIdentity, PackageSource,
    ThunderstoreDirectory, VersionMatcher,
};
use crate::game::profile::{store, InstalledMod, Profile, ProfileEntry};
use cache::DownloadCache;
use config::{EngineConfig, FailurePolicy};
use merge::InstallMerger;
use types::{
    DataLayout, DependencyFailure, InstallReport, InstallRequest, ProgressReporter,
    ResolveStage, SilentProgressReporter, Substitution,
};

/// State of one top-level install call. Dropped when the call returns.
struct ResolutionContext {
    catalog: Arc<PackageCatalog>,
    profile: Profile,
    install_root: PathBuf,
    target: Option<String>,
    /// `namespace-name-version` keys processed in this session
    visited: HashSet<String>,
    report: InstallReport,
}

/// Installs packages and their dependencies into profiles.
pub struct PackageInstaller {
    config: EngineConfig,
    layout: DataLayout,
    cache: Arc<DownloadCache>,
    source: Arc<dyn PackageSource>,
    game_versions: Arc<GameVersionCatalog>,
    merger: Arc<InstallMerger>,
    reporter: Arc<dyn ProgressReporter>,
}

impl PackageInstaller {
    pub fn new(layout: DataLayout, config: EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let cache = Arc::new(
            DownloadCache::new(layout.cache_dir(), client.clone())
                .with_ttl_hours(config.cache_ttl_hours),
        );
        let index_cache = Arc::new(
            DownloadCache::new(layout.index_cache_dir(), client)
                .with_ttl_hours(config.cache_ttl_hours)
                .with_extension("json"),
        );
        let url = Url::parse(&config.package_index_url)
            .with_context(|| format!("Invalid package index URL {}", config.package_index_url))?;
        let merger = Arc::new(InstallMerger::new(layout.staging_dir(), config.clone()));

        Ok(Self {
            source: Arc::new(ThunderstoreDirectory::new(url, index_cache)),
            game_versions: Arc::new(GameVersionCatalog::builtin().clone()),
            reporter: Arc::new(SilentProgressReporter),
            config,
            layout,
            cache,
            merger,
        })
    }

    pub fn with_source(mut self, source: Arc<dyn PackageSource>) -> Self {
        self.source = source;
        self
    }

    /// Share an archive cache with other installers.
    pub fn with_cache(mut self, cache: Arc<DownloadCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_game_versions(mut self, game_versions: Arc<GameVersionCatalog>) -> Self {
        self.game_versions = game_versions;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn game_versions(&self) -> &GameVersionCatalog {
        &self.game_versions
    }

    /// Create a profile under the data directory's `profiles/` folder.
    pub fn create_profile(
        &self,
        name: &str,
        game_version: &str,
        launch_arguments: &str,
        overwrite: bool,
    ) -> Result<ProfileEntry> {
        store::create(
            &self.layout.profiles_dir(),
            name,
            game_version,
            launch_arguments,
            overwrite,
            &self.game_versions,
        )
    }

    pub fn list_profiles(&self) -> Result<Vec<ProfileEntry>> {
        store::list(&self.layout.profiles_dir())
    }

    /// Install `request` and its dependencies into the profile at `profile_dir`.
    ///
    /// The profile's mod list is rebuilt from disk first and `profile.json` is
    /// written once at the end, also when the install fails part way.
    /// Without an explicit target the profile's own game version is used.
    pub async fn install(&self, profile_dir: &Path, request: &InstallRequest) -> Result<InstallReport> {
        log::info!(
            "[install] Installing {} into {:?}",
            request.identity,
            profile_dir
        );
        self.reporter
            .start_step(&format!("Installing {}", request.identity), None);

        let loaded = async {
            let catalog = self.source.load_catalog().await?;
            let profile = store::load_with_disk_mods(profile_dir)?;
            Ok::<_, anyhow::Error>((Arc::new(catalog), profile))
        }
        .await;
        let (catalog, profile) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                log::error!("[install] Could not start install of {}: {:#}", request.identity, e);
                self.reporter.done(false, Some(&format!("{e:#}")));
                return Err(e);
            }
        };
        let target = request
            .target_game_version
            .clone()
            .or_else(|| profile.game_version.clone());

        let mut ctx = ResolutionContext {
            catalog,
            profile,
            install_root: store::install_root(profile_dir),
            target,
            visited: HashSet::new(),
            report: InstallReport::default(),
        };

        let result = self
            .install_package(
                &mut ctx,
                request.identity.clone(),
                request.version.clone(),
                true,
            )
            .await;

        let ResolutionContext {
            profile, report, ..
        } = ctx;
        let saved = store::save(profile_dir, &profile);

        match (result, saved) {
            (Ok(()), Ok(())) => {
                let message = if report.already_satisfied {
                    format!("{} is already installed", request.identity)
                } else {
                    format!("Installed {} package(s)", report.installed.len())
                };
                log::info!("[install] {}", message);
                self.reporter.done(true, Some(&message));
                Ok(report)
            }
            (Err(e), saved) => {
                if let Err(save_err) = saved {
                    log::error!("[install] Failed to save profile after error: {:#}", save_err);
                }
                log::error!("[install] Install of {} failed: {:#}", request.identity, e);
                self.reporter.done(false, Some(&format!("{e:#}")));
                Err(e)
            }
            (Ok(()), Err(e)) => {
                self.reporter.done(false, Some(&format!("{e:#}")));
                Err(e)
            }
        }
    }

    /// Boxed entry point so [`install_node`](Self::install_node) can recurse.
    fn install_package<'a>(
        &'a self,
        ctx: &'a mut ResolutionContext,
        identity: PackageIdentity,
        requested: Option<String>,
        is_root: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.install_node(ctx, identity, requested, is_root))
    }

    /// One node of the depth-first walk.
    async fn install_node(
        &self,
        ctx: &mut ResolutionContext,
        identity: PackageIdentity,
        requested: Option<String>,
        is_root: bool,
    ) -> Result<()> {
        stage(&identity, ResolveStage::ResolvingVersion);
        let (version, kind) = {
            let matcher = VersionMatcher::new(&self.game_versions, &self.config.dlc_rules);
            let found = matcher.resolve_in(
                &ctx.catalog,
                &identity,
                requested.as_deref(),
                ctx.target.as_deref(),
            )?;
            (found.version.clone(), found.kind)
        };
        let key = identity.version_key(&version.version_number);

        if is_root {
            let differs = requested
                .as_deref()
                .map_or(false, |r| r != version.version_number);
            if differs || kind == MatchKind::Fallback {
                let substitution = Substitution {
                    requested: requested.clone(),
                    resolved: version.version_number.clone(),
                    kind,
                };
                log::warn!("[install] {}: {}", identity, substitution);
                self.reporter
                    .set_message(&format!("{}: {}", identity, substitution));
                ctx.report.substitution = Some(substitution);
            }
        }

        stage(&identity, ResolveStage::CheckAlreadyInstalled);
        let installed_version = ctx
            .profile
            .find_mod(&identity)
            .map(|m| m.version_number.clone());
        if installed_version.as_deref() == Some(version.version_number.as_str()) {
            if is_root {
                ctx.report.already_satisfied = true;
                self.reporter
                    .set_message(&format!("{} is already installed", key));
            }
            log::debug!("[install] {} already installed", key);
            ctx.visited.insert(key);
            return Ok(());
        }

        stage(&identity, ResolveStage::CheckSessionGuard);
        if !is_root && ctx.visited.contains(&key) {
            log::debug!("[install] {} already handled in this session", key);
            return Ok(());
        }

        stage(&identity, ResolveStage::Fetching);
        self.reporter.set_message(&format!("Pulling {}...", key));
        let bytes = self.cache.fetch(&key, &version.download_url).await?;

        self.merge_archive(bytes, &ctx.install_root, &identity).await?;

        stage(&identity, ResolveStage::Recording);
        ctx.profile
            .record_mod(InstalledMod::from_version(&identity, &version));
        ctx.visited.insert(key.clone());
        ctx.report.installed.push(key.clone());
        self.reporter
            .set_message(&format!("{} installed successfully!", key));

        stage(&identity, ResolveStage::Recursing);
        for raw in &version.dependencies {
            let dependency = match DependencyRef::parse(raw) {
                Ok(dependency) => dependency,
                Err(e) => {
                    self.dependency_failed(ctx, raw, &key, e.into())?;
                    continue;
                }
            };

            let full_name = dependency.identity.full_name();
            if ctx.profile.has_full_name(&full_name) {
                log::debug!("[install] {} satisfied by installed {}", raw, full_name);
                continue;
            }
            if self.config.is_base_platform(&full_name) {
                log::debug!("[install] {} is part of the base platform, skipping", raw);
                continue;
            }

            if let Err(e) = self
                .install_package(
                    &mut *ctx,
                    dependency.identity,
                    Some(dependency.version),
                    false,
                )
                .await
            {
                self.dependency_failed(ctx, raw, &key, e)?;
            }
        }

        stage(&identity, ResolveStage::Done);
        Ok(())
    }

    /// Extract on a blocking thread, then merge into the profile.
    async fn merge_archive(
        &self,
        bytes: Vec<u8>,
        install_root: &Path,
        identity: &PackageIdentity,
    ) -> Result<()> {
        stage(identity, ResolveStage::Extracting);
        let merger = self.merger.clone();
        let root = install_root.to_path_buf();
        let id = identity.clone();
        let extracted = tokio::task::spawn_blocking(move || merger.unpack(&bytes, &root, &id))
            .await
            .context("Extraction task panicked")??;

        stage(identity, ResolveStage::Installing);
        self.reporter
            .set_message(&format!("Installing {}...", identity));
        let merger = self.merger.clone();
        let summary = tokio::task::spawn_blocking(move || merger.install(extracted))
            .await
            .context("Merge task panicked")??;

        log::debug!(
            "[install] {}: {} metadata file(s), buckets {:?}, {} plugin and {} monomod assemblies flattened",
            identity,
            summary.metadata_files.len(),
            summary.buckets,
            summary.flattened_plugins,
            summary.flattened_monomod
        );
        Ok(())
    }

    fn dependency_failed(
        &self,
        ctx: &mut ResolutionContext,
        dependency: &str,
        required_by: &str,
        error: anyhow::Error,
    ) -> Result<()> {
        match self.config.failure_policy {
            FailurePolicy::Strict => Err(error.context(format!(
                "Dependency {} of {} failed",
                dependency, required_by
            ))),
            FailurePolicy::Lenient => {
                log::error!(
                    "[install] Dependency {} of {} failed: {:#}",
                    dependency,
                    required_by,
                    error
                );
                ctx.report.failures.push(DependencyFailure {
                    dependency: dependency.to_string(),
                    required_by: required_by.to_string(),
                    error: format!("{error:#}"),
                });
                Ok(())
            }
        }
    }
}

fn stage(identity: &PackageIdentity, stage: ResolveStage) {
    log::debug!("[resolve:{}] {}", identity, stage);
}
