use super::types::{Package, PackageCatalog};
use crate::game::installer::cache::DownloadCache;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use url::Url;

/// Cache key under which the directory listing is stored.
pub const PACKAGE_INDEX_KEY: &str = "package-index";

/// Where the package listing comes from.
pub trait PackageSource: Send + Sync {
    fn load_catalog(&self) -> BoxFuture<'_, Result<PackageCatalog>>;
}

/// The Thunderstore v1 listing endpoint, pulled through a [`DownloadCache`].
pub struct ThunderstoreDirectory {
    url: Url,
    cache: Arc<DownloadCache>,
}

impl ThunderstoreDirectory {
    pub fn new(url: Url, cache: Arc<DownloadCache>) -> Self {
        Self { url, cache }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn fetch_catalog(&self) -> Result<PackageCatalog> {
        let bytes = self
            .cache
            .fetch(PACKAGE_INDEX_KEY, self.url.as_str())
            .await?;

        let packages: Vec<Package> = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse package listing from {}", self.url))?;

        log::info!(
            "[directory] Loaded {} packages from {}",
            packages.len(),
            self.url
        );
        Ok(PackageCatalog::from_packages(packages))
    }
}

impl PackageSource for ThunderstoreDirectory {
    fn load_catalog(&self) -> BoxFuture<'_, Result<PackageCatalog>> {
        Box::pin(self.fetch_catalog())
    }
}

/// A fixed in-memory listing.
pub struct StaticDirectory {
    catalog: PackageCatalog,
}

impl StaticDirectory {
    pub fn new(packages: Vec<Package>) -> Self {
        Self {
            catalog: PackageCatalog::from_packages(packages),
        }
    }
}

impl PackageSource for StaticDirectory {
    fn load_catalog(&self) -> BoxFuture<'_, Result<PackageCatalog>> {
        let catalog = self.catalog.clone();
        Box::pin(async move { Ok::<_, anyhow::Error>(catalog) })
    }
}
