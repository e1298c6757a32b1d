use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::game::installer::error::InstallError;

/// `(namespace, name)` key of a package. Matching is exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageIdentity {
    pub namespace: String,
    pub name: String,
}

impl PackageIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// `namespace-name`
    pub fn full_name(&self) -> String {
        format!("{}-{}", self.namespace, self.name)
    }

    /// `namespace-name-version`, the key used by the download cache and the
    /// resolution session.
    pub fn version_key(&self, version: &str) -> String {
        format!("{}-{}-{}", self.namespace, self.name, version)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.namespace, self.name)
    }
}

/// One published version of a package as listed by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageVersion {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub full_name: String,

    #[serde(default)]
    pub description: String,

    pub version_number: String,

    /// `namespace-name-version` strings, in the order the author declared them
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub download_url: String,

    pub date_created: DateTime<Utc>,

    #[serde(default)]
    pub website_url: String,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,

    #[serde(default)]
    pub full_name: String,

    pub owner: String,

    /// Tags of the package as it is today. They are not copied onto older
    /// versions, which may predate whatever the tags describe.
    #[serde(default)]
    pub categories: Vec<String>,

    /// Most recent first. The matcher relies on this order.
    #[serde(default)]
    pub versions: Vec<PackageVersion>,
}

impl Package {
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(&self.owner, &self.name)
    }

    pub fn version(&self, version_number: &str) -> Option<&PackageVersion> {
        self.versions
            .iter()
            .find(|v| v.version_number == version_number)
    }

    pub fn position_of(&self, version_number: &str) -> Option<usize> {
        self.versions
            .iter()
            .position(|v| v.version_number == version_number)
    }
}

/// A parsed `namespace-name-version` dependency string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef {
    pub identity: PackageIdentity,
    pub version: String,
}

impl DependencyRef {
    /// Namespaces and version numbers never contain `-`; package names may not
    /// either on Thunderstore, so the first two dashes split the string.
    pub fn parse(raw: &str) -> Result<Self, InstallError> {
        let mut parts = raw.trim().splitn(3, '-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(ns), Some(name), Some(version))
                if !ns.is_empty() && !name.is_empty() && !version.is_empty() =>
            {
                Ok(Self {
                    identity: PackageIdentity::new(ns, name),
                    version: version.to_string(),
                })
            }
            _ => Err(InstallError::InvalidDependency {
                dependency: raw.to_string(),
            }),
        }
    }

    pub fn key(&self) -> String {
        self.identity.version_key(&self.version)
    }
}

/// In-memory view of the directory listing, indexed by identity.
#[derive(Debug, Clone, Default)]
pub struct PackageCatalog {
    packages: Vec<Package>,
    index: HashMap<PackageIdentity, usize>,
}

impl PackageCatalog {
    pub fn from_packages(packages: Vec<Package>) -> Self {
        let index = packages
            .iter()
            .enumerate()
            .map(|(i, package)| (package.identity(), i))
            .collect();
        Self { packages, index }
    }

    pub fn find(&self, identity: &PackageIdentity) -> Option<&Package> {
        self.index.get(identity).map(|&i| &self.packages[i])
    }

    /// Like [`find`](Self::find) but with the typed not-found error.
    pub fn require(&self, identity: &PackageIdentity) -> Result<&Package, InstallError> {
        self.find(identity)
            .ok_or_else(|| InstallError::PackageNotFound {
                namespace: identity.namespace.clone(),
                name: identity.name.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }
}
