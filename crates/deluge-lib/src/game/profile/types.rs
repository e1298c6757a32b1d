use crate::game::packages::{PackageIdentity, PackageVersion};
use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// A package recorded as installed in a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledMod {
    pub namespace: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub full_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    pub version_number: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub website_url: String,

    #[serde(default = "default_enabled", skip_serializing_if = "is_true")]
    pub enabled: bool,
}

impl InstalledMod {
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(&self.namespace, &self.name)
    }

    pub fn from_version(identity: &PackageIdentity, version: &PackageVersion) -> Self {
        Self {
            namespace: identity.namespace.clone(),
            name: identity.name.clone(),
            full_name: identity.full_name(),
            description: version.description.clone(),
            version_number: version.version_number.clone(),
            dependencies: version.dependencies.clone(),
            website_url: version.website_url.clone(),
            enabled: true,
        }
    }
}

/// `manifest.json` as shipped inside a package. Most packages omit the
/// namespace, so it is optional here and recovered from the folder name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, alias = "author", alias = "author_name")]
    pub namespace: Option<String>,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub version_number: Option<String>,

    #[serde(default)]
    pub website_url: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub incompatibilities: Vec<String>,

    #[serde(default)]
    pub optional_dependencies: Vec<String>,

    #[serde(default)]
    pub enabled: Option<bool>,
}

impl PluginManifest {
    /// Parse manifest text, tolerating the UTF-8 byte order mark many
    /// Windows editors prepend.
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw.trim_start_matches('\u{feff}'))
    }

    /// Build the profile record for a manifest found in `plugins/<dir_name>/`.
    /// Returns `None` when no version or identity can be determined.
    pub fn into_installed(self, dir_name: &str) -> Option<InstalledMod> {
        let (dir_namespace, dir_name_part) = match dir_name.split_once('-') {
            Some((ns, name)) => (Some(ns), Some(name)),
            None => (None, None),
        };

        let namespace = self
            .namespace
            .filter(|s| !s.is_empty())
            .or_else(|| dir_namespace.map(str::to_string))?;
        let name = self
            .name
            .filter(|s| !s.is_empty())
            .or_else(|| dir_name_part.map(str::to_string))?;
        let version_number = self.version_number.filter(|s| !s.is_empty())?;

        let identity = PackageIdentity::new(namespace, name);
        Some(InstalledMod {
            full_name: identity.full_name(),
            namespace: identity.namespace,
            name: identity.name,
            description: self.description.unwrap_or_default(),
            version_number,
            dependencies: self.dependencies,
            website_url: self.website_url.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
        })
    }
}

/// `profile.json`: a game build plus the mods installed for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mods: Vec<InstalledMod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_version: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub launch_arguments: String,
}

impl Profile {
    pub fn new(name: impl Into<String>, game_version: Option<String>) -> Self {
        Self {
            name: name.into(),
            game_version,
            ..Default::default()
        }
    }

    pub fn find_mod(&self, identity: &PackageIdentity) -> Option<&InstalledMod> {
        self.mods
            .iter()
            .find(|m| m.namespace == identity.namespace && m.name == identity.name)
    }

    /// Whether any mod with full name `ns-name` is installed, whatever its version.
    pub fn has_full_name(&self, full_name: &str) -> bool {
        self.mods
            .iter()
            .any(|m| m.full_name == full_name || m.identity().full_name() == full_name)
    }

    /// Insert `installed`, replacing the existing record for its identity.
    pub fn record_mod(&mut self, installed: InstalledMod) {
        let identity = installed.identity();
        match self
            .mods
            .iter_mut()
            .find(|m| m.namespace == identity.namespace && m.name == identity.name)
        {
            Some(existing) => *existing = installed,
            None => self.mods.push(installed),
        }
    }
}
