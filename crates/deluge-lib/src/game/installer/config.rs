//! Engine settings.
//! Defaults are static constants; callers override them through [`EngineConfig`].

use chrono::NaiveDate;

pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// How long a cached archive or listing stays valid
pub const CACHE_TTL_HOURS: u32 = 24;

// URL Constants
pub const PACKAGE_INDEX_URL: &str = "https://thunderstore.io/c/riskofrain2/api/v1/package/";

/// Loader packages every profile already carries; dependencies on them are skipped.
pub const BASE_PLATFORM_PACKAGES: &[&str] = &["bbepis-BepInExPack"];

/// Packages whose archives are not laid out like ordinary plugins and must not
/// get their root metadata copied into `plugins/`.
///
/// Anything listed here has no `manifest.json` on disk and so drops out of the
/// rebuilt mod list. The RiskofThunder loader fixes are ordinary dependencies
/// of most plugins and stay off the list.
pub const NON_STANDARD_LAYOUT_PACKAGES: &[&str] = &["bbepis-BepInExPack"];

pub fn current_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS)
}

/// A package version tagged with `category` needs a game build released on or
/// after `released`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlcRule {
    pub category: String,
    pub released: NaiveDate,
}

impl DlcRule {
    pub fn new(category: impl Into<String>, released: NaiveDate) -> Self {
        Self {
            category: category.into(),
            released,
        }
    }

    pub fn defaults() -> Vec<DlcRule> {
        [
            ("Survivors of the Void Update", (2022, 3, 1)),
            ("Seekers of the Storm Update", (2024, 8, 27)),
        ]
        .into_iter()
        .filter_map(|(category, (y, m, d))| {
            NaiveDate::from_ymd_opt(y, m, d).map(|date| DlcRule::new(category, date))
        })
        .collect()
    }
}

/// What a failing dependency does to the rest of the install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the whole call tree
    Strict,
    /// Record the failure and continue with the remaining siblings
    #[default]
    Lenient,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub package_index_url: String,
    pub cache_ttl_hours: u32,
    pub request_timeout: std::time::Duration,
    pub base_platform_packages: Vec<String>,
    pub non_standard_layout_packages: Vec<String>,
    pub dlc_rules: Vec<DlcRule>,
    pub failure_policy: FailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            package_index_url: PACKAGE_INDEX_URL.to_string(),
            cache_ttl_hours: CACHE_TTL_HOURS,
            request_timeout: current_timeout(),
            base_platform_packages: BASE_PLATFORM_PACKAGES.iter().map(|s| s.to_string()).collect(),
            non_standard_layout_packages: NON_STANDARD_LAYOUT_PACKAGES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            dlc_rules: DlcRule::defaults(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_package_index_url(mut self, url: impl Into<String>) -> Self {
        self.package_index_url = url.into();
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_dlc_rules(mut self, rules: Vec<DlcRule>) -> Self {
        self.dlc_rules = rules;
        self
    }

    pub fn with_cache_ttl_hours(mut self, hours: u32) -> Self {
        self.cache_ttl_hours = hours;
        self
    }

    pub fn is_base_platform(&self, full_name: &str) -> bool {
        self.base_platform_packages.iter().any(|p| p == full_name)
    }

    pub fn is_non_standard_layout(&self, full_name: &str) -> bool {
        self.non_standard_layout_packages
            .iter()
            .any(|p| p == full_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_both_dlcs() {
        let config = EngineConfig::default();
        assert_eq!(config.dlc_rules.len(), 2);
        assert_eq!(config.failure_policy, FailurePolicy::Lenient);
        assert!(config.is_base_platform("bbepis-BepInExPack"));
        assert!(!config.is_base_platform("bbepis-bepinexpack"));
        assert!(config.is_non_standard_layout("bbepis-BepInExPack"));
        assert!(!config.is_non_standard_layout("RiskofThunder-RoR2BepInExPack"));
        assert!(!config.is_non_standard_layout("RiskofThunder-FixPluginTypesSerialization"));
    }
}
