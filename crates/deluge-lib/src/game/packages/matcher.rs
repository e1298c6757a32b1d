//! Picks the package version to install for a game build.

use super::types::{Package, PackageCatalog, PackageIdentity, PackageVersion};
use crate::game::installer::config::DlcRule;
use crate::game::installer::error::InstallError;
use crate::game::metadata::{GameVersionCatalog, GameVersionDescriptor};
use anyhow::Result;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The requested version, compatible as-is
    Exact,
    /// No version requested; the most recent version was taken
    Latest,
    /// An older version than the one requested (or than the newest) that fits the target
    Nearest,
    /// Nothing fits the target; the most recent version was taken anyway
    Fallback,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchKind::Exact => "exact",
            MatchKind::Latest => "latest",
            MatchKind::Nearest => "nearest",
            MatchKind::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VersionMatch<'p> {
    pub version: &'p PackageVersion,
    pub kind: MatchKind,
}

pub struct VersionMatcher<'a> {
    game_versions: &'a GameVersionCatalog,
    dlc_rules: &'a [DlcRule],
}

impl<'a> VersionMatcher<'a> {
    pub fn new(game_versions: &'a GameVersionCatalog, dlc_rules: &'a [DlcRule]) -> Self {
        Self {
            game_versions,
            dlc_rules,
        }
    }

    /// Look `identity` up in `catalog` and resolve it.
    pub fn resolve_in<'p>(
        &self,
        catalog: &'p PackageCatalog,
        identity: &PackageIdentity,
        requested: Option<&str>,
        target: Option<&str>,
    ) -> Result<VersionMatch<'p>> {
        let package = catalog.require(identity)?;
        self.resolve(package, requested, target)
    }

    pub fn resolve<'p>(
        &self,
        package: &'p Package,
        requested: Option<&str>,
        target: Option<&str>,
    ) -> Result<VersionMatch<'p>> {
        let Some(newest) = package.versions.first() else {
            return Err(self.version_not_found(package, requested.unwrap_or("any")).into());
        };

        let start = match requested {
            Some(version) => Some(
                package
                    .position_of(version)
                    .ok_or_else(|| self.version_not_found(package, version))?,
            ),
            None => None,
        };

        let Some(target) = target else {
            return Ok(match start {
                Some(i) => VersionMatch {
                    version: &package.versions[i],
                    kind: MatchKind::Exact,
                },
                None => VersionMatch {
                    version: newest,
                    kind: MatchKind::Latest,
                },
            });
        };

        let descriptor = self.game_versions.get(target).ok_or_else(|| {
            InstallError::UnknownGameVersion {
                identifier: target.to_string(),
            }
        })?;

        let offset = start.unwrap_or(0);
        let found = package.versions[offset..]
            .iter()
            .position(|v| self.is_compatible(v, descriptor));

        match found {
            Some(0) => Ok(VersionMatch {
                version: &package.versions[offset],
                kind: if requested.is_some() {
                    MatchKind::Exact
                } else {
                    MatchKind::Latest
                },
            }),
            Some(i) => Ok(VersionMatch {
                version: &package.versions[offset + i],
                kind: MatchKind::Nearest,
            }),
            None => {
                log::warn!(
                    "[matcher] No version of {} fits game version {}; falling back to {}",
                    package.identity(),
                    target,
                    newest.version_number
                );
                Ok(VersionMatch {
                    version: newest,
                    kind: MatchKind::Fallback,
                })
            }
        }
    }

    fn is_compatible(&self, version: &PackageVersion, target: &GameVersionDescriptor) -> bool {
        let window = self.game_versions.window_for(target);
        if window.is_too_new(version.date_created) {
            return false;
        }

        // Only a version's own tags count. The sentinel build has every DLC.
        let Some(target_release) = target.release_date else {
            return true;
        };
        !self.dlc_rules.iter().any(|rule| {
            target_release < rule.released && version.categories.iter().any(|c| c == &rule.category)
        })
    }

    fn version_not_found(&self, package: &Package, version: &str) -> InstallError {
        InstallError::VersionNotFound {
            namespace: package.owner.clone(),
            name: package.name.clone(),
            version: version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, Utc};

    const ANNIVERSARY_STABLE: &str = "2021_04_20_Patch_1_1_1_4";
    const SOTV_STABLE: &str = "2022_09_29_Patch_1_2_4_1";

    fn version(number: &str, created: &str, categories: &[&str]) -> PackageVersion {
        PackageVersion {
            name: "Mod".into(),
            full_name: format!("Author-Mod-{number}"),
            description: String::new(),
            version_number: number.into(),
            dependencies: Vec::new(),
            download_url: String::new(),
            date_created: created.parse::<DateTime<Utc>>().unwrap(),
            website_url: String::new(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            file_size: 0,
        }
    }

    fn package(versions: Vec<PackageVersion>) -> Package {
        Package {
            name: "Mod".into(),
            full_name: "Author-Mod".into(),
            owner: "Author".into(),
            categories: Vec::new(),
            versions,
        }
    }

    fn sample() -> Package {
        package(vec![
            version("3.0.0", "2024-09-01T00:00:00Z", &[]),
            version("2.0.0", "2022-06-01T00:00:00Z", &[]),
            version("1.1.0", "2021-10-01T00:00:00Z", &[]),
            version("1.0.0", "2021-05-01T00:00:00Z", &[]),
        ])
    }

    fn matcher(rules: &[DlcRule]) -> VersionMatcher<'_> {
        VersionMatcher::new(GameVersionCatalog::builtin(), rules)
    }

    #[test]
    fn no_target_takes_newest_or_exact() {
        let pkg = sample();
        let m = matcher(&[]);

        let latest = m.resolve(&pkg, None, None).unwrap();
        assert_eq!(latest.version.version_number, "3.0.0");
        assert_eq!(latest.kind, MatchKind::Latest);

        let exact = m.resolve(&pkg, Some("1.1.0"), None).unwrap();
        assert_eq!(exact.version.version_number, "1.1.0");
        assert_eq!(exact.kind, MatchKind::Exact);
    }

    #[test]
    fn missing_requested_version_is_typed_error() {
        let pkg = sample();
        for target in [None, Some(ANNIVERSARY_STABLE)] {
            let err = matcher(&[]).resolve(&pkg, Some("9.9.9"), target).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<InstallError>(),
                Some(InstallError::VersionNotFound { .. })
            ));
        }
    }

    #[test]
    fn target_selects_newest_version_inside_window() {
        let pkg = sample();
        let found = matcher(&[]).resolve(&pkg, None, Some(ANNIVERSARY_STABLE)).unwrap();
        assert_eq!(found.version.version_number, "1.1.0");
        assert_eq!(found.kind, MatchKind::Nearest);
    }

    #[test]
    fn compatible_request_is_exact() {
        let pkg = sample();
        let found = matcher(&[])
            .resolve(&pkg, Some("1.0.0"), Some(ANNIVERSARY_STABLE))
            .unwrap();
        assert_eq!(found.version.version_number, "1.0.0");
        assert_eq!(found.kind, MatchKind::Exact);
    }

    #[test]
    fn too_new_request_walks_to_older_versions() {
        let pkg = sample();
        let found = matcher(&[])
            .resolve(&pkg, Some("2.0.0"), Some(ANNIVERSARY_STABLE))
            .unwrap();
        assert_eq!(found.version.version_number, "1.1.0");
        assert_eq!(found.kind, MatchKind::Nearest);
    }

    #[test]
    fn version_created_on_next_major_release_is_too_new() {
        let pkg = package(vec![
            version("2.0.0", "2022-03-01T00:00:00Z", &[]),
            version("1.0.0", "2022-02-28T23:59:59Z", &[]),
        ]);
        let found = matcher(&[]).resolve(&pkg, None, Some(ANNIVERSARY_STABLE)).unwrap();
        assert_eq!(found.version.version_number, "1.0.0");
    }

    #[test]
    fn nothing_compatible_falls_back_to_newest() {
        let pkg = package(vec![version("1.0.0", "2024-09-01T00:00:00Z", &[])]);
        let found = matcher(&[]).resolve(&pkg, None, Some(ANNIVERSARY_STABLE)).unwrap();
        assert_eq!(found.version.version_number, "1.0.0");
        assert_eq!(found.kind, MatchKind::Fallback);
    }

    #[test]
    fn dlc_tagged_versions_need_a_build_with_the_dlc() {
        let rules = vec![DlcRule::new(
            "Survivors of the Void Update",
            NaiveDate::from_ymd_opt(2022, 3, 1).unwrap(),
        )];
        // Both versions predate the end of the anniversary window, but the
        // newer one is tagged for the DLC.
        let pkg = package(vec![
            version("1.1.0", "2021-12-01T00:00:00Z", &["Survivors of the Void Update"]),
            version("1.0.0", "2021-06-01T00:00:00Z", &[]),
        ]);

        let on_anniversary = matcher(&rules)
            .resolve(&pkg, None, Some(ANNIVERSARY_STABLE))
            .unwrap();
        assert_eq!(on_anniversary.version.version_number, "1.0.0");

        let on_sotv = matcher(&rules).resolve(&pkg, None, Some(SOTV_STABLE)).unwrap();
        assert_eq!(on_sotv.version.version_number, "1.1.0");
        assert_eq!(on_sotv.kind, MatchKind::Latest);
    }

    #[test]
    fn unknown_target_is_typed_error() {
        let err = matcher(&[]).resolve(&sample(), None, Some("not-a-build")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::UnknownGameVersion { .. })
        ));
    }

    #[test]
    fn package_level_dlc_tag_does_not_reject_older_versions() {
        let rules = DlcRule::defaults();
        let json = r#"[{
            "name": "Mod", "owner": "Author", "categories": ["Survivors of the Void Update"],
            "versions": [
                {"version_number": "2.0.0", "date_created": "2022-06-01T00:00:00Z"},
                {"version_number": "1.0.0", "date_created": "2021-06-01T00:00:00Z"}
            ]
        }]"#;
        let catalog = PackageCatalog::from_packages(serde_json::from_str(json).unwrap());

        let found = matcher(&rules)
            .resolve_in(
                &catalog,
                &PackageIdentity::new("Author", "Mod"),
                None,
                Some(ANNIVERSARY_STABLE),
            )
            .unwrap();

        assert_eq!(found.version.version_number, "1.0.0");
        assert_eq!(found.kind, MatchKind::Nearest);
    }
}
