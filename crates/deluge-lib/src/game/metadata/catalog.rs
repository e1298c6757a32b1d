use super::types::{CompatibilityWindow, GameVersionDescriptor, LATEST_IDENTIFIER};
use crate::game::installer::error::InstallError;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;

/// Ordered table of known game builds, oldest first, ending with the
/// [`LATEST_IDENTIFIER`] sentinel.
#[derive(Debug, Clone)]
pub struct GameVersionCatalog {
    versions: Vec<GameVersionDescriptor>,
}

static BUILTIN: Lazy<GameVersionCatalog> = Lazy::new(|| {
    GameVersionCatalog::new(BUILTIN_VERSIONS.iter().map(RawVersion::to_descriptor).collect())
});

/// Friendly names accepted wherever a build identifier is expected
const ALIASES: &[(&str, &str)] = &[
    ("anniversary", "2021_04_20_Patch_1_1_1_4"),
    ("anniversary update", "2021_04_20_Patch_1_1_1_4"),
    ("sotv", "2022_09_29_Patch_1_2_4_1"),
    ("survivors of the void", "2022_09_29_Patch_1_2_4_1"),
    ("devotion", "2024_05_20_Update_Devotion"),
    ("devotion update", "2024_05_20_Update_Devotion"),
    ("sots", "2024_08_27_DLC_02_SeekersOfTheStorm"),
    ("seekers of the storm", "2024_08_27_DLC_02_SeekersOfTheStorm"),
];

impl GameVersionCatalog {
    pub fn new(versions: Vec<GameVersionDescriptor>) -> Self {
        Self { versions }
    }

    /// The table shipped with the library
    pub fn builtin() -> &'static GameVersionCatalog {
        &BUILTIN
    }

    pub fn get(&self, identifier: &str) -> Option<&GameVersionDescriptor> {
        self.versions.iter().find(|v| v.identifier == identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.get(identifier).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameVersionDescriptor> {
        self.versions.iter()
    }

    /// Newest dated build. The sentinel itself is never returned.
    pub fn latest(&self) -> Option<&GameVersionDescriptor> {
        self.versions
            .iter()
            .filter(|v| !v.is_latest_sentinel())
            .max_by_key(|v| v.release_date)
    }

    /// Look up a build by identifier or by one of its friendly aliases.
    pub fn resolve_alias(&self, input: &str) -> Option<&GameVersionDescriptor> {
        let trimmed = input.trim();
        if let Some(found) = self.get(trimmed) {
            return Some(found);
        }
        let lowered = trimmed.to_lowercase();
        if lowered == LATEST_IDENTIFIER.to_lowercase() {
            return self.get(LATEST_IDENTIFIER);
        }
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == lowered)
            .and_then(|(_, id)| self.get(id))
    }

    /// Compatibility window of the build named `identifier`.
    pub fn window(&self, identifier: &str) -> Result<CompatibilityWindow> {
        let descriptor = self
            .get(identifier)
            .ok_or_else(|| InstallError::UnknownGameVersion {
                identifier: identifier.to_string(),
            })?;
        Ok(self.window_for(descriptor))
    }

    /// `[release_date, next_major.release_date)`; an undated or missing next
    /// major leaves the window open-ended.
    pub fn window_for(&self, descriptor: &GameVersionDescriptor) -> CompatibilityWindow {
        let end = descriptor
            .next_major_version
            .as_deref()
            .and_then(|next| self.get(next))
            .and_then(|next| next.released_at());

        CompatibilityWindow {
            start: descriptor.released_at(),
            end,
        }
    }

    /// Serialize the whole table, as printed by `list versions --rawInfo`.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.versions).context("Failed to serialize version table")
    }
}

struct RawVersion {
    id: &'static str,
    manifest: i64,
    date: Option<(i32, u32, u32)>,
    next: Option<&'static str>,
    display: Option<&'static str>,
    major: bool,
    stable: bool,
    bepinex: Option<&'static str>,
    ror2_pack: Option<&'static str>,
    fpts: Option<&'static str>,
}

impl RawVersion {
    fn to_descriptor(&self) -> GameVersionDescriptor {
        GameVersionDescriptor {
            identifier: self.id.to_string(),
            manifest: self.manifest,
            release_date: self
                .date
                .and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            next_major_version: self.next.map(str::to_string),
            display_name: self.display.map(str::to_string),
            major: self.major,
            stable: self.stable,
            bepinex_version: self.bepinex.map(str::to_string),
            ror2_bepinex_pack_version: self.ror2_pack.map(str::to_string),
            fix_plugin_types_serialization_version: self.fpts.map(str::to_string),
        }
    }
}

const fn patch(
    id: &'static str,
    manifest: i64,
    date: (i32, u32, u32),
    next: &'static str,
    bepinex: &'static str,
) -> RawVersion {
    RawVersion {
        id,
        manifest,
        date: Some(date),
        next: Some(next),
        display: None,
        major: false,
        stable: false,
        bepinex: Some(bepinex),
        ror2_pack: None,
        fpts: None,
    }
}

const fn major(
    id: &'static str,
    manifest: i64,
    date: (i32, u32, u32),
    display: &'static str,
    next: &'static str,
    bepinex: &'static str,
) -> RawVersion {
    RawVersion {
        id,
        manifest,
        date: Some(date),
        next: Some(next),
        display: Some(display),
        major: true,
        stable: false,
        bepinex: Some(bepinex),
        ror2_pack: None,
        fpts: None,
    }
}

const SCORCHED_ACRES: &str = "2019_06_25_EarlyAccess_ContentUpdate_ScorchedAcres";
const SKILLS_2: &str = "2019_09_17_EarlyAccess_ContentUpdate_Skills2_0";
const HIDDEN_REALMS: &str = "2019_12_17_EarlyAccess_ContentUpdate_HiddenRealms";
const ARTIFACTS: &str = "2020_03_31_EarlyAccess_ContentUpdate_Artifacts";
const LAUNCH: &str = "2020_08_11_EarlyAccess_ContentUpdate_5";
const ANNIVERSARY: &str = "2021_03_25_Update_Anniversary";
const SOTV: &str = "2022_03_01_DLC_01_SurvivorsOfTheVoid";
const COMET: &str = "2023_11_06_Patch_7_5";
const DEVOTION: &str = "2024_05_20_Update_Devotion";
const SOTS: &str = "2024_08_27_DLC_02_SeekersOfTheStorm";

static BUILTIN_VERSIONS: &[RawVersion] = &[
    major("2019_03_28_EarlyAccess_Launch", 4785037072112130807, (2019, 3, 28), "Early Access Launch", SCORCHED_ACRES, "2.0.0"),
    patch("2019_04_03_EarlyAccess_Patch", 5182444948675866264, (2019, 4, 3), SCORCHED_ACRES, "2.0.0"),
    patch("2019_04_16_EarlyAccess_Patch", 1280738030908307534, (2019, 4, 16), SCORCHED_ACRES, "2.0.0"),
    patch("2019_05_21_EarlyAccess_Patch", 3793891161392450065, (2019, 5, 21), SCORCHED_ACRES, "2.0.0"),
    major(SCORCHED_ACRES, 2112019357004186123, (2019, 6, 25), "Scorched Acres", SKILLS_2, "2.0.0"),
    patch("2019_07_03_EarlyAccess_Patch", 3670024595274968264, (2019, 7, 3), SKILLS_2, "2.0.0"),
    major(SKILLS_2, 4255430772592120193, (2019, 9, 17), "Skills 2.0", HIDDEN_REALMS, "2.0.0"),
    patch("2019_10_10_EarlyAccess_Patch", 7012808837121522032, (2019, 10, 10), HIDDEN_REALMS, "2.0.0"),
    major(HIDDEN_REALMS, 5239878991551190606, (2019, 12, 17), "Hidden Realms", ARTIFACTS, "3.0.0"),
    major(ARTIFACTS, 2472907969637403728, (2020, 3, 31), "Artifacts 2.0", LAUNCH, "3.2.0"),
    patch("2020_04_21_EarlyAccess_Patch", 6052191829405703267, (2020, 4, 21), LAUNCH, "3.2.0"),
    major(LAUNCH, 6571321385300192800, (2020, 8, 11), "1.0 Launch", ANNIVERSARY, "5.3.1"),
    patch("2020_08_13_EarlyAccess_ContentUpdate_5_Hotfix", 9204909284884878595, (2020, 8, 13), ANNIVERSARY, "5.3.1"),
    patch("2020_09_01_Patch_1_0_1_1", 5049246425996249487, (2020, 9, 1), ANNIVERSARY, "5.3.1"),
    patch("2020_11_03_Patch_1_0_2_0", 3160519164886166204, (2020, 11, 3), ANNIVERSARY, "5.3.1"),
    RawVersion {
        stable: true,
        ..patch("2020_12_15_Patch_1_0_3_1", 8643078234309832101, (2020, 12, 15), ANNIVERSARY, "5.3.1")
    },
    major(ANNIVERSARY, 7255008819833157291, (2021, 3, 25), "Anniversary Update", SOTV, "5.4.1801"),
    patch("2021_04_12_Patch_1_1_1_2", 4163843425391060582, (2021, 4, 12), SOTV, "5.4.1801"),
    RawVersion {
        display: Some("Anniversary Update Stable"),
        stable: true,
        fpts: Some("1.0.1"),
        ..patch("2021_04_20_Patch_1_1_1_4", 2934004482569727060, (2021, 4, 20), SOTV, "5.4.1801")
    },
    RawVersion {
        fpts: Some("1.0.2"),
        ..major(SOTV, 5430547693553236352, (2022, 3, 1), "Survivors of the Void Update + DLC", COMET, "5.4.2112")
    },
    RawVersion {
        fpts: Some("1.0.2"),
        ..patch("2022_03_11_Patch_1_2_2_0", 226983827800243462, (2022, 3, 11), COMET, "5.4.2112")
    },
    RawVersion {
        fpts: Some("1.0.2"),
        ..patch("2022_04_19_Patch_1_2_3_0", 4649272427595582012, (2022, 4, 19), COMET, "5.4.2112")
    },
    RawVersion {
        fpts: Some("1.0.2"),
        ..patch("2022_05_26_Patch_1_2_4_0", 8981465225844154625, (2022, 5, 26), COMET, "5.4.2112")
    },
    RawVersion {
        display: Some("SOTV Stable"),
        stable: true,
        fpts: Some("1.0.2"),
        ..patch("2022_09_29_Patch_1_2_4_1", 7660073450841700654, (2022, 9, 29), COMET, "5.4.2112")
    },
    RawVersion {
        display: Some("(unnamed) \"Comet\" Update"),
        stable: true,
        ror2_pack: Some("1.11.0"),
        fpts: Some("1.0.3"),
        ..patch(COMET, 2538203695974683966, (2023, 11, 6), DEVOTION, "5.4.2113")
    },
    RawVersion {
        display: Some("Devotion Update Stable"),
        stable: true,
        ror2_pack: Some("1.16.0"),
        fpts: Some("1.0.4"),
        ..major(DEVOTION, 9058106608706845920, (2024, 5, 20), "Devotion Update", SOTS, "5.4.2115")
    },
    RawVersion {
        ror2_pack: Some("1.20.0"),
        fpts: Some("1.0.4"),
        ..major(SOTS, 4567638355138669926, (2024, 8, 27), "Seekers of the Storm Update + DLC", LATEST_IDENTIFIER, "5.4.2117")
    },
    RawVersion {
        id: LATEST_IDENTIFIER,
        manifest: -1,
        date: None,
        next: None,
        display: None,
        major: false,
        stable: false,
        bepinex: None,
        ror2_pack: None,
        fpts: None,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_is_ordered_and_linked() {
        let catalog = GameVersionCatalog::builtin();
        let dated: Vec<_> = catalog.iter().filter_map(|v| v.release_date).collect();
        assert!(dated.windows(2).all(|w| w[0] < w[1]));

        for version in catalog.iter() {
            if let Some(next) = &version.next_major_version {
                assert!(catalog.contains(next), "{} points at missing {}", version.identifier, next);
            }
        }
    }

    #[test]
    fn latest_is_newest_dated_build() {
        let latest = GameVersionCatalog::builtin().latest().unwrap();
        assert_eq!(latest.identifier, SOTS);
    }

    #[test]
    fn anniversary_window_ends_at_sotv() {
        let catalog = GameVersionCatalog::builtin();
        let window = catalog.window("2021_04_20_Patch_1_1_1_4").unwrap();
        assert_eq!(
            window.start.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2021, 4, 20).unwrap()
        );
        assert_eq!(
            window.end.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2022, 3, 1).unwrap()
        );
    }

    #[test]
    fn newest_build_window_is_open_ended() {
        let catalog = GameVersionCatalog::builtin();
        assert_eq!(catalog.window(SOTS).unwrap().end, None);
        assert_eq!(
            catalog.window(LATEST_IDENTIFIER).unwrap(),
            CompatibilityWindow::UNBOUNDED
        );
    }

    #[test]
    fn unknown_build_is_typed_error() {
        let err = GameVersionCatalog::builtin().window("1999_nope").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::UnknownGameVersion { .. })
        ));
    }

    #[test]
    fn aliases_resolve() {
        let catalog = GameVersionCatalog::builtin();
        assert_eq!(
            catalog.resolve_alias("SotV").unwrap().identifier,
            "2022_09_29_Patch_1_2_4_1"
        );
        assert_eq!(catalog.resolve_alias("latest").unwrap().identifier, LATEST_IDENTIFIER);
        assert!(catalog.resolve_alias("nonsense").is_none());
    }

    #[test]
    fn json_export_uses_component_field_names() {
        let json = GameVersionCatalog::builtin().to_json().unwrap();
        assert!(json.contains("\"BepInEx_version\": \"5.4.2117\""));
        assert!(json.contains("\"RoR2BepInExPack_version\""));
    }
}
