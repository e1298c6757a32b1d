use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the sentinel entry that stands for "whatever Steam currently ships".
pub const LATEST_IDENTIFIER: &str = "Latest";

/// Metadata for a single Risk of Rain 2 build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameVersionDescriptor {
    /// Build identifier (e.g. "2021_04_20_Patch_1_1_1_4")
    pub identifier: String,

    /// Steam depot manifest id, -1 for the sentinel entry
    pub manifest: i64,

    /// Release date, absent for the sentinel entry
    pub release_date: Option<NaiveDate>,

    /// The next content update after this build
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_major_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub major: bool,

    #[serde(default)]
    pub stable: bool,

    #[serde(rename = "BepInEx_version", skip_serializing_if = "Option::is_none")]
    pub bepinex_version: Option<String>,

    #[serde(
        rename = "RoR2BepInExPack_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub ror2_bepinex_pack_version: Option<String>,

    #[serde(
        rename = "FixPluginTypesSerialization_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub fix_plugin_types_serialization_version: Option<String>,
}

impl GameVersionDescriptor {
    /// True for the undated "Latest" placeholder.
    pub fn is_latest_sentinel(&self) -> bool {
        self.release_date.is_none()
    }

    /// Release date as a UTC instant at midnight.
    pub fn released_at(&self) -> Option<DateTime<Utc>> {
        self.release_date.map(start_of_day)
    }
}

/// Half-open date range `[start, end)` in which a package version is
/// considered to target a given game build. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompatibilityWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl CompatibilityWindow {
    pub const UNBOUNDED: CompatibilityWindow = CompatibilityWindow {
        start: None,
        end: None,
    };

    /// Whether `at` falls on or after the following major update.
    pub fn is_too_new(&self, at: DateTime<Utc>) -> bool {
        self.end.map_or(false, |e| at >= e)
    }
}

pub(crate) fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::default()))
}
