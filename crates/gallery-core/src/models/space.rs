use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;
use uuid::Uuid;

const MIB: i64 = 1024 * 1024;

/// Space tier. Determines the default quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "UPPERCASE")]
#[repr(i32)]
pub enum SpaceLevel {
    Common = 0,
    Professional = 1,
    Flagship = 2,
}

impl SpaceLevel {
    pub const ALL: [SpaceLevel; 3] = [
        SpaceLevel::Common,
        SpaceLevel::Professional,
        SpaceLevel::Flagship,
    ];

    pub fn value(self) -> i32 {
        self as i32
    }

    pub fn from_value(value: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.value() == value)
    }

    pub fn text(self) -> &'static str {
        match self {
            SpaceLevel::Common => "common",
            SpaceLevel::Professional => "professional",
            SpaceLevel::Flagship => "flagship",
        }
    }

    pub fn default_max_count(self) -> i64 {
        match self {
            SpaceLevel::Common => 100,
            SpaceLevel::Professional => 1_000,
            SpaceLevel::Flagship => 10_000,
        }
    }

    pub fn default_max_size(self) -> i64 {
        match self {
            SpaceLevel::Common => 100 * MIB,
            SpaceLevel::Professional => 1_000 * MIB,
            SpaceLevel::Flagship => 10_000 * MIB,
        }
    }

    pub fn info(self) -> SpaceLevelInfo {
        SpaceLevelInfo {
            value: self.value(),
            text: self.text().to_string(),
            level: self,
            max_count: self.default_max_count(),
            max_size: self.default_max_size(),
        }
    }
}

impl Display for SpaceLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.text())
    }
}

/// Catalogue entry describing a level's default quotas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpaceLevelInfo {
    pub value: i32,
    pub text: String,
    pub level: SpaceLevel,
    pub max_count: i64,
    pub max_size: i64,
}

/// Per-user storage container with quotas. At most one per owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Space {
    pub id: Uuid,
    pub space_name: String,
    pub space_level: SpaceLevel,
    pub max_size: i64,
    pub max_count: i64,
    pub user_id: Uuid,
    pub create_time: DateTime<Utc>,
    pub edit_time: DateTime<Utc>,
}

/// Current usage of a space, computed from its pictures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpaceUsage {
    pub total_count: i64,
    pub total_size: i64,
}

/// Space creation request. Unset fields are defaulted from the level.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpaceRequest {
    pub space_name: Option<String>,
    pub space_level: Option<SpaceLevel>,
    pub max_size: Option<i64>,
    pub max_count: Option<i64>,
}
