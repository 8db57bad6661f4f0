use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Workflow stage of a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Verified,
    Resolved,
    Rejected,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 4] = [
        ReportStatus::Pending,
        ReportStatus::Verified,
        ReportStatus::Resolved,
        ReportStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Verified => "verified",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Rejected => "rejected",
        }
    }

    /// Forward-only transition table. Re-applying the current status is allowed.
    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        use ReportStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Verified) | (Pending, Rejected) | (Verified, Resolved)
        )
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let allowed: Vec<&str> = ReportStatus::ALL.iter().map(|s| s.as_str()).collect();
        write!(
            f,
            "status '{}' is not one of: {}",
            self.0,
            allowed.join(", ")
        )
    }
}

impl FromStr for ReportStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ReportStatus::Pending),
            "verified" => Ok(ReportStatus::Verified),
            "resolved" => Ok(ReportStatus::Resolved),
            "rejected" => Ok(ReportStatus::Rejected),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A citizen-submitted civic issue, as stored on disk and returned by the API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    /// Base64 or data-URL encoded photo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub category: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fine_collected: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_disbursed: Option<u64>,
}

/// Fields supplied by the citizen when submitting a report.
#[derive(Clone, Debug, Default)]
pub struct NewReport {
    pub title: String,
    pub description: String,
    pub location: String,
    pub image: Option<String>,
    pub category: String,
}

impl Report {
    pub fn new(input: NewReport, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            location: input.location,
            image: input.image.filter(|img| !img.trim().is_empty()),
            category: input.category,
            status: ReportStatus::Pending,
            created_at: now,
            verified_at: None,
            resolved_at: None,
            fine_collected: None,
            reward_disbursed: None,
        }
    }

    /// Move to `next`, stamping the entry timestamp the first time a stage is reached.
    /// Does not consult the transition table.
    pub fn enter(&mut self, next: ReportStatus, now: DateTime<Utc>) {
        match next {
            ReportStatus::Verified => {
                self.verified_at.get_or_insert(now);
            }
            ReportStatus::Resolved => {
                self.resolved_at.get_or_insert(now);
            }
            ReportStatus::Pending | ReportStatus::Rejected => {}
        }
        self.status = next;
    }
}
