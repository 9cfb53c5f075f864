//! Outpass requests and their approval lifecycle.
//!
//! `PENDING` is the initial state. Any authenticated caller may move a record
//! to `APPROVED` (minting its access token on the first approval) or to
//! `REJECTED` (from any state, clearing the token). Every transition pushes a
//! refresh signal to the owner's live-update channels.

pub mod lifecycle;
pub mod render;
pub mod routes;
pub mod store;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use lifecycle::LifecycleEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutpassStatus {
    Pending,
    Approved,
    Rejected,
}

impl OutpassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutpassStatus::Pending => "PENDING",
            OutpassStatus::Approved => "APPROVED",
            OutpassStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for OutpassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutpassStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OutpassStatus::Pending),
            "APPROVED" => Ok(OutpassStatus::Approved),
            "REJECTED" => Ok(OutpassStatus::Rejected),
            other => Err(format!("unknown outpass status: {}", other)),
        }
    }
}

/// One leave request as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutpassRecord {
    pub id: String,
    pub owner_id: String,
    pub purpose: String,
    pub destination: String,
    pub date_out: String,
    pub return_time: String,
    pub status: OutpassStatus,
    /// Set on first approval, cleared on rejection.
    pub access_token: Option<String>,
    /// RFC 3339, microsecond precision, UTC
    pub created_at: String,
}

impl OutpassRecord {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(6)?;
        let status = status.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            purpose: row.get(2)?,
            destination: row.get(3)?,
            date_out: row.get(4)?,
            return_time: row.get(5)?,
            status,
            access_token: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

/// Fields supplied by the requester.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOutpass {
    pub purpose: String,
    pub date_out: String,
    pub return_time: String,
    pub destination: String,
}

/// Caller-facing projection of a record. `qr_code_data_url` is rendered at
/// read time for approved records and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutpassView {
    pub id: String,
    pub user_id: String,
    pub purpose: String,
    pub date_out: String,
    pub return_time: String,
    pub destination: String,
    pub status: OutpassStatus,
    pub created_at: String,
    pub qr_code_token: Option<String>,
    pub qr_code_data_url: Option<String>,
}

impl From<OutpassRecord> for OutpassView {
    fn from(record: OutpassRecord) -> Self {
        let qr_code_token = match record.status {
            OutpassStatus::Approved => record.access_token,
            _ => None,
        };
        Self {
            id: record.id,
            user_id: record.owner_id,
            purpose: record.purpose,
            date_out: record.date_out,
            return_time: record.return_time,
            destination: record.destination,
            status: record.status,
            created_at: record.created_at,
            qr_code_token,
            qr_code_data_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            OutpassStatus::Pending,
            OutpassStatus::Approved,
            OutpassStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<OutpassStatus>().unwrap(), status);
        }
        assert!("approved".parse::<OutpassStatus>().is_err());
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(OutpassStatus::Approved).unwrap(),
            serde_json::json!("APPROVED")
        );
    }

    #[test]
    fn view_uses_camel_case_fields() {
        let view = OutpassView::from(OutpassRecord {
            id: "o1".into(),
            owner_id: "u1".into(),
            purpose: "Medical".into(),
            destination: "Clinic".into(),
            date_out: "2026-10-20".into(),
            return_time: "18:00".into(),
            status: OutpassStatus::Pending,
            access_token: None,
            created_at: "2026-10-18T10:00:00.000000Z".into(),
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["dateOut"], "2026-10-20");
        assert_eq!(json["returnTime"], "18:00");
        assert_eq!(json["status"], "PENDING");
        assert!(json["qrCodeToken"].is_null());
        assert!(json["qrCodeDataUrl"].is_null());
    }
}
