use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A registered person as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Opaque backend key, distinct from the display name.
    pub identity_id: String,
    pub is_active: bool,
    /// Timestamp as sent by the server (ISO 8601, with or without offset).
    pub created_at: String,
}

impl User {
    /// Parse `created_at`, normalising offset timestamps to UTC.
    ///
    /// Returns `None` for timestamps the server formatted unexpectedly;
    /// callers sort those last.
    pub fn created_at_utc(&self) -> Option<NaiveDateTime> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.created_at) {
            return Some(dt.naive_utc());
        }
        NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
    }
}

/// Partial update for `PATCH /users/{id}`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.is_active.is_none()
    }
}

/// Per-item outcome reported in a progress frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkStatus {
    Success,
    Failed,
}

/// One processed candidate in a bulk run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkProgressEvent {
    /// 1-based index of the candidate just processed.
    pub current: u32,
    pub total: u32,
    pub name: String,
    pub status: BulkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BulkProgressEvent {
    /// Completion in percent (0–100). A zero `total` reads as complete.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (f64::from(self.current) / f64::from(self.total) * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub folder: String,
    pub reason: String,
}

/// Terminal summary of one bulk run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRegisterResponse {
    pub total_folders_scanned: u32,
    pub success_count: u32,
    pub failed_count: u32,
    #[serde(default)]
    pub failures: Vec<BulkFailure>,
}

impl BulkRegisterResponse {
    /// Every scanned folder is accounted for exactly once.
    pub fn is_consistent(&self) -> bool {
        u64::from(self.success_count) + u64::from(self.failed_count)
            == u64::from(self.total_folders_scanned)
    }
}

/// A decoded bulk progress frame, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BulkStreamEvent {
    Progress(BulkProgressEvent),
    Complete(BulkRegisterResponse),
    /// Event types this client does not know about.
    #[serde(other)]
    Unknown,
}

/// The user block of a search answer. The backend sends all-null fields
/// when the gallery had no candidate at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchedUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub identity_id: Option<String>,
    #[serde(default)]
    pub face_image_url: Option<String>,
}

/// Answer of `POST /users/search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub search_result: bool,
    /// Cosine similarity of the best gallery entry, as reported by the server.
    #[serde(default)]
    pub similarity: f64,
    #[serde(default)]
    pub user: Option<MatchedUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SearchResponse {
    /// URL of the matched user's stored face image, if the server sent one.
    pub fn face_image_url(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|u| u.face_image_url.as_deref())
            .filter(|u| !u.is_empty())
    }
}

/// Answer of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub device: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(created_at: &str) -> User {
        User {
            id: 1,
            name: "alice".into(),
            identity_id: "id-1".into(),
            is_active: true,
            created_at: created_at.into(),
        }
    }

    #[test]
    fn test_created_at_naive() {
        let parsed = user("2025-03-01T10:20:30.123456").created_at_utc().unwrap();
        assert_eq!(parsed.to_string(), "2025-03-01 10:20:30.123456");
    }

    #[test]
    fn test_created_at_with_offset_is_utc() {
        let parsed = user("2025-03-01T10:20:30+09:00").created_at_utc().unwrap();
        assert_eq!(parsed.to_string(), "2025-03-01 01:20:30");
    }

    #[test]
    fn test_created_at_garbage() {
        assert!(user("yesterday").created_at_utc().is_none());
    }

    #[test]
    fn test_user_update_skips_absent_fields() {
        let update = UserUpdate {
            name: None,
            is_active: Some(false),
        };
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"is_active":false}"#
        );
        assert!(UserUpdate::default().is_empty());
    }

    #[test]
    fn test_stream_event_progress() {
        let raw = r#"{"type":"progress","current":1,"total":3,"name":"bob","status":"failed","reason":"Already registered"}"#;
        let event: BulkStreamEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            BulkStreamEvent::Progress(BulkProgressEvent {
                current: 1,
                total: 3,
                name: "bob".into(),
                status: BulkStatus::Failed,
                reason: Some("Already registered".into()),
            })
        );
    }

    #[test]
    fn test_stream_event_unknown_type() {
        let event: BulkStreamEvent =
            serde_json::from_str(r#"{"type":"heartbeat","ts":1}"#).unwrap();
        assert_eq!(event, BulkStreamEvent::Unknown);
    }

    #[test]
    fn test_summary_consistency() {
        let mut summary = BulkRegisterResponse {
            total_folders_scanned: 3,
            success_count: 2,
            failed_count: 1,
            failures: vec![BulkFailure {
                folder: "carol".into(),
                reason: "no face".into(),
            }],
        };
        assert!(summary.is_consistent());
        summary.failed_count = 0;
        assert!(!summary.is_consistent());
    }

    #[test]
    fn test_progress_percent() {
        let event = BulkProgressEvent {
            current: 1,
            total: 4,
            name: "a".into(),
            status: BulkStatus::Success,
            reason: None,
        };
        assert!((event.percent() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_search_response_with_null_user_fields() {
        let raw = r#"{"search_result":false,"user":{"name":null,"identity_id":null,"face_image_url":null},"message":"No matching user found or similarity is too low","similarity":0.0}"#;
        let resp: SearchResponse = serde_json::from_str(raw).unwrap();
        assert!(!resp.search_result);
        assert_eq!(resp.face_image_url(), None);
        assert_eq!(resp.user.unwrap(), MatchedUser::default());
    }
}
