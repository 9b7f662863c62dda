//! Read-only projections of backend data, as shown to the operator.

use crate::types::{HealthResponse, SearchResponse, User};
use std::fmt;

/// How many recently registered users the dashboard lists.
pub const RECENT_COUNT: usize = 10;

/// Format a similarity in [0, 1] as a percentage with two decimals.
pub fn format_similarity(similarity: f64) -> String {
    format!("{:.2}%", similarity * 100.0)
}

/// Operator-facing summary of one face search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub matched: bool,
    pub name: String,
    pub identity_id: String,
    pub similarity: f64,
}

impl SearchOutcome {
    pub fn from_response(resp: &SearchResponse) -> Self {
        let user = resp.user.clone().unwrap_or_default();
        Self {
            matched: resp.search_result,
            name: user.name.unwrap_or_else(|| "Unknown User".to_string()),
            identity_id: user.identity_id.unwrap_or_else(|| "-".to_string()),
            similarity: resp.similarity,
        }
    }

    /// Similarity rendered as in [`format_similarity`].
    pub fn similarity_percent(&self) -> String {
        format_similarity(self.similarity)
    }
}

impl fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.matched { "MATCH" } else { "NO MATCH" };
        write!(
            f,
            "{verdict}: {} (ID: {}) similarity {}",
            self.name,
            self.identity_id,
            self.similarity_percent()
        )
    }
}

/// Keep users whose name or identity id contains `term`, ignoring case.
pub fn filter_users<'a>(users: &'a [User], term: &str) -> Vec<&'a User> {
    let needle = term.trim().to_lowercase();
    users
        .iter()
        .filter(|u| {
            needle.is_empty()
                || u.name.to_lowercase().contains(&needle)
                || u.identity_id.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Backend state as shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Healthy,
    Degraded,
    /// Health endpoint unreachable or not yet queried.
    Unknown,
}

impl BackendState {
    pub fn from_health(health: Option<&HealthResponse>) -> Self {
        match health {
            Some(h) if h.model_loaded => BackendState::Healthy,
            Some(_) => BackendState::Degraded,
            None => BackendState::Unknown,
        }
    }
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendState::Healthy => "Healthy",
            BackendState::Degraded => "Degraded",
            BackendState::Unknown => "-",
        })
    }
}

/// Landing page summary.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub total_users: usize,
    pub active_users: usize,
    pub backend: BackendState,
    pub device: Option<String>,
    /// Newest first, at most [`RECENT_COUNT`].
    pub recent: Vec<User>,
}

impl Dashboard {
    pub fn build(users: &[User], health: Option<&HealthResponse>) -> Self {
        let mut recent: Vec<User> = users.to_vec();
        // Unparseable timestamps sort last.
        recent.sort_by(|a, b| b.created_at_utc().cmp(&a.created_at_utc()));
        recent.truncate(RECENT_COUNT);

        Self {
            total_users: users.len(),
            active_users: users.iter().filter(|u| u.is_active).count(),
            backend: BackendState::from_health(health),
            device: health.map(|h| h.device.clone()),
            recent,
        }
    }
}
