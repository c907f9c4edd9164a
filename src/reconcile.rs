//! Merging on-disk profiles with live daemon connection state.
//!
//! The daemon only reports profiles it currently manages a connection for,
//! so every loaded profile starts out Disconnected and is upgraded when a
//! matching entry appears in the connection list. The daemon is the single
//! source of truth for live state; nothing here fabricates it.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::profile::Profile;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("failed to parse connection list: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Live state for one profile as reported by the daemon.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub client_addr: String,
    #[serde(default)]
    pub server_addr: String,
}

/// A profile joined with its current connection state.
#[derive(Debug, Clone)]
pub struct ReconciledRow {
    pub id: usize,
    pub name: String,
    pub status: String,
    pub connected: bool,
    /// Connect timestamp (Unix seconds) when the daemon reported one.
    pub timestamp: Option<i64>,
    pub client_addr: String,
    pub server_addr: String,
}

/// Parses the daemon's `profile` payload, a JSON object keyed by profile ID.
pub fn parse_connections(raw: &str) -> Result<HashMap<String, ConnectionStatus>, ReconcileError> {
    if raw.trim().is_empty() {
        return Ok(HashMap::new());
    }
    Ok(serde_json::from_str(raw)?)
}

/// Joins every profile with its live connection state, if any.
///
/// Rows come back sorted ascending by profile ID; the sort is stable, so
/// enumeration order is preserved for equal IDs.
pub fn reconcile(
    profiles: &BTreeMap<String, Profile>,
    live: &HashMap<String, ConnectionStatus>,
) -> Vec<ReconciledRow> {
    let mut rows: Vec<ReconciledRow> = profiles
        .iter()
        .map(|(key, profile)| {
            let mut row = ReconciledRow {
                id: profile.id,
                name: profile.display_name(),
                status: "Disconnected".to_string(),
                connected: false,
                timestamp: None,
                client_addr: String::new(),
                server_addr: String::new(),
            };
            if let Some(state) = live.get(key) {
                row.connected = state.status.eq_ignore_ascii_case("connected");
                row.status = if row.connected {
                    "Connected".to_string()
                } else {
                    title_case(&state.status)
                };
                row.timestamp = (state.timestamp > 0).then_some(state.timestamp);
                row.client_addr = state.client_addr.clone();
                row.server_addr = state.server_addr.clone();
            }
            row
        })
        .collect();
    rows.sort_by_key(|row| row.id);
    rows
}

/// Whether any row is actively connected. Drives the extended column set.
pub fn any_connected(rows: &[ReconciledRow]) -> bool {
    rows.iter().any(|row| row.connected)
}

/// Formats the time elapsed since `timestamp` as of `now`.
pub fn format_since(timestamp: i64, now: i64) -> String {
    format_duration(now - timestamp)
}

/// Renders an elapsed duration as `N days N hrs N mins N secs`, omitting
/// zero units except seconds. A negative input (clock skew between this
/// host and the daemon's recorded timestamp) formats its magnitude.
pub fn format_duration(elapsed_secs: i64) -> String {
    let total = elapsed_secs.unsigned_abs();
    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let seconds = total % 60;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days} days "));
    }
    if hours > 0 {
        out.push_str(&format!("{hours} hrs "));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes} mins "));
    }
    out.push_str(&format!("{seconds} secs"));
    out
}

fn title_case(status: &str) -> String {
    let mut chars = status.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
