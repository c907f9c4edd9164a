//! On-disk profile discovery.
//!
//! The Pritunl client stores each imported profile as a pair of files in a
//! per-user directory: `<id>.conf` with JSON metadata and `<id>.ovpn` with
//! the raw tunnel configuration. This module scans that directory and parses
//! the metadata; the `.ovpn` side is only read later when a connection is
//! actually requested.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::platform;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("failed to read profile {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse profile {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Fields of a profile `.conf` file this tool cares about.
///
/// The daemon writes more keys than these; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub password_mode: Option<String>,
}

/// A profile as found on disk.
///
/// IDs are assigned by enumeration order of the directory scan (1-based) and
/// are only stable for as long as the set of profile files does not change.
#[derive(Debug, Clone)]
pub struct Profile {
    pub key: String,
    pub path: PathBuf,
    pub id: usize,
    pub conf: ProfileConfig,
}

impl Profile {
    /// The profile's display name, synthesized as `"{user} ({server})"`
    /// when the `name` field is absent or empty.
    pub fn display_name(&self) -> String {
        match self.conf.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!(
                "{} ({})",
                self.conf.user.as_deref().unwrap_or_default(),
                self.conf.server.as_deref().unwrap_or_default()
            ),
        }
    }

    /// Whether `target` names this profile, by exact equality against the
    /// numeric ID or the display name.
    pub fn matches(&self, target: &str) -> bool {
        target == self.id.to_string() || target == self.display_name()
    }

    /// Path of the companion tunnel configuration file.
    pub fn ovpn_path(&self) -> PathBuf {
        self.path.with_extension("ovpn")
    }
}

/// Loads every profile from the platform profile directory.
///
/// A machine without a resolvable home directory simply has no profiles.
pub fn load_default() -> Result<BTreeMap<String, Profile>, ProfileError> {
    match platform::profile_dir() {
        Some(dir) => load_profiles(&dir),
        None => Ok(BTreeMap::new()),
    }
}

/// Scans `dir` (non-recursively) for `*.conf` files and parses each one.
///
/// A missing directory yields an empty map; an unreadable or unparsable
/// profile fails the whole load. IDs are assigned 1-based in lexicographic
/// filename order.
pub fn load_profiles(dir: &Path) -> Result<BTreeMap<String, Profile>, ProfileError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => {
            return Err(ProfileError::Read {
                path: dir.to_path_buf(),
                source: err,
            });
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "conf"))
        .collect();
    paths.sort();

    let mut profiles = BTreeMap::new();
    for (index, path) in paths.into_iter().enumerate() {
        let key = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        let raw = std::fs::read_to_string(&path).map_err(|source| ProfileError::Read {
            path: path.clone(),
            source,
        })?;
        let conf: ProfileConfig =
            serde_json::from_str(&raw).map_err(|source| ProfileError::Parse {
                path: path.clone(),
                source,
            })?;
        profiles.insert(
            key.clone(),
            Profile {
                key,
                path,
                id: index + 1,
                conf,
            },
        );
    }
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_profile(dir: &Path, stem: &str, json: &str) {
        std::fs::write(dir.join(format!("{stem}.conf")), json).unwrap();
    }

    #[test]
    fn assigns_ids_in_filename_order() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(dir.path(), "bbb", r#"{"name": "second"}"#);
        write_profile(dir.path(), "aaa", r#"{"name": "first"}"#);
        write_profile(dir.path(), "ccc", r#"{"name": "third"}"#);

        let profiles = load_profiles(dir.path()).unwrap();
        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles["aaa"].id, 1);
        assert_eq!(profiles["bbb"].id, 2);
        assert_eq!(profiles["ccc"].id, 3);
    }

    #[test]
    fn synthesizes_display_name_from_user_and_server() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(
            dir.path(),
            "p1",
            r#"{"name": null, "user": "alice", "server": "vpn.example.com"}"#,
        );
        write_profile(
            dir.path(),
            "p2",
            r#"{"name": "", "user": "bob", "server": "hub"}"#,
        );

        let profiles = load_profiles(dir.path()).unwrap();
        assert_eq!(profiles["p1"].display_name(), "alice (vpn.example.com)");
        assert_eq!(profiles["p2"].display_name(), "bob (hub)");
    }

    #[test]
    fn explicit_name_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(
            dir.path(),
            "p1",
            r#"{"name": "work", "user": "alice", "server": "hub"}"#,
        );

        let profiles = load_profiles(dir.path()).unwrap();
        assert_eq!(profiles["p1"].display_name(), "work");
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let profiles = load_profiles(&missing).unwrap();
        assert!(profiles.is_empty());
    }

    #[test]
    fn corrupt_profile_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(dir.path(), "good", r#"{"name": "ok"}"#);
        write_profile(dir.path(), "bad", "not json at all");

        let err = load_profiles(dir.path()).unwrap_err();
        assert!(matches!(err, ProfileError::Parse { .. }));
    }

    #[test]
    fn ignores_non_conf_files() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(dir.path(), "p1", r#"{"name": "work"}"#);
        std::fs::write(dir.path().join("p1.ovpn"), "remote vpn 1194").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let profiles = load_profiles(dir.path()).unwrap();
        assert_eq!(profiles.len(), 1);
    }

    #[test]
    fn matches_by_id_string_or_display_name() {
        let profile = Profile {
            key: "abc".to_string(),
            path: PathBuf::from("/tmp/abc.conf"),
            id: 3,
            conf: ProfileConfig {
                name: Some("work".to_string()),
                ..Default::default()
            },
        };
        assert!(profile.matches("3"));
        assert!(profile.matches("work"));
        assert!(!profile.matches("wor"));
        assert!(!profile.matches("4"));
    }

    #[test]
    fn ovpn_path_sits_next_to_conf() {
        let profile = Profile {
            key: "abc".to_string(),
            path: PathBuf::from("/tmp/profiles/abc.conf"),
            id: 1,
            conf: ProfileConfig::default(),
        };
        assert_eq!(profile.ovpn_path(), PathBuf::from("/tmp/profiles/abc.ovpn"));
    }
}
