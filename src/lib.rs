//! rotunl - Pritunl command line client
//!
//! This crate talks to the locally running Pritunl client daemon over its
//! control API to list, connect, and disconnect VPN profiles without the
//! GUI. On macOS and Linux the API lives behind a Unix domain socket; on
//! Windows it listens on loopback TCP.
//!
//! # Architecture
//!
//! - `platform`: OS-specific daemon and profile locations
//! - `profile`: on-disk profile discovery
//! - `daemon`: control API client
//! - `reconcile`: merges profiles with live connection state
//! - `creds`: credential resolution (keychain, interactive prompts)
//! - `render`: table and TSV output

pub mod creds;
pub mod daemon;
pub mod platform;
pub mod profile;
pub mod reconcile;
pub mod render;

pub use daemon::DaemonClient;
