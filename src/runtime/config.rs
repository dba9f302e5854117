use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::mapping::MapBundle;
use crate::error::ConfigError;

/// How the local host of an endpoint is chosen.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LocalHostMode {
    /// Unspecified address of the remote host's family.
    #[default]
    Any,
    Custom { host: String },
}

/// How the local port of a transmitter is chosen.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LocalPortMode {
    /// Mirror the remote port.
    #[default]
    FromRemotePort,
    /// Deprecated: use the bound source receiver's port. Prefer binding a source receiver.
    FromReceiver,
    /// Fixed port, 0 picks an ephemeral one.
    Custom { port: u16 },
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransmitterConfig {
    #[serde(default = "default_remote_host")]
    pub remote_host: String,
    #[serde(default = "default_remote_port")]
    pub remote_port: u16,
    #[serde(default)]
    pub local_host_mode: LocalHostMode,
    #[serde(default)]
    pub local_port_mode: LocalPortMode,
    /// Name of a receiver in the same [`SystemConfig`] to piggyback on.
    #[serde(default)]
    pub source_receiver: Option<String>,
    #[serde(default = "default_true")]
    pub auto_connect: bool,
    #[serde(default)]
    pub close_on_pause: bool,
    #[serde(default)]
    pub work_in_editor: bool,
    #[serde(default)]
    pub use_bundle: bool,
    #[serde(default)]
    pub map_bundle: Option<MapBundle>,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        TransmitterConfig {
            remote_host: default_remote_host(),
            remote_port: default_remote_port(),
            local_host_mode: LocalHostMode::default(),
            local_port_mode: LocalPortMode::default(),
            source_receiver: None,
            auto_connect: default_true(),
            close_on_pause: false,
            work_in_editor: false,
            use_bundle: false,
            map_bundle: None,
        }
    }
}

impl TransmitterConfig {
    pub fn new(remote_host: impl Into<String>, remote_port: u16) -> Self {
        TransmitterConfig {
            remote_host: remote_host.into(),
            remote_port,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReceiverConfig {
    #[serde(default)]
    pub local_host_mode: LocalHostMode,
    #[serde(default = "default_receiver_port")]
    pub local_port: u16,
    #[serde(default = "default_true")]
    pub auto_connect: bool,
    #[serde(default)]
    pub close_on_pause: bool,
    #[serde(default)]
    pub work_in_editor: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            local_host_mode: LocalHostMode::default(),
            local_port: default_receiver_port(),
            auto_connect: default_true(),
            close_on_pause: false,
            work_in_editor: false,
        }
    }
}

impl ReceiverConfig {
    pub fn new(local_port: u16) -> Self {
        ReceiverConfig { local_port, ..Default::default() }
    }
}

fn default_remote_host() -> String { "127.0.0.1".to_string() }
fn default_remote_port() -> u16 { 7100 }
fn default_receiver_port() -> u16 { 7001 }
fn default_true() -> bool { true }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SystemConfig {
    #[serde(default)]
    pub transmitters: HashMap<String, TransmitterConfig>,
    #[serde(default)]
    pub receivers: HashMap<String, ReceiverConfig>,
}

impl SystemConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn transmitter(&self, name: &str) -> Result<&TransmitterConfig, ConfigError> {
        self.transmitters.get(name).ok_or_else(|| ConfigError::Missing {
            kind: "transmitter",
            name: name.to_string(),
        })
    }

    pub fn receiver(&self, name: &str) -> Result<&ReceiverConfig, ConfigError> {
        self.receivers.get(name).ok_or_else(|| ConfigError::Missing {
            kind: "receiver",
            name: name.to_string(),
        })
    }
}
