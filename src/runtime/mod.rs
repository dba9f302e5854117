//! # OSC Runtime Module
//!
//! Endpoint lifecycle for OSC transmitters and receivers.
//!
//! ## Key Types
//!
//! - [`OscTransmitter`] - Sending endpoint and its Closed/Open state machine
//! - [`OscReceiver`] - Listening endpoint a transmitter can piggyback on
//! - [`OscRuntime`] - Named endpoints built from a [`SystemConfig`]
//! - [`MapBundle`] - Value remapping applied to outgoing messages
//!
//! ## Lifecycle
//!
//! 1. Load configuration: `OscRuntime::load("osc.json")`
//! 2. Start endpoints: `runtime.start(HostMode::Playing)` connects those with `auto_connect`
//! 3. Send: `runtime.transmitter_mut("main")?.send(message)`
//! 4. Stop: `runtime.stop()`
//!
//! ## Example
//!
//! ```ignore
//! let mut tx = OscTransmitter::new(TransmitterConfig::new("127.0.0.1", 9000));
//! tx.connect()?;
//! tx.send(OscMessage::new("/volume").with_arg(0.8f32))?;
//! tx.close();
//! ```

pub mod config;
pub mod mapping;
pub mod receiver;
pub mod transmitter;

pub use config::{LocalHostMode, LocalPortMode, ReceiverConfig, SystemConfig, TransmitterConfig};
pub use mapping::{MapBundle, MapMessage, MapValue};
pub use receiver::OscReceiver;
pub use transmitter::{OscTransmitter, TransmitterState};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::logging::{ConsoleLogger, LogLevel, OscLogger};

/// Context the host is running in. Selects which flag drives `start`:
/// `auto_connect` when playing, `work_in_editor` when editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    Playing,
    Editing,
}

pub struct OscRuntime {
    receivers: HashMap<String, Arc<OscReceiver>>,
    transmitters: HashMap<String, OscTransmitter>,
    logger: Arc<dyn OscLogger>,
}

impl OscRuntime {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let logger = ConsoleLogger::new();
        logger.log(LogLevel::Info, "Runtime", &format!("Loading config from {}", path.as_ref().display()));
        Self::from_config(SystemConfig::load(path)?, logger)
    }

    /// Builds every endpoint. Transmitters naming a `source_receiver` are
    /// bound to that receiver; an unknown name is an error.
    pub fn from_config(config: SystemConfig, logger: Arc<dyn OscLogger>) -> Result<Self, ConfigError> {
        let receivers: HashMap<String, Arc<OscReceiver>> = config
            .receivers
            .into_iter()
            .map(|(name, cfg)| (name, Arc::new(OscReceiver::with_logger(cfg, logger.clone()))))
            .collect();

        let mut transmitters = HashMap::new();
        for (name, cfg) in config.transmitters {
            let source = match &cfg.source_receiver {
                Some(rx_name) => Some(receivers.get(rx_name).ok_or_else(|| ConfigError::Missing {
                    kind: "receiver",
                    name: rx_name.clone(),
                })?),
                None => None,
            };
            let mut transmitter = OscTransmitter::with_logger(cfg, logger.clone());
            transmitter.bind_source_receiver(source);
            transmitters.insert(name, transmitter);
        }

        Ok(OscRuntime { receivers, transmitters, logger })
    }

    pub fn receiver(&self, name: &str) -> Option<Arc<OscReceiver>> {
        self.receivers.get(name).cloned()
    }

    pub fn receivers(&self) -> impl Iterator<Item = (&String, &Arc<OscReceiver>)> {
        self.receivers.iter()
    }

    pub fn transmitters_mut(&mut self) -> impl Iterator<Item = (&String, &mut OscTransmitter)> {
        self.transmitters.iter_mut()
    }

    pub fn transmitter(&self, name: &str) -> Option<&OscTransmitter> {
        self.transmitters.get(name)
    }

    pub fn transmitter_mut(&mut self, name: &str) -> Option<&mut OscTransmitter> {
        self.transmitters.get_mut(name)
    }

    /// Starts receivers first so piggybacking transmitters can share their
    /// sockets. Returns the names of endpoints that failed to connect.
    pub fn start(&mut self, mode: HostMode) -> Vec<String> {
        let mut failed = Vec::new();
        for (name, receiver) in &self.receivers {
            if let Err(e) = receiver.start(mode) {
                self.logger.log(LogLevel::Error, "Runtime", &format!("Receiver '{}' failed to start: {}", name, e));
                failed.push(name.clone());
            }
        }
        for (name, transmitter) in &mut self.transmitters {
            if let Err(e) = transmitter.start(mode) {
                self.logger.log(LogLevel::Error, "Runtime", &format!("Transmitter '{}' failed to start: {}", name, e));
                failed.push(name.clone());
            }
        }
        failed
    }

    pub fn pause(&mut self, paused: bool) {
        for (name, transmitter) in &mut self.transmitters {
            if let Err(e) = transmitter.pause(paused) {
                self.logger.log(LogLevel::Warn, "Runtime", &format!("Transmitter '{}' did not resume: {}", name, e));
            }
        }
        for (name, receiver) in &self.receivers {
            if let Err(e) = receiver.pause(paused) {
                self.logger.log(LogLevel::Warn, "Runtime", &format!("Receiver '{}' did not resume: {}", name, e));
            }
        }
    }

    /// Flushes bundled messages of every open transmitter.
    pub fn flush(&mut self) {
        for (name, transmitter) in &mut self.transmitters {
            if !transmitter.is_available() {
                continue;
            }
            if let Err(e) = transmitter.flush() {
                self.logger.log(LogLevel::Warn, "Runtime", &format!("Transmitter '{}' flush failed: {}", name, e));
            }
        }
    }

    pub fn stop(&mut self) {
        for transmitter in self.transmitters.values_mut() {
            transmitter.stop();
        }
        for receiver in self.receivers.values() {
            receiver.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLogger;

    #[test]
    fn test_unknown_source_receiver_is_rejected() {
        let config = SystemConfig::from_json(
            r#"{ "transmitters": { "tx": { "source_receiver": "ghost" } } }"#,
        )
        .unwrap();
        let err = OscRuntime::from_config(config, MemoryLogger::new()).err().unwrap();
        assert!(matches!(err, ConfigError::Missing { kind: "receiver", ref name } if name == "ghost"));
    }

    #[test]
    fn test_start_reports_failures_and_continues() {
        let config = SystemConfig::from_json(
            r#"{
                "transmitters": {
                    "bad": { "remote_host": "nowhere" },
                    "good": {
                        "local_host_mode": { "mode": "custom", "host": "127.0.0.1" },
                        "local_port_mode": { "mode": "custom", "port": 0 }
                    }
                }
            }"#,
        )
        .unwrap();
        let mut runtime = OscRuntime::from_config(config, MemoryLogger::new()).unwrap();

        let failed = runtime.start(HostMode::Playing);
        assert_eq!(failed, vec!["bad".to_string()]);
        assert!(runtime.transmitter("good").unwrap().is_available());

        runtime.stop();
        assert!(!runtime.transmitter("good").unwrap().is_available());
    }

    #[test]
    fn test_configured_source_receiver_is_bound() {
        let config = SystemConfig::from_json(
            r#"{
                "transmitters": { "tx": { "source_receiver": "rx" } },
                "receivers": { "rx": { "local_port": 0 } }
            }"#,
        )
        .unwrap();
        let runtime = OscRuntime::from_config(config, MemoryLogger::new()).unwrap();
        let bound = runtime.transmitter("tx").unwrap().source_receiver().unwrap();
        assert!(Arc::ptr_eq(&bound, &runtime.receiver("rx").unwrap()));
    }
}
