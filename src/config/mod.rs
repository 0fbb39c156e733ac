//! Server and output configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::{fs, io};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Widest duty resolution the output hosts can carry.
pub const MAX_RESOLUTION_BITS: u8 = 16;
/// Most channels a bridge setup packet can describe.
pub const MAX_CHANNELS: usize = u8::MAX as usize;

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Root {
    /// Server configuration.
    pub server: Server,
    /// Physical outputs.
    pub output: Output,
    /// Channel state at startup.
    pub defaults: Defaults,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct Server {
    /// Host address to serve the control page and WebSocket on.
    pub web_addr: String,
    /// Control page on disk. The bundled page is served when unset.
    pub page: Option<PathBuf>,
    /// Close a session that has been silent for this long.
    pub idle_timeout_secs: Option<u64>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            web_addr: "0.0.0.0:80".into(),
            page: None,
            idle_timeout_secs: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct Output {
    /// PWM frequency in Hz.
    pub frequency: u32,
    /// Duty resolution in bits.
    pub resolution_bits: u8,
    /// Drive lines, indexed by their position in this list.
    pub channels: Vec<Channel>,
    /// Hardware the duty values are written to.
    pub host: Host,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            frequency: 5000,
            resolution_bits: 8,
            channels: vec![
                Channel { pin: 4, name: None },
                Channel { pin: 0, name: None },
                Channel { pin: 2, name: None },
            ],
            host: Host::default(),
        }
    }
}

impl Output {
    /// Largest duty value for the configured resolution, saturating at `u16::MAX`.
    pub fn max_duty(&self) -> u16 {
        match 1u32.checked_shl(u32::from(self.resolution_bits)) {
            Some(limit) => u16::try_from(limit - 1).unwrap_or(u16::MAX),
            None => u16::MAX,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    /// Pin the line is attached to on the bridge.
    pub pin: u8,
    /// Human-readable name.
    pub name: Option<String>,
}

/// Output host configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Host {
    #[serde(rename_all = "camelCase")]
    Serial {
        /// Path to a serial device. Writes are only logged when unset.
        path: Option<String>,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
    /// Keep duty frames in memory.
    Memory,
}

impl Default for Host {
    fn default() -> Self {
        Host::Serial {
            path: None,
            baud_rate: default_baud_rate(),
        }
    }
}

fn default_baud_rate() -> u32 {
    115_200
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct Defaults {
    pub channel: usize,
    pub intensity: u8,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            channel: 0,
            intensity: 50,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("unable to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub fn read_config_yaml<T: AsRef<Path>>(path: T) -> Result<Root, ConfigError> {
    let file = fs::File::open(path)?;
    let reader = io::BufReader::new(file);
    let root: Root = serde_yaml::from_reader(reader)?;
    root.validate()?;
    Ok(root)
}

impl Root {
    /// Quick sanity check for the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let output = &self.output;
        if output.channels.is_empty() {
            return Err(ConfigError::Invalid("at least one output channel is required".into()));
        }
        if output.channels.len() > MAX_CHANNELS {
            return Err(ConfigError::Invalid(format!(
                "{} output channels configured, at most {} are supported",
                output.channels.len(),
                MAX_CHANNELS
            )));
        }
        if output.resolution_bits == 0 || output.resolution_bits > MAX_RESOLUTION_BITS {
            return Err(ConfigError::Invalid(format!(
                "resolution of {} bits is outside 1..={}",
                output.resolution_bits, MAX_RESOLUTION_BITS
            )));
        }
        if self.defaults.channel >= output.channels.len() {
            return Err(ConfigError::Invalid(format!(
                "default channel {} refers to one of {} channels",
                self.defaults.channel,
                output.channels.len()
            )));
        }
        if self.defaults.intensity > 100 {
            return Err(ConfigError::Invalid(format!(
                "default intensity {} is above 100",
                self.defaults.intensity
            )));
        }
        if self.server.web_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "web address {:?} is not a socket address",
                self.server.web_addr
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_board() {
        let root = Root::default();
        root.validate().expect("defaults are valid");
        let pins: Vec<u8> = root.output.channels.iter().map(|c| c.pin).collect();
        assert_eq!(pins, vec![4, 0, 2]);
        assert_eq!(root.output.max_duty(), 255);
        assert_eq!(root.defaults.channel, 0);
        assert_eq!(root.defaults.intensity, 50);
    }

    #[test]
    fn shipped_config_is_valid() {
        let root = read_config_yaml(concat!(env!("CARGO_MANIFEST_DIR"), "/config.yaml")).expect("config");
        assert_eq!(root.output.channels.len(), 3);
        assert_eq!(root.server.idle_timeout_secs, Some(300));
        match root.output.host {
            Host::Serial { baud_rate, .. } => assert_eq!(baud_rate, 115_200),
            Host::Memory => panic!("expected serial host"),
        }
    }

    #[test]
    fn parses_partial_yaml() {
        let raw = r#"
server:
  webAddr: "127.0.0.1:8080"
output:
  resolutionBits: 10
  channels:
    - { pin: 12, name: "warm" }
    - { pin: 13 }
  host: { type: memory }
defaults:
  intensity: 20
"#;
        let root: Root = serde_yaml::from_str(raw).expect("yaml");
        root.validate().expect("valid");
        assert_eq!(root.server.web_addr, "127.0.0.1:8080");
        assert_eq!(root.output.frequency, 5000);
        assert_eq!(root.output.max_duty(), 1023);
        assert_eq!(root.output.channels[0].name.as_deref(), Some("warm"));
        assert!(matches!(root.output.host, Host::Memory));
        assert_eq!(root.defaults.channel, 0);
        assert_eq!(root.defaults.intensity, 20);
    }

    #[test]
    fn serial_host_defaults_baud_rate() {
        let host: Host = serde_yaml::from_str("{ type: serial, path: /dev/ttyUSB0 }").expect("yaml");
        match host {
            Host::Serial { path, baud_rate } => {
                assert_eq!(path.as_deref(), Some("/dev/ttyUSB0"));
                assert_eq!(baud_rate, 115_200);
            }
            Host::Memory => panic!("expected serial host"),
        }
    }

    #[test]
    fn rejects_default_channel_out_of_range() {
        let mut root = Root::default();
        root.defaults.channel = 3;
        assert!(matches!(root.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_empty_channel_list() {
        let mut root = Root::default();
        root.output.channels.clear();
        assert!(matches!(root.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_more_channels_than_a_setup_packet_holds() {
        let mut root = Root::default();
        root.output.channels = vec![Channel { pin: 1, name: None }; MAX_CHANNELS];
        root.validate().expect("largest channel count is valid");

        root.output.channels = vec![Channel { pin: 1, name: None }; 300];
        assert!(matches!(root.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn max_duty_saturates_for_unvalidated_resolutions() {
        let mut output = Output::default();
        output.resolution_bits = 16;
        assert_eq!(output.max_duty(), u16::MAX);
        output.resolution_bits = 20;
        assert_eq!(output.max_duty(), u16::MAX);
        output.resolution_bits = 40;
        assert_eq!(output.max_duty(), u16::MAX);
        output.resolution_bits = 0;
        assert_eq!(output.max_duty(), 0);
    }

    #[test]
    fn rejects_bad_resolution_and_intensity() {
        let mut root = Root::default();
        root.output.resolution_bits = 17;
        assert!(root.validate().is_err());

        let mut root = Root::default();
        root.defaults.intensity = 101;
        assert!(root.validate().is_err());
    }

    #[test]
    fn rejects_unparsable_bind_address() {
        let mut root = Root::default();
        root.server.web_addr = "localhost".into();
        assert!(root.validate().is_err());
    }
}
