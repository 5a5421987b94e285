//! Codec configuration.
//!
//! Configuration is parsed from TOML text; reading the file is left to the
//! embedding proxy. Every section and field has a default, so an empty
//! document is a valid configuration.

use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;

use crate::flow_control::{SendWindows, Window};
use crate::frame::{self, FrameDecoder, FrameEncoder};
use crate::hpack::{HpackDecoder, HpackEncoder};
use crate::settings::ConnectionSettings;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Header compression
    #[serde(default)]
    pub hpack: HpackConfig,

    /// Frame codec
    #[serde(default)]
    pub frame: FrameConfig,

    /// Send-side flow control
    #[serde(default)]
    pub flow_control: FlowControlConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that the type system cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(frame::DEFAULT_MAX_FRAME_SIZE..=frame::MAX_FRAME_SIZE)
            .contains(&self.frame.max_frame_size)
        {
            return Err(ConfigError::Invalid(format!(
                "frame.max_frame_size must be between {} and {}, got {}",
                frame::DEFAULT_MAX_FRAME_SIZE,
                frame::MAX_FRAME_SIZE,
                self.frame.max_frame_size
            )));
        }

        if self.flow_control.initial_window_size > frame::MAX_WINDOW_SIZE {
            return Err(ConfigError::Invalid(format!(
                "flow_control.initial_window_size must be at most {}, got {}",
                frame::MAX_WINDOW_SIZE,
                self.flow_control.initial_window_size
            )));
        }

        if self.hpack.header_table_size > u32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "hpack.header_table_size must fit in 32 bits, got {}",
                self.hpack.header_table_size
            )));
        }

        if self.hpack.never_index.iter().any(|name| name.is_empty()) {
            return Err(ConfigError::Invalid(
                "hpack.never_index must not contain empty names".to_string(),
            ));
        }

        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.logging.level) {
            return Err(ConfigError::Invalid(format!(
                "logging.level '{}' is not a valid filter: {e}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// The settings to advertise to the peer.
    pub fn local_settings(&self) -> ConnectionSettings {
        let mut settings = ConnectionSettings::new()
            .header_table_size(self.hpack.header_table_size as u32)
            .initial_window_size(self.flow_control.initial_window_size)
            .max_frame_size(self.frame.max_frame_size);
        if let Some(limit) = self.hpack.max_header_list_size() {
            settings = settings.max_header_list_size(limit as u32);
        }
        settings
    }
}

/// HPACK configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HpackConfig {
    /// Dynamic table size in bytes (default: 4096)
    #[serde(default = "default_header_table_size")]
    pub header_table_size: usize,

    /// Huffman-encode string literals when shorter (default: true)
    #[serde(default = "default_huffman")]
    pub huffman: bool,

    /// Maximum decoded header list size; 0 disables the limit (default: 65536)
    #[serde(default = "default_max_header_list_size")]
    pub max_header_list_size: usize,

    /// Header names never added to a dynamic table
    #[serde(default = "default_never_index")]
    pub never_index: Vec<String>,
}

impl Default for HpackConfig {
    fn default() -> Self {
        Self {
            header_table_size: default_header_table_size(),
            huffman: default_huffman(),
            max_header_list_size: default_max_header_list_size(),
            never_index: default_never_index(),
        }
    }
}

impl HpackConfig {
    /// The header list limit, `None` when disabled.
    pub fn max_header_list_size(&self) -> Option<usize> {
        Some(self.max_header_list_size).filter(|&limit| limit > 0)
    }

    /// An encoder for the outbound direction.
    ///
    /// Its table starts at the RFC default. `header_table_size` bounds our
    /// decoder only; the encoder grows or shrinks when the peer's
    /// SETTINGS_HEADER_TABLE_SIZE arrives.
    pub fn encoder(&self) -> HpackEncoder {
        let mut encoder = HpackEncoder::new();
        encoder.set_huffman(self.huffman);
        encoder.set_never_indexed(
            self.never_index
                .iter()
                .map(|name| Bytes::from(name.to_ascii_lowercase())),
        );
        encoder
    }

    /// A decoder for the inbound direction.
    pub fn decoder(&self) -> HpackDecoder {
        let mut decoder = HpackDecoder::with_table_size(self.header_table_size);
        decoder.set_max_header_list_size(self.max_header_list_size());
        decoder
    }
}

/// Frame codec configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameConfig {
    /// Largest frame payload accepted from the peer (default: 16384)
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl FrameConfig {
    /// A decoder enforcing the configured frame size.
    pub fn decoder(&self) -> FrameDecoder {
        let mut decoder = FrameDecoder::new();
        decoder.set_max_frame_size(self.max_frame_size);
        decoder
    }

    /// An encoder limited to the RFC default until the peer's SETTINGS
    /// arrive.
    pub fn encoder(&self) -> FrameEncoder {
        FrameEncoder::new()
    }
}

/// Flow control configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowControlConfig {
    /// Initial stream window advertised to the peer (default: 65535)
    #[serde(default = "default_initial_window_size")]
    pub initial_window_size: u32,

    /// Re-check interval while waiting for window, in milliseconds;
    /// 0 disables the periodic re-check (default: 500)
    #[serde(default = "default_liveness_interval_ms")]
    pub liveness_interval_ms: u64,
}

impl Default for FlowControlConfig {
    fn default() -> Self {
        Self {
            initial_window_size: default_initial_window_size(),
            liveness_interval_ms: default_liveness_interval_ms(),
        }
    }
}

impl FlowControlConfig {
    pub fn liveness_interval(&self) -> Option<Duration> {
        Some(self.liveness_interval_ms)
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }

    /// A window of `initial_size` using the configured re-check interval.
    pub fn window(&self, initial_size: u32) -> Window {
        Window::new(initial_size).with_liveness_interval(self.liveness_interval())
    }

    /// Send windows for a connection whose peer advertised
    /// `peer_initial_window_size`.
    pub fn send_windows(&self, peer_initial_window_size: u32) -> SendWindows {
        SendWindows::with_liveness_interval(peer_initial_window_size, self.liveness_interval())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "h2intercept=debug" (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (default: compact)
    #[serde(default)]
    pub format: LogFormat,

    /// Include the event target (default: true)
    #[serde(default = "default_true")]
    pub target: bool,

    /// Include timestamps (default: true)
    #[serde(default = "default_true")]
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            target: true,
            timestamps: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human-oriented output.
    Pretty,
    /// Single-line output.
    #[default]
    Compact,
    /// Newline-delimited JSON.
    Json,
}

fn default_header_table_size() -> usize {
    crate::hpack::DEFAULT_TABLE_SIZE
}

fn default_huffman() -> bool {
    true
}

fn default_max_header_list_size() -> usize {
    65_536
}

fn default_never_index() -> Vec<String> {
    vec!["authorization".to_string(), "proxy-authorization".to_string()]
}

fn default_max_frame_size() -> u32 {
    frame::DEFAULT_MAX_FRAME_SIZE
}

fn default_initial_window_size() -> u32 {
    frame::DEFAULT_INITIAL_WINDOW_SIZE
}

fn default_liveness_interval_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
