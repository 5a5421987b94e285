//! HTTP/2 connection settings.
//!
//! A [`ConnectionSettings`] describes one side of the connection. The local
//! copy is advertised with [`ConnectionSettings::to_frame`]; the remote copy
//! starts at the RFC 9113 defaults and is updated with
//! [`ConnectionSettings::apply`] as the peer's SETTINGS frames arrive.

use crate::flow_control::{FlowControlError, SendWindows};
use crate::frame::{
    self, FrameEncoder, FrameError, Setting, SettingId, SettingsFrame, validate_setting,
};
use crate::hpack::HpackEncoder;

/// HTTP/2 connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// HPACK header table size.
    pub header_table_size: u32,
    /// Whether server push is enabled.
    pub enable_push: bool,
    /// Maximum number of concurrent streams; `None` is unlimited.
    pub max_concurrent_streams: Option<u32>,
    /// Initial stream window size.
    pub initial_window_size: u32,
    /// Maximum frame size.
    pub max_frame_size: u32,
    /// Maximum header list size; `None` is unlimited.
    pub max_header_list_size: Option<u32>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            header_table_size: frame::DEFAULT_HEADER_TABLE_SIZE,
            enable_push: true,
            max_concurrent_streams: None,
            initial_window_size: frame::DEFAULT_INITIAL_WINDOW_SIZE,
            max_frame_size: frame::DEFAULT_MAX_FRAME_SIZE,
            max_header_list_size: None,
        }
    }
}

/// What a received SETTINGS frame changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsChange {
    /// New SETTINGS_HEADER_TABLE_SIZE, if the frame carried one.
    pub header_table_size: Option<u32>,
    /// Signed change of SETTINGS_INITIAL_WINDOW_SIZE; zero if unchanged.
    pub initial_window_delta: i64,
    /// New SETTINGS_MAX_FRAME_SIZE, if the frame carried one.
    pub max_frame_size: Option<u32>,
}

impl SettingsChange {
    /// Whether the frame changed anything the codec state depends on.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Forward the change to the outbound side of a connection: the HPACK
    /// encoder, the frame encoder and the send windows.
    pub fn apply_to(
        &self,
        hpack: &mut HpackEncoder,
        frames: &mut FrameEncoder,
        windows: &SendWindows,
    ) -> Result<(), FlowControlError> {
        if let Some(size) = self.header_table_size {
            hpack.update_max_size(size as usize);
        }
        if let Some(size) = self.max_frame_size {
            frames.set_max_frame_size(size);
        }
        if self.initial_window_delta != 0 {
            windows.apply_initial_window_delta(self.initial_window_delta)?;
        }
        Ok(())
    }
}

impl ConnectionSettings {
    /// Create new settings with the RFC 9113 default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set header table size.
    pub fn header_table_size(mut self, value: u32) -> Self {
        self.header_table_size = value;
        self
    }

    /// Enable or disable server push.
    pub fn enable_push(mut self, value: bool) -> Self {
        self.enable_push = value;
        self
    }

    /// Set maximum concurrent streams.
    pub fn max_concurrent_streams(mut self, value: u32) -> Self {
        self.max_concurrent_streams = Some(value);
        self
    }

    /// Set initial window size.
    pub fn initial_window_size(mut self, value: u32) -> Self {
        self.initial_window_size = value;
        self
    }

    /// Set maximum frame size.
    pub fn max_frame_size(mut self, value: u32) -> Self {
        self.max_frame_size = value;
        self
    }

    /// Set maximum header list size.
    pub fn max_header_list_size(mut self, value: u32) -> Self {
        self.max_header_list_size = Some(value);
        self
    }

    /// Check every value against its legal range.
    pub fn validate(&self) -> Result<(), FrameError> {
        for setting in self.settings() {
            validate_setting(setting.id, setting.value)?;
        }
        Ok(())
    }

    /// The SETTINGS frame advertising these values.
    pub fn to_frame(&self) -> SettingsFrame {
        SettingsFrame {
            ack: false,
            settings: self.settings(),
        }
    }

    fn settings(&self) -> Vec<Setting> {
        let mut settings = vec![
            Setting {
                id: SettingId::HeaderTableSize,
                value: self.header_table_size,
            },
            Setting {
                id: SettingId::EnablePush,
                value: u32::from(self.enable_push),
            },
        ];
        if let Some(value) = self.max_concurrent_streams {
            settings.push(Setting {
                id: SettingId::MaxConcurrentStreams,
                value,
            });
        }
        settings.push(Setting {
            id: SettingId::InitialWindowSize,
            value: self.initial_window_size,
        });
        settings.push(Setting {
            id: SettingId::MaxFrameSize,
            value: self.max_frame_size,
        });
        if let Some(value) = self.max_header_list_size {
            settings.push(Setting {
                id: SettingId::MaxHeaderListSize,
                value,
            });
        }
        settings
    }

    /// Apply a SETTINGS frame received from the peer.
    ///
    /// The frame is applied entirely or not at all. Settings are processed
    /// in order, so a repeated identifier takes its last value. Unknown
    /// identifiers are ignored. An ACK changes nothing.
    pub fn apply(&mut self, frame: &SettingsFrame) -> Result<SettingsChange, FrameError> {
        if frame.ack {
            return Ok(SettingsChange::default());
        }

        let mut next = *self;
        let mut change = SettingsChange::default();

        for setting in &frame.settings {
            validate_setting(setting.id, setting.value)?;

            match setting.id {
                SettingId::HeaderTableSize => {
                    next.header_table_size = setting.value;
                    change.header_table_size = Some(setting.value);
                }
                SettingId::EnablePush => next.enable_push = setting.value == 1,
                SettingId::MaxConcurrentStreams => {
                    next.max_concurrent_streams = Some(setting.value)
                }
                SettingId::InitialWindowSize => next.initial_window_size = setting.value,
                SettingId::MaxFrameSize => {
                    next.max_frame_size = setting.value;
                    change.max_frame_size = Some(setting.value);
                }
                SettingId::MaxHeaderListSize => next.max_header_list_size = Some(setting.value),
                SettingId::Unknown(id) => {
                    tracing::trace!(id, value = setting.value, "ignoring unknown setting");
                }
            }
        }

        change.initial_window_delta =
            i64::from(next.initial_window_size) - i64::from(self.initial_window_size);
        *self = next;

        tracing::debug!(
            settings = frame.settings.len(),
            header_table_size = ?change.header_table_size,
            initial_window_delta = change.initial_window_delta,
            max_frame_size = ?change.max_frame_size,
            "applied peer settings"
        );

        Ok(change)
    }
}
