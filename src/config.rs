// Node configuration: loop timing, addressing, gains, encoder selection
//
// Everything the firmware originally baked in as compile-time constants is a
// field here so tests can inject alternate timings and limits.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::motor::can::OverflowPolicy;
use crate::motor::frame::FrameFormat;

/// Default PID gains applied at startup and substituted when gain entry
/// receives unparsable input.
pub const DEFAULT_KP: f32 = 0.30;
pub const DEFAULT_KI: f32 = 0.80;

/// Serial baud rate for the operator link
pub const DEFAULT_BAUD: u32 = 115_200;

/// Immutable runtime configuration, constructed once and handed to the
/// control loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Control loop period in milliseconds
    pub tick_ms: u64,
    /// Maximum speed-mode setpoint magnitude in rotations per second
    pub max_rps: f32,
    /// Gains applied at startup and used as gain-entry fallbacks
    pub default_kp: f32,
    pub default_ki: f32,
    /// CAN addressing: logical device group, axis index, and the
    /// board-level site-select (DIP switch) value
    pub group: u32,
    pub axis: u32,
    pub site_select: u32,
    /// Which telemetry payload the frame encoder emits
    pub frame_format: FrameFormat,
    /// What to do when a framed payload exceeds the 8-byte CAN body
    pub overflow_policy: OverflowPolicy,
    /// Operator serial link baud rate
    pub baud: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            max_rps: 3.0,
            default_kp: DEFAULT_KP,
            default_ki: DEFAULT_KI,
            group: 1,
            axis: 0,
            site_select: 0x00,
            frame_format: FrameFormat::Pwm,
            overflow_policy: OverflowPolicy::LegacyTruncate,
            baud: DEFAULT_BAUD,
        }
    }
}

impl NodeConfig {
    /// Load configuration from a JSON file; absent fields keep their
    /// defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_firmware_constants() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.tick_ms, 100);
        assert_eq!(cfg.max_rps, 3.0);
        assert_eq!(cfg.default_kp, 0.30);
        assert_eq!(cfg.default_ki, 0.80);
        assert_eq!(cfg.site_select, 0x00);
    }

    #[test]
    fn partial_json_uses_defaults_for_the_rest() {
        let cfg: NodeConfig = serde_json::from_str(r#"{"tick_ms": 20, "max_rps": 5.0}"#).unwrap();
        assert_eq!(cfg.tick_ms, 20);
        assert_eq!(cfg.max_rps, 5.0);
        assert_eq!(cfg.default_kp, DEFAULT_KP);
        assert_eq!(cfg.baud, DEFAULT_BAUD);
    }
}
