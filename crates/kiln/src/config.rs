//! Renderer configuration.
//!
//! Batch capacities and the texture slot count are fixed for a renderer's
//! lifetime. They live in [`RendererConfig`], which can be built in code or
//! loaded from JSON; every field is optional in JSON and falls back to its
//! default:
//!
//! ```json
//! { "max_quads": 2000, "max_texture_slots": 8, "slot_retention": "reset" }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What happens to texture slot assignments when a batch is flushed because
/// it ran out of vertex capacity.
///
/// A flush caused by running out of texture slots always resets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotRetention {
    /// Keep assignments, so the next batch reuses the same slot indices for
    /// the same textures.
    #[default]
    Preserve,
    /// Start the next batch with only the white texture in slot 0.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Quads per batch before a flush.
    pub max_quads: usize,
    /// Circles per batch before a flush.
    pub max_circles: usize,
    /// Lines per batch before a flush.
    pub max_lines: usize,
    /// Texture slots per draw, including slot 0 (the white texture).
    pub max_texture_slots: u32,
    /// Line width in pixels passed to the device.
    pub line_width: f32,
    pub slot_retention: SlotRetention,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_quads: 10_000,
            max_circles: 10_000,
            max_lines: 10_000,
            max_texture_slots: 16,
            line_width: 2.0,
            slot_retention: SlotRetention::Preserve,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("`{0}` must be at least 1")]
    ZeroCapacity(&'static str),
    #[error("`{field}` = {value} needs more indices than a u32 can address")]
    CapacityTooLarge { field: &'static str, value: usize },
    #[error("max_texture_slots = {requested}, but must be between 2 and {available}")]
    TextureSlots { requested: u32, available: u32 },
    #[error("line_width must be positive and finite, got {0}")]
    LineWidth(f32),
}

impl RendererConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the config against a device offering `max_units` texture units.
    pub fn validate(&self, max_units: u32) -> Result<(), ConfigError> {
        for (field, value) in [
            ("max_quads", self.max_quads),
            ("max_circles", self.max_circles),
            ("max_lines", self.max_lines),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroCapacity(field));
            }
            // Quads and circles draw 6 indices each; lines 2 vertices each.
            if value.checked_mul(6).is_none_or(|n| n > u32::MAX as usize) {
                return Err(ConfigError::CapacityTooLarge { field, value });
            }
        }
        if self.max_texture_slots < 2 || self.max_texture_slots > max_units {
            return Err(ConfigError::TextureSlots {
                requested: self.max_texture_slots,
                available: max_units,
            });
        }
        if !(self.line_width.is_finite() && self.line_width > 0.0) {
            return Err(ConfigError::LineWidth(self.line_width));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = RendererConfig::default();
        assert_eq!(config.max_quads, 10_000);
        assert_eq!(config.max_texture_slots, 16);
        assert!(config.validate(16).is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config =
            RendererConfig::from_json_str(r#"{ "max_quads": 4, "slot_retention": "reset" }"#)
                .unwrap();
        assert_eq!(config.max_quads, 4);
        assert_eq!(config.max_lines, 10_000);
        assert_eq!(config.slot_retention, SlotRetention::Reset);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = RendererConfig::from_json_str("{ max_quads: }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn json_round_trip_preserves_fields() {
        let config = RendererConfig {
            max_circles: 7,
            line_width: 3.5,
            ..RendererConfig::default()
        };
        let text = config.to_json_string().unwrap();
        assert_eq!(RendererConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let zero = RendererConfig {
            max_lines: 0,
            ..RendererConfig::default()
        };
        assert!(matches!(
            zero.validate(16),
            Err(ConfigError::ZeroCapacity("max_lines"))
        ));

        let too_many_slots = RendererConfig {
            max_texture_slots: 32,
            ..RendererConfig::default()
        };
        assert!(matches!(
            too_many_slots.validate(16),
            Err(ConfigError::TextureSlots { requested: 32, available: 16 })
        ));

        let one_slot = RendererConfig {
            max_texture_slots: 1,
            ..RendererConfig::default()
        };
        assert!(one_slot.validate(16).is_err());

        let bad_width = RendererConfig {
            line_width: f32::NAN,
            ..RendererConfig::default()
        };
        assert!(matches!(bad_width.validate(16), Err(ConfigError::LineWidth(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RendererConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
