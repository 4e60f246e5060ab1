use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::frame::DEFAULT_MAX_FRAME_LEN;

/// Per-connection codec tuning, usually read from a `[codec]` TOML table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Largest envelope accepted or emitted, excluding the 4-byte prefix.
    pub max_frame_len: u32,
    pub read_buffer_capacity: usize,
    pub write_buffer_capacity: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_buffer_capacity: 8 * 1024,
            write_buffer_capacity: 8 * 1024,
        }
    }
}

impl CodecConfig {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }

    pub fn with_max_frame_len(mut self, max_frame_len: u32) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }
}
