use serde::Deserialize;
use std::fs;
use std::path::Path;
use wirerpc_codec::CodecConfig;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:4250";

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub codec: CodecConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

impl AppConfig {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, DEFAULT_LISTEN};
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").expect("empty config");
        assert_eq!(config.server.listen, DEFAULT_LISTEN);
        assert_eq!(config.codec, wirerpc_codec::CodecConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = AppConfig::from_toml(
            r#"
[server]
listen = "0.0.0.0:9000"

[codec]
max_frame_len = 4096
"#,
        )
        .expect("config");
        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert_eq!(config.codec.max_frame_len, 4096);
        assert_eq!(config.codec.read_buffer_capacity, 8 * 1024);
    }

    #[test]
    fn unknown_codec_keys_are_rejected() {
        assert!(AppConfig::from_toml("[codec]\nmax_frame = 1\n").is_err());
    }

    #[test]
    fn from_path_reports_invalid_toml_as_invalid_data() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[server\nlisten = ").expect("write");
        let err = AppConfig::from_path(file.path()).expect_err("broken toml");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
