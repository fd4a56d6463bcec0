//! Configuration for WeChat media recovery.

use crate::error::{WeChatError, WeChatResult};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use wxmedia_core::constants::{
    DAT_V1_AES_KEY, DEFAULT_FFMPEG_BINARY, DEFAULT_XOR_KEY, FFMPEG_PATH_ENV, WXGF_DEBUG_ENV,
};
use wxmedia_core::LoggingConfig;

static GLOBAL_CONFIG: Lazy<MediaDecodeConfig> = Lazy::new(MediaDecodeConfig::from_env);

/// Keys used by the `.dat` decryption schemes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Version 2 AES key: 16 raw characters or 32 hex characters.
    pub aes_key: String,
    /// Single-byte XOR key for the trailing region and the legacy scheme.
    pub xor_key: u8,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            aes_key: String::from_utf8_lossy(DAT_V1_AES_KEY).into_owned(),
            xor_key: DEFAULT_XOR_KEY,
        }
    }
}

impl KeyConfig {
    /// Resolve the configured AES key into its 16 key bytes.
    pub fn aes_key_bytes(&self) -> WeChatResult<[u8; 16]> {
        let raw = self.aes_key.trim();
        if raw.len() == 16 {
            let mut key = [0u8; 16];
            key.copy_from_slice(raw.as_bytes());
            return Ok(key);
        }

        let decoded = normalize_hex_key(raw, 32, "aes_key")?;
        let mut key = [0u8; 16];
        key.copy_from_slice(&decoded);
        Ok(key)
    }
}

/// Process-wide settings for the media pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MediaDecodeConfig {
    /// Explicit path to the external decoder; `ffmpeg` on `PATH` otherwise.
    pub ffmpeg_path: Option<PathBuf>,
    /// Emit per-partition and per-slice diagnostics.
    pub debug: bool,
    /// Decryption keys.
    pub keys: KeyConfig,
    /// Logging setup for hosts that let this crate install a subscriber.
    pub logging: LoggingConfig,
}

impl MediaDecodeConfig {
    /// Defaults overlaid with `FFMPEG_PATH` and `WXGF_DEBUG`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> WeChatResult<Self> {
        let mut config: Self = wxmedia_core::config::load_toml(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Configuration read once for the lifetime of the process.
    pub fn global() -> &'static MediaDecodeConfig {
        &GLOBAL_CONFIG
    }

    /// Check that the configured keys are usable.
    pub fn validate(&self) -> WeChatResult<()> {
        self.keys.aes_key_bytes().map(|_| ())
    }

    /// Decoder binary to spawn.
    pub fn ffmpeg_binary(&self) -> &Path {
        self.ffmpeg_path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_FFMPEG_BINARY))
    }

    fn apply_env(&mut self) {
        if let Some(path) = std::env::var_os(FFMPEG_PATH_ENV).filter(|v| !v.is_empty()) {
            self.ffmpeg_path = Some(PathBuf::from(path));
        }
        if let Ok(value) = std::env::var(WXGF_DEBUG_ENV) {
            self.debug = parse_flag(&value);
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn normalize_hex_key(raw: &str, expected_len: usize, label: &str) -> WeChatResult<Vec<u8>> {
    let mut value = raw.trim().to_ascii_lowercase();
    if let Some(rest) = value.strip_prefix("0x") {
        value = rest.to_string();
    }
    if value.len() != expected_len {
        return Err(WeChatError::Config(format!(
            "{} must be 16 characters or {} hex chars, got {}",
            label,
            expected_len,
            value.len()
        )));
    }
    if !value.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(WeChatError::Config(format!(
            "{} contains non-hex characters",
            label
        )));
    }
    hex::decode(value).map_err(|e| WeChatError::Config(format!("{} decode failed: {}", label, e)))
}
