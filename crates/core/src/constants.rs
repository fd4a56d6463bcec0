//! Format constants and configuration defaults.

/// Magic prefix of a decrypted WXGF container.
pub const WXGF_MAGIC: &[u8; 4] = b"wxgf";

/// Smallest buffer accepted as a WXGF container.
pub const WXGF_MIN_LEN: usize = 15;

/// A container is animated only when no partition reaches this share of the payload.
pub const ANIME_MAX_RATIO: f64 = 0.6;

/// Signature of version 1 `.dat` files (`07 08 V1 08 07`).
pub const DAT_V1_SIGNATURE: &[u8; 6] = b"\x07\x08V1\x08\x07";

/// Signature of version 2 `.dat` files (`07 08 V2 08 07`).
pub const DAT_V2_SIGNATURE: &[u8; 6] = b"\x07\x08V2\x08\x07";

/// Length of the version 1/2 `.dat` header.
pub const DAT_HEADER_LEN: usize = 15;

/// Built-in AES key of version 1 `.dat` files.
///
/// This is a format constant, not a secret.
pub const DAT_V1_AES_KEY: &[u8; 16] = b"74bfac6b0767bfc5";

/// Default single-byte XOR key for the trailing region and the legacy scheme.
pub const DEFAULT_XOR_KEY: u8 = 0x96;

/// Environment variable overriding the external decoder path.
pub const FFMPEG_PATH_ENV: &str = "FFMPEG_PATH";

/// Environment variable enabling WXGF diagnostics.
pub const WXGF_DEBUG_ENV: &str = "WXGF_DEBUG";

/// Decoder binary looked up on `PATH` when no override is set.
pub const DEFAULT_FFMPEG_BINARY: &str = "ffmpeg";
