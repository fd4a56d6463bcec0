//! Recovery of WeChat media attachments from their encrypted on-disk form.
//!
//! This crate provides functionality for:
//! - Detecting the `.dat` encryption version and decrypting it
//! - Locating the HEVC partitions of a decrypted WXGF container
//! - Repairing HEVC elementary streams (parameter sets, duplicated slices)
//! - Handing repaired streams to an external decoder, with a raw fallback

#![deny(missing_docs)]
#![warn(unsafe_code)]

pub mod codec;
pub mod config;
pub mod decrypt;
pub mod error;
pub mod hevc;
pub mod media;
pub mod partition;
pub mod service;
pub mod wxgf;

pub use codec::{CodecBridge, CodecError, FfmpegBridge};
pub use config::{KeyConfig, MediaDecodeConfig};
pub use decrypt::{DatVersion, DecryptionError};
pub use error::{WeChatError, WeChatResult};
pub use service::MediaService;
pub use wxgf::decode_wxgf;
pub use wxmedia_core::{DecodedMedia, MediaFormat};
