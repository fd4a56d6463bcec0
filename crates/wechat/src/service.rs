//! End-to-end media recovery: encrypted `.dat` blob in, image bytes out.

use crate::codec::{CodecBridge, FfmpegBridge};
use crate::config::MediaDecodeConfig;
use crate::decrypt::{decrypt, decrypt_with_tag};
use crate::error::{WeChatError, WeChatResult};
use crate::media::{sniff_payload, PayloadKind};
use crate::wxgf::WxgfDecoder;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wxmedia_core::{DecodedMedia, MediaFormat};

/// Media recovery service.
///
/// Cheap to clone; clones share the codec bridge and its availability check.
#[derive(Clone)]
pub struct MediaService {
    config: MediaDecodeConfig,
    codec: Arc<dyn CodecBridge>,
}

impl MediaService {
    /// Create a service that decodes through the configured `ffmpeg`.
    ///
    /// Services naming the same binary share one bridge and its availability check.
    pub fn new(config: MediaDecodeConfig) -> Self {
        let codec = FfmpegBridge::from_config(&config);
        Self::with_codec(config, codec)
    }

    /// Create a service with an explicit codec bridge.
    pub fn with_codec(config: MediaDecodeConfig, codec: Arc<dyn CodecBridge>) -> Self {
        Self { config, codec }
    }

    /// Active configuration.
    pub fn config(&self) -> &MediaDecodeConfig {
        &self.config
    }

    /// Decrypt a blob, detecting its version from the header.
    pub fn decode(&self, blob: &[u8]) -> WeChatResult<DecodedMedia> {
        let plain = decrypt(blob, &self.config.keys)?;
        self.decode_payload(plain)
    }

    /// Decrypt a blob whose version tag is known from elsewhere.
    pub fn decode_with_tag(&self, blob: &[u8], tag: u32) -> WeChatResult<DecodedMedia> {
        let plain = decrypt_with_tag(blob, tag, &self.config.keys)?;
        self.decode_payload(plain)
    }

    /// Read and decode a `.dat` file.
    ///
    /// Decryption and codec calls run on the blocking pool.
    pub async fn decode_file(&self, path: &Path) -> WeChatResult<DecodedMedia> {
        let blob = tokio::fs::read(path).await?;
        info!("Decoding {} ({} bytes)", path.display(), blob.len());

        let service = self.clone();
        tokio::task::spawn_blocking(move || service.decode(&blob))
            .await
            .map_err(|e| WeChatError::Internal(anyhow::anyhow!("decode task failed: {}", e)))?
    }

    fn decode_payload(&self, plain: Vec<u8>) -> WeChatResult<DecodedMedia> {
        match sniff_payload(&plain) {
            PayloadKind::Wxgf => WxgfDecoder::new(self.codec.as_ref())
                .with_debug(self.config.debug)
                .decode(&plain),
            PayloadKind::Image(format) => {
                debug!("Decrypted payload is {:?}", format);
                Ok(DecodedMedia::new(plain, format))
            }
            PayloadKind::Unknown => {
                warn!(
                    "Unrecognised payload ({} bytes); returning it as binary",
                    plain.len()
                );
                Ok(DecodedMedia::new(plain, MediaFormat::Binary))
            }
        }
    }
}
