//! WXGF container decoding.
//!
//! Partitions are located, their HEVC streams repaired, and the external
//! codec asked for a JPEG (single picture) or an animated GIF (interleaved
//! mask/color frames). Every codec failure degrades to returning the
//! repaired raw stream as `bin`; only structural problems with the
//! container itself are errors.

use crate::codec::{CodecBridge, CodecError, FfmpegBridge};
use crate::config::MediaDecodeConfig;
use crate::error::{WeChatError, WeChatResult};
use crate::hevc::{ensure_parameter_sets, fix_slice_headers, ParameterSetTable};
use crate::partition::{find_partitions, PartitionSet};
use std::borrow::Cow;
use tracing::{debug, info, warn};
use wxmedia_core::constants::{WXGF_MAGIC, WXGF_MIN_LEN};
use wxmedia_core::{DecodedMedia, MediaFormat};

/// Decode a WXGF payload with the process-wide codec and configuration.
pub fn decode_wxgf(payload: &[u8]) -> WeChatResult<DecodedMedia> {
    WxgfDecoder::new(FfmpegBridge::shared()).decode(payload)
}

/// WXGF decoder bound to one codec bridge.
pub struct WxgfDecoder<'c> {
    codec: &'c dyn CodecBridge,
    debug: bool,
}

impl<'c> WxgfDecoder<'c> {
    /// Decoder using `codec`, with diagnostics taken from the global configuration.
    pub fn new(codec: &'c dyn CodecBridge) -> Self {
        Self {
            codec,
            debug: MediaDecodeConfig::global().debug,
        }
    }

    /// Override partition/stream diagnostics.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Decode one decrypted WXGF payload.
    ///
    /// Fails only when the payload is not a WXGF container or holds no
    /// partition; codec trouble yields `MediaFormat::Binary` instead.
    pub fn decode(&self, payload: &[u8]) -> WeChatResult<DecodedMedia> {
        if payload.len() < WXGF_MIN_LEN || !payload.starts_with(WXGF_MAGIC) {
            return Err(WeChatError::InvalidFormat("invalid wxgf header".to_string()));
        }

        let partitions = find_partitions(payload)?;
        if self.debug {
            partitions.describe();
        }

        let slices = partitions.slices(payload);
        let table = ParameterSetTable::collect(slices.iter().copied());
        if self.debug {
            debug!("wxgf parameter sets collected: {}", table.len());
        }

        if partitions.like_anime() {
            Ok(self.decode_animated(&slices, &table))
        } else {
            Ok(self.decode_static(payload, &partitions, &table))
        }
    }

    fn decode_static(
        &self,
        payload: &[u8],
        partitions: &PartitionSet,
        table: &ParameterSetTable<'_>,
    ) -> DecodedMedia {
        let ensured = ensure_parameter_sets(partitions.primary().bytes(payload), table);

        let jpeg = {
            let fixed = fix_slice_headers(&ensured);
            if self.debug {
                debug!(
                    "wxgf static stream: ensured={} fixed={}",
                    ensured.len(),
                    fixed.len()
                );
            }
            let mut candidates: Vec<&[u8]> = vec![fixed.as_ref()];
            if is_changed(&fixed) {
                candidates.push(ensured.as_ref());
            }
            first_success(self.codec, "static", &candidates, |stream| {
                self.codec.decode_static(stream)
            })
        };

        match jpeg {
            Some(data) => DecodedMedia::new(data, MediaFormat::Jpeg),
            None => DecodedMedia::new(ensured.into_owned(), MediaFormat::Binary),
        }
    }

    fn decode_animated(&self, slices: &[&[u8]], table: &ParameterSetTable<'_>) -> DecodedMedia {
        // Masks sit at even indexes, color frames at odd ones.
        let mut ensured_color = Vec::new();
        let mut ensured_mask = Vec::new();
        for (idx, slice) in slices.iter().enumerate() {
            let ensured = ensure_parameter_sets(slice, table);
            if idx % 2 == 0 {
                ensured_mask.push(ensured);
            } else {
                ensured_color.push(ensured);
            }
        }
        info!(
            "wxgf animation: color_frames={} mask_frames={}",
            ensured_color.len(),
            ensured_mask.len()
        );

        let gif = {
            let fixed_color: Vec<Cow<'_, [u8]>> =
                ensured_color.iter().map(|f| fix_slice_headers(f)).collect();
            let fixed_mask: Vec<Cow<'_, [u8]>> =
                ensured_mask.iter().map(|f| fix_slice_headers(f)).collect();

            let mut candidates = vec![(as_slices(&fixed_color), as_slices(&fixed_mask))];
            if fixed_color.iter().chain(&fixed_mask).any(is_changed) {
                candidates.push((as_slices(&ensured_color), as_slices(&ensured_mask)));
            }
            first_success(self.codec, "animated", &candidates, |(color, mask)| {
                self.codec.decode_animated(color, mask)
            })
        };

        match gif {
            Some(data) => DecodedMedia::new(data, MediaFormat::Gif),
            None => DecodedMedia::new(ensured_color.concat(), MediaFormat::Binary),
        }
    }
}

/// Run `decode` over each candidate in turn and keep the first success.
fn first_success<T>(
    codec: &dyn CodecBridge,
    kind: &str,
    candidates: &[T],
    mut decode: impl FnMut(&T) -> Result<Vec<u8>, CodecError>,
) -> Option<Vec<u8>> {
    if !codec.available() {
        warn!("FFmpeg unavailable; returning raw {} wxgf stream", kind);
        return None;
    }

    for (attempt, candidate) in candidates.iter().enumerate() {
        match decode(candidate) {
            Ok(data) => return Some(data),
            Err(CodecError::Unavailable) => {
                warn!("FFmpeg became unavailable during {} attempt {}", kind, attempt + 1);
                return None;
            }
            Err(e) => warn!("FFmpeg {} attempt {} failed: {}", kind, attempt + 1, e),
        }
    }
    None
}

fn is_changed(stream: &Cow<'_, [u8]>) -> bool {
    matches!(stream, Cow::Owned(_))
}

fn as_slices<'a>(frames: &'a [Cow<'_, [u8]>]) -> Vec<&'a [u8]> {
    frames.iter().map(|f| f.as_ref()).collect()
}
