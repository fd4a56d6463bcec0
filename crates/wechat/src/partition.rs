//! WXGF container partitioning.
//!
//! A WXGF payload is a short header followed by HEVC fragments. Each fragment
//! starts with an Annex-B start code and is preceded by its big-endian `u32`
//! length, so a partition is found by locating a start code and reading the
//! four bytes before it.

use crate::error::{WeChatError, WeChatResult};
use tracing::debug;
use wxmedia_core::constants::ANIME_MAX_RATIO;

/// Start-code patterns in priority order.
const PATTERNS: [&[u8]; 2] = [&[0x00, 0x00, 0x00, 0x01], &[0x00, 0x00, 0x01]];

/// One length-prefixed region of a container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partition {
    /// Index of the start code within the payload.
    pub offset: usize,
    /// Length read from the big-endian prefix.
    pub size: usize,
    /// `size / payload_len`, in `(0, 1]`.
    pub ratio: f64,
}

impl Partition {
    /// Byte range of this partition within `payload`.
    pub fn bytes<'a>(&self, payload: &'a [u8]) -> &'a [u8] {
        &payload[self.offset..self.offset + self.size]
    }
}

/// Every partition of a container plus classification metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSet {
    /// Partitions in scan order (strictly increasing offsets).
    pub partitions: Vec<Partition>,
    /// Index of the partition with the greatest ratio (first one on ties).
    pub max_index: usize,
    /// Ratio of that partition.
    pub max_ratio: f64,
}

impl PartitionSet {
    /// Whether the container holds interleaved mask/color frames.
    pub fn like_anime(&self) -> bool {
        self.partitions.len() > 1 && self.max_ratio < ANIME_MAX_RATIO
    }

    /// The dominant partition.
    pub fn primary(&self) -> &Partition {
        &self.partitions[self.max_index]
    }

    /// Slices of every partition, in scan order.
    pub fn slices<'a>(&self, payload: &'a [u8]) -> Vec<&'a [u8]> {
        self.partitions.iter().map(|p| p.bytes(payload)).collect()
    }

    /// Log every partition; used when WXGF diagnostics are enabled.
    pub fn describe(&self) {
        debug!(
            "wxgf partitions: count={} max_index={} max_ratio={:.3}",
            self.partitions.len(),
            self.max_index,
            self.max_ratio
        );
        for (idx, part) in self.partitions.iter().enumerate() {
            debug!(
                "  #{:02} offset={} size={} ratio={:.3}",
                idx, part.offset, part.size, part.ratio
            );
        }
    }
}

/// Locate every partition of a WXGF payload.
pub fn find_partitions(payload: &[u8]) -> WeChatResult<PartitionSet> {
    let header_len = match payload.get(4) {
        Some(&len) if (len as usize) < payload.len() => len as usize,
        _ => {
            return Err(WeChatError::InvalidFormat(
                "invalid wxgf header".to_string(),
            ))
        }
    };

    PATTERNS
        .iter()
        .find_map(|pattern| scan(payload, header_len, pattern))
        .ok_or_else(|| WeChatError::InvalidFormat("no valid partition found".to_string()))
}

fn scan(payload: &[u8], header_len: usize, pattern: &[u8]) -> Option<PartitionSet> {
    let total = payload.len();
    let mut partitions: Vec<Partition> = Vec::new();
    let mut max_index = 0;
    let mut max_ratio = f64::MIN;
    let mut pos = header_len;

    while pos < total {
        let Some(idx) = find_pattern(payload, pattern, pos) else {
            break;
        };
        if idx < 4 {
            pos = idx + 1;
            continue;
        }

        let size = u32::from_be_bytes([
            payload[idx - 4],
            payload[idx - 3],
            payload[idx - 2],
            payload[idx - 1],
        ]) as usize;
        if size == 0 || size > total - idx {
            pos = idx + 1;
            continue;
        }

        let ratio = size as f64 / total as f64;
        partitions.push(Partition {
            offset: idx,
            size,
            ratio,
        });
        if ratio > max_ratio {
            max_ratio = ratio;
            max_index = partitions.len() - 1;
        }
        pos = idx + size;
    }

    if partitions.is_empty() {
        return None;
    }
    Some(PartitionSet {
        partitions,
        max_index,
        max_ratio,
    })
}

fn find_pattern(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|rel| from + rel)
}
