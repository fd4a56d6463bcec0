//! HEVC (H.265) Annex-B stream repair.
//!
//! WXGF partitions are raw HEVC fragments that a generic decoder often
//! rejects as-is: parameter sets may live in a different partition, and
//! encoders sometimes repeat the leading slice segment of a picture.
//!
//! # HEVC NAL header (2 bytes)
//! ```text
//! +---------------------------------------------------+
//! | forbidden(1) | type(6) | layer_id(6) | tid_plus1(3) |
//! +---------------------------------------------------+
//! ```

use std::borrow::Cow;
use tracing::trace;

/// Four-byte Annex-B start code; used for every NALU this module emits.
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

const SHORT_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];

/// Video parameter set.
pub const NAL_VPS: u8 = 32;
/// Sequence parameter set.
pub const NAL_SPS: u8 = 33;
/// Picture parameter set.
pub const NAL_PPS: u8 = 34;

/// Parameter-set types in the order a decoder needs them.
pub const PARAMETER_SET_TYPES: [u8; 3] = [NAL_VPS, NAL_SPS, NAL_PPS];

/// A NAL unit borrowed from an Annex-B stream, without its start code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// NAL unit type, bits 1..=6 of the first header byte.
    pub fn nal_type(&self) -> u8 {
        nal_type(self.data)
    }

    /// TRAIL_N ..= CRA_NUT.
    pub fn is_slice(&self) -> bool {
        self.nal_type() <= 21
    }

    /// VPS, SPS or PPS.
    pub fn is_parameter_set(&self) -> bool {
        PARAMETER_SET_TYPES.contains(&self.nal_type())
    }

    /// Raw bytes including the 2-byte header.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// `first_slice_segment_in_pic_flag` of a slice segment header.
    ///
    /// Units too short to carry a slice header report `false`.
    pub fn first_slice_segment_in_pic(&self) -> bool {
        if self.data.len() <= 2 {
            return false;
        }
        remove_emulation_prevention(&self.data[2..])
            .first()
            .is_some_and(|byte| byte & 0x80 != 0)
    }
}

/// NAL unit type of a raw NALU (`(first_byte >> 1) & 0x3F`).
///
/// Callers guarantee a non-empty unit; an empty slice reports type 0.
pub fn nal_type(nalu: &[u8]) -> u8 {
    nalu.first().map(|b| (b >> 1) & 0x3F).unwrap_or(0)
}

/// Split an Annex-B stream into NAL units.
///
/// Both start-code widths are recognised, even mixed within one stream.
/// Bytes before the first start code and empty units are dropped.
pub fn split_annexb(data: &[u8]) -> Vec<NalUnit<'_>> {
    let mut nalus = Vec::new();
    let mut start: Option<usize> = None;
    let mut i = 0;

    while i < data.len() {
        let code_len = if data[i..].starts_with(&START_CODE) {
            START_CODE.len()
        } else if data[i..].starts_with(&SHORT_START_CODE) {
            SHORT_START_CODE.len()
        } else {
            i += 1;
            continue;
        };

        if let Some(begin) = start {
            nalus.push(&data[begin..i]);
        }
        i += code_len;
        start = Some(i);
    }
    if let Some(begin) = start {
        nalus.push(&data[begin..]);
    }

    nalus
        .into_iter()
        .filter(|nalu| !nalu.is_empty())
        .map(|data| NalUnit { data })
        .collect()
}

/// Remove emulation-prevention bytes: every `00 00 03` becomes `00 00`.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 3 {
            out.push(0);
            out.push(0);
            i += 3;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    out
}

/// Distinct VPS/SPS/PPS units pooled from every partition of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSetTable<'a> {
    vps: Vec<&'a [u8]>,
    sps: Vec<&'a [u8]>,
    pps: Vec<&'a [u8]>,
}

impl<'a> ParameterSetTable<'a> {
    /// Collect parameter sets from a sequence of Annex-B chunks.
    pub fn collect<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut table = Self::default();
        for chunk in chunks {
            for nalu in split_annexb(chunk) {
                table.insert(nalu);
            }
        }
        table
    }

    /// Record a parameter set unless an identical one is already known.
    ///
    /// Returns `true` when the unit was added.
    pub fn insert(&mut self, nalu: NalUnit<'a>) -> bool {
        let Some(list) = self.list_mut(nalu.nal_type()) else {
            return false;
        };
        if list.contains(&nalu.as_bytes()) {
            return false;
        }
        list.push(nalu.as_bytes());
        true
    }

    /// Known units of one parameter-set type, in first-seen order.
    pub fn get(&self, nal_type: u8) -> &[&'a [u8]] {
        match nal_type {
            NAL_VPS => &self.vps,
            NAL_SPS => &self.sps,
            NAL_PPS => &self.pps,
            _ => &[],
        }
    }

    /// Total number of stored units.
    pub fn len(&self) -> usize {
        self.vps.len() + self.sps.len() + self.pps.len()
    }

    /// Whether nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn list_mut(&mut self, nal_type: u8) -> Option<&mut Vec<&'a [u8]>> {
        match nal_type {
            NAL_VPS => Some(&mut self.vps),
            NAL_SPS => Some(&mut self.sps),
            NAL_PPS => Some(&mut self.pps),
            _ => None,
        }
    }
}

/// Prefix any parameter-set type missing from `stream` with the table's units.
///
/// Returns the input untouched (borrowed) when all three types are present or
/// the table has nothing to contribute.
pub fn ensure_parameter_sets<'s>(
    stream: &'s [u8],
    table: &ParameterSetTable<'_>,
) -> Cow<'s, [u8]> {
    let nalus = split_annexb(stream);
    let missing: Vec<u8> = PARAMETER_SET_TYPES
        .into_iter()
        .filter(|ty| !nalus.iter().any(|nalu| nalu.nal_type() == *ty))
        .collect();
    if missing.is_empty() {
        return Cow::Borrowed(stream);
    }

    let mut prefix = Vec::new();
    for ty in missing {
        for nalu in table.get(ty) {
            prefix.extend_from_slice(&START_CODE);
            prefix.extend_from_slice(nalu);
        }
    }
    if prefix.is_empty() {
        return Cow::Borrowed(stream);
    }

    trace!(
        "hevc: prepended {} bytes of parameter sets to {} byte stream",
        prefix.len(),
        stream.len()
    );
    prefix.extend_from_slice(stream);
    Cow::Owned(prefix)
}

/// Drop repeated leading slice segments.
///
/// The first slice NALU is always kept; a later slice whose
/// `first_slice_segment_in_pic_flag` is set starts the same picture again and
/// is dropped. When nothing is dropped the input is returned borrowed, so
/// callers can detect that a retry with the unfixed stream is pointless.
pub fn fix_slice_headers(stream: &[u8]) -> Cow<'_, [u8]> {
    let nalus = split_annexb(stream);

    let mut kept = Vec::with_capacity(nalus.len());
    let mut first_slice_seen = false;
    for nalu in &nalus {
        if !nalu.is_slice() {
            kept.push(*nalu);
        } else if !first_slice_seen {
            first_slice_seen = true;
            kept.push(*nalu);
        } else if !nalu.first_slice_segment_in_pic() {
            kept.push(*nalu);
        }
    }

    let dropped = nalus.len() - kept.len();
    trace!("hevc slices: total={} dropped_dups={}", nalus.len(), dropped);
    if dropped == 0 {
        return Cow::Borrowed(stream);
    }

    let capacity = kept.iter().map(|n| n.as_bytes().len() + START_CODE.len()).sum();
    let mut fixed = Vec::with_capacity(capacity);
    for nalu in kept {
        fixed.extend_from_slice(&START_CODE);
        fixed.extend_from_slice(nalu.as_bytes());
    }
    Cow::Owned(fixed)
}
