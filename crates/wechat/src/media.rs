//! Payload sniffing and the legacy single-byte XOR scheme.

use wxmedia_core::constants::WXGF_MAGIC;
use wxmedia_core::MediaFormat;

/// What a decrypted payload turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// A standard image that needs no further work.
    Image(MediaFormat),
    /// A WXGF container wrapping HEVC partitions.
    Wxgf,
    /// Nothing recognisable.
    Unknown,
}

const SIGNATURES: &[(&[u8], PayloadKind)] = &[
    (&[0xFF, 0xD8, 0xFF], PayloadKind::Image(MediaFormat::Jpeg)),
    (
        &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        PayloadKind::Image(MediaFormat::Png),
    ),
    (b"GIF89a", PayloadKind::Image(MediaFormat::Gif)),
    (b"GIF87a", PayloadKind::Image(MediaFormat::Gif)),
    (&[0x49, 0x49, 0x2A, 0x00], PayloadKind::Image(MediaFormat::Tiff)),
    (&[0x4D, 0x4D, 0x00, 0x2A], PayloadKind::Image(MediaFormat::Tiff)),
    (WXGF_MAGIC, PayloadKind::Wxgf),
    (b"BM", PayloadKind::Image(MediaFormat::Bmp)),
];

/// Classify a decrypted payload by its leading bytes.
pub fn sniff_payload(data: &[u8]) -> PayloadKind {
    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return PayloadKind::Image(MediaFormat::Webp);
    }
    SIGNATURES
        .iter()
        .find(|(signature, _)| data.starts_with(signature))
        .map(|(_, kind)| *kind)
        .unwrap_or(PayloadKind::Unknown)
}

/// Signatures shorter than this match too many arbitrary payloads to infer a key from.
const MIN_INFER_SIGNATURE_LEN: usize = 3;

/// Infer a single-byte XOR key by matching known payload signatures.
pub fn infer_xor_key(encrypted: &[u8]) -> Option<u8> {
    let first = *encrypted.first()?;

    SIGNATURES.iter().find_map(|(signature, _)| {
        if signature.len() < MIN_INFER_SIGNATURE_LEN || encrypted.len() < signature.len() {
            return None;
        }
        let candidate = first ^ signature[0];
        signature
            .iter()
            .zip(encrypted)
            .all(|(expected, byte)| byte ^ candidate == *expected)
            .then_some(candidate)
    })
}

/// Decrypt a legacy (version 0) blob: every byte XORed with one key.
///
/// `configured_key` is used when it yields a recognised payload. Otherwise the
/// key is inferred from the payload signature, so a stale configured key still
/// decrypts common images; when nothing matches `configured_key` is used anyway.
pub fn decrypt_legacy_xor(blob: &[u8], configured_key: u8) -> Vec<u8> {
    let key = if decodes_to_known_payload(blob, configured_key) {
        configured_key
    } else {
        infer_xor_key(blob).unwrap_or(configured_key)
    };
    blob.iter().map(|b| b ^ key).collect()
}

fn decodes_to_known_payload(blob: &[u8], key: u8) -> bool {
    let head: Vec<u8> = blob.iter().take(12).map(|b| b ^ key).collect();
    sniff_payload(&head) != PayloadKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_xor_key_jpeg() {
        let plain = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00];
        let key = 0xAA_u8;
        let encrypted: Vec<u8> = plain.iter().map(|b| *b ^ key).collect();
        assert_eq!(infer_xor_key(&encrypted), Some(key));
    }

    #[test]
    fn test_legacy_decrypt_png() {
        let plain = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
        let encrypted: Vec<u8> = plain.iter().map(|b| *b ^ 0x10).collect();

        let decrypted = decrypt_legacy_xor(&encrypted, 0x96);
        assert_eq!(decrypted, plain);
        assert_eq!(
            sniff_payload(&decrypted),
            PayloadKind::Image(MediaFormat::Png)
        );
    }

    #[test]
    fn test_legacy_decrypt_falls_back_to_configured_key() {
        let encrypted = vec![0x00, 0x00, 0x00];
        assert_eq!(decrypt_legacy_xor(&encrypted, 0x5A), vec![0x5A; 3]);
    }

    #[test]
    fn test_configured_key_wins_when_it_yields_a_known_payload() {
        // Only the two-byte BMP signature matches; inference ignores it.
        let plain = b"BM\x36\x00\x00\x00";
        let encrypted: Vec<u8> = plain.iter().map(|b| b ^ 0x37).collect();
        assert_eq!(decrypt_legacy_xor(&encrypted, 0x37), plain);
    }

    #[test]
    fn test_two_byte_signature_does_not_override_configured_key() {
        // p0 ^ p1 == b'B' ^ b'M', so some other key would turn the head into "BM".
        let plain = [0x10, 0x1F, 0x20, 0x30, 0x40];
        let encrypted: Vec<u8> = plain.iter().map(|b| b ^ 0x37).collect();
        assert_eq!(infer_xor_key(&encrypted), None);
        assert_eq!(decrypt_legacy_xor(&encrypted, 0x37), plain);
    }

    #[test]
    fn test_sniff_webp_and_wxgf() {
        let mut sample = b"RIFF".to_vec();
        sample.extend_from_slice(&[0, 0, 0, 0]);
        sample.extend_from_slice(b"WEBP");
        assert_eq!(
            sniff_payload(&sample),
            PayloadKind::Image(MediaFormat::Webp)
        );
        assert_eq!(sniff_payload(b"wxgf\x10rest"), PayloadKind::Wxgf);
        assert_eq!(sniff_payload(b"\x00\x01"), PayloadKind::Unknown);
        assert_eq!(sniff_payload(b""), PayloadKind::Unknown);
    }
}
