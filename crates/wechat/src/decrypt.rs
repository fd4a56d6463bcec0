//! `.dat` media decryption (legacy XOR and the AES-ECB/XOR scheme).
//!
//! Version 1 and 2 files share one layout:
//!
//! ```text
//! +-----------+-----------------+-----------------+-----+
//! | sig (6)   | aes_size (u32le)| xor_size (u32le)| pad |   15-byte header
//! +-----------+-----------------+-----------------+-----+
//! | AES-ECB ciphertext (aes_size rounded up, PKCS#7)     |
//! | plain middle bytes                                   |
//! | trailing xor_size bytes, each XORed with one byte    |
//! +------------------------------------------------------+
//! ```

use crate::config::KeyConfig;
use crate::media::decrypt_legacy_xor;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyInit};
use thiserror::Error;
use tracing::debug;
use wxmedia_core::constants::{
    DAT_HEADER_LEN, DAT_V1_AES_KEY, DAT_V1_SIGNATURE, DAT_V2_SIGNATURE,
};

type Aes128EcbDec = ecb::Decryptor<aes::Aes128>;

const AES_BLOCK_SIZE: usize = 16;

/// Decryption failures. All are fatal for the blob at hand.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    /// Version tag outside `{0, 1, 2}`.
    #[error("unsupported dat version tag {0}")]
    UnsupportedVersion(u32),

    /// Header truncated or its sizes overrun the blob.
    #[error("malformed dat header: {0}")]
    MalformedHeader(String),

    /// AES block decrypted but its PKCS#7 padding is invalid.
    #[error("invalid PKCS#7 padding (wrong key or corrupted data)")]
    BadPadding,

    /// Key material unusable for the selected scheme.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Encryption scheme of a `.dat` blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatVersion {
    /// Legacy whole-file XOR.
    Legacy,
    /// AES-ECB/XOR under the built-in key.
    V1,
    /// AES-ECB/XOR under the configured key.
    V2,
}

impl DatVersion {
    /// Classify a blob by its leading signature.
    pub fn detect(blob: &[u8]) -> Self {
        if blob.starts_with(DAT_V1_SIGNATURE) {
            DatVersion::V1
        } else if blob.starts_with(DAT_V2_SIGNATURE) {
            DatVersion::V2
        } else {
            DatVersion::Legacy
        }
    }

    /// Integer tag used by the on-disk classifier.
    pub fn tag(self) -> u32 {
        match self {
            DatVersion::Legacy => 0,
            DatVersion::V1 => 1,
            DatVersion::V2 => 2,
        }
    }
}

impl TryFrom<u32> for DatVersion {
    type Error = DecryptionError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(DatVersion::Legacy),
            1 => Ok(DatVersion::V1),
            2 => Ok(DatVersion::V2),
            other => Err(DecryptionError::UnsupportedVersion(other)),
        }
    }
}

/// Parsed 15-byte header of a version 1/2 blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatHeader {
    /// Leading signature; diagnostics only.
    pub signature: [u8; 6],
    /// Plaintext length of the AES region.
    pub aes_size: u32,
    /// Length of the XORed trailing region.
    pub xor_size: u32,
}

impl DatHeader {
    /// Parse the header from the start of `blob`.
    pub fn parse(blob: &[u8]) -> Result<Self, DecryptionError> {
        if blob.len() < DAT_HEADER_LEN {
            return Err(DecryptionError::MalformedHeader(format!(
                "need {} header bytes, got {}",
                DAT_HEADER_LEN,
                blob.len()
            )));
        }

        let mut signature = [0u8; 6];
        signature.copy_from_slice(&blob[..6]);
        let aes_size = u32::from_le_bytes([blob[6], blob[7], blob[8], blob[9]]);
        let xor_size = u32::from_le_bytes([blob[10], blob[11], blob[12], blob[13]]);

        Ok(Self {
            signature,
            aes_size,
            xor_size,
        })
    }

    /// Length of the ciphertext region.
    ///
    /// The ciphertext always carries a padding block, so a size that is
    /// already block-aligned grows by a full block. `None` when the length
    /// does not fit in `usize`.
    pub fn aes_region_len(&self) -> Option<usize> {
        let size = usize::try_from(self.aes_size).ok()?;
        size.checked_add(AES_BLOCK_SIZE - size % AES_BLOCK_SIZE)
    }
}

/// Detect the version of `blob` and decrypt it.
pub fn decrypt(blob: &[u8], keys: &KeyConfig) -> Result<Vec<u8>, DecryptionError> {
    let version = DatVersion::detect(blob);
    debug!("dat version detected: v{}", version.tag());
    decrypt_version(blob, version, keys)
}

/// Decrypt `blob` with an externally supplied version tag.
pub fn decrypt_with_tag(
    blob: &[u8],
    tag: u32,
    keys: &KeyConfig,
) -> Result<Vec<u8>, DecryptionError> {
    let version = DatVersion::try_from(tag)?;
    decrypt_version(blob, version, keys)
}

/// Decrypt `blob` under a known version.
pub fn decrypt_version(
    blob: &[u8],
    version: DatVersion,
    keys: &KeyConfig,
) -> Result<Vec<u8>, DecryptionError> {
    match version {
        DatVersion::Legacy => Ok(decrypt_legacy_xor(blob, keys.xor_key)),
        DatVersion::V1 => decrypt_dat_v4(blob, keys.xor_key, DAT_V1_AES_KEY),
        DatVersion::V2 => {
            let aes_key = keys
                .aes_key_bytes()
                .map_err(|e| DecryptionError::InvalidKey(e.to_string()))?;
            decrypt_dat_v4(blob, keys.xor_key, &aes_key)
        }
    }
}

/// Decrypt a version 1/2 blob: AES region, plain middle, XORed tail.
pub fn decrypt_dat_v4(
    blob: &[u8],
    xor_key: u8,
    aes_key: &[u8; 16],
) -> Result<Vec<u8>, DecryptionError> {
    let header = DatHeader::parse(blob)?;
    let body = &blob[DAT_HEADER_LEN..];

    let aes_len = header.aes_region_len().ok_or_else(|| {
        DecryptionError::MalformedHeader(format!("aes size {} overflows", header.aes_size))
    })?;
    let xor_len = header.xor_size as usize;
    if aes_len > body.len() {
        return Err(DecryptionError::MalformedHeader(format!(
            "aes region of {} bytes exceeds body of {} bytes",
            aes_len,
            body.len()
        )));
    }
    if xor_len > body.len() - aes_len {
        return Err(DecryptionError::MalformedHeader(format!(
            "xor region of {} bytes overlaps the aes region",
            xor_len
        )));
    }

    let mut output = decrypt_aes_ecb_pkcs7(&body[..aes_len], aes_key)?;

    let xor_start = body.len() - xor_len;
    output.reserve(body.len() - aes_len);
    output.extend_from_slice(&body[aes_len..xor_start]);
    output.extend(body[xor_start..].iter().map(|b| b ^ xor_key));

    debug!(
        "dat v4 decrypted: sig={:02x?} aes={} xor={} out={}",
        header.signature,
        aes_len,
        xor_len,
        output.len()
    );
    Ok(output)
}

fn decrypt_aes_ecb_pkcs7(data: &[u8], key: &[u8; 16]) -> Result<Vec<u8>, DecryptionError> {
    let cipher = Aes128EcbDec::new_from_slice(key)
        .map_err(|e| DecryptionError::InvalidKey(e.to_string()))?;
    let mut buffer = data.to_vec();
    let plain = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| DecryptionError::BadPadding)?;
    Ok(plain.to_vec())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use aes::cipher::block_padding::NoPadding;
    use aes::cipher::BlockEncryptMut;
    use proptest::prelude::*;

    type Aes128EcbEnc = ecb::Encryptor<aes::Aes128>;

    const KEY: &[u8; 16] = b"0123456789abcdef";

    pub(crate) fn encrypt_ecb(plain: &[u8], key: &[u8; 16]) -> Vec<u8> {
        Aes128EcbEnc::new_from_slice(key)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plain)
    }

    pub(crate) fn build_dat(
        signature: &[u8; 6],
        plain_aes: &[u8],
        middle: &[u8],
        tail: &[u8],
        key: &[u8; 16],
        xor_key: u8,
    ) -> Vec<u8> {
        let mut blob = signature.to_vec();
        blob.extend_from_slice(&(plain_aes.len() as u32).to_le_bytes());
        blob.extend_from_slice(&(tail.len() as u32).to_le_bytes());
        blob.push(0);
        blob.extend_from_slice(&encrypt_ecb(plain_aes, key));
        blob.extend_from_slice(middle);
        blob.extend(tail.iter().map(|b| b ^ xor_key));
        blob
    }

    #[test]
    fn test_detect_version_by_signature() {
        assert_eq!(DatVersion::detect(b"\x07\x08V1\x08\x07rest"), DatVersion::V1);
        assert_eq!(DatVersion::detect(b"\x07\x08V2\x08\x07rest"), DatVersion::V2);
        assert_eq!(DatVersion::detect(&[0xFF, 0xD8]), DatVersion::Legacy);
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        assert_eq!(
            DatVersion::try_from(3),
            Err(DecryptionError::UnsupportedVersion(3))
        );
        let err = decrypt_with_tag(&[0u8; 32], 7, &KeyConfig::default()).unwrap_err();
        assert_eq!(err, DecryptionError::UnsupportedVersion(7));
    }

    #[test]
    fn test_aes_only_blob_has_no_middle_or_tail() {
        let mut plain = b"hello".to_vec();
        plain.resize(16, 0);
        let blob = build_dat(b"ABCDEF", &plain, &[], &[], KEY, 0x96);

        let header = DatHeader::parse(&blob).unwrap();
        assert_eq!(&header.signature, b"ABCDEF");
        assert_eq!(header.aes_size, 16);
        assert_eq!(header.xor_size, 0);

        let out = decrypt_dat_v4(&blob, 0x96, KEY).unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn test_middle_and_tail_regions() {
        let blob = build_dat(b"ABCDEF", b"head-bytes", b"MIDDLE", b"TAIL", KEY, 0x33);
        let out = decrypt_dat_v4(&blob, 0x33, KEY).unwrap();
        assert_eq!(out, b"head-bytesMIDDLETAIL");
    }

    #[test]
    fn test_invalid_padding_reports_bad_padding() {
        // One block whose last byte (0x11) is not a valid PKCS#7 pad length.
        let block = Aes128EcbEnc::new_from_slice(KEY)
            .unwrap()
            .encrypt_padded_vec_mut::<NoPadding>(&[0x11; 16]);
        let mut blob = b"ABCDEF".to_vec();
        blob.extend_from_slice(&5u32.to_le_bytes());
        blob.extend_from_slice(&0u32.to_le_bytes());
        blob.push(0);
        blob.extend_from_slice(&block);

        assert_eq!(
            decrypt_dat_v4(&blob, 0, KEY),
            Err(DecryptionError::BadPadding)
        );
    }

    #[test]
    fn test_aes_region_len_rounds_up_and_never_wraps() {
        let header = |aes_size| DatHeader {
            signature: *b"ABCDEF",
            aes_size,
            xor_size: 0,
        };
        assert_eq!(header(0).aes_region_len(), Some(16));
        assert_eq!(header(15).aes_region_len(), Some(16));
        assert_eq!(header(16).aes_region_len(), Some(32));

        let largest = header(u32::MAX).aes_region_len();
        #[cfg(target_pointer_width = "64")]
        assert_eq!(largest, Some(1usize << 32));
        #[cfg(target_pointer_width = "32")]
        assert_eq!(largest, None);

        let mut blob = build_dat(b"ABCDEF", b"abc", &[], &[], KEY, 0);
        blob[6..10].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decrypt_dat_v4(&blob, 0, KEY),
            Err(DecryptionError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_truncated_header_and_overrun() {
        assert!(matches!(
            decrypt_dat_v4(&[0u8; 10], 0, KEY),
            Err(DecryptionError::MalformedHeader(_))
        ));

        let mut blob = build_dat(b"ABCDEF", b"abc", &[], &[], KEY, 0);
        blob[6..10].copy_from_slice(&4096u32.to_le_bytes());
        assert!(matches!(
            decrypt_dat_v4(&blob, 0, KEY),
            Err(DecryptionError::MalformedHeader(_))
        ));

        let mut blob = build_dat(b"ABCDEF", b"abc", b"m", &[], KEY, 0);
        blob[10..14].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            decrypt_dat_v4(&blob, 0, KEY),
            Err(DecryptionError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_dispatch_uses_builtin_key_for_v1_and_configured_key_for_v2() {
        let keys = KeyConfig {
            aes_key: "0123456789abcdef".to_string(),
            xor_key: 0x11,
        };
        let v1 = build_dat(DAT_V1_SIGNATURE, b"one", b"", b"x", DAT_V1_AES_KEY, 0x11);
        let v2 = build_dat(DAT_V2_SIGNATURE, b"two", b"", b"y", KEY, 0x11);

        assert_eq!(decrypt(&v1, &keys).unwrap(), b"onex");
        assert_eq!(decrypt(&v2, &keys).unwrap(), b"twoy");
    }

    #[test]
    fn test_v2_with_unusable_key_is_invalid_key() {
        let keys = KeyConfig {
            aes_key: "bad".to_string(),
            xor_key: 0,
        };
        let v2 = build_dat(DAT_V2_SIGNATURE, b"two", b"", b"", KEY, 0);
        assert!(matches!(
            decrypt(&v2, &keys),
            Err(DecryptionError::InvalidKey(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_aes_region_roundtrips(
            key in proptest::array::uniform16(any::<u8>()),
            plain in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let blob = build_dat(b"ABCDEF", &plain, &[], &[], &key, 0);
            let out = decrypt_dat_v4(&blob, 0, &key).unwrap();
            prop_assert_eq!(out, plain);
        }
    }
}
