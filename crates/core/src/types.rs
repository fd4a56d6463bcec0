use serde::{Deserialize, Serialize};

/// Media formats produced by the recovery pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaFormat {
    /// JPEG image.
    Jpeg,

    /// PNG image.
    Png,

    /// GIF image (static or animated).
    Gif,

    /// WEBP image.
    Webp,

    /// BMP image.
    Bmp,

    /// TIFF image.
    Tiff,

    /// Undecoded bytes, e.g. a repaired HEVC stream the codec could not render.
    Binary,
}

impl MediaFormat {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "jpg",
            MediaFormat::Png => "png",
            MediaFormat::Gif => "gif",
            MediaFormat::Webp => "webp",
            MediaFormat::Bmp => "bmp",
            MediaFormat::Tiff => "tiff",
            MediaFormat::Binary => "bin",
        }
    }

    /// MIME type the serving layer should attach to the bytes.
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::Png => "image/png",
            MediaFormat::Gif => "image/gif",
            MediaFormat::Webp => "image/webp",
            MediaFormat::Bmp => "image/bmp",
            MediaFormat::Tiff => "image/tiff",
            MediaFormat::Binary => "application/octet-stream",
        }
    }

    /// Look a format up by extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        [
            MediaFormat::Jpeg,
            MediaFormat::Png,
            MediaFormat::Gif,
            MediaFormat::Webp,
            MediaFormat::Bmp,
            MediaFormat::Tiff,
            MediaFormat::Binary,
        ]
        .into_iter()
        .find(|format| format.extension().eq_ignore_ascii_case(ext))
        .or_else(|| ext.eq_ignore_ascii_case("jpeg").then_some(MediaFormat::Jpeg))
    }
}

/// Recovered media bytes plus the format they should be served as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMedia {
    /// Output bytes, owned by the caller.
    pub data: Vec<u8>,

    /// Format of `data`.
    pub format: MediaFormat,
}

impl DecodedMedia {
    /// Wrap bytes with their format.
    pub fn new(data: Vec<u8>, format: MediaFormat) -> Self {
        Self { data, format }
    }

    /// Extension token (`jpg`, `gif`, `bin`, ...).
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    /// Split into `(bytes, extension)`.
    pub fn into_parts(self) -> (Vec<u8>, &'static str) {
        let ext = self.format.extension();
        (self.data, ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_lookup_is_case_insensitive() {
        assert_eq!(MediaFormat::from_extension("JPG"), Some(MediaFormat::Jpeg));
        assert_eq!(MediaFormat::from_extension(".jpeg"), Some(MediaFormat::Jpeg));
        assert_eq!(MediaFormat::from_extension("bin"), Some(MediaFormat::Binary));
        assert_eq!(MediaFormat::from_extension("mp4"), None);
    }

    #[test]
    fn test_decoded_media_into_parts() {
        let media = DecodedMedia::new(vec![1, 2, 3], MediaFormat::Gif);
        assert_eq!(media.extension(), "gif");
        assert_eq!(media.format.mime_type(), "image/gif");
        assert_eq!(media.into_parts(), (vec![1, 2, 3], "gif"));
    }
}
