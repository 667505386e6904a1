//! Content-type detection for uploaded images.

use std::path::Path;

/// Image formats Slides accepts for `createImage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Identify a format from its signature bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0x89, b'P', b'N', b'G', ..] => Some(Self::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [b'G', b'I', b'F', b'8', ..] => Some(Self::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}

/// Content type to store `bytes` under, read from `path`.
///
/// Signature bytes win over the extension; if neither is recognised the
/// object is labelled `image/png`.
pub fn upload_content_type(bytes: &[u8], path: &Path) -> &'static str {
    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension);

    match (ImageFormat::sniff(bytes), by_extension) {
        (Some(sniffed), Some(named)) if sniffed != named => {
            tracing::debug!(
                "{} has a {:?} extension but {:?} content",
                path.display(),
                named,
                sniffed
            );
            sniffed.content_type()
        }
        (Some(format), _) | (None, Some(format)) => format.content_type(),
        (None, None) => {
            tracing::warn!(
                "Unrecognized image {} (first 4 bytes: {:02X?}), uploading as image/png",
                path.display(),
                &bytes[..bytes.len().min(4)]
            );
            ImageFormat::Png.content_type()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_signatures() {
        assert_eq!(ImageFormat::sniff(b"\x89PNG\r\n\x1a\n"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::sniff(b"GIF89a"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageFormat::Webp));
        assert_eq!(ImageFormat::sniff(b"RIFF\0\0\0\0WAVE"), None);
        assert_eq!(ImageFormat::sniff(&[]), None);
    }

    #[test]
    fn test_extension_lookup_ignores_case_and_dot() {
        assert_eq!(ImageFormat::from_extension(".JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("webp"), Some(ImageFormat::Webp));
        assert_eq!(ImageFormat::from_extension("svg"), None);
    }

    #[test]
    fn test_content_beats_extension() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xDB];
        assert_eq!(upload_content_type(&jpeg, Path::new("cat.png")), "image/jpeg");
    }

    #[test]
    fn test_extension_used_when_bytes_are_unknown() {
        assert_eq!(upload_content_type(b"????", Path::new("cat.gif")), "image/gif");
    }

    #[test]
    fn test_unknown_falls_back_to_png() {
        assert_eq!(upload_content_type(&[0, 1, 2, 3], Path::new("cat")), "image/png");
        assert_eq!(upload_content_type(&[], Path::new("cat.bin")), "image/png");
    }
}
