#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ImageType {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageType {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

/// Sniffs the image type from magic bytes, `None` for anything unsupported.
pub fn detect_image_type(data: &[u8]) -> Option<ImageType> {
    const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
    const GIF87_SIGNATURE: &[u8] = b"GIF87a";
    const GIF89_SIGNATURE: &[u8] = b"GIF89a";

    if data.len() < 8 {
        return None;
    }

    if data.starts_with(PNG_SIGNATURE) {
        Some(ImageType::Png)
    } else if data.starts_with(JPEG_SIGNATURE) {
        Some(ImageType::Jpeg)
    } else if data.starts_with(GIF87_SIGNATURE) || data.starts_with(GIF89_SIGNATURE) {
        Some(ImageType::Gif)
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        Some(ImageType::Webp)
    } else {
        None
    }
}
