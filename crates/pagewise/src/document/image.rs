use image::GenericImageView;

use super::PageImage;
use crate::error::ExtractError;

/// Validates an uploaded image and wraps it as page 1.
pub fn page_image(bytes: &[u8]) -> Result<PageImage, ExtractError> {
    let format = image::guess_format(bytes)
        .map_err(|e| ExtractError::Image(format!("Unrecognised image data: {}", e)))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ExtractError::Image(format!("Failed to load image: {}", e)))?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ExtractError::Image("Image has no pixels".to_string()));
    }
    tracing::debug!(width, height, ?format, "Decoded page image");

    Ok(PageImage {
        page: 1,
        mime_type: format.to_mime_type().to_string(),
        bytes: bytes.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_png_page() {
        let page = page_image(&png(4, 3)).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.mime_type, "image/png");
        assert!(!page.bytes.is_empty());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            page_image(b"definitely not an image"),
            Err(ExtractError::Image(_))
        ));
    }
}
