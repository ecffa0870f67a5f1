use image::{DynamicImage, Rgb, RgbImage};

/// An RGB8 buffer with the dimensions of the decoded source.
///
/// Whatever the source encoding (palette, 16 bits, grey, alpha), pixels are
/// re-rendered the way a 2D canvas readback would see them: fully
/// transparent pixels come out black, the others lose their alpha channel.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalImage(RgbImage);

impl CanonicalImage {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.0
    }
}

impl From<RgbImage> for CanonicalImage {
    fn from(image: RgbImage) -> CanonicalImage {
        CanonicalImage(image)
    }
}

pub fn canonicalize(image: &DynamicImage) -> CanonicalImage {
    let canonical = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            if a == 0 { Rgb([0, 0, 0]) } else { Rgb([r, g, b]) }
        })
    } else {
        image.to_rgb8()
    };
    trace!("canonical image {}x{}", canonical.width(), canonical.height());
    CanonicalImage(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgba, RgbaImage};

    #[test]
    fn dimensions_are_preserved() {
        for (w, h) in [(1, 1), (3, 5), (640, 480)] {
            let image = DynamicImage::ImageRgb8(RgbImage::new(w, h));
            let canonical = canonicalize(&image);
            assert_eq!((canonical.width(), canonical.height()), (w, h));
        }
    }

    #[test]
    fn transparency_is_flattened() {
        let mut rgba = RgbaImage::from_pixel(2, 1, Rgba([90, 80, 70, 0]));
        rgba.put_pixel(1, 0, Rgba([90, 80, 70, 128]));
        let canonical = canonicalize(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(canonical.pixels().get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(canonical.pixels().get_pixel(1, 0), &Rgb([90, 80, 70]));
    }

    #[test]
    fn grey_and_wide_pixels_become_rgb8() {
        let grey: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_pixel(2, 2, Luma([77]));
        let canonical = canonicalize(&DynamicImage::ImageLuma8(grey));
        assert_eq!(canonical.pixels().get_pixel(1, 1), &Rgb([77, 77, 77]));

        let wide: ImageBuffer<Rgb<u16>, Vec<u16>> =
            ImageBuffer::from_pixel(1, 1, Rgb([u16::MAX, 0, 257 * 10]));
        let canonical = canonicalize(&DynamicImage::ImageRgb16(wide));
        assert_eq!(canonical.pixels().get_pixel(0, 0), &Rgb([255, 0, 10]));
    }
}
