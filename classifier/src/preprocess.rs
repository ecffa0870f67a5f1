//! Canonical image to model input tensor.
//!
//! The transformation is fixed and ordered: nearest-neighbour resize, u8 to
//! f32, scale, mean subtraction, std division, batch axis, NHWC to NCHW. The
//! result is not clamped: normalized values routinely fall outside `[0, 1]`.

use image::{Rgb, RgbImage};
use tract_onnx::prelude::*;
use tract_onnx::prelude::tract_ndarray::{Array1, Array3, Axis};

use crate::config::ClassifierConfig;
use crate::errors::{ClassifierError, ClassifierResult};
use crate::normalizer::CanonicalImage;

#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessor {
    pub size: u32,
    pub scale: f32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for Preprocessor {
    fn default() -> Preprocessor {
        Preprocessor::new(&ClassifierConfig::default())
    }
}

impl Preprocessor {
    pub fn new(config: &ClassifierConfig) -> Preprocessor {
        Preprocessor {
            size: config.input_size,
            scale: config.scale,
            mean: config.mean,
            std: config.std,
        }
    }

    /// Shape of the tensor produced by [`Preprocessor::to_tensor`].
    pub fn input_shape(&self) -> [usize; 4] {
        [1, 3, self.size as usize, self.size as usize]
    }

    pub fn resize(&self, image: &CanonicalImage) -> RgbImage {
        resize_nearest(image.pixels(), self.size, self.size)
    }

    /// Value of a single channel sample after steps 2 to 5.
    pub fn normalize_value(&self, value: u8, channel: usize) -> f32 {
        (value as f32 / self.scale - self.mean[channel]) / self.std[channel]
    }

    /// Steps 2 to 5 on an HWC buffer.
    pub fn normalize(&self, image: &RgbImage) -> ClassifierResult<Array3<f32>> {
        let (w, h) = image.dimensions();
        let raw = Array3::from_shape_vec((h as usize, w as usize, 3), image.as_raw().clone())
            .map_err(|e| ClassifierError::Tensor(e.to_string()))?;
        let mut hwc = raw.mapv(|v| v as f32);
        hwc /= self.scale;
        hwc -= &Array1::from(self.mean.to_vec());
        hwc /= &Array1::from(self.std.to_vec());
        Ok(hwc)
    }

    pub fn to_tensor(&self, image: &CanonicalImage) -> ClassifierResult<Tensor> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ClassifierError::Tensor(format!(
                "empty image ({}x{})",
                image.width(),
                image.height()
            )));
        }
        let resized = self.resize(image);
        let nhwc = self.normalize(&resized)?.insert_axis(Axis(0));
        let nchw = nhwc.permuted_axes([0, 3, 1, 2]);
        let tensor: Tensor = nchw.as_standard_layout().into_owned().into();
        debug!("input tensor {:?}", tensor.shape());
        Ok(tensor)
    }
}

/// Nearest-neighbour resize without half-pixel centers or corner alignment.
///
/// Destination `(x, y)` samples source `(floor(x * w / out_w), floor(y * h / out_h))`,
/// so resizing to the same dimensions is the identity.
pub fn resize_nearest(src: &RgbImage, out_w: u32, out_h: u32) -> RgbImage {
    let (w, h) = src.dimensions();
    let source_index = |dst: u32, input: u32, output: u32| -> u32 {
        ((dst as u64 * input as u64 / output as u64) as u32).min(input.saturating_sub(1))
    };
    RgbImage::from_fn(out_w, out_h, |x, y| -> Rgb<u8> {
        *src.get_pixel(source_index(x, w, out_w), source_index(y, h, out_h))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IMAGENET_MEAN, IMAGENET_STD};
    use proptest::prelude::*;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]))
    }

    #[test]
    fn resize_is_identity_at_target_size() {
        let image = gradient(128, 128);
        assert_eq!(resize_nearest(&image, 128, 128), image);
    }

    #[test]
    fn resize_picks_floor_neighbours() {
        let image = gradient(4, 2);
        let up = resize_nearest(&image, 8, 4);
        assert_eq!(up.get_pixel(0, 0), image.get_pixel(0, 0));
        assert_eq!(up.get_pixel(1, 1), image.get_pixel(0, 0));
        assert_eq!(up.get_pixel(7, 3), image.get_pixel(3, 1));
        let down = resize_nearest(&image, 2, 1);
        assert_eq!(down.get_pixel(0, 0), image.get_pixel(0, 0));
        assert_eq!(down.get_pixel(1, 0), image.get_pixel(2, 0));
    }

    #[test]
    fn tensor_shape_and_layout() {
        let pre = Preprocessor::default();
        let image = CanonicalImage::from(gradient(300, 200));
        let tensor = pre.to_tensor(&image).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);
        let view = tensor.to_array_view::<f32>().unwrap();
        let resized = pre.resize(&image);
        for (x, y) in [(0, 0), (5, 17), (127, 127), (64, 3)] {
            let px = resized.get_pixel(x, y);
            for c in 0..3 {
                assert_eq!(view[[0, c, y as usize, x as usize]], pre.normalize_value(px[c], c));
            }
        }
    }

    #[test]
    fn target_size_input_is_not_resampled() {
        let pre = Preprocessor::default();
        let source = gradient(128, 128);
        let tensor = pre.to_tensor(&CanonicalImage::from(source.clone())).unwrap();
        let view = tensor.to_array_view::<f32>().unwrap();
        for (x, y, px) in source.enumerate_pixels() {
            assert_eq!(view[[0, 1, y as usize, x as usize]], pre.normalize_value(px[1], 1));
        }
    }

    #[test]
    fn black_and_white_normalize_exactly() {
        let pre = Preprocessor::default();
        for (value, image) in [(0f32, RgbImage::new(128, 128)), (255f32, RgbImage::from_pixel(128, 128, Rgb([255; 3])))] {
            let tensor = pre.to_tensor(&CanonicalImage::from(image)).unwrap();
            let view = tensor.to_array_view::<f32>().unwrap();
            for c in 0..3 {
                let expected = (value / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
                assert_eq!(view[[0, c, 42, 7]], expected);
            }
        }
        approx::assert_abs_diff_eq!(pre.normalize_value(255, 0), (1.0 - 0.485) / 0.229, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(pre.normalize_value(0, 2), -0.406 / 0.225, epsilon = 1e-6);
    }

    #[test]
    fn empty_image_is_rejected() {
        let pre = Preprocessor::default();
        assert!(pre.to_tensor(&CanonicalImage::from(RgbImage::new(0, 4))).is_err());
    }

    proptest! {
        #[test]
        fn normalized_values_are_unclamped_and_bounded(value in any::<u8>(), channel in 0usize..3) {
            let pre = Preprocessor::default();
            let v = pre.normalize_value(value, channel);
            let low = pre.normalize_value(0, channel);
            let high = pre.normalize_value(255, channel);
            prop_assert!(low <= v && v <= high);
            prop_assert!(low < 0.0);
            prop_assert!(high > 1.0);
        }

        #[test]
        fn any_size_gives_model_shape(w in 1u32..64, h in 1u32..64) {
            let pre = Preprocessor { size: 16, ..Preprocessor::default() };
            let tensor = pre.to_tensor(&CanonicalImage::from(gradient(w, h))).unwrap();
            prop_assert_eq!(tensor.shape(), &[1, 3, 16, 16]);
        }
    }
}
