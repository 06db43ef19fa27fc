use image::{DynamicImage, GrayImage, Luma, imageops::FilterType};

use crate::error::{MantleError, Result};

// Dense row-major grid of normalized elevations, `size × size` cells,
// access as `data[z * size + x]`.
// Values are nominally in [0, 1]; erosion and painting may leave them
// slightly outside.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    size: usize,
    data: Vec<f32>,
}

impl HeightField {
    // All-zero field
    pub fn flat(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; size * size],
        }
    }

    // Fails without allocating anything if `data` is not `size * size` long
    pub fn from_vec(size: usize, data: Vec<f32>) -> Result<Self> {
        let expected = size * size;
        if data.len() != expected {
            return Err(MantleError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { size, data })
    }

    // Resample an image to `size × size` and turn luma
    // (0.299 R + 0.587 G + 0.114 B) into heights in [0, 1]
    pub fn from_image(img: &DynamicImage, size: usize) -> Self {
        let side = size as u32;
        let rgba = img.to_rgba8();
        let rgba = if rgba.dimensions() == (side, side) {
            rgba
        } else {
            image::imageops::resize(&rgba, side, side, FilterType::Triangle)
        };
        let data = rgba
            .pixels()
            .map(|p| {
                // Colour is read straight (not premultiplied), so alpha
                // has no effect on height
                let [r, g, b, _] = p.0;
                ((r as f64 * 0.299 + g as f64 * 0.587 + b as f64 * 0.114) / 255.0) as f32
            })
            .collect();
        Self { size, data }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    pub fn index(&self, x: usize, z: usize) -> usize {
        z * self.size + x
    }

    #[inline]
    pub fn get(&self, x: usize, z: usize) -> f32 {
        self.data[z * self.size + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, z: usize, h: f32) {
        self.data[z * self.size + x] = h;
    }

    pub fn min_max(&self) -> (f32, f32) {
        self.data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            })
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().map(|&h| h as f64).sum()
    }

    // Bilinear sample at a fractional grid position.
    // The far neighbour is clamped to the last row/column.
    pub fn sample_bilinear(&self, x: f64, z: f64) -> f64 {
        let last = self.size - 1;
        let x0 = (x.floor().max(0.0) as usize).min(last);
        let z0 = (z.floor().max(0.0) as usize).min(last);
        let x1 = (x0 + 1).min(last);
        let z1 = (z0 + 1).min(last);
        let fx = x - x0 as f64;
        let fz = z - z0 as f64;

        let h00 = self.get(x0, z0) as f64;
        let h10 = self.get(x1, z0) as f64;
        let h01 = self.get(x0, z1) as f64;
        let h11 = self.get(x1, z1) as f64;

        (1.0 - fx) * (1.0 - fz) * h00
            + fx * (1.0 - fz) * h10
            + (1.0 - fx) * fz * h01
            + fx * fz * h11
    }

    // 8-bit grayscale encoding, `floor(clamp(h, 0, 1) * 255)`
    pub fn to_gray_image(&self) -> GrayImage {
        let side = self.size as u32;
        GrayImage::from_fn(side, side, |x, z| {
            let h = self.get(x as usize, z as usize).clamp(0.0, 1.0);
            Luma([(h * 255.0).floor() as u8])
        })
    }
}

// World (x, z) on a terrain of width/depth `scale` centred on the origin
// to normalized (u, v)
#[inline]
pub fn world_to_uv(scale: f64, world_x: f64, world_z: f64) -> (f64, f64) {
    let half = scale / 2.0;
    ((world_x + half) / scale, (world_z + half) / scale)
}

// Nearest grid cell for (u, v); None when it falls outside the grid
pub fn uv_to_cell(size: usize, u: f64, v: f64) -> Option<(usize, usize)> {
    let span = size.saturating_sub(1) as f64;
    let cx = (u * span).floor();
    let cz = (v * span).floor();
    if !cx.is_finite() || !cz.is_finite() {
        return None;
    }
    if cx < 0.0 || cz < 0.0 || cx >= size as f64 || cz >= size as f64 {
        return None;
    }
    Some((cx as usize, cz as usize))
}

#[cfg(test)]
mod tests {
    use super::{HeightField, uv_to_cell, world_to_uv};
    use crate::error::MantleError;
    use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn from_vec_rejects_wrong_length() {
        let err = HeightField::from_vec(4, vec![0.0; 15]).unwrap_err();
        match err {
            MantleError::SizeMismatch { expected, actual } => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn from_vec_round_trip() {
        let data: Vec<f32> = (0..9).map(|i| i as f32 / 8.0).collect();
        let f = HeightField::from_vec(3, data.clone()).unwrap();
        assert_eq!(f.as_slice(), data.as_slice());
        assert_eq!(f.get(2, 1), data[5]);
    }

    #[test]
    fn bilinear_matches_cells_and_midpoints() {
        let f = HeightField::from_vec(2, vec![0.0, 1.0, 0.0, 1.0]).unwrap();
        assert_eq!(f.sample_bilinear(0.0, 0.0), 0.0);
        assert_eq!(f.sample_bilinear(1.0, 0.0), 1.0);
        assert!((f.sample_bilinear(0.5, 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn gray_image_quantizes_and_clamps() {
        let f = HeightField::from_vec(2, vec![0.0, 1.0, 1.5, -0.2]).unwrap();
        let img = f.to_gray_image();
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        assert_eq!(img.get_pixel(1, 0).0[0], 255);
        assert_eq!(img.get_pixel(0, 1).0[0], 255);
        assert_eq!(img.get_pixel(1, 1).0[0], 0);
    }

    #[test]
    fn image_luma_weights() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        img.put_pixel(0, 1, Rgb([0, 0, 255]));
        img.put_pixel(1, 1, Rgb([255, 255, 255]));
        let f = HeightField::from_image(&DynamicImage::ImageRgb8(img), 2);
        assert!((f.get(0, 0) - 0.299).abs() < 1e-6);
        assert!((f.get(1, 0) - 0.587).abs() < 1e-6);
        assert!((f.get(0, 1) - 0.114).abs() < 1e-6);
        assert!((f.get(1, 1) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn translucent_pixels_keep_their_colour() {
        let img = RgbaImage::from_fn(2, 2, |x, _| {
            let alpha = if x == 0 { 255 } else { 64 };
            Rgba([200, 200, 200, alpha])
        });
        let f = HeightField::from_image(&DynamicImage::ImageRgba8(img), 2);
        assert_eq!(f.get(0, 0), f.get(1, 0));
        assert!((f.get(1, 0) - 200.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn image_is_resampled_to_map_size() {
        let img = RgbImage::from_pixel(16, 16, Rgb([128, 128, 128]));
        let f = HeightField::from_image(&DynamicImage::ImageRgb8(img), 4);
        assert_eq!(f.len(), 16);
        for &h in f.as_slice() {
            assert!((h - 128.0 / 255.0).abs() < 1e-3);
        }
    }

    #[test]
    fn world_mapping() {
        let (u, v) = world_to_uv(4.0, 0.0, 0.0);
        assert_eq!((u, v), (0.5, 0.5));
        assert_eq!(uv_to_cell(4, u, v), Some((1, 1)));
        assert_eq!(uv_to_cell(4, -0.01, 0.5), None);
        assert_eq!(uv_to_cell(4, 1.0, 1.0), Some((3, 3)));
        assert_eq!(uv_to_cell(4, 1.5, 0.0), None);
        assert_eq!(uv_to_cell(4, f64::NAN, 0.0), None);
    }
}
