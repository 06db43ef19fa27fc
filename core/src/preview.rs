use image::{Rgb, RgbImage};
use palette::{Gradient, LinSrgb};

use crate::field::HeightField;

// Lambertian shade per cell, light from 45° azimuth and 45° altitude.
// `z_scale` exaggerates relief; edge cells reuse their nearest neighbour.
fn hillshade(field: &HeightField, z_scale: f64) -> Vec<f64> {
    let size = field.size();
    let last = size.saturating_sub(1);
    let angle = std::f64::consts::FRAC_PI_4;
    let (sin_alt, cos_alt) = angle.sin_cos();
    let light = (angle.cos() * cos_alt, angle.sin() * cos_alt, sin_alt);

    let mut shade = Vec::with_capacity(size * size);
    for z in 0..size {
        for x in 0..size {
            let west = field.get(x.saturating_sub(1), z) as f64;
            let east = field.get((x + 1).min(last), z) as f64;
            let north = field.get(x, z.saturating_sub(1)) as f64;
            let south = field.get(x, (z + 1).min(last)) as f64;
            let nx = -(east - west) / 2.0 * z_scale;
            let ny = -(south - north) / 2.0 * z_scale;
            let len = (nx * nx + ny * ny + 1.0).sqrt();
            let dot = (nx * light.0 + ny * light.1 + light.2) / len;
            shade.push(dot.max(0.0));
        }
    }
    shade
}

// Colour preview: water, sand, grass, rock and snow by height, darkened
// by hillshade
pub fn render_preview(field: &HeightField, elevation_scale: f64) -> RgbImage {
    let gradient = Gradient::with_domain(vec![
        (0.00, LinSrgb::new(0.0, 0.0, 0.5)),
        (0.30, LinSrgb::new(0.8, 0.8, 0.5)),
        (0.50, LinSrgb::new(0.1, 0.6, 0.2)),
        (0.75, LinSrgb::new(0.5, 0.4, 0.3)),
        (1.00, LinSrgb::new(1.0, 1.0, 1.0)),
    ]);
    let shade = hillshade(field, elevation_scale);
    let side = field.size() as u32;

    RgbImage::from_fn(side, side, |x, z| {
        let idx = field.index(x as usize, z as usize);
        let h = field.as_slice()[idx].clamp(0.0, 1.0);
        let col: LinSrgb = gradient.get(h);
        let rgb = col.into_format::<u8>();
        let light = (shade[idx] * 0.5 + 0.5).clamp(0.0, 1.0);
        Rgb([
            (rgb.red as f64 * light) as u8,
            (rgb.green as f64 * light) as u8,
            (rgb.blue as f64 * light) as u8,
        ])
    })
}
