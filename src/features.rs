//! Pixel-level feature extraction.
//!
//! Decodes raw image bytes (any format the `image` crate recognizes) and
//! derives the scalar features the classifiers consume:
//!
//! | Feature | Definition |
//! |---------|------------|
//! | `edge_ratio` | fraction of pixels marked by a Canny detector (thresholds 100/200) on the grayscale image |
//! | `mean_red/green/blue` | per-channel mean over all pixels |
//! | `brightness` | mean HSV value channel (0–255) |
//! | `saturation` | mean HSV saturation channel (0–255) |
//! | `mean_gray` | mean grayscale intensity |
//! | `laplacian_variance` | variance of the 3x3 Laplacian over the grayscale image |
//!
//! Decode failure is an ordinary outcome, reported as [`DecodeError`].
//! The classifiers in [`crate::classify`] all have a fallback for it.

use image::{GrayImage, Luma, RgbImage};
use thiserror::Error;

/// Canny hysteresis thresholds, applied to the L1 Sobel gradient magnitude.
pub const CANNY_LOW: f32 = 100.0;
pub const CANNY_HIGH: f32 = 200.0;

/// Numeric features derived from one image. Ephemeral; never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSet {
    pub edge_ratio: f64,
    pub mean_red: f64,
    pub mean_green: f64,
    pub mean_blue: f64,
    pub brightness: f64,
    pub saturation: f64,
    pub mean_gray: f64,
    pub laplacian_variance: f64,
}

/// The bytes could not be decoded into a non-empty pixel grid.
#[derive(Debug, Error)]
#[error("image decode failed: {0}")]
pub struct DecodeError(String);

/// Decode `bytes` and compute its [`FeatureSet`].
pub fn extract(bytes: &[u8]) -> Result<FeatureSet, DecodeError> {
    let img = image::load_from_memory(bytes).map_err(|e| DecodeError(e.to_string()))?;
    let rgb = img.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(DecodeError("image has no pixels".to_string()));
    }
    Ok(extract_from_rgb(&rgb))
}

/// Compute features from an already decoded RGB image with at least one pixel.
pub fn extract_from_rgb(rgb: &RgbImage) -> FeatureSet {
    let pixel_count = (rgb.width() as f64) * (rgb.height() as f64);

    let mut sum_r = 0.0f64;
    let mut sum_g = 0.0f64;
    let mut sum_b = 0.0f64;
    let mut sum_v = 0.0f64;
    let mut sum_s = 0.0f64;

    for p in rgb.pixels() {
        let [r, g, b] = p.0;
        sum_r += r as f64;
        sum_g += g as f64;
        sum_b += b as f64;

        let (s, v) = hsv_saturation_value(r, g, b);
        sum_s += s as f64;
        sum_v += v as f64;
    }

    let gray = rgb_to_gray(rgb);
    let mean_gray = gray.pixels().map(|p| p.0[0] as f64).sum::<f64>() / pixel_count;
    let edges = canny_edge_count(&gray, CANNY_LOW, CANNY_HIGH);

    FeatureSet {
        edge_ratio: edges as f64 / pixel_count,
        mean_red: sum_r / pixel_count,
        mean_green: sum_g / pixel_count,
        mean_blue: sum_b / pixel_count,
        brightness: sum_v / pixel_count,
        saturation: sum_s / pixel_count,
        mean_gray,
        laplacian_variance: laplacian_variance(&gray),
    }
}

/// 8-bit HSV saturation and value for one pixel.
///
/// `V = max(r, g, b)`, `S = 255 * (V - min) / V` (zero for black).
fn hsv_saturation_value(r: u8, g: u8, b: u8) -> (u8, u8) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == 0 {
        return (0, 0);
    }
    let s = (255.0 * (max - min) as f64 / max as f64).round() as u8;
    (s, max)
}

/// Convert RGB to grayscale with ITU-R BT.601 weights, rounding per pixel.
pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    let (w, h) = rgb.dimensions();
    let mut gray = GrayImage::new(w, h);
    for (x, y, p) in rgb.enumerate_pixels() {
        let luma = 0.299 * p.0[0] as f64 + 0.587 * p.0[1] as f64 + 0.114 * p.0[2] as f64;
        gray.put_pixel(x, y, Luma([luma.round().clamp(0.0, 255.0) as u8]));
    }
    gray
}

/// Index into a dimension of length `n` with reflect-101 borders
/// (`-1 → 1`, `n → n-2`). Dimensions of length 1 clamp to 0.
fn reflect101(i: i64, n: i64) -> u32 {
    if n == 1 {
        return 0;
    }
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= n {
        i = 2 * (n - 1) - i;
    }
    i.clamp(0, n - 1) as u32
}

/// Population variance of the 4-neighbour Laplacian `[0,1,0; 1,-4,1; 0,1,0]`
/// over every pixel, with reflect-101 borders.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = (gray.width() as i64, gray.height() as i64);
    if w == 0 || h == 0 {
        return 0.0;
    }
    let at = |x: i64, y: i64| gray.get_pixel(reflect101(x, w), reflect101(y, h)).0[0] as f64;

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for y in 0..h {
        for x in 0..w {
            let lap = at(x, y - 1) + at(x, y + 1) + at(x - 1, y) + at(x + 1, y) - 4.0 * at(x, y);
            sum += lap;
            sum_sq += lap * lap;
        }
    }
    let n = (w * h) as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Count the pixels a Canny detector marks as edges.
///
/// 3x3 Sobel gradients with replicated borders, L1 magnitude, non-maximum
/// suppression along the quantized gradient direction, then hysteresis:
/// pixels above `high` seed edges that grow through 8-connected pixels
/// above `low`.
pub fn canny_edge_count(gray: &GrayImage, low: f32, high: f32) -> usize {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w == 0 || h == 0 {
        return 0;
    }
    let px = |x: i64, y: i64| {
        let cx = x.clamp(0, w as i64 - 1) as u32;
        let cy = y.clamp(0, h as i64 - 1) as u32;
        gray.get_pixel(cx, cy).0[0] as f32
    };

    let mut gx = vec![0f32; w * h];
    let mut gy = vec![0f32; w * h];
    let mut mag = vec![0f32; w * h];
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let dx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
            let dy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
            let i = y as usize * w + x as usize;
            gx[i] = dx;
            gy[i] = dy;
            mag[i] = dx.abs() + dy.abs();
        }
    }

    let mag_at = |x: i64, y: i64| {
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            0.0
        } else {
            mag[y as usize * w + x as usize]
        }
    };

    // 0 = suppressed, 1 = weak candidate, 2 = strong
    let mut class = vec![0u8; w * h];
    let tan22 = 22.5f32.to_radians().tan();
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let i = y as usize * w + x as usize;
            let m = mag[i];
            if m <= low {
                continue;
            }
            let (ax, ay) = (gx[i].abs(), gy[i].abs());
            // `before` must be strictly smaller, `after` may tie.
            let (before, after) = if ay <= ax * tan22 {
                (mag_at(x - 1, y), mag_at(x + 1, y))
            } else if ay >= ax / tan22 {
                (mag_at(x, y - 1), mag_at(x, y + 1))
            } else if (gx[i] > 0.0) == (gy[i] > 0.0) {
                (mag_at(x - 1, y - 1), mag_at(x + 1, y + 1))
            } else {
                (mag_at(x + 1, y - 1), mag_at(x - 1, y + 1))
            };
            if m > before && m >= after {
                class[i] = if m > high { 2 } else { 1 };
            }
        }
    }

    let mut stack: Vec<usize> = (0..w * h).filter(|&i| class[i] == 2).collect();
    let mut edge = vec![false; w * h];
    for &i in &stack {
        edge[i] = true;
    }
    while let Some(i) = stack.pop() {
        let (x, y) = ((i % w) as i64, (i / w) as i64);
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if !edge[j] && class[j] == 1 {
                    edge[j] = true;
                    stack.push(j);
                }
            }
        }
    }

    edge.iter().filter(|&&e| e).count()
}
