//! Threshold classifiers over a [`FeatureSet`].
//!
//! Three independent, total functions share one feature extraction pass:
//!
//! | Classifier | Output | Decode failure |
//! |------------|--------|----------------|
//! | [`composition_tags`] | subset of `warm`, `bright`, `minimal`, `busy` | empty |
//! | [`vibe`] | `energetic`, `moody` or `casual` | `unknown` |
//! | [`quality`] | `lighting:<mean gray> sharpness:<sharp|soft>` | `low-confidence` |
//!
//! Every comparison is strict. The thresholds are fixed constants.

use serde::Serialize;

use crate::features::{extract, FeatureSet};

pub const BRIGHT_CHANNEL_MIN: f64 = 150.0;
pub const MINIMAL_EDGE_RATIO: f64 = 0.03;
pub const BUSY_EDGE_RATIO: f64 = 0.12;
pub const ENERGETIC_BRIGHTNESS: f64 = 180.0;
pub const ENERGETIC_SATURATION: f64 = 90.0;
pub const MOODY_BRIGHTNESS: f64 = 90.0;
pub const SHARP_LAPLACIAN_VARIANCE: f64 = 120.0;

pub const VIBE_UNKNOWN: &str = "unknown";
pub const QUALITY_LOW_CONFIDENCE: &str = "low-confidence";

/// Composition tags, in the order they are emitted.
pub fn composition_tags(features: Option<&FeatureSet>) -> Vec<String> {
    let Some(f) = features else {
        return Vec::new();
    };
    let mut tags = Vec::new();
    if f.mean_red > f.mean_green && f.mean_red > f.mean_blue {
        tags.push("warm".to_string());
    }
    if f.mean_red > BRIGHT_CHANNEL_MIN
        && f.mean_green > BRIGHT_CHANNEL_MIN
        && f.mean_blue > BRIGHT_CHANNEL_MIN
    {
        tags.push("bright".to_string());
    }
    if f.edge_ratio < MINIMAL_EDGE_RATIO {
        tags.push("minimal".to_string());
    } else if f.edge_ratio > BUSY_EDGE_RATIO {
        tags.push("busy".to_string());
    }
    tags
}

pub fn vibe(features: Option<&FeatureSet>) -> String {
    let Some(f) = features else {
        return VIBE_UNKNOWN.to_string();
    };
    let label = if f.brightness > ENERGETIC_BRIGHTNESS && f.saturation > ENERGETIC_SATURATION {
        "energetic"
    } else if f.brightness < MOODY_BRIGHTNESS {
        "moody"
    } else {
        "casual"
    };
    label.to_string()
}

pub fn quality(features: Option<&FeatureSet>) -> String {
    let Some(f) = features else {
        return QUALITY_LOW_CONFIDENCE.to_string();
    };
    let sharpness = if f.laplacian_variance > SHARP_LAPLACIAN_VARIANCE {
        "sharp"
    } else {
        "soft"
    };
    // mean gray is truncated, not rounded
    format!("lighting:{} sharpness:{}", f.mean_gray as i64, sharpness)
}

/// The three classifier outputs for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrichment {
    pub tags: Vec<String>,
    pub vibe: String,
    pub quality: String,
}

impl Enrichment {
    pub fn from_features(features: Option<&FeatureSet>) -> Self {
        Self {
            tags: composition_tags(features),
            vibe: vibe(features),
            quality: quality(features),
        }
    }
}

impl From<Enrichment> for (Vec<String>, String, String) {
    fn from(e: Enrichment) -> Self {
        (e.tags, e.vibe, e.quality)
    }
}

/// Decode `bytes` once and run all three classifiers. Never fails.
pub fn classify(bytes: &[u8]) -> Enrichment {
    let features = match extract(bytes) {
        Ok(f) => Some(f),
        Err(e) => {
            tracing::debug!(error = %e, "falling back to decode-failure labels");
            None
        }
    };
    Enrichment::from_features(features.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::{encode_png, stripes};
    use image::{Rgb, RgbImage};

    fn neutral() -> FeatureSet {
        FeatureSet {
            edge_ratio: 0.05,
            mean_red: 100.0,
            mean_green: 100.0,
            mean_blue: 100.0,
            brightness: 120.0,
            saturation: 40.0,
            mean_gray: 100.0,
            laplacian_variance: 50.0,
        }
    }

    #[test]
    fn test_neutral_features_have_no_tags() {
        assert!(composition_tags(Some(&neutral())).is_empty());
        assert_eq!(vibe(Some(&neutral())), "casual");
        assert_eq!(quality(Some(&neutral())), "lighting:100 sharpness:soft");
    }

    #[test]
    fn test_warm_requires_red_above_both() {
        let mut f = neutral();
        f.mean_red = 101.0;
        assert_eq!(composition_tags(Some(&f)), vec!["warm"]);

        f.mean_green = 101.0;
        assert!(composition_tags(Some(&f)).is_empty());
    }

    #[test]
    fn test_bright_requires_all_channels_above_150() {
        let mut f = neutral();
        f.mean_red = 151.0;
        f.mean_green = 151.0;
        f.mean_blue = 150.0;
        assert!(!composition_tags(Some(&f)).contains(&"bright".to_string()));

        f.mean_blue = 151.0;
        assert!(composition_tags(Some(&f)).contains(&"bright".to_string()));
    }

    #[test]
    fn test_minimal_boundary_is_strict() {
        let mut f = neutral();
        f.edge_ratio = 0.03;
        assert!(composition_tags(Some(&f)).is_empty());

        f.edge_ratio = 0.0300001;
        assert!(composition_tags(Some(&f)).is_empty());

        f.edge_ratio = 0.0299999;
        assert_eq!(composition_tags(Some(&f)), vec!["minimal"]);
    }

    #[test]
    fn test_busy_boundary_is_strict() {
        let mut f = neutral();
        f.edge_ratio = 0.12;
        assert!(composition_tags(Some(&f)).is_empty());

        f.edge_ratio = 0.1200001;
        assert_eq!(composition_tags(Some(&f)), vec!["busy"]);
    }

    #[test]
    fn test_energetic_boundary_is_strict_on_brightness() {
        let mut f = neutral();
        f.brightness = 180.0;
        f.saturation = 91.0;
        assert_eq!(vibe(Some(&f)), "casual");

        f.brightness = 180.5;
        assert_eq!(vibe(Some(&f)), "energetic");

        f.saturation = 90.0;
        assert_eq!(vibe(Some(&f)), "casual");
    }

    #[test]
    fn test_moody_boundary_is_strict() {
        let mut f = neutral();
        f.brightness = 90.0;
        assert_eq!(vibe(Some(&f)), "casual");

        f.brightness = 89.9;
        assert_eq!(vibe(Some(&f)), "moody");
    }

    #[test]
    fn test_sharpness_boundary_is_strict() {
        let mut f = neutral();
        f.laplacian_variance = 120.0;
        assert!(quality(Some(&f)).ends_with("sharpness:soft"));

        f.laplacian_variance = 120.01;
        assert!(quality(Some(&f)).ends_with("sharpness:sharp"));
    }

    #[test]
    fn test_quality_truncates_mean_gray() {
        let mut f = neutral();
        f.mean_gray = 127.99;
        assert_eq!(quality(Some(&f)), "lighting:127 sharpness:soft");
    }

    #[test]
    fn test_decode_failure_fallbacks() {
        let e = classify(b"<html>not an image</html>");
        assert!(e.tags.is_empty());
        assert_eq!(e.vibe, "unknown");
        assert_eq!(e.quality, "low-confidence");

        assert!(composition_tags(None).is_empty());
        assert_eq!(vibe(None), "unknown");
        assert_eq!(quality(None), "low-confidence");
    }

    #[test]
    fn test_classify_saturated_red_image() {
        let png = encode_png(&RgbImage::from_pixel(24, 24, Rgb([255, 0, 0])));
        let e = classify(&png);
        assert_eq!(e.tags, vec!["warm", "minimal"]);
        assert_eq!(e.vibe, "energetic");
        assert_eq!(e.quality, "lighting:76 sharpness:soft");
    }

    #[test]
    fn test_classify_white_image() {
        let png = encode_png(&RgbImage::from_pixel(24, 24, Rgb([255, 255, 255])));
        let e = classify(&png);
        assert_eq!(e.tags, vec!["bright", "minimal"]);
        assert_eq!(e.vibe, "casual");
        assert_eq!(e.quality, "lighting:255 sharpness:soft");
    }

    #[test]
    fn test_classify_dark_image_is_moody() {
        let png = encode_png(&RgbImage::from_pixel(24, 24, Rgb([20, 20, 20])));
        assert_eq!(classify(&png).vibe, "moody");
    }

    #[test]
    fn test_classify_stripes_is_busy_and_sharp() {
        let e = classify(&encode_png(&stripes(64, 4)));
        assert!(e.tags.contains(&"busy".to_string()), "tags {:?}", e.tags);
        assert!(e.quality.ends_with("sharpness:sharp"));
    }

    #[test]
    fn test_classify_is_idempotent() {
        let png = encode_png(&stripes(32, 4));
        assert_eq!(classify(&png), classify(&png));
    }

    #[test]
    fn test_enrichment_into_tuple() {
        let (tags, vibe, quality): (Vec<String>, String, String) =
            Enrichment::from_features(None).into();
        assert!(tags.is_empty());
        assert_eq!(vibe, "unknown");
        assert_eq!(quality, "low-confidence");
    }
}
