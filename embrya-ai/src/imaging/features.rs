//! Feature extraction from the normalised analysis image
//!
//! Computes the 8 morphological metrics in fixed order:
//! 1. Luminance standard deviation and mean
//! 2. Contrast (max − min luminance)
//! 3. Shannon entropy of the 256-bin luminance histogram (base 2)
//! 4. Edge density (Canny, thresholds 50/150)
//! 5. Mean Sobel gradient magnitude
//! 6. Circularity (4π·area/perimeter²) of the largest external contour after
//!    Otsu binarisation
//! 7. External contour count
//!
//! Extraction is total: `extract_or_default` substitutes the documented
//! default vector when measurement fails.

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::contrast::otsu_level;
use imageproc::edges::canny;
use imageproc::filter::filter3x3;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{DegradedDefault, FeatureVector, MorphologicalMetrics, Stage, StageOutcome};

/// Canny hysteresis thresholds
///
/// `imageproc::edges::canny` smooths with a sigma 1.4 Gaussian before the
/// gradient step, so edge densities run lower than an unsmoothed detector
/// reports on the same thresholds.
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

const SOBEL_X: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
const SOBEL_Y: [f32; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Substituted when extraction fails
///
/// Hand-tuned constants; kept fixed so degraded reports stay comparable.
pub const DEFAULT_METRICS: MorphologicalMetrics = MorphologicalMetrics {
    std_dev: 50.0,
    mean_intensity: 128.0,
    contrast: 100.0,
    entropy: 5.0,
    edge_density: 0.1,
    gradient_magnitude: 30.0,
    circularity: 0.5,
    num_regions: 10.0,
};

/// Feature extraction errors (recovered locally, never surfaced to clients)
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Image has no pixels")]
    EmptyImage,

    #[error("Non-finite measurement: {0}")]
    NonFinite(&'static str),
}

/// Extraction output
///
/// The largest contour's perimeter is not part of the classifier schema but
/// feeds the zona pellucida estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractedFeatures {
    pub vector: FeatureVector,
    /// `None` when no external contour was found
    pub largest_contour_perimeter: Option<f64>,
}

/// Documented default features
pub fn default_features() -> ExtractedFeatures {
    ExtractedFeatures {
        vector: FeatureVector::from_metrics(DEFAULT_METRICS),
        largest_contour_perimeter: None,
    }
}

/// Extract features, substituting defaults on failure
pub fn extract_or_default(image: &RgbImage) -> StageOutcome<ExtractedFeatures> {
    extract_features(image).map_err(|e| {
        warn!(
            stage = %Stage::FeatureExtraction,
            "Feature extraction failed, using defaults: {}", e
        );
        DegradedDefault {
            stage: Stage::FeatureExtraction,
            value: default_features(),
            reason: e.to_string(),
        }
    })
}

/// Extract the feature vector from a normalised RGB image
pub fn extract_features(image: &RgbImage) -> Result<ExtractedFeatures, ExtractionError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ExtractionError::EmptyImage);
    }

    // Luminance = mean of the three channels; the u8 image truncates it
    let luminance: Vec<f64> = image
        .pixels()
        .map(|p| (p[0] as f64 + p[1] as f64 + p[2] as f64) / 3.0)
        .collect();
    let gray = GrayImage::from_fn(width, height, |x, y| {
        Luma([luminance[(y * width + x) as usize] as u8])
    });

    let (mean_intensity, std_dev) = mean_and_std(&luminance);
    let contrast = contrast(&luminance);
    let histogram = histogram(&gray);
    let entropy = entropy(&histogram);
    let edge_density = edge_density(&gray);
    let gradient_magnitude = mean_gradient_magnitude(width, height, &luminance);
    let shapes = external_contour_shapes(&gray, &histogram);

    let largest = largest_shape(&shapes);
    let circularity = largest.map(|s| s.circularity()).unwrap_or(0.0);

    let metrics = MorphologicalMetrics {
        std_dev,
        mean_intensity,
        contrast,
        entropy,
        edge_density,
        gradient_magnitude,
        circularity,
        num_regions: shapes.len() as f64,
    };

    let vector = FeatureVector::from_metrics(metrics);
    if let Some(name) = vector.first_non_finite() {
        return Err(ExtractionError::NonFinite(name));
    }

    debug!(
        std_dev,
        mean_intensity,
        entropy,
        edge_density,
        circularity,
        regions = shapes.len(),
        "Features extracted"
    );

    Ok(ExtractedFeatures {
        vector,
        largest_contour_perimeter: largest.map(|s| s.perimeter),
    })
}

/// Population mean and standard deviation
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn contrast(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    max - min
}

fn histogram(gray: &GrayImage) -> [u32; 256] {
    let mut bins = [0u32; 256];
    for p in gray.pixels() {
        bins[p[0] as usize] += 1;
    }
    bins
}

/// Shannon entropy in bits, ignoring empty bins
fn entropy(histogram: &[u32; 256]) -> f64 {
    let total: u32 = histogram.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let sum: f64 = histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total as f64;
            p * p.log2()
        })
        .sum();
    0.0 - sum
}

/// Fraction of pixels marked as edges
fn edge_density(gray: &GrayImage) -> f64 {
    let edges = canny(gray, CANNY_LOW, CANNY_HIGH);
    let edge_pixels = edges.pixels().filter(|p| p[0] > 0).count();
    edge_pixels as f64 / (gray.width() * gray.height()) as f64
}

/// Mean of sqrt(Gx² + Gy²) over all pixels
///
/// Runs on the untruncated channel mean, not the u8 analysis image.
fn mean_gradient_magnitude(width: u32, height: u32, luminance: &[f64]) -> f64 {
    let image = GrayF32::from_fn(width, height, |x, y| {
        Luma([luminance[(y * width + x) as usize] as f32])
    });
    let gx: Vec<f32> = filter3x3(&image, &SOBEL_X).into_raw();
    let gy: Vec<f32> = filter3x3(&image, &SOBEL_Y).into_raw();
    let total: f64 = gx
        .iter()
        .zip(gy.iter())
        .map(|(&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            (x * x + y * y).sqrt()
        })
        .sum();
    total / luminance.len() as f64
}

/// Area and closed arc length of one contour
#[derive(Debug, Clone, Copy, PartialEq)]
struct ContourShape {
    area: f64,
    perimeter: f64,
}

impl ContourShape {
    fn from_contour(contour: &Contour<i32>) -> Self {
        let points = &contour.points;
        let n = points.len();
        let mut twice_area = 0.0;
        let mut perimeter = 0.0;
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            twice_area += (a.x as f64) * (b.y as f64) - (b.x as f64) * (a.y as f64);
            let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
            perimeter += (dx * dx + dy * dy).sqrt();
        }
        Self {
            area: twice_area.abs() / 2.0,
            perimeter,
        }
    }

    /// 4π·area/perimeter², 0 for a degenerate contour
    fn circularity(&self) -> f64 {
        if self.perimeter > 0.0 {
            4.0 * std::f64::consts::PI * self.area / (self.perimeter * self.perimeter)
        } else {
            0.0
        }
    }
}

/// Shapes of the outermost contours of the Otsu foreground
///
/// A single-intensity image has no foreground/background split, so its mask
/// is empty and it has no contours.
///
/// The mask sits inside a one-pixel zero frame: `find_contours` reports
/// foreground touching the image edge as a parentless hole otherwise. The
/// offset leaves area and arc length unchanged.
fn external_contour_shapes(gray: &GrayImage, histogram: &[u32; 256]) -> Vec<ContourShape> {
    let occupied_bins = histogram.iter().filter(|&&c| c > 0).count();
    if occupied_bins < 2 {
        return Vec::new();
    }

    let level = otsu_level(gray);
    let (width, height) = gray.dimensions();
    let binary = GrayImage::from_fn(width + 2, height + 2, |x, y| {
        let inside = (1..=width).contains(&x) && (1..=height).contains(&y);
        if inside && gray.get_pixel(x - 1, y - 1)[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    find_contours::<i32>(&binary)
        .iter()
        .filter(|c| c.parent.is_none() && matches!(c.border_type, BorderType::Outer))
        .map(ContourShape::from_contour)
        .collect()
}

/// Largest contour by area; the first one wins ties
fn largest_shape(shapes: &[ContourShape]) -> Option<ContourShape> {
    let mut best: Option<ContourShape> = None;
    for shape in shapes {
        match best {
            Some(b) if shape.area <= b.area => {}
            _ => best = Some(*shape),
        }
    }
    best
}
