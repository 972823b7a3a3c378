//! Image preprocessing and feature extraction
//!
//! - **preprocess**: decode arbitrary bytes, force 3 channels, resize to the
//!   fixed 128×128 analysis canvas
//! - **features**: luminance statistics, edges, gradients, contours → `FeatureVector`

pub mod features;
pub mod preprocess;

pub use features::{
    default_features, extract_features, extract_or_default, ExtractedFeatures, ExtractionError,
};
pub use preprocess::{preprocess, ImagingError, ANALYSIS_SIZE};
