use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_REJECTION_THRESHOLD;
use crate::geometry::Rect;

/// Which value an extremum stack keeps for each pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtremumPolarity {
    #[default]
    Max,
    Min,
}

impl std::fmt::Display for ExtremumPolarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Max => write!(f, "max"),
            Self::Min => write!(f, "min"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum StackMode {
    /// Plain accumulation.
    #[default]
    Standard,
    /// Two passes: moments, then a mean of the samples within `threshold`
    /// standard deviations.
    SigmaReject { threshold: f64 },
    /// Per-pixel maximum or minimum.
    Extremum { polarity: ExtremumPolarity },
}

impl StackMode {
    pub fn sigma_reject() -> Self {
        Self::SigmaReject {
            threshold: DEFAULT_REJECTION_THRESHOLD,
        }
    }
}

impl std::fmt::Display for StackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::SigmaReject { threshold } => write!(f, "sigma-reject ({threshold} sigma)"),
            Self::Extremum { polarity } => write!(f, "extremum ({polarity})"),
        }
    }
}

/// What to do with a standard stack once every image is in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostStack {
    /// Leave the sum as is.
    None,
    /// Divide by the number of images stacked.
    #[default]
    Mean,
    /// Rescale so the maximum is 1.
    Normalize,
}

impl std::fmt::Display for PostStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Mean => write!(f, "mean"),
            Self::Normalize => write!(f, "normalize"),
        }
    }
}

/// Stacking parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Region to stack, in reference coordinates. `None` uses the whole
    /// image.
    pub rect: Option<Rect>,
    /// Each source pixel becomes an `expansion` x `expansion` block.
    pub expansion: usize,
    /// Convert every image to luminance before accumulating it.
    pub monochrome: bool,
    pub mode: StackMode,
    /// Applies to [`StackMode::Standard`] only.
    pub post_stack: PostStack,
    /// Also stack images whose alignment failed.
    pub include_failed: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            rect: None,
            expansion: 1,
            monochrome: false,
            mode: StackMode::Standard,
            post_stack: PostStack::Mean,
            include_failed: false,
        }
    }
}
