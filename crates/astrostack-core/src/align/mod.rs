//! Image registration: cross-correlation against a reference spectrum with
//! sub-pixel peak refinement.

mod aligner;
mod config;
pub mod correlation;
mod source;
pub mod subpixel;

pub use aligner::{AlignFailure, AlignStatus, Aligner, AlignerState, AlignmentResult};
pub use config::AlignConfig;
pub use correlation::{correlate, correlate_spectra, find_peak, CorrelationPeak};
pub use source::ImageSource;
