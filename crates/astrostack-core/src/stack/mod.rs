//! Stacking: strategies that combine aligned images, and the threaded
//! driver that runs them over partitioned image lists.

mod config;
mod driver;
mod extremum;
mod sigma_reject;
mod standard;
mod strategy;

pub use config::{ExtremumPolarity, PostStack, StackConfig, StackMode};
pub use driver::{partition, SkipReason, SkippedImage, StackItem, StackOutput, Stacker};
pub use extremum::ExtremumStack;
pub use sigma_reject::{SigmaPartial, SigmaRejectStack};
pub use standard::{StandardPartial, StandardStack};
pub use strategy::{PassOutcome, StackingStrategy};
