pub mod align;
pub mod buffer;
pub mod config;
pub mod consts;
pub mod error;
pub mod geometry;
pub mod kernels;
pub mod precision;
pub mod progress;
pub mod spectrum;
pub mod stack;
