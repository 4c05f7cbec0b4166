/// Number of samples a padded row is rounded up to, so every row of every
/// plane starts on a full AVX lane of `f32` values. Only the row stride is
/// affected; transforms and image dimensions use the true width.
pub const ROW_ALIGNMENT: usize = 8;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f64 = 1e-12;

/// ITU-R BT.601 luminance coefficient for the red channel.
pub const LUMINANCE_R: f64 = 0.299;

/// ITU-R BT.601 luminance coefficient for the green channel.
pub const LUMINANCE_G: f64 = 0.587;

/// ITU-R BT.601 luminance coefficient for the blue channel.
pub const LUMINANCE_B: f64 = 0.114;

/// Number of planes in a color image (R, G, B).
pub const COLOR_PLANE_COUNT: usize = 3;

/// Default frequency cutoff applied before correlation, as a fraction of the
/// Nyquist frequency.
pub const DEFAULT_CUTOFF: f64 = 0.5;

/// Default correlation peak width (pixels) above which an alignment fails.
pub const DEFAULT_PRECISION_THRESHOLD: f64 = 2.0;

/// Default sigma-reject threshold, in standard deviations.
pub const DEFAULT_REJECTION_THRESHOLD: f64 = 2.5;

/// Residual offset (pixels) tolerated by the alignment self-check.
pub const CHECK_RESIDUAL_TOLERANCE: f64 = 1.0;

/// Minimum pixel count (h*w) to resample rows in parallel with Rayon.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum image count to align with Rayon parallelism.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// Scale of the fixed-point sample sums used by sigma-reject stacking
/// (60 fractional bits).
pub const FIXED_POINT_SCALE: f64 = (1u64 << 60) as f64;

/// Largest magnitude a scaled sample may take, so that `i128` sums of up to
/// 2^27 samples cannot overflow.
pub const FIXED_POINT_LIMIT: f64 = (1u128 << 100) as f64;
