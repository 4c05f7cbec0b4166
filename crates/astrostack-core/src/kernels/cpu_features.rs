//! Cached CPU feature probe for runtime kernel selection.

use std::sync::OnceLock;

#[derive(Debug, Clone, Copy)]
pub struct CpuFeatures {
    pub avx2: bool,
    pub fma: bool,
}

static FEATURES: OnceLock<CpuFeatures> = OnceLock::new();

/// Get cached CPU features (detected once on first call).
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn get() -> CpuFeatures {
    *FEATURES.get_or_init(|| CpuFeatures {
        avx2: is_x86_feature_detected!("avx2"),
        fma: is_x86_feature_detected!("fma"),
    })
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub fn get() -> CpuFeatures {
    *FEATURES.get_or_init(|| CpuFeatures {
        avx2: false,
        fma: false,
    })
}

/// Check if AVX2 and FMA are both available.
#[inline]
pub fn has_avx2_fma() -> bool {
    let f = get();
    f.avx2 && f.fma
}
