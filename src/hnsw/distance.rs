//! Distance kernels. Manually unrolled; these dominate search time.

/// Euclidean norm of a vector.
pub fn magnitude(v: &[f32]) -> f32 {
    let mut sum = 0.0;
    let mut chunks = v.chunks_exact(4);
    for c in &mut chunks {
        sum += c[0] * c[0] + c[1] * c[1] + c[2] * c[2] + c[3] * c[3];
    }
    for &x in chunks.remainder() {
        sum += x * x;
    }
    sum.sqrt()
}

/// Dot product. Lengths are assumed equal on the hot path.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0;
    let n = a.len();
    let mut i = 0;
    while i + 3 < n {
        sum += a[i] * b[i] + a[i + 1] * b[i + 1] + a[i + 2] * b[i + 2] + a[i + 3] * b[i + 3];
        i += 4;
    }
    while i < n {
        sum += a[i] * b[i];
        i += 1;
    }
    sum
}

/// Cosine similarity in `[-1, 1]`. Precomputed magnitudes may be passed in
/// to skip the norm on cached node vectors; zero-magnitude inputs score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32], mag_a: Option<f32>, mag_b: Option<f32>) -> f32 {
    let ma = mag_a.unwrap_or_else(|| magnitude(a));
    let mb = mag_b.unwrap_or_else(|| magnitude(b));
    if ma == 0.0 || mb == 0.0 {
        return 0.0;
    }
    dot(a, b) / (ma * mb)
}

/// Squared Euclidean distance (no sqrt; ordering-equivalent).
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0;
    let n = a.len();
    let mut i = 0;
    while i + 3 < n {
        let d0 = a[i] - b[i];
        let d1 = a[i + 1] - b[i + 1];
        let d2 = a[i + 2] - b[i + 2];
        let d3 = a[i + 3] - b[i + 3];
        sum += d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3;
        i += 4;
    }
    while i < n {
        let d = a[i] - b[i];
        sum += d * d;
        i += 1;
    }
    sum
}
