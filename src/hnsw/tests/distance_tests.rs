use crate::hnsw::distance::{cosine_similarity, dot, euclidean_distance_squared, magnitude};

#[test]
fn test_magnitude_basic() {
    assert!((magnitude(&[3.0, 4.0]) - 5.0).abs() < 1e-6);
    assert_eq!(magnitude(&[]), 0.0);
}

#[test]
fn test_magnitude_covers_remainder_lanes() {
    // 6 elements exercises both the unrolled body and the remainder.
    let v = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
    assert!((magnitude(&v) - 6.0f32.sqrt()).abs() < 1e-6);
}

#[test]
fn test_dot_product() {
    let a = [1.0, 2.0, 3.0, 4.0, 5.0];
    let b = [5.0, 4.0, 3.0, 2.0, 1.0];
    assert!((dot(&a, &b) - 35.0).abs() < 1e-6);
}

#[test]
fn test_cosine_identical_vectors() {
    let v = [0.3, -0.2, 0.9, 0.1];
    assert!((cosine_similarity(&v, &v, None, None) - 1.0).abs() < 1e-6);
}

#[test]
fn test_cosine_orthogonal_vectors() {
    let a = [1.0, 0.0];
    let b = [0.0, 1.0];
    assert!(cosine_similarity(&a, &b, None, None).abs() < 1e-6);
}

#[test]
fn test_cosine_opposite_vectors() {
    let a = [1.0, 0.0];
    let b = [-1.0, 0.0];
    assert!((cosine_similarity(&a, &b, None, None) + 1.0).abs() < 1e-6);
}

#[test]
fn test_cosine_zero_vector_scores_zero() {
    let a = [0.0, 0.0];
    let b = [1.0, 1.0];
    assert_eq!(cosine_similarity(&a, &b, None, None), 0.0);
}

#[test]
fn test_cosine_precomputed_magnitudes_agree() {
    let a = [0.5, 1.5, -0.5, 2.0, 0.25];
    let b = [1.0, -1.0, 0.5, 0.5, 2.0];
    let lazy = cosine_similarity(&a, &b, None, None);
    let eager = cosine_similarity(&a, &b, Some(magnitude(&a)), Some(magnitude(&b)));
    assert!((lazy - eager).abs() < 1e-6);
}

#[test]
fn test_euclidean_distance_squared() {
    let a = [0.0, 0.0, 0.0];
    let b = [1.0, 2.0, 2.0];
    assert!((euclidean_distance_squared(&a, &b) - 9.0).abs() < 1e-6);
}
