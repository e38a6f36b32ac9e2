use crate::hnsw::index::{Hnsw, HnswParams, Metric};

fn build_graph(n: usize) -> Hnsw {
    let mut hnsw = Hnsw::new(HnswParams::default(), Metric::Cosine);
    for i in 0..n {
        let v = vec![
            (i as f32 * 0.31).sin(),
            (i as f32 * 0.17).cos(),
            (i as f32 * 0.53).sin(),
        ];
        hnsw.add_point(i as u32, v).unwrap();
    }
    hnsw
}

#[test]
fn test_roundtrip_preserves_graph() {
    let hnsw = build_graph(25);
    let bytes = hnsw.serialize();
    let restored = Hnsw::deserialize(&bytes).unwrap();

    assert_eq!(hnsw.len(), restored.len());
    assert_eq!(hnsw.dimension(), restored.dimension());
    assert_eq!(hnsw.params(), restored.params());
    assert_eq!(hnsw.metric(), restored.metric());
    for i in 0..25u32 {
        assert_eq!(hnsw.get_vector(i), restored.get_vector(i));
    }
}

#[test]
fn test_roundtrip_search_results_identical() {
    let hnsw = build_graph(40);
    let restored = Hnsw::deserialize(&hnsw.serialize()).unwrap();

    for query in [[0.6, 0.4, 0.0], [-0.2, 0.9, 0.3], [0.0, 0.0, 1.0]] {
        assert_eq!(hnsw.search_knn(&query, 10), restored.search_knn(&query, 10));
    }
}

#[test]
fn test_serialization_is_reproducible() {
    let hnsw = build_graph(15);
    let bytes = hnsw.serialize();
    let restored = Hnsw::deserialize(&bytes).unwrap();
    // Restoring and re-serializing yields identical bytes.
    assert_eq!(bytes, restored.serialize());
}

#[test]
fn test_invalid_magic_fails() {
    let mut bytes = build_graph(5).serialize();
    bytes[0] = 0x00;
    assert!(Hnsw::deserialize(&bytes).is_err());
}

#[test]
fn test_unsupported_version_fails() {
    let mut bytes = build_graph(5).serialize();
    bytes[4] = 99; // version byte follows the 4-byte magic
    assert!(Hnsw::deserialize(&bytes).is_err());
}

#[test]
fn test_truncated_buffer_fails() {
    let bytes = build_graph(10).serialize();
    let truncated = &bytes[..bytes.len() - 7];
    assert!(Hnsw::deserialize(truncated).is_err());
}

#[test]
fn test_large_params_survive_roundtrip() {
    let params = HnswParams {
        connectivity: 16,
        expansion_add: 100_000,
        expansion_search: 70_000,
    };
    let mut hnsw = Hnsw::new(params, Metric::Cosine);
    hnsw.add_point(0, vec![1.0, 0.0]).unwrap();
    hnsw.add_point(1, vec![0.0, 1.0]).unwrap();

    let restored = Hnsw::deserialize(&hnsw.serialize()).unwrap();
    assert_eq!(restored.params(), params);
}

#[test]
fn test_euclidean_metric_survives_roundtrip() {
    let mut hnsw = Hnsw::new(HnswParams::default(), Metric::Euclidean);
    hnsw.add_point(0, vec![0.0, 0.0]).unwrap();
    hnsw.add_point(1, vec![3.0, 3.0]).unwrap();

    let restored = Hnsw::deserialize(&hnsw.serialize()).unwrap();
    assert_eq!(restored.metric(), Metric::Euclidean);
    assert_eq!(hnsw.search_knn(&[1.0, 1.0], 2), restored.search_knn(&[1.0, 1.0], 2));
}
