use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ttc_toolkit::detected_points::ScoredPoint;
use ttc_toolkit::nms::{KeypointDeduplicator, SuppressionPolicy};
use ttc_toolkit::response::ResponseMap;

fn map_with(width: usize, height: usize, cells: &[(usize, usize, f32)]) -> ResponseMap {
    let mut map = ResponseMap::new(width, height);
    for &(x, y, v) in cells {
        map.set(x, y, v);
    }
    map
}

fn random_map(seed: u64, width: usize, height: usize) -> ResponseMap {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let data = (0..width * height).map(|_| rng.random_range(0.0..255.0)).collect();
    ResponseMap::from_vec(width, height, data).unwrap()
}

fn sorted(mut points: Vec<ScoredPoint>) -> Vec<ScoredPoint> {
    points.sort_by_key(|p| (p.pos.y, p.pos.x));
    points
}

fn deduplicator(policy: SuppressionPolicy) -> KeypointDeduplicator {
    KeypointDeduplicator::new(100.0, 3, policy).unwrap()
}

#[test]
fn test_overlap_ratio() {
    let a = ScoredPoint::new(10, 10, 1.0, 6.0);
    assert!((a.overlap(&a) - 1.0).abs() < 1e-6);

    let far = ScoredPoint::new(16, 10, 1.0, 6.0);
    assert_eq!(a.overlap(&far), 0.0);

    let near = ScoredPoint::new(13, 10, 1.0, 6.0);
    let o = a.overlap(&near);
    assert!(o > 0.0 && o < 1.0);
    assert!((o - near.overlap(&a)).abs() < 1e-6);

    let big = ScoredPoint::new(10, 10, 1.0, 12.0);
    assert!((a.overlap(&big) - 0.25).abs() < 1e-6);
}

#[test]
fn test_zero_aperture_is_rejected() {
    assert!(KeypointDeduplicator::new(100.0, 0, SuppressionPolicy::default()).is_err());
}

#[test]
fn test_single_peak() {
    let map = map_with(20, 20, &[(5, 7, 200.0)]);
    let points = deduplicator(SuppressionPolicy::AllConflicts).deduplicate(&map);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].pos.x, 5);
    assert_eq!(points[0].pos.y, 7);
    assert_eq!(points[0].score, 200.0);
    assert_eq!(points[0].size, 6.0);
}

#[test]
fn test_threshold_is_strict() {
    let map = map_with(20, 20, &[(5, 5, 100.0), (15, 15, 100.5)]);
    let points = deduplicator(SuppressionPolicy::AllConflicts).deduplicate(&map);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].pos.x, 15);
}

#[test]
fn test_stronger_later_candidate_replaces() {
    let map = map_with(20, 20, &[(5, 5, 150.0), (7, 5, 200.0)]);
    let points = deduplicator(SuppressionPolicy::AllConflicts).deduplicate(&map);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].pos.x, 7);

    let map = map_with(20, 20, &[(5, 5, 200.0), (7, 5, 150.0)]);
    let points = deduplicator(SuppressionPolicy::AllConflicts).deduplicate(&map);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].pos.x, 5);
}

#[test]
fn test_distant_peaks_survive() {
    let map = map_with(30, 30, &[(2, 2, 120.0), (12, 12, 130.0), (25, 3, 140.0)]);
    let points = deduplicator(SuppressionPolicy::FirstConflict).deduplicate(&map);
    assert_eq!(points.len(), 3);
}

#[test]
fn test_policies_differ_on_bridging_candidate() {
    // A and B do not overlap; C, scanned later, overlaps both.
    let cells = [(2, 0, 120.0), (10, 0, 180.0), (6, 1, 150.0)];
    let map = map_with(20, 5, &cells);

    let first = deduplicator(SuppressionPolicy::FirstConflict).deduplicate(&map);
    assert_eq!(first.len(), 2);
    assert_eq!((first[0].pos.x, first[0].pos.y), (6, 1));
    assert_eq!((first[1].pos.x, first[1].pos.y), (10, 0));
    assert!(first[0].overlap(&first[1]) > 0.0);

    let all = deduplicator(SuppressionPolicy::AllConflicts).deduplicate(&map);
    assert_eq!(all.len(), 2);
    assert_eq!((all[0].pos.x, all[0].pos.y), (2, 0));
    assert_eq!((all[1].pos.x, all[1].pos.y), (10, 0));

    let map = map_with(20, 5, &[(2, 0, 120.0), (10, 0, 180.0), (6, 1, 200.0)]);
    let all = deduplicator(SuppressionPolicy::AllConflicts).deduplicate(&map);
    assert_eq!(all.len(), 1);
    assert_eq!((all[0].pos.x, all[0].pos.y), (6, 1));
}

#[test]
fn test_first_conflict_skips_stronger_neighbor() {
    // C overlaps A and B; it loses to A but beats B, so only B is replaced
    let map = map_with(20, 5, &[(2, 0, 200.0), (10, 0, 120.0), (6, 1, 150.0)]);

    let first = deduplicator(SuppressionPolicy::FirstConflict).deduplicate(&map);
    assert_eq!(first.len(), 2);
    assert_eq!((first[0].pos.x, first[0].pos.y), (2, 0));
    assert_eq!(first[0].score, 200.0);
    assert_eq!((first[1].pos.x, first[1].pos.y), (6, 1));
    assert_eq!(first[1].score, 150.0);

    let all = deduplicator(SuppressionPolicy::AllConflicts).deduplicate(&map);
    assert_eq!(all.len(), 2);
    assert_eq!((all[0].pos.x, all[0].pos.y), (2, 0));
    assert_eq!((all[1].pos.x, all[1].pos.y), (10, 0));
}

#[test]
fn test_no_overlap_between_survivors() {
    let dedup = deduplicator(SuppressionPolicy::AllConflicts);
    for seed in 0..5 {
        let points = dedup.deduplicate(&random_map(seed, 48, 40));
        assert!(!points.is_empty());
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                assert_eq!(a.overlap(b), 0.0, "{:?} overlaps {:?}", a, b);
            }
        }
    }
}

#[test]
fn test_deterministic() {
    let map = random_map(11, 40, 40);
    for policy in [SuppressionPolicy::FirstConflict, SuppressionPolicy::AllConflicts] {
        let dedup = deduplicator(policy);
        assert_eq!(dedup.deduplicate(&map), dedup.deduplicate(&map));
    }
}

#[test]
fn test_idempotent_on_survivors() {
    let dedup = deduplicator(SuppressionPolicy::AllConflicts);
    let points = dedup.deduplicate(&random_map(3, 40, 40));

    let cells: Vec<_> = points
        .iter()
        .map(|p| (p.pos.x as usize, p.pos.y as usize, p.score))
        .collect();
    let survivors_only = map_with(40, 40, &cells);

    let again = dedup.deduplicate(&survivors_only);
    assert_eq!(sorted(again), sorted(points.clone()));

    let seeded = dedup.deduplicate_seeded(&survivors_only, points.clone());
    assert_eq!(seeded, points);
}

#[test]
fn test_seed_blocks_weaker_candidates() {
    let dedup = deduplicator(SuppressionPolicy::AllConflicts);
    let seed = vec![ScoredPoint::new(5, 5, 250.0, dedup.neighborhood_size())];
    let map = map_with(20, 20, &[(6, 6, 200.0), (15, 15, 150.0)]);
    let points = dedup.deduplicate_seeded(&map, seed);
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].pos.x, 5);
    assert_eq!(points[1].pos.x, 15);
}
