mod common;

use rcvrp_oracle::{
    reference, tables::min_precision, Arena, Marker, OracleConfig, RegisterKind, SelectorSet,
    SelectorSpace, Threshold, ThresholdOracle,
};
use serde_json::json;
use std::collections::BTreeSet;

#[derive(Default)]
struct Collect {
    marked: BTreeSet<Vec<u64>>,
}

impl Marker for Collect {
    fn mark(&mut self, assignment: &[u64]) {
        self.marked.insert(assignment.to_vec());
    }
}

fn sweep(oracle: &ThresholdOracle, threshold: Threshold) -> BTreeSet<Vec<u64>> {
    let space = oracle.tables().selector_space();
    let mut arena = Arena::new();
    let mut collect = Collect::default();
    for assignment in space.iter() {
        let selectors = SelectorSet::allocate(&mut arena, &space, &assignment).unwrap();
        oracle
            .evaluate(&mut arena, &selectors, threshold, &mut collect)
            .unwrap();
        selectors.release(&mut arena);
    }
    collect.marked
}

#[test]
fn test_marks_match_reference_at_every_length() {
    for (seed, capacity) in [(0, 20), (1, 35), (2, 60), (3, 1)] {
        let challenge = common::generated(seed, 6, capacity);
        let tables = common::default_tables(&challenge);
        let oracle = ThresholdOracle::new(&tables);
        let space = tables.selector_space();

        let lengths: BTreeSet<u64> = space
            .iter()
            .map(|a| reference::greedy_route_length(&tables, &reference::permutation(6, &a)))
            .collect();
        for &length in &lengths {
            for raw in [length, length.saturating_sub(1)] {
                let threshold = Threshold::from_raw(raw);
                let expected: BTreeSet<Vec<u64>> = space
                    .iter()
                    .filter(|a| reference::is_accepted(&tables, a, threshold))
                    .collect();
                assert_eq!(sweep(&oracle, threshold), expected, "threshold {}", raw);
            }
        }
    }
}

#[test]
fn test_extreme_thresholds() {
    let challenge = common::generated(4, 5, 35);
    let tables = common::default_tables(&challenge);
    let oracle = ThresholdOracle::new(&tables);
    assert!(sweep(&oracle, Threshold::from_raw(0)).is_empty());

    let everything = tables.threshold(f64::MAX).unwrap();
    assert_eq!(everything.raw(), (1 << tables.accumulator_width()) - 1);
    assert_eq!(sweep(&oracle, everything).len(), 24);
}

#[test]
fn test_evaluation_leaves_no_residue() {
    let challenge = common::asymmetric(11, 6, 12);
    let tables = common::default_tables(&challenge);
    let oracle = ThresholdOracle::new(&tables);
    let space = tables.selector_space();
    let threshold = tables.threshold(challenge.baseline_length()).unwrap();

    let mut arena = Arena::new();
    let driver = arena.allocate("driver", RegisterKind::Counter, 8, 0b1011_0110);
    for assignment in space.iter() {
        let selectors = SelectorSet::allocate(&mut arena, &space, &assignment).unwrap();
        let before = arena.snapshot();
        let mut count = 0;
        let mut marker = |_: &[u64]| count += 1;
        oracle
            .evaluate(&mut arena, &selectors, threshold, &mut marker)
            .unwrap();
        assert_eq!(arena.snapshot(), before);
        assert!(count <= 1);
        selectors.release(&mut arena);
    }
    assert!(arena.peak_depth() > arena.depth());
    arena.release(driver);
    assert_eq!(arena.depth(), 0);
}

#[test]
fn test_measure_matches_reference() {
    let challenge = common::generated(8, 6, 60);
    let tables = common::default_tables(&challenge);
    let oracle = ThresholdOracle::new(&tables);
    let space = tables.selector_space();
    let mut arena = Arena::new();
    for assignment in space.iter() {
        let selectors = SelectorSet::allocate(&mut arena, &space, &assignment).unwrap();
        let length = oracle.measure(&mut arena, &selectors).unwrap();
        let itinerary = reference::permutation(6, &assignment);
        assert_eq!(length, reference::greedy_route_length(&tables, &itinerary));
        selectors.release(&mut arena);
    }
}

#[test]
fn test_rejects_preconditions() {
    let challenge = common::generated(2, 6, 35);
    let tables = common::default_tables(&challenge);
    let oracle = ThresholdOracle::new(&tables);
    let mut arena = Arena::new();

    let short = SelectorSet::allocate(&mut arena, &SelectorSpace::new(5), &[0, 0, 0]).unwrap();
    let depth = arena.depth();
    let mut collect = Collect::default();
    assert!(oracle
        .evaluate(&mut arena, &short, Threshold::from_raw(u64::MAX), &mut collect)
        .is_err());
    assert!(collect.marked.is_empty());
    assert!(oracle.measure(&mut arena, &short).is_err());
    assert_eq!(arena.depth(), depth);
    short.release(&mut arena);

    assert!(tables.threshold(-1.0).is_err());
    assert!(tables.threshold(f64::NAN).is_err());
    assert!(tables.threshold(f64::INFINITY).is_err());
    assert!(tables.threshold(f64::NEG_INFINITY).is_err());
}

#[test]
fn test_parallel_workers_agree() {
    let challenge = common::generated(6, 6, 35);
    let tables = common::default_tables(&challenge);
    let oracle = ThresholdOracle::new(&tables);
    let space = tables.selector_space();
    let threshold = tables.threshold(challenge.baseline_length()).unwrap();
    let total = space.num_candidates().unwrap();
    let num_workers = 3;

    let marked: BTreeSet<Vec<u64>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..num_workers)
            .map(|worker| {
                let space = &space;
                s.spawn(move || {
                    let mut arena = Arena::new();
                    let mut collect = Collect::default();
                    for rank in (worker..total).step_by(num_workers as usize) {
                        let assignment = space.assignment(rank);
                        let selectors =
                            SelectorSet::allocate(&mut arena, space, &assignment).unwrap();
                        oracle
                            .evaluate(&mut arena, &selectors, threshold, &mut collect)
                            .unwrap();
                        selectors.release(&mut arena);
                    }
                    assert_eq!(arena.depth(), 0);
                    collect.marked
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });
    assert_eq!(marked, sweep(&oracle, threshold));
}

#[test]
fn test_config_defaults() {
    let square = common::unit_square(2);
    let config = OracleConfig::defaults(&square);
    assert_eq!(config.precision, 5);
    assert_eq!(config.threshold_ratio, 0.8);
    assert_eq!(config.threshold, None);
    assert_eq!(config.num_workers, 1);

    let generated = common::generated(0, 6, 35);
    let precision = OracleConfig::defaults(&generated).precision;
    assert!(precision >= min_precision(6) && precision <= 11);
    assert_eq!(
        OracleConfig::initialize(&None, &generated).unwrap(),
        OracleConfig::defaults(&generated)
    );
}

#[test]
fn test_config_overrides() {
    let challenge = common::generated(0, 6, 35);
    let hyperparameters = json!({"precision": 12, "threshold": 2500.0, "num_workers": 4});
    let config =
        OracleConfig::initialize(&hyperparameters.as_object().cloned(), &challenge).unwrap();
    assert_eq!(config.precision, 12);
    assert_eq!(config.num_workers, 4);
    assert_eq!(config.threshold_for(&challenge), 2500.0);

    let ratio = json!({"threshold_ratio": 0.5});
    let config = OracleConfig::initialize(&ratio.as_object().cloned(), &challenge).unwrap();
    assert_eq!(
        config.threshold_for(&challenge),
        0.5 * challenge.baseline_length()
    );

    for bad in [
        json!({"precison": 12}),
        json!({"num_workers": 0}),
        json!({"threshold_ratio": -1.0}),
        json!({"precision": "high"}),
    ] {
        assert!(OracleConfig::initialize(&bad.as_object().cloned(), &challenge).is_err());
    }
}
