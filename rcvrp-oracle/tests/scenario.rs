mod common;

use rcvrp_oracle::{Arena, CoefficientTables, SelectorSet, ThresholdOracle};

// (0,0) depot, stops at (1,0), (1,1), (0,1), all with demand 1.
const UNIT: u64 = 46340;
const DIAGONAL: u64 = 65535;

fn lengths(tables: &CoefficientTables) -> Vec<(Vec<u64>, u64)> {
    let oracle = ThresholdOracle::new(tables);
    let space = tables.selector_space();
    let mut arena = Arena::new();
    space
        .iter()
        .map(|assignment| {
            let selectors = SelectorSet::allocate(&mut arena, &space, &assignment).unwrap();
            let length = oracle.measure(&mut arena, &selectors).unwrap();
            selectors.release(&mut arena);
            (assignment, length)
        })
        .collect()
}

fn marked(tables: &CoefficientTables, threshold: f64) -> Vec<Vec<u64>> {
    let oracle = ThresholdOracle::new(tables);
    let space = tables.selector_space();
    let threshold = tables.threshold(threshold).unwrap();
    let mut arena = Arena::new();
    let mut marked = Vec::new();
    for assignment in space.iter() {
        let selectors = SelectorSet::allocate(&mut arena, &space, &assignment).unwrap();
        let mut marker = |a: &[u64]| marked.push(a.to_vec());
        oracle
            .evaluate(&mut arena, &selectors, threshold, &mut marker)
            .unwrap();
        selectors.release(&mut arena);
    }
    assert_eq!(arena.depth(), 0);
    marked
}

#[test]
fn test_fixed_point_table() {
    let tables = CoefficientTables::new(&common::unit_square(3), 16).unwrap();
    assert_eq!(tables.distance(0, 1), UNIT);
    assert_eq!(tables.distance(0, 2), DIAGONAL);
    assert_eq!(tables.distance(1, 1), 0);
    assert_eq!(tables.accumulator_width(), 32);
    assert!((tables.to_real(4 * UNIT) - 4.0).abs() < 1e-3);
}

#[test]
fn test_single_vehicle_square() {
    let tables = CoefficientTables::new(&common::unit_square(100), 16).unwrap();
    let lengths = lengths(&tables);
    assert_eq!(lengths.len(), 6);
    for (assignment, length) in &lengths {
        let expected = match assignment.as_slice() {
            [0, 0] | [2, 0] => 4 * UNIT,
            _ => 2 * UNIT + 2 * DIAGONAL,
        };
        assert_eq!(*length, expected, "assignment {:?}", assignment);
    }

    assert_eq!(marked(&tables, 4.01), vec![vec![0, 0], vec![2, 0]]);
    assert!(marked(&tables, 3.99).is_empty());
    assert!(marked(&tables, 0.0).is_empty());
    assert_eq!(marked(&tables, 5.0).len(), 6);
}

#[test]
fn test_one_vehicle_per_stop() {
    let tables = CoefficientTables::new(&common::unit_square(1), 16).unwrap();
    let there_and_back = 2 * (UNIT + DIAGONAL + UNIT);
    for (_, length) in lengths(&tables) {
        assert_eq!(length, there_and_back);
    }
    assert!(marked(&tables, 4.01).is_empty());
    assert_eq!(marked(&tables, 7.0).len(), 6);
}

#[test]
fn test_two_vehicles() {
    // capacity 2: the third stop always needs a second vehicle
    let tables = CoefficientTables::new(&common::unit_square(2), 16).unwrap();
    for (assignment, length) in lengths(&tables) {
        let stops = rcvrp_oracle::reference::permutation(4, &assignment);
        let expected = tables.distance(0, stops[0])
            + tables.distance(stops[0], stops[1])
            + tables.distance(stops[1], 0)
            + tables.distance(0, stops[2])
            + tables.distance(stops[2], 0);
        assert_eq!(length, expected, "assignment {:?}", assignment);
    }
}
