#![allow(dead_code)]

use rand::{rngs::SmallRng, Rng, SeedableRng};
use rcvrp_challenges::{Challenge, Difficulty};
use rcvrp_oracle::{CoefficientTables, OracleConfig};

pub const CAPACITIES: [u64; 5] = [1, 20, 35, 60, 1000];

pub fn unit_square(capacity: u64) -> Challenge {
    Challenge::from_coordinates(
        vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)],
        vec![0, 1, 1, 1],
        capacity,
    )
    .unwrap()
}

pub fn generated(seed: u8, num_nodes: usize, max_capacity: u64) -> Challenge {
    Challenge::generate_instance(
        &[seed; 32],
        &Difficulty {
            num_nodes,
            max_capacity,
        },
    )
    .unwrap()
}

/// Random asymmetric distances, to catch mixed-up edge directions.
pub fn asymmetric(seed: u64, num_nodes: usize, max_capacity: u64) -> Challenge {
    let mut rng = SmallRng::seed_from_u64(seed);
    let distance_matrix = (0..num_nodes)
        .map(|i| {
            (0..num_nodes)
                .map(|j| if i == j { 0.0 } else { rng.gen_range(1.0..100.0) })
                .collect()
        })
        .collect();
    let mut demands: Vec<u64> = (0..num_nodes).map(|_| rng.gen_range(1..=10)).collect();
    demands[0] = 0;
    Challenge::from_distance_matrix(distance_matrix, demands, max_capacity).unwrap()
}

pub fn default_tables(challenge: &Challenge) -> CoefficientTables {
    CoefficientTables::new(challenge, OracleConfig::defaults(challenge).precision).unwrap()
}
