//! Register-free counterparts of the oracle, over plain values.

use crate::tables::{CoefficientTables, Threshold};

/// The visiting order selected by `assignment`.
pub fn permutation(num_nodes: usize, assignment: &[u64]) -> Vec<usize> {
    let mut itinerary: Vec<usize> = (1..num_nodes).collect();
    for (step, &offset) in assignment.iter().enumerate() {
        itinerary.swap(step, step + offset as usize);
    }
    itinerary
}

/// Greedy capacity-split route length on the quantized tables.
pub fn greedy_route_length(tables: &CoefficientTables, itinerary: &[usize]) -> u64 {
    let (Some(&first), Some(&last)) = (itinerary.first(), itinerary.last()) else {
        return 0;
    };
    let mut length = tables.distance(0, first) + tables.distance(last, 0);
    let mut load = tables.demand(first);
    for pair in itinerary.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        let demand = tables.demand(cur);
        if load + demand <= tables.capacity() {
            load += demand;
            length += tables.distance(prev, cur);
        } else {
            load = demand;
            length += tables.distance(prev, 0) + tables.distance(0, cur);
        }
    }
    length
}

pub fn is_accepted(tables: &CoefficientTables, assignment: &[u64], threshold: Threshold) -> bool {
    let itinerary = permutation(tables.num_nodes(), assignment);
    greedy_route_length(tables, &itinerary) <= threshold.raw()
}

/// Number of clusters the greedy split opens for `itinerary`.
pub fn cluster_count(tables: &CoefficientTables, itinerary: &[usize]) -> usize {
    let mut clusters = 0;
    let mut load = 0;
    for &stop in itinerary {
        let demand = tables.demand(stop);
        if clusters == 0 || load + demand > tables.capacity() {
            clusters += 1;
            load = 0;
        }
        load += demand;
    }
    clusters
}
