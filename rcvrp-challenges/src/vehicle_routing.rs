use anyhow::{anyhow, Result};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{from_value, Map, Value};
use statrs::function::erf::{erf, erf_inv};
use std::collections::HashSet;

pub const GRID_SIZE: f64 = 1000.0;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Difficulty {
    pub num_nodes: usize,
    pub max_capacity: u64,
}

impl From<Vec<i32>> for Difficulty {
    fn from(arr: Vec<i32>) -> Self {
        Self {
            num_nodes: arr[0] as usize,
            max_capacity: arr[1] as u64,
        }
    }
}

impl Into<Vec<i32>> for Difficulty {
    fn into(self) -> Vec<i32> {
        vec![self.num_nodes as i32, self.max_capacity as i32]
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Solution {
    pub routes: Vec<Vec<usize>>,
}

impl TryFrom<Map<String, Value>> for Solution {
    type Error = serde_json::Error;

    fn try_from(v: Map<String, Value>) -> Result<Self, Self::Error> {
        from_value(Value::Object(v))
    }
}

/// A capacitated vehicle routing instance. Node 0 is the depot.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Challenge {
    pub seed: [u8; 32],
    pub num_nodes: usize,
    #[serde(default)]
    pub node_positions: Vec<(f64, f64)>,
    pub demands: Vec<u64>,
    pub distance_matrix: Vec<Vec<f64>>,
    pub max_capacity: u64,
}

impl Challenge {
    pub fn generate_instance(seed: &[u8; 32], difficulty: &Difficulty) -> Result<Self> {
        if difficulty.num_nodes == 0 {
            return Err(anyhow!("An instance needs at least the depot node"));
        }
        let mut rng = SmallRng::from_seed(seed.clone());
        let num_nodes = difficulty.num_nodes;

        let num_clusters = rng.gen_range(1..=3).min(num_nodes - 1);
        let mut node_positions: Vec<(f64, f64)> = Vec::with_capacity(num_nodes);
        let mut node_positions_set: HashSet<(i64, i64)> = HashSet::with_capacity(num_nodes);
        let centre = GRID_SIZE / 2.0;
        node_positions.push((centre, centre)); // Depot is node 0, and in the center
        node_positions_set.insert((centre as i64, centre as i64));

        while node_positions.len() < num_nodes {
            let node = node_positions.len();
            let pos = if node <= num_clusters || rng.gen::<f64>() < 0.5 {
                (
                    rng.gen_range(0..=GRID_SIZE as i64),
                    rng.gen_range(0..=GRID_SIZE as i64),
                )
            } else {
                let (cx, cy) = node_positions[rng.gen_range(1..=num_clusters)];
                (
                    truncated_normal_sample(&mut rng, cx, 60.0, 0.0, GRID_SIZE).round() as i64,
                    truncated_normal_sample(&mut rng, cy, 60.0, 0.0, GRID_SIZE).round() as i64,
                )
            };
            if !node_positions_set.insert(pos) {
                continue;
            }
            node_positions.push((pos.0 as f64, pos.1 as f64));
        }

        let mut demands: Vec<u64> = (0..num_nodes).map(|_| rng.gen_range(1..=35)).collect();
        demands[0] = 0;

        let mut c = Self::from_coordinates(node_positions, demands, difficulty.max_capacity)?;
        c.seed = seed.clone();
        Ok(c)
    }

    pub fn from_coordinates(
        node_positions: Vec<(f64, f64)>,
        demands: Vec<u64>,
        max_capacity: u64,
    ) -> Result<Self> {
        let distance_matrix = node_positions
            .iter()
            .map(|&(fx, fy)| {
                node_positions
                    .iter()
                    .map(|&(tx, ty)| (fx - tx).hypot(fy - ty))
                    .collect()
            })
            .collect();
        let c = Challenge {
            seed: [0; 32],
            num_nodes: node_positions.len(),
            node_positions,
            demands,
            distance_matrix,
            max_capacity,
        };
        c.validate()?;
        Ok(c)
    }

    pub fn from_distance_matrix(
        distance_matrix: Vec<Vec<f64>>,
        demands: Vec<u64>,
        max_capacity: u64,
    ) -> Result<Self> {
        let c = Challenge {
            seed: [0; 32],
            num_nodes: distance_matrix.len(),
            node_positions: Vec::new(),
            demands,
            distance_matrix,
            max_capacity,
        };
        c.validate()?;
        Ok(c)
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.num_nodes;
        if n == 0 {
            return Err(anyhow!("An instance needs at least the depot node"));
        }
        if self.max_capacity == 0 {
            return Err(anyhow!("Max capacity must be positive"));
        }
        if !self.node_positions.is_empty() && self.node_positions.len() != n {
            return Err(anyhow!(
                "Expected {} node positions, got {}",
                n,
                self.node_positions.len()
            ));
        }
        if self.demands.len() != n {
            return Err(anyhow!(
                "Expected {} demands, got {}",
                n,
                self.demands.len()
            ));
        }
        if self.demands[0] != 0 {
            return Err(anyhow!("The depot (node 0) must have zero demand"));
        }
        if let Some(node) = (1..n).find(|&node| self.demands[node] == 0) {
            return Err(anyhow!(
                "Node {} has zero demand; zero-demand stops are not supported by the oracle",
                node
            ));
        }
        if self
            .demands
            .iter()
            .try_fold(0u64, |acc, &d| acc.checked_add(d))
            .is_none()
        {
            return Err(anyhow!("Total demand overflows a 64-bit counter"));
        }
        if self.distance_matrix.len() != n
            || self.distance_matrix.iter().any(|row| row.len() != n)
        {
            return Err(anyhow!("Distance matrix must be {}x{}", n, n));
        }
        for (i, row) in self.distance_matrix.iter().enumerate() {
            if let Some(j) = row.iter().position(|d| !d.is_finite() || *d < 0.0) {
                return Err(anyhow!(
                    "Distance from {} to {} must be a non-negative number",
                    i,
                    j
                ));
            }
        }
        Ok(())
    }

    /// Sum of all demands, saturating for instances that fail [`Challenge::validate`].
    pub fn total_demand(&self) -> u64 {
        self.demands
            .iter()
            .fold(0u64, |acc, &d| acc.saturating_add(d))
    }

    pub fn max_distance(&self) -> f64 {
        self.distance_matrix
            .iter()
            .flatten()
            .fold(0.0, |acc, &d| acc.max(d))
    }

    /// Splits a visiting order into depot-bounded routes, dispatching a new
    /// vehicle whenever the next stop would exceed the capacity.
    pub fn split_routes(&self, itinerary: &[usize]) -> Vec<Vec<usize>> {
        let mut routes = Vec::new();
        let mut route = vec![0];
        let mut load = 0;
        for &node in itinerary {
            let demand = self.demands[node];
            if route.len() > 1 && load + demand > self.max_capacity {
                route.push(0);
                routes.push(route);
                route = vec![0];
                load = 0;
            }
            route.push(node);
            load += demand;
        }
        if route.len() > 1 {
            route.push(0);
            routes.push(route);
        }
        routes
    }

    pub fn greedy_route_length(&self, itinerary: &[usize]) -> f64 {
        self.split_routes(itinerary)
            .iter()
            .map(|route| {
                route
                    .windows(2)
                    .map(|w| self.distance_matrix[w[0]][w[1]])
                    .sum::<f64>()
            })
            .sum()
    }

    /// Greedy length of the itinerary visiting stops in index order.
    pub fn baseline_length(&self) -> f64 {
        let itinerary: Vec<usize> = (1..self.num_nodes).collect();
        self.greedy_route_length(&itinerary)
    }

    pub fn verify_solution(&self, solution: &Solution) -> Result<f64> {
        let mut total_distance = 0.0;
        let mut visited = vec![false; self.num_nodes];
        visited[0] = true;

        for route in &solution.routes {
            if route.len() <= 2 || route[0] != 0 || route[route.len() - 1] != 0 {
                return Err(anyhow!("Each route must start and end at node 0 (the depot), and visit at least one non-depot node"));
            }

            let mut load = 0;
            let mut current_node = 0;
            for &node in &route[1..route.len() - 1] {
                if node == 0 || node >= self.num_nodes {
                    return Err(anyhow!("Route visits invalid node {}", node));
                }
                if visited[node] {
                    return Err(anyhow!(
                        "The same non-depot node cannot be visited more than once"
                    ));
                }
                visited[node] = true;
                load += self.demands[node];
                total_distance += self.distance_matrix[current_node][node];
                current_node = node;
            }
            // a lone stop heavier than the vehicle still gets its own dispatch
            if load > self.max_capacity && route.len() > 3 {
                return Err(anyhow!(
                    "The total demand on each route must not exceed max capacity"
                ));
            }
            total_distance += self.distance_matrix[current_node][0];
        }

        if visited.iter().any(|&v| !v) {
            return Err(anyhow!("All nodes must be visited"));
        }

        Ok(total_distance)
    }
}

fn truncated_normal_sample<T: Rng>(
    rng: &mut T,
    mean: f64,
    std_dev: f64,
    min_val: f64,
    max_val: f64,
) -> f64 {
    let cdf_min = 0.5 * (1.0 + erf((min_val - mean) / (std_dev * (2.0_f64).sqrt())));
    let cdf_max = 0.5 * (1.0 + erf((max_val - mean) / (std_dev * (2.0_f64).sqrt())));
    let sample = rng.gen::<f64>() * (cdf_max - cdf_min) + cdf_min;
    mean + std_dev * (2.0_f64).sqrt() * erf_inv(2.0 * sample - 1.0)
}
