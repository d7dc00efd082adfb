use crate::register::width_for;
use crate::selector::SelectorSpace;
use anyhow::{anyhow, Result};
use rcvrp_challenges::Challenge;

pub const MAX_PRECISION: u32 = 31;

/// A threshold quantized onto the accumulator's fixed-point grid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Threshold(u64);

impl Threshold {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Read-only coefficient tables of one instance, in fixed point.
///
/// Distances are divided by `scaling` so the largest one maps to
/// `(2^p - 1) / 2^p`, then rounded to multiples of `2^-p`. The
/// accumulator is `2p` bits wide with `p` fractional bits.
#[derive(Debug, Clone)]
pub struct CoefficientTables {
    num_nodes: usize,
    precision: u32,
    scaling: f64,
    distances: Vec<u64>,
    demands: Vec<u64>,
    capacity: u64,
    ledger_size: usize,
    counter_width: u32,
    indexer_width: u32,
    stop_width: u32,
}

/// Smallest precision whose accumulator holds the longest possible route
/// over `num_nodes` nodes: `2 * (num_nodes - 1)` edges of maximal length.
pub fn min_precision(num_nodes: usize) -> u32 {
    let max_edges = 2 * num_nodes.saturating_sub(1) as u128;
    (1..=MAX_PRECISION)
        .find(|&p| fits_accumulator(max_edges, p))
        .unwrap_or(MAX_PRECISION + 1)
}

fn fits_accumulator(max_edges: u128, precision: u32) -> bool {
    max_edges * ((1u128 << precision) - 1) < (1u128 << (2 * precision))
}

impl CoefficientTables {
    pub fn new(challenge: &Challenge, precision: u32) -> Result<Self> {
        challenge.validate()?;
        if !(1..=MAX_PRECISION).contains(&precision) {
            return Err(anyhow!(
                "Precision must be between 1 and {}, got {}",
                MAX_PRECISION,
                precision
            ));
        }
        let num_nodes = challenge.num_nodes;
        if !fits_accumulator(2 * (num_nodes as u128 - 1), precision) {
            return Err(anyhow!(
                "Precision {} is too small for {} nodes (need at least {})",
                precision,
                num_nodes,
                min_precision(num_nodes)
            ));
        }

        let one = (1u64 << precision) as f64;
        let max_distance = challenge.max_distance();
        let scaling = if max_distance > 0.0 {
            max_distance * one / (one - 1.0)
        } else {
            1.0
        };
        let max_entry = (1u64 << precision) - 1;
        let distances = challenge
            .distance_matrix
            .iter()
            .flatten()
            .map(|&d| ((d / scaling * one).round() as u64).min(max_entry))
            .collect();

        let capacity = challenge.max_capacity;
        let total_demand = challenge.total_demand();
        let max_demand = challenge.demands.iter().copied().max().unwrap_or(0);
        let counter_max = total_demand.checked_add(max_demand).ok_or_else(|| {
            anyhow!(
                "Total demand {} plus largest demand {} overflows a counter",
                total_demand,
                max_demand
            )
        })?;
        // next-fit never opens more clusters than there are stops
        let num_stops = num_nodes - 1;
        let ledger_size = total_demand
            .div_ceil(capacity)
            .saturating_mul(2)
            .min(num_stops as u64)
            .max(1) as usize;

        Ok(Self {
            num_nodes,
            precision,
            scaling,
            distances,
            demands: challenge.demands.clone(),
            capacity,
            ledger_size,
            counter_width: width_for(counter_max),
            indexer_width: width_for(ledger_size as u64),
            stop_width: width_for(num_nodes.saturating_sub(1) as u64),
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Non-depot stops in an itinerary.
    pub fn num_stops(&self) -> usize {
        self.num_nodes - 1
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn distance(&self, from: usize, to: usize) -> u64 {
        self.distances[from * self.num_nodes + to]
    }

    pub fn demand(&self, node: usize) -> u64 {
        self.demands[node]
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn ledger_size(&self) -> usize {
        self.ledger_size
    }

    pub fn counter_width(&self) -> u32 {
        self.counter_width
    }

    pub fn indexer_width(&self) -> u32 {
        self.indexer_width
    }

    pub fn stop_width(&self) -> u32 {
        self.stop_width
    }

    pub fn accumulator_width(&self) -> u32 {
        2 * self.precision
    }

    pub fn selector_space(&self) -> SelectorSpace {
        SelectorSpace::new(self.num_nodes)
    }

    /// Quantizes a length in instance units, saturating at the accumulator
    /// maximum.
    fn quantize(&self, length: f64) -> u64 {
        let max = (1u64 << self.accumulator_width()) - 1;
        let raw = (length / self.scaling * (1u64 << self.precision) as f64).round();
        if raw >= max as f64 {
            max
        } else {
            raw as u64
        }
    }

    pub fn threshold(&self, length: f64) -> Result<Threshold> {
        if !length.is_finite() || length < 0.0 {
            return Err(anyhow!(
                "Threshold must be a non-negative number, got {}",
                length
            ));
        }
        Ok(Threshold(self.quantize(length)))
    }

    /// Converts an accumulator value back to instance units.
    pub fn to_real(&self, raw: u64) -> f64 {
        raw as f64 / (1u64 << self.precision) as f64 * self.scaling
    }
}
