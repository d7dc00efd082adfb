use crate::tables::{min_precision, MAX_PRECISION};
use anyhow::{anyhow, Result};
use rcvrp_challenges::Challenge;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OracleConfig {
    pub precision: u32,
    pub threshold_ratio: f64,
    pub threshold: Option<f64>,
    pub num_workers: usize,
    pub max_candidates: u64,
}

impl OracleConfig {
    pub fn defaults(challenge: &Challenge) -> Self {
        // half a bit of precision per doubling of the distance scale
        let scale_bits = challenge.max_distance().max(1.0).log2().ceil() as u32;
        let precision = (5 + scale_bits / 2)
            .max(min_precision(challenge.num_nodes))
            .min(MAX_PRECISION);
        Self {
            precision,
            threshold_ratio: 0.8,
            threshold: None,
            num_workers: 1,
            max_candidates: 3_628_800,
        }
    }

    /// Overlays `hyperparameters` onto [`OracleConfig::defaults`].
    pub fn initialize(
        hyperparameters: &Option<Map<String, Value>>,
        challenge: &Challenge,
    ) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::defaults(challenge))?;
        if let (Value::Object(ref mut obj), Some(map)) = (&mut merged, hyperparameters) {
            for (k, v) in map {
                if !obj.contains_key(k) {
                    return Err(anyhow!("Unknown hyperparameter '{}'", k));
                }
                obj.insert(k.clone(), v.clone());
            }
        }
        let config: Self = serde_json::from_value(merged)
            .map_err(|e| anyhow!("Invalid hyperparameters: {}", e))?;
        if config.num_workers == 0 {
            return Err(anyhow!("num_workers must be at least 1"));
        }
        if !config.threshold_ratio.is_finite() || config.threshold_ratio < 0.0 {
            return Err(anyhow!("threshold_ratio must be a non-negative number"));
        }
        Ok(config)
    }

    /// Threshold in instance units: the absolute `threshold` if given,
    /// otherwise `threshold_ratio` times the baseline route length.
    pub fn threshold_for(&self, challenge: &Challenge) -> f64 {
        self.threshold
            .unwrap_or_else(|| self.threshold_ratio * challenge.baseline_length())
    }
}
