use crate::register::{width_for, Arena, Register, RegisterKind};
use anyhow::{anyhow, Result};

/// The value ranges of the selectors for an instance with `num_nodes`
/// nodes: selector `i` ranges over `[0, num_nodes - 1 - i)`.
///
/// The final factor of the factorial number system always has range 1, so
/// there are `num_nodes - 2` selectors (none for two nodes or fewer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSpace {
    ranges: Vec<u64>,
}

impl SelectorSpace {
    pub fn new(num_nodes: usize) -> Self {
        let num_stops = num_nodes.saturating_sub(1) as u64;
        Self {
            ranges: (0..num_stops.saturating_sub(1))
                .map(|i| num_stops - i)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[u64] {
        &self.ranges
    }

    /// `(num_nodes - 1)!`, or `None` if it overflows.
    pub fn num_candidates(&self) -> Option<u64> {
        self.ranges
            .iter()
            .try_fold(1u64, |acc, &range| acc.checked_mul(range))
    }

    /// Mixed-radix decoding of `rank`, selector 0 most significant.
    pub fn assignment(&self, mut rank: u64) -> Vec<u64> {
        let mut digits = vec![0; self.ranges.len()];
        for (digit, &range) in digits.iter_mut().zip(&self.ranges).rev() {
            *digit = rank % range;
            rank /= range;
        }
        digits
    }

    pub fn check(&self, values: &[u64]) -> Result<()> {
        if values.len() != self.ranges.len() {
            return Err(anyhow!(
                "Expected {} selector values, got {}",
                self.ranges.len(),
                values.len()
            ));
        }
        for (i, (&value, &range)) in values.iter().zip(&self.ranges).enumerate() {
            if value >= range {
                return Err(anyhow!(
                    "Selector {} value {} is outside [0, {})",
                    i,
                    value,
                    range
                ));
            }
        }
        Ok(())
    }

    /// Every assignment in rank order.
    pub fn iter(&self) -> impl Iterator<Item = Vec<u64>> + '_ {
        let count = self.num_candidates().unwrap_or(u64::MAX);
        (0..count).map(move |rank| self.assignment(rank))
    }
}

/// Selector registers supplied by the driver.
#[derive(Debug)]
pub struct SelectorSet {
    registers: Vec<Register>,
    ranges: Vec<u64>,
}

impl SelectorSet {
    pub fn allocate(arena: &mut Arena, space: &SelectorSpace, values: &[u64]) -> Result<Self> {
        space.check(values)?;
        let registers = values
            .iter()
            .zip(space.ranges())
            .map(|(&value, &range)| {
                arena.allocate("selector", RegisterKind::Selector, width_for(range - 1), value)
            })
            .collect();
        Ok(Self {
            registers,
            ranges: space.ranges().to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn register(&self, i: usize) -> &Register {
        &self.registers[i]
    }

    pub fn range(&self, i: usize) -> u64 {
        self.ranges[i]
    }

    pub fn values(&self, arena: &Arena) -> Vec<u64> {
        self.registers.iter().map(|r| arena.value(r)).collect()
    }

    /// Releases the selectors, which must hold the values they were
    /// allocated with.
    pub fn release(self, arena: &mut Arena) {
        for register in self.registers.into_iter().rev() {
            arena.release(register);
        }
    }
}
