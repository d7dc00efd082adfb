use crate::register::{Arena, Register, RegisterKind};
use crate::tables::CoefficientTables;

/// Per-cluster demand counters and the index of the active cluster.
#[derive(Debug)]
pub struct DemandLedger {
    counters: Vec<Register>,
    indexer: Register,
}

impl DemandLedger {
    pub fn allocate(arena: &mut Arena, tables: &CoefficientTables) -> Self {
        let counters = (0..tables.ledger_size())
            .map(|_| {
                arena.allocate(
                    "demand_counter",
                    RegisterKind::Counter,
                    tables.counter_width(),
                    0,
                )
            })
            .collect();
        let indexer = arena.allocate(
            "cluster_indexer",
            RegisterKind::Indexer,
            tables.indexer_width(),
            0,
        );
        Self { counters, indexer }
    }

    pub fn active(&self, arena: &Arena) -> usize {
        arena.value(&self.indexer) as usize
    }

    pub fn active_load(&self, arena: &Arena) -> u64 {
        arena.value(&self.counters[self.active(arena)])
    }

    pub fn loads(&self, arena: &Arena) -> Vec<u64> {
        self.counters.iter().map(|r| arena.value(r)).collect()
    }

    pub fn add_active(&self, arena: &mut Arena, demand: u64) {
        let active = self.active(arena);
        arena.add(&self.counters[active], demand);
    }

    pub fn sub_active(&self, arena: &mut Arena, demand: u64) {
        let active = self.active(arena);
        arena.sub(&self.counters[active], demand);
    }

    pub fn advance(&self, arena: &mut Arena) {
        if self.active(arena) + 1 >= self.counters.len() {
            panic!(
                "internal consistency fault: cluster ledger exhausted after {} clusters",
                self.counters.len()
            );
        }
        arena.add(&self.indexer, 1);
    }

    pub fn retreat(&self, arena: &mut Arena) {
        if self.active(arena) == 0 {
            panic!("internal consistency fault: cluster indexer retreated past the first cluster");
        }
        arena.sub(&self.indexer, 1);
    }

    /// Releases the indexer, then every counter. All must be zero.
    pub fn release(self, arena: &mut Arena) {
        arena.release(self.indexer);
        for counter in self.counters.into_iter().rev() {
            arena.release(counter);
        }
    }
}
