use crate::distance;
use crate::permutation;
use crate::register::Arena;
use crate::selector::SelectorSet;
use crate::tables::{CoefficientTables, Threshold};
use anyhow::Result;
use tracing::debug;

/// The driver's marking primitive, called with the selector assignment of
/// every accepted candidate.
pub trait Marker {
    fn mark(&mut self, assignment: &[u64]);
}

impl<F: FnMut(&[u64])> Marker for F {
    fn mark(&mut self, assignment: &[u64]) {
        self(assignment)
    }
}

/// Marks candidates whose greedy route length is within a threshold,
/// leaving no other trace in the arena.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdOracle<'a> {
    tables: &'a CoefficientTables,
}

impl<'a> ThresholdOracle<'a> {
    pub fn new(tables: &'a CoefficientTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &'a CoefficientTables {
        self.tables
    }

    /// Runs permutation and distance forward, marks the candidate if the
    /// length is within `threshold`, then runs both passes backward.
    ///
    /// Returns an error only for precondition violations, before any
    /// register is allocated. Consistency faults inside the passes panic.
    pub fn evaluate<M: Marker + ?Sized>(
        &self,
        arena: &mut Arena,
        selectors: &SelectorSet,
        threshold: Threshold,
        marker: &mut M,
    ) -> Result<()> {
        let assignment = self.check(arena, selectors)?;
        let depth = arena.depth();

        let itinerary = permutation::forward(arena, self.tables, selectors);
        let route = distance::forward(arena, self.tables, &itinerary);

        let length = route.length(arena);
        let accepted = arena.flag("below_threshold");
        if length <= threshold.raw() {
            arena.flip(&accepted);
        }
        let marked = arena.is_set(&accepted);
        if marked {
            marker.mark(&assignment);
        }
        if length <= threshold.raw() {
            arena.flip(&accepted);
        }
        arena.release(accepted);

        distance::backward(arena, self.tables, &itinerary, route);
        permutation::backward(arena, selectors, itinerary);

        assert_eq!(arena.depth(), depth, "evaluation left registers allocated");
        debug!(
            ?assignment,
            length,
            threshold = threshold.raw(),
            marked,
            "evaluated candidate"
        );
        Ok(())
    }

    /// Greedy route length of the candidate, as a raw accumulator value.
    pub fn measure(&self, arena: &mut Arena, selectors: &SelectorSet) -> Result<u64> {
        self.check(arena, selectors)?;
        let depth = arena.depth();

        let itinerary = permutation::forward(arena, self.tables, selectors);
        let route = distance::forward(arena, self.tables, &itinerary);
        let length = route.length(arena);
        distance::backward(arena, self.tables, &itinerary, route);
        permutation::backward(arena, selectors, itinerary);

        assert_eq!(arena.depth(), depth, "measurement left registers allocated");
        Ok(length)
    }

    fn check(&self, arena: &Arena, selectors: &SelectorSet) -> Result<Vec<u64>> {
        let assignment = selectors.values(arena);
        self.tables.selector_space().check(&assignment)?;
        Ok(assignment)
    }
}
