//! Route length under the greedy capacity split, computed into registers
//! and uncomputed again.
//!
//! [`forward`] and [`backward`] are mirror images: every addition in the
//! forward pass has a matching subtraction in the backward pass, and the
//! backward pass recomputes each dispatch decision from the ledger instead
//! of remembering it.

use crate::ledger::DemandLedger;
use crate::permutation::Itinerary;
use crate::register::{Arena, Register, RegisterKind};
use crate::tables::CoefficientTables;
use tracing::trace;

const DEPOT: usize = 0;

/// Registers produced by [`forward`] and consumed by [`backward`].
#[derive(Debug)]
pub struct RouteState {
    pub accumulator: Register,
    pub ledger: DemandLedger,
}

impl RouteState {
    pub fn length(&self, arena: &Arena) -> u64 {
        arena.value(&self.accumulator)
    }
}

pub fn forward(arena: &mut Arena, tables: &CoefficientTables, itinerary: &Itinerary) -> RouteState {
    let stops = itinerary.stops(arena);
    let accumulator = arena.allocate(
        "distance",
        RegisterKind::Accumulator,
        tables.accumulator_width(),
        0,
    );
    let ledger = DemandLedger::allocate(arena, tables);

    if let (Some(&first), Some(&last)) = (stops.first(), stops.last()) {
        arena.add(&accumulator, tables.distance(DEPOT, first));
        arena.add(&accumulator, tables.distance(last, DEPOT));
        ledger.add_active(arena, tables.demand(first));
    }
    for pair in stops.windows(2) {
        forward_step(arena, tables, &accumulator, &ledger, pair[0], pair[1]);
    }

    RouteState {
        accumulator,
        ledger,
    }
}

fn forward_step(
    arena: &mut Arena,
    tables: &CoefficientTables,
    accumulator: &Register,
    ledger: &DemandLedger,
    prev: usize,
    cur: usize,
) {
    let demand = tables.demand(cur);
    let capacity = tables.capacity();

    ledger.add_active(arena, demand);
    let capped = arena.flag("capped");
    if ledger.active_load(arena) <= capacity {
        arena.flip(&capped);
    }
    if arena.is_set(&capped) {
        arena.add(accumulator, tables.distance(prev, cur));
    }

    arena.flip(&capped);
    if arena.is_set(&capped) {
        // new vehicle: take the demand back out and open the next cluster
        ledger.sub_active(arena, demand);
        ledger.advance(arena);
        ledger.add_active(arena, demand);
        arena.add(accumulator, tables.distance(prev, DEPOT));
        arena.add(accumulator, tables.distance(DEPOT, cur));
    }
    trace!(
        prev,
        cur,
        dispatched = arena.is_set(&capped),
        cluster = ledger.active(arena),
        load = ledger.active_load(arena),
        "forward step"
    );

    // A cluster that holds exactly this stop's demand was opened by it.
    let fresh = arena.flag("fresh_cluster");
    if ledger.active_load(arena) == demand {
        arena.flip(&fresh);
    }
    if arena.is_set(&fresh) {
        arena.flip(&capped);
    }
    if ledger.active_load(arena) == demand {
        arena.flip(&fresh);
    }
    arena.release(fresh);
    arena.release(capped);
}

/// Uncomputes a [`RouteState`] built by [`forward`] over the same itinerary
/// and releases its registers.
///
/// # Panics
///
/// Panics if a recomputed dispatch decision disagrees with the forward pass
/// or if any register is non-zero at release.
pub fn backward(
    arena: &mut Arena,
    tables: &CoefficientTables,
    itinerary: &Itinerary,
    state: RouteState,
) {
    let stops = itinerary.stops(arena);
    let RouteState {
        accumulator,
        ledger,
    } = state;

    for pair in stops.windows(2).rev() {
        backward_step(arena, tables, &accumulator, &ledger, pair[0], pair[1]);
    }
    if let (Some(&first), Some(&last)) = (stops.first(), stops.last()) {
        ledger.sub_active(arena, tables.demand(first));
        arena.sub(&accumulator, tables.distance(DEPOT, first));
        arena.sub(&accumulator, tables.distance(last, DEPOT));
    }

    ledger.release(arena);
    arena.release(accumulator);
}

fn backward_step(
    arena: &mut Arena,
    tables: &CoefficientTables,
    accumulator: &Register,
    ledger: &DemandLedger,
    prev: usize,
    cur: usize,
) {
    let demand = tables.demand(cur);
    let capacity = tables.capacity();

    ledger.sub_active(arena, demand);
    let dispatched = arena.flag("was_capped");
    if ledger.active_load(arena) == 0 {
        arena.flip(&dispatched);
    }
    if arena.is_set(&dispatched) {
        ledger.retreat(arena);
        arena.sub(accumulator, tables.distance(prev, DEPOT));
        arena.sub(accumulator, tables.distance(DEPOT, cur));
    }

    arena.flip(&dispatched);
    if arena.is_set(&dispatched) {
        arena.sub(accumulator, tables.distance(prev, cur));
    }

    let fits = arena.flag("reverse_capped");
    if ledger.active_load(arena) + demand <= capacity {
        arena.flip(&fits);
    }
    if arena.is_set(&fits) {
        arena.flip(&dispatched);
    }
    if ledger.active_load(arena) + demand <= capacity {
        arena.flip(&fits);
    }
    arena.release(fits);

    if arena.is_set(&dispatched) {
        panic!(
            "internal consistency fault: dispatch decision for stop {} after {} does not match the forward pass (cluster {}, load {})",
            cur,
            prev,
            ledger.active(arena),
            ledger.active_load(arena)
        );
    }
    arena.release(dispatched);
}
