//! Selector registers to visiting order, and back.
//!
//! The itinerary starts as the identity `1, 2, .., n-1`. Step `i` exchanges
//! position `i` with position `i + selector_i`, one Fisher-Yates step driven
//! by the selector. Every step is its own inverse, so the backward pass runs
//! the same steps in reverse order.

use crate::register::{Arena, Register, RegisterKind};
use crate::selector::SelectorSet;
use crate::tables::CoefficientTables;

#[derive(Debug)]
pub struct Itinerary {
    stops: Vec<Register>,
}

impl Itinerary {
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn stops(&self, arena: &Arena) -> Vec<usize> {
        self.stops.iter().map(|r| arena.value(r) as usize).collect()
    }
}

pub fn forward(
    arena: &mut Arena,
    tables: &CoefficientTables,
    selectors: &SelectorSet,
) -> Itinerary {
    let stops = (1..=tables.num_stops())
        .map(|stop| {
            arena.allocate(
                "itinerary",
                RegisterKind::Stop,
                tables.stop_width(),
                stop as u64,
            )
        })
        .collect();
    let itinerary = Itinerary { stops };
    for step in 0..selectors.len() {
        swap_step(arena, selectors, &itinerary, step);
    }
    itinerary
}

/// Undoes [`forward`] and releases the itinerary, which must be back at the
/// identity order.
pub fn backward(arena: &mut Arena, selectors: &SelectorSet, itinerary: Itinerary) {
    for step in (0..selectors.len()).rev() {
        swap_step(arena, selectors, &itinerary, step);
    }
    for stop in itinerary.stops.into_iter().rev() {
        arena.release(stop);
    }
}

fn swap_step(arena: &mut Arena, selectors: &SelectorSet, itinerary: &Itinerary, step: usize) {
    let offset = arena.value(selectors.register(step));
    let range = selectors.range(step);
    if offset >= range {
        panic!(
            "selector {} holds {} outside [0, {}) inside the swap network",
            step, offset, range
        );
    }
    // offset 0 leaves the position in place
    for candidate in 1..range {
        let hit = arena.flag("swap_hit");
        if offset == candidate {
            arena.flip(&hit);
        }
        if arena.is_set(&hit) {
            arena.swap(
                &itinerary.stops[step],
                &itinerary.stops[step + candidate as usize],
            );
        }
        if offset == candidate {
            arena.flip(&hit);
        }
        arena.release(hit);
    }
}
