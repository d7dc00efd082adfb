//! Register arena for reversible evaluation.
//!
//! Every register is allocated with an initial value and may only be
//! released once it holds that value again. Allocation order is a stack:
//! only the most recently allocated live register can be released. The
//! slot vector doubles as that stack, so a handle's slot index is its
//! stack position.
//!
//! Only reversible updates are offered (modular add/sub, xor, swap). Any
//! violation of the release discipline is an engine defect and panics.

use std::sync::atomic::{AtomicU64, Ordering};

// Serials are unique across arenas so a handle can never alias a slot of
// another arena.
static NEXT_SERIAL: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    Selector,
    Stop,
    Counter,
    Indexer,
    Accumulator,
    Flag,
}

#[derive(Debug)]
struct Slot {
    name: &'static str,
    kind: RegisterKind,
    width: u32,
    serial: u64,
    initial: u64,
    value: u64,
}

/// Handle to a live register. Not `Clone`: releasing consumes it.
#[derive(Debug)]
pub struct Register {
    slot: usize,
    serial: u64,
    kind: RegisterKind,
    width: u32,
}

#[derive(Debug, Default)]
pub struct Arena {
    slots: Vec<Slot>,
    peak_depth: usize,
}

/// Number of bits needed to hold `max_value` (at least one).
pub fn width_for(max_value: u64) -> u32 {
    (64 - max_value.leading_zeros()).max(1)
}

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live registers.
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Largest number of simultaneously live registers seen so far.
    pub fn peak_depth(&self) -> usize {
        self.peak_depth
    }

    pub fn allocate(
        &mut self,
        name: &'static str,
        kind: RegisterKind,
        width: u32,
        initial: u64,
    ) -> Register {
        assert!(
            (1..=64).contains(&width),
            "register `{}` has invalid width {}",
            name,
            width
        );
        assert!(
            initial & !mask(width) == 0,
            "initial value {} does not fit register `{}` of width {}",
            initial,
            name,
            width
        );
        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        self.slots.push(Slot {
            name,
            kind,
            width,
            serial,
            initial,
            value: initial,
        });
        self.peak_depth = self.peak_depth.max(self.slots.len());
        Register {
            slot: self.slots.len() - 1,
            serial,
            kind,
            width,
        }
    }

    pub fn flag(&mut self, name: &'static str) -> Register {
        self.allocate(name, RegisterKind::Flag, 1, 0)
    }

    /// Pops `register` off the allocation stack.
    ///
    /// # Panics
    ///
    /// Panics if `register` is not the most recently allocated live register,
    /// or if it does not hold its allocation-time value.
    pub fn release(&mut self, register: Register) {
        let slot = self.slot(&register);
        if slot.value != slot.initial {
            panic!(
                "zero-residue violation: register `{}` ({:?}) holds {} but was allocated with {}",
                slot.name, slot.kind, slot.value, slot.initial
            );
        }
        if register.slot + 1 != self.slots.len() {
            panic!(
                "out-of-order release of register `{}`: {} registers were allocated after it",
                slot.name,
                self.slots.len() - register.slot - 1
            );
        }
        self.slots.pop();
    }

    pub fn value(&self, register: &Register) -> u64 {
        self.slot(register).value
    }

    pub fn is_set(&self, register: &Register) -> bool {
        self.value(register) != 0
    }

    /// Adds modulo `2^width`.
    pub fn add(&mut self, register: &Register, amount: u64) {
        let slot = self.slot_mut(register);
        slot.value = slot.value.wrapping_add(amount) & mask(slot.width);
    }

    /// Subtracts modulo `2^width`.
    pub fn sub(&mut self, register: &Register, amount: u64) {
        let slot = self.slot_mut(register);
        slot.value = slot.value.wrapping_sub(amount) & mask(slot.width);
    }

    pub fn xor(&mut self, register: &Register, bits: u64) {
        let slot = self.slot_mut(register);
        slot.value = (slot.value ^ bits) & mask(slot.width);
    }

    pub fn flip(&mut self, register: &Register) {
        self.xor(register, 1);
    }

    pub fn swap(&mut self, a: &Register, b: &Register) {
        assert!(
            a.kind == b.kind && a.width == b.width,
            "cannot swap registers of different types"
        );
        let (va, vb) = (self.value(a), self.value(b));
        self.slot_mut(a).value = vb;
        self.slot_mut(b).value = va;
    }

    /// Values of all live registers in allocation order.
    pub fn snapshot(&self) -> Vec<u64> {
        self.slots.iter().map(|s| s.value).collect()
    }

    fn slot(&self, register: &Register) -> &Slot {
        match self.slots.get(register.slot) {
            Some(slot) if slot.serial == register.serial => slot,
            _ => panic!("register handle does not belong to a live register of this arena"),
        }
    }

    fn slot_mut(&mut self, register: &Register) -> &mut Slot {
        match self.slots.get_mut(register.slot) {
            Some(slot) if slot.serial == register.serial => slot,
            _ => panic!("register handle does not belong to a live register of this arena"),
        }
    }
}
