//! Per-session buffer of form slots.
//!
//! Each slot gets a fresh index when it is added; indices are never reused
//! within a session and are dropped once the readings are bucketed.

use std::fmt;

use chrono::{Local, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(u32);

impl SlotIndex {
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Form state for one reading before validation.
pub trait SlotDraft {
    /// Field edit carrying its new value.
    type Field;

    fn blank(now: NaiveDateTime) -> Self;

    fn set(&mut self, field: Self::Field);

    /// True while the user has not entered anything into the slot.
    fn is_untouched(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct SessionBuffer<D> {
    slots: Vec<(SlotIndex, D)>,
    next_index: u32,
}

impl<D> Default for SessionBuffer<D> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            next_index: 0,
        }
    }
}

impl<D: SlotDraft> SessionBuffer<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a blank slot stamped with the current local time.
    pub fn add_slot(&mut self) -> SlotIndex {
        self.add_slot_at(Local::now().naive_local())
    }

    pub fn add_slot_at(&mut self, now: NaiveDateTime) -> SlotIndex {
        let index = SlotIndex(self.next_index);
        self.next_index += 1;
        self.slots.push((index, D::blank(now)));
        index
    }

    /// Applies `field` to the slot at `index`. Unknown indices are ignored;
    /// the return value tells whether a slot was touched.
    pub fn update_slot(&mut self, index: SlotIndex, field: D::Field) -> bool {
        match self.slot_mut(index) {
            Some(draft) => {
                draft.set(field);
                true
            }
            None => false,
        }
    }

    pub fn slot(&self, index: SlotIndex) -> Option<&D> {
        self.slots
            .iter()
            .find(|(slot, _)| *slot == index)
            .map(|(_, draft)| draft)
    }

    pub fn slot_mut(&mut self, index: SlotIndex) -> Option<&mut D> {
        self.slots
            .iter_mut()
            .find(|(slot, _)| *slot == index)
            .map(|(_, draft)| draft)
    }

    pub fn indices(&self) -> impl Iterator<Item = SlotIndex> + '_ {
        self.slots.iter().map(|(index, _)| *index)
    }

    /// Snapshot of every slot in index order.
    pub fn get_all(&self) -> Vec<&D> {
        self.slots.iter().map(|(_, draft)| draft).collect()
    }

    /// Slots the user has entered something into, in index order.
    pub fn filled(&self) -> impl Iterator<Item = &D> {
        self.slots
            .iter()
            .map(|(_, draft)| draft)
            .filter(|draft| !draft.is_untouched())
    }

    pub fn has_data(&self) -> bool {
        self.filled().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
