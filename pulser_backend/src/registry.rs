//! Owner of all live pulses.
//!
//! Pulses live in an arena of slots addressed by a generational [`PulseId`]. Functions
//! keep lists of ids, never references, so deleting a pulse is "free the slot and drop
//! the id from the owning function". A stale id (one whose slot has since been reused)
//! is detected by its generation and treated as a logic error.
//!
//! Pulses are also indexed by their external number in creation order, which is the
//! order every registry-wide pass walks them in.

use indexmap::IndexMap;

use crate::error::{PulserError, Result};
use crate::pulse::Pulse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PulseId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    pulse: Option<Pulse>,
}

#[derive(Debug, Default)]
pub struct PulseRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_number: IndexMap<usize, PulseId>,
}

impl PulseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }

    /// Creates a new, completely unset pulse with the given external number.
    pub fn create(&mut self, number: usize) -> Result<PulseId> {
        if self.by_number.contains_key(&number) {
            return Err(PulserError::DuplicateId(number));
        }
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.pulse = Some(Pulse::new(number));
                PulseId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    pulse: Some(Pulse::new(number)),
                });
                PulseId {
                    index,
                    generation: 0,
                }
            }
        };
        self.by_number.insert(number, id);
        Ok(id)
    }

    pub fn find(&self, number: usize) -> Result<PulseId> {
        self.by_number
            .get(&number)
            .copied()
            .ok_or(PulserError::NotFound(number))
    }

    pub fn contains(&self, id: PulseId) -> bool {
        self.slots
            .get(id.index as usize)
            .map_or(false, |slot| slot.generation == id.generation && slot.pulse.is_some())
    }

    /// # Panics
    /// If `id` does not refer to a live pulse.
    pub fn get(&self, id: PulseId) -> &Pulse {
        let slot = &self.slots[id.index as usize];
        assert_eq!(slot.generation, id.generation, "stale pulse id {:?}", id);
        slot.pulse
            .as_ref()
            .unwrap_or_else(|| panic!("pulse id {:?} refers to a free slot", id))
    }

    /// # Panics
    /// If `id` does not refer to a live pulse.
    pub fn get_mut(&mut self, id: PulseId) -> &mut Pulse {
        let slot = &mut self.slots[id.index as usize];
        assert_eq!(slot.generation, id.generation, "stale pulse id {:?}", id);
        slot.pulse
            .as_mut()
            .unwrap_or_else(|| panic!("pulse id {:?} refers to a free slot", id))
    }

    /// Frees the pulse's slot and returns the pulse. The caller is responsible for
    /// dropping the id from the owning function's pulse list.
    pub fn remove(&mut self, id: PulseId) -> Pulse {
        let slot = &mut self.slots[id.index as usize];
        assert_eq!(slot.generation, id.generation, "stale pulse id {:?}", id);
        let pulse = slot
            .pulse
            .take()
            .unwrap_or_else(|| panic!("pulse id {:?} removed twice", id));
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.by_number.shift_remove(&pulse.number);
        pulse
    }

    /// Ids of all live pulses in creation order.
    pub fn ids(&self) -> Vec<PulseId> {
        self.by_number.values().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pulse> + '_ {
        self.by_number.values().map(move |id| self.get(*id))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn create_find_remove() {
        let mut reg = PulseRegistry::new();
        let a = reg.create(1).unwrap();
        let b = reg.create(7).unwrap();
        assert_eq!(reg.create(7), Err(PulserError::DuplicateId(7)));
        assert_eq!(reg.find(7).unwrap(), b);
        assert_eq!(reg.get(a).number(), 1);

        let removed = reg.remove(a);
        assert_eq!(removed.number(), 1);
        assert!(!reg.contains(a));
        assert_eq!(reg.find(1), Err(PulserError::NotFound(1)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn slot_reuse_bumps_generation() {
        let mut reg = PulseRegistry::new();
        let a = reg.create(1).unwrap();
        reg.remove(a);
        let c = reg.create(2).unwrap();
        assert_ne!(a, c);
        assert!(reg.contains(c));
        assert!(!reg.contains(a));
    }

    #[test]
    #[should_panic(expected = "stale pulse id")]
    fn stale_id_panics() {
        let mut reg = PulseRegistry::new();
        let a = reg.create(1).unwrap();
        reg.remove(a);
        reg.create(2).unwrap();
        reg.get(a);
    }

    #[test]
    fn creation_order() {
        let mut reg = PulseRegistry::new();
        for number in [5, 2, 9, 0] {
            reg.create(number).unwrap();
        }
        reg.remove(reg.find(2).unwrap());
        let numbers: Vec<usize> = reg.iter().map(|p| p.number()).collect();
        assert_eq!(numbers, vec![5, 9, 0]);
    }
}
