//! Pulses: the central mutable entity of the engine.
//!
//! Every numeric attribute of a pulse is wrapped in a [`Declared`] cell. The *declare* API
//! (`declare_*`) may write a cell exactly once and fails with
//! [`PulserError::AlreadySet`] afterwards. The *mutate* API (`set_*`, [`Pulse::shift`],
//! [`Pulse::increment_length`], [`Pulse::reset_to_initial`]) changes values of a running
//! sequence and keeps the bookkeeping the synchronization engine depends on:
//!
//! - `old_position` / `old_length`: the value last committed to hardware, recorded on the
//!   first change after a commit,
//! - `is_active`: position and length set and length non-zero, always derived,
//! - `needs_update`: the activity changed or an active pulse moved or resized.

use std::cmp::Ordering;
use std::fmt;

use crate::channel::ChannelId;
use crate::error::{PulserError, Result};
use crate::function::FunctionKind;
use crate::timebase::Ticks;

/// A write-once value. Only [`Pulse`]'s mutate API may overwrite it once declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declared<T: Copy>(Option<T>);

impl<T: Copy> Default for Declared<T> {
    fn default() -> Self {
        Declared(None)
    }
}

impl<T: Copy> Declared<T> {
    pub fn get(&self) -> Option<T> {
        self.0
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Writes the value if the cell is still empty, otherwise hands the current value back.
    fn declare(&mut self, value: T) -> std::result::Result<(), T> {
        match self.0 {
            Some(current) => Err(current),
            None => {
                self.0 = Some(value);
                Ok(())
            }
        }
    }

    fn overwrite(&mut self, value: Option<T>) {
        self.0 = value;
    }
}

/// Values captured when an attribute is first declared outside of a test run.
/// End-of-test-run resets restore exactly these, including "not set".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitialValues {
    pub position: Option<Ticks>,
    pub length: Option<Ticks>,
    pub position_delta: Option<Ticks>,
    pub length_delta: Option<Ticks>,
}

#[derive(Debug, Clone)]
pub struct Pulse {
    pub(crate) number: usize,
    pub(crate) function: Option<FunctionKind>,
    pub(crate) channel: Option<ChannelId>,
    position: Declared<Ticks>,
    length: Declared<Ticks>,
    position_delta: Declared<Ticks>,
    length_delta: Declared<Ticks>,
    initial: InitialValues,
    old_position: Option<Ticks>,
    old_length: Option<Ticks>,
    is_active: bool,
    pub(crate) was_active: bool,
    pub(crate) has_been_active: bool,
    needs_update: bool,
}

impl Pulse {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            function: None,
            channel: None,
            position: Declared::default(),
            length: Declared::default(),
            position_delta: Declared::default(),
            length_delta: Declared::default(),
            initial: InitialValues::default(),
            old_position: None,
            old_length: None,
            is_active: false,
            was_active: false,
            has_been_active: false,
            needs_update: false,
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }
    pub fn function(&self) -> Option<FunctionKind> {
        self.function
    }
    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }
    pub fn position(&self) -> Option<Ticks> {
        self.position.get()
    }
    pub fn length(&self) -> Option<Ticks> {
        self.length.get()
    }
    pub fn position_delta(&self) -> Option<Ticks> {
        self.position_delta.get()
    }
    pub fn length_delta(&self) -> Option<Ticks> {
        self.length_delta.get()
    }
    pub fn initial(&self) -> &InitialValues {
        &self.initial
    }
    pub fn old_position(&self) -> Option<Ticks> {
        self.old_position
    }
    pub fn old_length(&self) -> Option<Ticks> {
        self.old_length
    }
    pub fn is_active(&self) -> bool {
        self.is_active
    }
    pub fn was_active(&self) -> bool {
        self.was_active
    }
    pub fn has_been_active(&self) -> bool {
        self.has_been_active
    }
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Start and length of an active pulse.
    pub fn span(&self) -> Option<(Ticks, Ticks)> {
        if self.is_active {
            Some((self.position.get()?, self.length.get()?))
        } else {
            None
        }
    }

    /// Span this pulse occupied at the last commit, if it has moved or resized since.
    pub(crate) fn committed_span(&self) -> Option<(Ticks, Ticks)> {
        if !self.was_active || (self.old_position.is_none() && self.old_length.is_none()) {
            return None;
        }
        let position = self.old_position.or(self.position.get())?;
        let length = self.old_length.or(self.length.get())?;
        Some((position, length))
    }

    fn already_set(&self, attribute: &'static str) -> PulserError {
        PulserError::AlreadySet {
            number: self.number,
            attribute,
        }
    }

    fn check_non_negative(&self, attribute: &'static str, value: Ticks) -> Result<()> {
        if value < 0 {
            return Err(PulserError::NegativeValue {
                number: self.number,
                attribute,
                value,
            });
        }
        Ok(())
    }

    // DECLARE API: write-once

    pub(crate) fn declare_position(&mut self, value: Ticks, capture_initial: bool) -> Result<()> {
        self.check_non_negative("position", value)?;
        self.position
            .declare(value)
            .map_err(|_| self.already_set("position"))?;
        if capture_initial {
            self.initial.position = Some(value);
        }
        self.refresh();
        Ok(())
    }

    pub(crate) fn declare_length(&mut self, value: Ticks, capture_initial: bool) -> Result<()> {
        self.check_non_negative("length", value)?;
        self.length
            .declare(value)
            .map_err(|_| self.already_set("length"))?;
        if capture_initial {
            self.initial.length = Some(value);
        }
        self.refresh();
        Ok(())
    }

    pub(crate) fn declare_position_delta(&mut self, value: Ticks, capture_initial: bool) -> Result<()> {
        self.position_delta
            .declare(value)
            .map_err(|_| self.already_set("position change"))?;
        if capture_initial {
            self.initial.position_delta = Some(value);
        }
        Ok(())
    }

    pub(crate) fn declare_length_delta(&mut self, value: Ticks, capture_initial: bool) -> Result<()> {
        self.length_delta
            .declare(value)
            .map_err(|_| self.already_set("length change"))?;
        if capture_initial {
            self.initial.length_delta = Some(value);
        }
        Ok(())
    }

    // MUTATE API: tracked edits of a running sequence

    pub(crate) fn set_position(&mut self, value: Ticks) -> Result<()> {
        self.check_non_negative("position", value)?;
        self.track_position(Some(value));
        Ok(())
    }

    pub(crate) fn set_length(&mut self, value: Ticks) -> Result<()> {
        self.check_non_negative("length", value)?;
        self.track_length(Some(value));
        Ok(())
    }

    pub(crate) fn set_position_delta(&mut self, value: Ticks) {
        self.position_delta.overwrite(Some(value));
    }

    pub(crate) fn set_length_delta(&mut self, value: Ticks) {
        self.length_delta.overwrite(Some(value));
    }

    /// Moves the pulse by its position delta.
    pub(crate) fn shift(&mut self) -> Result<()> {
        let delta = self.position_delta.get().ok_or(PulserError::NotSet {
            number: self.number,
            attribute: "position change",
        })?;
        let position = self.position.get().ok_or(PulserError::NotSet {
            number: self.number,
            attribute: "position",
        })?;
        self.set_position(position + delta)
    }

    /// Grows (or shrinks) the pulse by its length delta.
    pub(crate) fn increment_length(&mut self) -> Result<()> {
        let delta = self.length_delta.get().ok_or(PulserError::NotSet {
            number: self.number,
            attribute: "length change",
        })?;
        let length = self.length.get().ok_or(PulserError::NotSet {
            number: self.number,
            attribute: "length",
        })?;
        self.set_length(length + delta)
    }

    /// Brings the pulse back to its initial values as a tracked edit, so the next
    /// commit writes the difference to hardware.
    pub(crate) fn reset_to_initial(&mut self) {
        let initial = self.initial;
        self.track_position(initial.position);
        self.track_length(initial.length);
        self.position_delta.overwrite(initial.position_delta);
        self.length_delta.overwrite(initial.length_delta);
    }

    fn track_position(&mut self, value: Option<Ticks>) {
        if self.old_position.is_none() {
            self.old_position = self.position.get();
        }
        self.position.overwrite(value);
        self.refresh();
    }

    fn track_length(&mut self, value: Option<Ticks>) {
        if self.old_length.is_none() {
            self.old_length = self.length.get();
        }
        self.length.overwrite(value);
        self.refresh();
    }

    // BOOKKEEPING

    /// Recomputes the derived activity and update flags.
    pub(crate) fn refresh(&mut self) {
        self.is_active = matches!(
            (self.position.get(), self.length.get()),
            (Some(_), Some(len)) if len > 0
        );
        if self.is_active {
            self.has_been_active = true;
        }
        let moved = self
            .old_position
            .map_or(false, |old| Some(old) != self.position.get());
        let resized = self
            .old_length
            .map_or(false, |old| Some(old) != self.length.get());
        self.needs_update =
            self.is_active != self.was_active || (self.is_active && (moved || resized));
    }

    /// Marks the current state as the one present in hardware.
    pub(crate) fn commit(&mut self) {
        self.old_position = None;
        self.old_length = None;
        self.was_active = self.is_active;
        self.needs_update = false;
    }

    /// Rejects the edits since the last commit: position and length go back to their
    /// recorded old values. Delta requests are left alone.
    pub(crate) fn rollback(&mut self) {
        if let Some(position) = self.old_position.take() {
            self.position.overwrite(Some(position));
        }
        if let Some(length) = self.old_length.take() {
            self.length.overwrite(Some(length));
        }
        self.refresh();
        self.needs_update = false;
    }

    /// Restores the initial snapshot without tracking (end of a test run).
    pub(crate) fn restore_initial(&mut self) {
        let initial = self.initial;
        self.position.overwrite(initial.position);
        self.length.overwrite(initial.length);
        self.position_delta.overwrite(initial.position_delta);
        self.length_delta.overwrite(initial.length_delta);
        self.old_position = None;
        self.old_length = None;
        self.refresh();
        self.was_active = self.is_active;
        self.needs_update = false;
    }
}

/// Sort order of a function's pulse list: active pulses by ascending position, inactive
/// pulses after all active ones and equal among themselves.
pub fn start_compare(a: &Pulse, b: &Pulse) -> Ordering {
    match (a.is_active, b.is_active) {
        (false, false) => Ordering::Equal,
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (true, true) => a.position.get().cmp(&b.position.get()),
    }
}

impl fmt::Display for Pulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<Ticks>| v.map_or("-".to_string(), |v| v.to_string());
        write!(
            f,
            "Pulse(#{}, {}, pos={}, len={}, active={})",
            self.number,
            self.function.map_or("-", |kind| kind.name()),
            show(self.position.get()),
            show(self.length.get()),
            self.is_active
        )
    }
}
