// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Timing Event System
//!
//! Each processor (EE and IOP) owns one [`EventScheduler`]. A scheduler holds
//! a fixed set of event kinds, each with at most one pending instance, stored
//! as a start cycle plus a delta. Time advances by jumping straight to the
//! next due event; nothing is polled per cycle.
//!
//! # Architecture
//!
//! - Every event kind has one slot and one bit in the `armed` mask
//! - Re-arming an armed event overwrites its slot (no duplicates)
//! - `pop_due()` clears the arm bit before handing the kind to the caller, so
//!   handlers may re-arm themselves, including with a zero delta
//! - Due events fire in increasing `start + delta` order, ties broken by kind
//!   order
//!
//! # Example
//!
//! ```
//! use ps2rx::core::timing::{EeEvent, EventScheduler};
//!
//! let mut ee = EventScheduler::<EeEvent>::new("EE");
//! ee.schedule(EeEvent::Gif, 1000);
//!
//! // Simulate CPU execution
//! ee.advance_to(1000);
//! assert_eq!(ee.pop_due(), Some(EeEvent::Gif));
//! assert_eq!(ee.pop_due(), None);
//! ```

use std::fmt::Debug;
use std::marker::PhantomData;

/// Absolute cycle count of one processor since reset
pub type Cycle = u64;

/// Cycle value reported when nothing is armed
pub const NEVER: Cycle = Cycle::MAX;

/// A closed set of event kinds owned by one scheduler
pub trait EventKind: Copy + Eq + Debug + 'static {
    /// Every kind, in slot order
    const ALL: &'static [Self];

    /// Slot index of this kind
    fn index(self) -> usize;

    /// Name used in trace logs
    fn name(self) -> &'static str;
}

/// EE-side event kinds
///
/// The first ten kinds are the DMA channel continuations, in channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EeEvent {
    Vif0,
    Vif1,
    Gif,
    FromIpu,
    ToIpu,
    Sif0,
    Sif1,
    Sif2,
    FromSpr,
    ToSpr,
    /// Interrupt delivery to the EE core
    Exception,
    /// GS consuming from the GIF
    GifDrain,
    /// Periodic counter tick
    Counter,
}

impl EeEvent {
    /// Continuation event of DMA channel `channel`
    ///
    /// # Panics
    ///
    /// Panics if `channel` is not a DMAC channel index (0-9).
    pub fn dma(channel: usize) -> Self {
        assert!(channel < 10, "invalid DMA channel {}", channel);
        Self::ALL[channel]
    }

    /// DMA channel this event continues, if any
    pub fn channel(self) -> Option<usize> {
        let index = self.index();
        (index < 10).then_some(index)
    }
}

impl EventKind for EeEvent {
    const ALL: &'static [Self] = &[
        EeEvent::Vif0,
        EeEvent::Vif1,
        EeEvent::Gif,
        EeEvent::FromIpu,
        EeEvent::ToIpu,
        EeEvent::Sif0,
        EeEvent::Sif1,
        EeEvent::Sif2,
        EeEvent::FromSpr,
        EeEvent::ToSpr,
        EeEvent::Exception,
        EeEvent::GifDrain,
        EeEvent::Counter,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            EeEvent::Vif0 => "DMA VIF0",
            EeEvent::Vif1 => "DMA VIF1",
            EeEvent::Gif => "DMA GIF",
            EeEvent::FromIpu => "DMA fromIPU",
            EeEvent::ToIpu => "DMA toIPU",
            EeEvent::Sif0 => "DMA SIF0",
            EeEvent::Sif1 => "DMA SIF1",
            EeEvent::Sif2 => "DMA SIF2",
            EeEvent::FromSpr => "DMA fromSPR",
            EeEvent::ToSpr => "DMA toSPR",
            EeEvent::Exception => "EE Exception",
            EeEvent::GifDrain => "GIF Drain",
            EeEvent::Counter => "EE Counter",
        }
    }
}

/// IOP-side event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IopEvent {
    /// IOP DMA channel 9 (SIF0, IOP to EE)
    Sif0,
    /// IOP DMA channel 10 (SIF1, EE to IOP)
    Sif1,
    /// Interrupt delivery to the IOP core
    Exception,
    /// Periodic counter tick
    Counter,
}

impl EventKind for IopEvent {
    const ALL: &'static [Self] = &[
        IopEvent::Sif0,
        IopEvent::Sif1,
        IopEvent::Exception,
        IopEvent::Counter,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            IopEvent::Sif0 => "IOP SIF0",
            IopEvent::Sif1 => "IOP SIF1",
            IopEvent::Exception => "IOP Exception",
            IopEvent::Counter => "IOP Counter",
        }
    }
}

/// One pending event instance
#[derive(Debug, Clone, Copy, Default)]
struct EventSlot {
    /// Cycle the event was armed at
    start: Cycle,
    /// Cycles after `start` the event is due
    delta: u32,
}

impl EventSlot {
    #[inline]
    fn due(&self) -> Cycle {
        self.start + self.delta as Cycle
    }
}

/// Cooperative per-processor event scheduler
///
/// # Example
///
/// ```
/// use ps2rx::core::timing::{EventScheduler, IopEvent};
///
/// let mut iop = EventScheduler::<IopEvent>::new("IOP");
/// iop.schedule(IopEvent::Sif1, 50);
/// assert_eq!(iop.next_event_cycle(), 50);
///
/// // Re-arming overwrites the pending instance
/// iop.schedule(IopEvent::Sif1, 10);
/// assert_eq!(iop.next_event_cycle(), 10);
/// ```
#[derive(Debug)]
pub struct EventScheduler<K: EventKind> {
    /// Domain name (for logging)
    name: &'static str,

    /// Current cycle of this processor
    cycle: Cycle,

    /// Earliest due cycle over all armed events
    next_event_cycle: Cycle,

    /// One bit per armed event kind
    armed: u32,

    /// Pending event data, indexed by kind
    slots: Vec<EventSlot>,

    _kind: PhantomData<K>,
}

impl<K: EventKind> EventScheduler<K> {
    /// Create a scheduler at cycle 0 with nothing armed
    ///
    /// # Arguments
    ///
    /// * `name` - Domain name used in trace logs
    pub fn new(name: &'static str) -> Self {
        assert!(K::ALL.len() <= 32, "too many event kinds for the arm mask");
        Self {
            name,
            cycle: 0,
            next_event_cycle: NEVER,
            armed: 0,
            slots: vec![EventSlot::default(); K::ALL.len()],
            _kind: PhantomData,
        }
    }

    /// Current cycle
    #[inline]
    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    /// Earliest due cycle of any armed event ([`NEVER`] when idle)
    #[inline]
    pub fn next_event_cycle(&self) -> Cycle {
        self.next_event_cycle
    }

    /// Arm `kind` to fire `delta` cycles from now
    ///
    /// An already armed instance is overwritten.
    ///
    /// # Arguments
    ///
    /// * `kind` - Event to arm
    /// * `delta` - Cycles until the event is due
    pub fn schedule(&mut self, kind: K, delta: u32) {
        let slot = &mut self.slots[kind.index()];
        slot.start = self.cycle;
        slot.delta = delta;
        self.armed |= 1 << kind.index();

        let due = slot.due();
        if due < self.next_event_cycle {
            self.next_event_cycle = due;
        } else {
            self.update_next_event();
        }

        log::trace!(
            "{}: '{}' armed at {} (+{})",
            self.name,
            kind.name(),
            self.cycle,
            delta
        );
    }

    /// Disarm `kind`
    ///
    /// Cancellation is immediate: a cancelled event never fires.
    pub fn cancel(&mut self, kind: K) {
        if self.is_armed(kind) {
            self.armed &= !(1 << kind.index());
            self.update_next_event();
            log::trace!("{}: '{}' cancelled", self.name, kind.name());
        }
    }

    /// Whether `kind` is currently armed
    #[inline]
    pub fn is_armed(&self, kind: K) -> bool {
        self.armed & (1 << kind.index()) != 0
    }

    /// Due cycle of `kind`, if armed
    pub fn due_cycle(&self, kind: K) -> Option<Cycle> {
        self.is_armed(kind)
            .then(|| self.slots[kind.index()].due())
    }

    /// Move the clock forward to `cycle`
    ///
    /// Moving backwards is ignored. Events are not fired here; call
    /// [`pop_due`](Self::pop_due) afterwards.
    pub fn advance_to(&mut self, cycle: Cycle) {
        if cycle > self.cycle {
            self.cycle = cycle;
        }
    }

    /// Move the clock forward by `cycles`
    pub fn advance(&mut self, cycles: u64) {
        self.cycle += cycles;
    }

    /// Take the earliest event that is due at the current cycle
    ///
    /// The event's arm bit is cleared before it is returned.
    pub fn pop_due(&mut self) -> Option<K> {
        if self.next_event_cycle > self.cycle {
            return None;
        }

        let mut best: Option<(Cycle, K)> = None;
        for &kind in K::ALL {
            if !self.is_armed(kind) {
                continue;
            }
            let due = self.slots[kind.index()].due();
            if due <= self.cycle && best.is_none_or(|(best_due, _)| due < best_due) {
                best = Some((due, kind));
            }
        }

        let (due, kind) = best?;
        self.armed &= !(1 << kind.index());
        self.update_next_event();

        log::trace!(
            "{}: '{}' fired at {} (late: {} cycles)",
            self.name,
            kind.name(),
            self.cycle,
            self.cycle - due
        );
        Some(kind)
    }

    /// Recompute the earliest due cycle over all armed events
    fn update_next_event(&mut self) {
        self.next_event_cycle = K::ALL
            .iter()
            .filter(|kind| self.is_armed(**kind))
            .map(|kind| self.slots[kind.index()].due())
            .min()
            .unwrap_or(NEVER);
    }

    /// Reset the clock and disarm every event
    pub fn reset(&mut self) {
        self.cycle = 0;
        self.armed = 0;
        self.next_event_cycle = NEVER;
        self.slots.fill(EventSlot::default());
    }
}
