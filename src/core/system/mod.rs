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

//! System integration module
//!
//! [`System`] owns every component of the core and runs the two clock
//! domains against each other. Nothing here executes guest instructions:
//! the EE and IOP interpreters live outside the core and drive it through
//! register reads/writes, direct GIF path submission and [`System::run`].
//!
//! # Run loop
//!
//! Each pass of [`System::run`]:
//!
//! 1. Fires every EE event due at the current EE cycle
//! 2. Picks the boundary: the next EE event or the run target
//! 3. Lets the IOP catch up to the boundary in a [`ClockBridge`] slice,
//!    firing its own events on the way; anything the IOP does that arms an
//!    earlier EE event cuts the slice there
//! 4. Moves the EE clock to where the slice ended
//!
//! After every event and register write the system re-routes channel
//! kicks, SIF wake-ups and GS signals, and re-tests both interrupt lines.

mod mmio;

pub use mmio::{INTC_MASK, INTC_STAT, I_CTRL, I_MASK, I_STAT};

use std::sync::Arc;

use super::clock::ClockBridge;
use super::config::CoreConfig;
use super::dma::{ChannelId, ChannelState, DmaController, DmaTarget, DmaTargets, StepResult};
use super::error::Result;
use super::gif::{GifPath, GifUnit, GsRegisters, GsSink, NullGsSink, VuSignals};
use super::interrupt::{interrupts, iop_interrupts, IntcController, IopInterruptController};
use super::memory::{IopMemory, MainMemory};
use super::sif::{IopSifId, Sif, SifWake};
use super::timing::{Cycle, EeEvent, EventScheduler, IopEvent};

/// EE pending-mask bit for INT0 (INTC)
pub const EE_PENDING_INTC: u32 = 1 << 0;

/// EE pending-mask bit for INT1 (DMAC)
pub const EE_PENDING_DMAC: u32 = 1 << 1;

/// IOP pending-mask bit for the IOP INTC
pub const IOP_PENDING_INTC: u32 = 1 << 0;

/// PlayStation 2 data-movement core
///
/// # Example
///
/// ```
/// use ps2rx::core::config::CoreConfig;
/// use ps2rx::core::gif::GifPath;
/// use ps2rx::core::system::System;
///
/// let mut system = System::new(CoreConfig::default()).unwrap();
///
/// // One-quadword IMAGE packet with EOP on PATH2
/// let tag = (1u128 << 15) | 1 | (2u128 << 58);
/// system.submit_path(GifPath::Path2, &[tag, 0xAB]);
/// system.run(100);
///
/// assert_eq!(system.gif().transferred(GifPath::Path2), 2);
/// ```
pub struct System {
    config: CoreConfig,

    /// EE-side events
    ee: EventScheduler<EeEvent>,
    /// IOP-side events
    iop: EventScheduler<IopEvent>,
    bridge: ClockBridge,

    memory: MainMemory,
    iop_memory: IopMemory,

    dmac: DmaController,
    intc: IntcController,
    iop_intc: IopInterruptController,

    gif: GifUnit,
    gs: GsRegisters,
    vu_signals: Arc<VuSignals>,
    sif: Sif,

    /// VIF0/VIF1/IPU/SIF2 collaborators
    targets: DmaTargets,
    gs_sink: Box<dyn GsSink>,

    /// Pending masks seen on the last interrupt test
    ee_pending: u32,
    iop_pending: u32,

    /// Exceptions latched for the CPUs
    ee_exception: Option<u32>,
    iop_exception: Option<u32>,

    /// Counter event ticks (EE, IOP)
    counter_ticks: [u64; 2],
}

impl System {
    /// Create a system with null collaborators
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::Config`](super::error::EmulatorError::Config)
    /// if the configuration does not validate
    pub fn new(config: CoreConfig) -> Result<Self> {
        Self::with_collaborators(config, DmaTargets::default(), Box::new(NullGsSink::default()))
    }

    /// Create a system wired to external collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - Core configuration
    /// * `targets` - VIF0, VIF1, IPU and SIF2 endpoints
    /// * `gs_sink` - Consumer of everything the GIF sends to the GS
    pub fn with_collaborators(
        config: CoreConfig,
        targets: DmaTargets,
        gs_sink: Box<dyn GsSink>,
    ) -> Result<Self> {
        config.validate()?;
        let system = Self::build(config, targets, gs_sink);
        log::info!(
            "System: {} MiB EE RAM, {} KiB IOP RAM, EE:IOP = {}:1",
            system.config.main_ram_size / (1024 * 1024),
            system.config.iop_ram_size / 1024,
            system.config.clock_ratio
        );
        Ok(system)
    }

    fn build(config: CoreConfig, targets: DmaTargets, gs_sink: Box<dyn GsSink>) -> Self {
        let mut system = Self {
            ee: EventScheduler::new("EE"),
            iop: EventScheduler::new("IOP"),
            bridge: ClockBridge::new(config.clock_ratio),
            memory: MainMemory::new(config.main_ram_size),
            iop_memory: IopMemory::new(config.iop_ram_size),
            dmac: DmaController::new(&config),
            intc: IntcController::new(),
            iop_intc: IopInterruptController::new(),
            gif: GifUnit::new(&config),
            gs: GsRegisters::new(),
            vu_signals: Arc::new(VuSignals::new()),
            sif: Sif::new(&config),
            targets,
            gs_sink,
            ee_pending: 0,
            iop_pending: 0,
            ee_exception: None,
            iop_exception: None,
            counter_ticks: [0; 2],
            config,
        };
        system.arm_counters();
        system
    }

    /// Return every component to its power-on state
    ///
    /// Collaborators and the VU signal channel stay attached.
    pub fn reset(&mut self) {
        self.ee.reset();
        self.iop.reset();
        self.bridge.reset();
        self.memory.reset();
        self.iop_memory.reset();
        self.dmac.reset();
        self.intc.reset();
        self.iop_intc.reset();
        self.gif.reset();
        self.gs.reset();
        self.vu_signals.clear();
        self.sif.reset();
        self.ee_pending = 0;
        self.iop_pending = 0;
        self.ee_exception = None;
        self.iop_exception = None;
        self.counter_ticks = [0; 2];
        self.arm_counters();
        log::info!("System reset");
    }

    fn arm_counters(&mut self) {
        let period = self.config.counter_period;
        if period > 0 {
            self.ee.schedule(EeEvent::Counter, period);
            self.iop.schedule(IopEvent::Counter, self.iop_counter_period());
        }
    }

    fn iop_counter_period(&self) -> u32 {
        (self.config.counter_period / self.config.clock_ratio).max(1)
    }

    // Run loop

    /// Run the core for `ee_cycles` EE cycles
    ///
    /// # Returns
    ///
    /// The EE cycle reached
    pub fn run(&mut self, ee_cycles: u64) -> Cycle {
        let target = self.ee.cycle().saturating_add(ee_cycles);
        loop {
            self.dispatch_ee();
            if self.ee.cycle() >= target {
                break;
            }

            let boundary = self.ee.next_event_cycle().min(target);
            let reached = self.run_iop_slice(boundary);
            self.ee.advance_to(reached);
        }
        self.ee.cycle()
    }

    /// Fire every EE event due now
    fn dispatch_ee(&mut self) {
        self.sync();
        while let Some(event) = self.ee.pop_due() {
            self.handle_ee_event(event);
            self.sync();
        }
    }

    /// Let the IOP catch up to `ee_limit`
    ///
    /// # Returns
    ///
    /// The EE cycle the slice ended at
    fn run_iop_slice(&mut self, ee_limit: Cycle) -> Cycle {
        self.bridge.begin_slice(self.ee.cycle(), ee_limit);

        while let Some(end) = self.bridge.slice_end_iop() {
            let next = self.iop.next_event_cycle();
            if next > end {
                break;
            }
            self.iop.advance_to(next);
            while let Some(event) = self.iop.pop_due() {
                self.handle_iop_event(event);
                self.sync();
            }
        }

        let end_ee = self.bridge.slice_end_ee().unwrap_or(ee_limit);
        self.iop.advance_to(self.bridge.ee_to_iop(end_ee));
        let lost = self.bridge.end_slice();
        if lost > 0 {
            log::trace!("IOP slice ended {} EE cycles early at {}", lost, end_ee);
        }
        end_ee
    }

    fn handle_ee_event(&mut self, event: EeEvent) {
        if let Some(id) = event.channel().and_then(ChannelId::from_index) {
            self.step_channel(id);
            return;
        }

        match event {
            EeEvent::Exception => {
                let pending = self.ee_pending_mask();
                if pending != 0 {
                    log::debug!("EE exception, pending mask 0x{:X}", pending);
                    self.ee_exception = Some(pending);
                }
            }
            EeEvent::GifDrain => {
                let moved = self.gif.drain(self.gs_sink.as_mut());
                log::trace!("GS drained {} quadwords", moved);
                if self.gif.has_pending() {
                    self.ee.schedule(EeEvent::GifDrain, self.config.gs_drain_cycles);
                }
                if moved > 0 {
                    self.wake_ee_channel(ChannelId::Gif, 0);
                }
            }
            EeEvent::Counter => {
                self.counter_ticks[0] += 1;
                if self.config.counter_period > 0 {
                    self.ee.schedule(EeEvent::Counter, self.config.counter_period);
                }
            }
            _ => {}
        }
    }

    fn handle_iop_event(&mut self, event: IopEvent) {
        let id = match event {
            IopEvent::Sif0 => IopSifId::Sif0,
            IopEvent::Sif1 => IopSifId::Sif1,
            IopEvent::Exception => {
                let pending = self.iop_pending_mask();
                if pending != 0 {
                    log::debug!("IOP exception, pending mask 0x{:X}", pending);
                    self.iop_exception = Some(pending);
                }
                return;
            }
            IopEvent::Counter => {
                self.counter_ticks[1] += 1;
                if self.config.counter_period > 0 {
                    self.iop.schedule(IopEvent::Counter, self.iop_counter_period());
                }
                return;
            }
        };

        match self.sif.iop_step(id, &mut self.iop_memory) {
            StepResult::Continue(delay) | StepResult::Completing(delay) => {
                self.iop.schedule(event, delay);
            }
            StepResult::Done | StepResult::Waiting | StepResult::Faulted => {}
        }
    }

    /// Step one DMAC channel against its downstream unit
    fn step_channel(&mut self, id: ChannelId) {
        let Self {
            dmac,
            memory,
            gif,
            sif,
            targets,
            ..
        } = self;

        let result = match id {
            ChannelId::Gif => dmac.step(id, memory, Some(gif as &mut dyn DmaTarget)),
            ChannelId::Sif0 => dmac.step(id, memory, Some(&mut sif.sif0_port())),
            ChannelId::Sif1 => dmac.step(id, memory, Some(&mut sif.sif1_port())),
            ChannelId::Vif0 => dmac.step(id, memory, Some(targets.vif0.as_mut())),
            ChannelId::Vif1 => dmac.step(id, memory, Some(targets.vif1.as_mut())),
            ChannelId::FromIpu => dmac.step(id, memory, Some(targets.from_ipu.as_mut())),
            ChannelId::ToIpu => dmac.step(id, memory, Some(targets.to_ipu.as_mut())),
            ChannelId::Sif2 => dmac.step(id, memory, Some(targets.sif2.as_mut())),
            ChannelId::FromSpr | ChannelId::ToSpr => dmac.step(id, memory, None),
        };

        match result {
            StepResult::Continue(delay) | StepResult::Completing(delay) => {
                self.ee.schedule(EeEvent::dma(id.index()), delay);
            }
            StepResult::Done | StepResult::Waiting | StepResult::Faulted => {}
        }
    }

    /// Re-step a running EE channel `delay` cycles from now
    ///
    /// Only pulls an armed continuation in, never pushes it out. A pending
    /// completion keeps its delay.
    fn wake_ee_channel(&mut self, id: ChannelId, delay: u32) {
        if self.dmac.channel_state(id) != ChannelState::Running || self.dmac.channel(id).completing {
            return;
        }
        let event = EeEvent::dma(id.index());
        let at = self.ee.cycle() + delay as Cycle;
        if self.ee.due_cycle(event).is_none_or(|due| due > at) {
            self.ee.schedule(event, delay);
        }
    }

    fn wake_iop_channel(&mut self, id: IopSifId, delay: u32) {
        if !self.sif.iop_active(id) {
            return;
        }
        let event = match id {
            IopSifId::Sif0 => IopEvent::Sif0,
            IopSifId::Sif1 => IopEvent::Sif1,
        };
        let at = self.iop.cycle() + delay as Cycle;
        if self.iop.due_cycle(event).is_none_or(|due| due > at) {
            self.iop.schedule(event, delay);
        }
    }

    /// Route everything the components produced since the last call
    fn sync(&mut self) {
        let requests = self.dmac.take_requests();
        for id in ChannelId::ALL {
            let bit = 1 << id.index();
            if requests.cancel & bit != 0 {
                self.ee.cancel(EeEvent::dma(id.index()));
            }
            if requests.kick & bit != 0 {
                self.ee.schedule(EeEvent::dma(id.index()), 0);
            }
        }

        if self.gif.has_pending() && !self.ee.is_armed(EeEvent::GifDrain) {
            self.ee.schedule(EeEvent::GifDrain, self.config.gs_drain_cycles);
        }

        self.route_sif_wakes();

        let changes = self.vu_signals.take_changes();
        if !changes.is_empty() && self.gs.apply(&changes) {
            self.intc.request(interrupts::GS);
        }

        if self.sif.take_iop_irq() {
            self.iop_intc.request(iop_interrupts::DMA);
        }

        self.test_interrupts();

        if self.bridge.in_slice() {
            self.bridge.request_break(self.ee.next_event_cycle());
        }
    }

    /// Turn SIF wake-ups into events on the other domain
    ///
    /// A wake lands at the waker's local time. Inside an IOP slice that is
    /// ahead of the EE clock, and the slice is cut there.
    fn route_sif_wakes(&mut self) {
        let wake = self.sif.take_wake();
        if wake.is_empty() {
            return;
        }

        let ee_now = self.ee.cycle();
        let ee_at = ee_now.max(self.bridge.iop_to_ee(self.iop.cycle()));
        let ee_delay = clamp_delta(ee_at - ee_now);
        let iop_now = self.iop.cycle();
        let iop_delay = clamp_delta(self.bridge.ee_to_iop(ee_now).saturating_sub(iop_now));

        if wake.contains(SifWake::EE_SIF0) {
            self.wake_ee_channel(ChannelId::Sif0, ee_delay);
        }
        if wake.contains(SifWake::EE_SIF1) {
            self.wake_ee_channel(ChannelId::Sif1, ee_delay);
        }
        if wake.contains(SifWake::IOP_SIF0) {
            self.wake_iop_channel(IopSifId::Sif0, iop_delay);
        }
        if wake.contains(SifWake::IOP_SIF1) {
            self.wake_iop_channel(IopSifId::Sif1, iop_delay);
        }
    }

    fn ee_pending_mask(&self) -> u32 {
        let mut pending = 0;
        if self.intc.is_pending() {
            pending |= EE_PENDING_INTC;
        }
        if self.dmac.int1() {
            pending |= EE_PENDING_DMAC;
        }
        pending
    }

    fn iop_pending_mask(&self) -> u32 {
        if self.iop_intc.is_pending() {
            IOP_PENDING_INTC
        } else {
            0
        }
    }

    /// Arm the exception events on newly raised pending bits
    fn test_interrupts(&mut self) {
        let ee = self.ee_pending_mask();
        if ee & !self.ee_pending != 0 && !self.ee.is_armed(EeEvent::Exception) {
            self.ee.schedule(EeEvent::Exception, self.config.ee_irq_latency);
        }
        self.ee_pending = ee;

        let iop = self.iop_pending_mask();
        if iop & !self.iop_pending != 0 && !self.iop.is_armed(IopEvent::Exception) {
            self.iop.schedule(IopEvent::Exception, self.config.iop_irq_latency);
        }
        self.iop_pending = iop;
    }

    // External interface

    /// Queue quadwords on a GIF path (PATH1 from VU1, PATH2 from VIF1)
    ///
    /// # Returns
    ///
    /// Number of quadwords accepted
    pub fn submit_path(&mut self, path: GifPath, data: &[u128]) -> usize {
        let accepted = self.gif.submit(path, data);
        self.sync();
        accepted
    }

    /// Signal channel shared with the VU1 worker
    pub fn vu_signals(&self) -> Arc<VuSignals> {
        Arc::clone(&self.vu_signals)
    }

    /// Take the latched EE exception (the pending mask it was raised with)
    pub fn take_ee_exception(&mut self) -> Option<u32> {
        self.ee_exception.take()
    }

    /// Take the latched IOP exception
    pub fn take_iop_exception(&mut self) -> Option<u32> {
        self.iop_exception.take()
    }

    /// Arm an EE event on behalf of an external component
    pub fn schedule_ee(&mut self, event: EeEvent, delta: u32) {
        self.ee.schedule(event, delta);
    }

    /// Arm an IOP event on behalf of an external component
    pub fn schedule_iop(&mut self, event: IopEvent, delta: u32) {
        self.iop.schedule(event, delta);
    }

    /// Replace the GS consumer
    pub fn set_gs_sink(&mut self, sink: Box<dyn GsSink>) {
        self.gs_sink = sink;
    }

    /// Replace the VIF/IPU/SIF2 endpoints
    pub fn set_targets(&mut self, targets: DmaTargets) {
        self.targets = targets;
    }

    // Accessors

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn ee_cycle(&self) -> Cycle {
        self.ee.cycle()
    }

    pub fn iop_cycle(&self) -> Cycle {
        self.iop.cycle()
    }

    pub fn ee_scheduler(&self) -> &EventScheduler<EeEvent> {
        &self.ee
    }

    pub fn iop_scheduler(&self) -> &EventScheduler<IopEvent> {
        &self.iop
    }

    pub fn clock_bridge(&self) -> &ClockBridge {
        &self.bridge
    }

    pub fn memory(&self) -> &MainMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MainMemory {
        &mut self.memory
    }

    pub fn iop_memory(&self) -> &IopMemory {
        &self.iop_memory
    }

    pub fn iop_memory_mut(&mut self) -> &mut IopMemory {
        &mut self.iop_memory
    }

    pub fn dmac(&self) -> &DmaController {
        &self.dmac
    }

    pub fn gif(&self) -> &GifUnit {
        &self.gif
    }

    /// Mutable GIF access for VIF1 (MASKP3)
    pub fn gif_mut(&mut self) -> &mut GifUnit {
        &mut self.gif
    }

    pub fn gs(&self) -> &GsRegisters {
        &self.gs
    }

    pub fn sif(&self) -> &Sif {
        &self.sif
    }

    pub fn intc(&self) -> &IntcController {
        &self.intc
    }

    pub fn iop_intc(&self) -> &IopInterruptController {
        &self.iop_intc
    }

    /// Counter event ticks so far (EE, IOP)
    pub fn counter_ticks(&self) -> (u64, u64) {
        (self.counter_ticks[0], self.counter_ticks[1])
    }

    /// Whether no channel, path or IOP transfer has work left
    pub fn is_idle(&self) -> bool {
        ChannelId::ALL
            .iter()
            .all(|&id| self.dmac.channel_state(id) == ChannelState::Idle)
            && !self.gif.has_pending()
            && IopSifId::ALL.iter().all(|&id| !self.sif.iop_active(id))
    }
}

impl Default for System {
    fn default() -> Self {
        Self::build(
            CoreConfig::default(),
            DmaTargets::default(),
            Box::new(NullGsSink::default()),
        )
    }
}

/// Scheduler deltas are 32-bit
fn clamp_delta(cycles: u64) -> u32 {
    cycles.min(u32::MAX as u64) as u32
}

#[cfg(test)]
mod tests;
