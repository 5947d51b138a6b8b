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

//! Core emulation components
//!
//! This module contains the data-movement half of the machine:
//! - DMA controller (10 EE channels and tag chains)
//! - Event schedulers and the EE/IOP clock bridge
//! - GIF path arbitration and the privileged GS registers
//! - SIF FIFOs, IOP SIF channels and the mailbox
//! - EE INTC and IOP interrupt controllers
//! - System integration

pub mod clock;
pub mod config;
pub mod dma;
pub mod error;
pub mod fifo;
pub mod gif;
pub mod interrupt;
pub mod memory;
pub mod sif;
pub mod system;
pub mod timing;

// Re-export commonly used types
pub use clock::ClockBridge;
pub use config::CoreConfig;
pub use dma::{DmaController, DmaTarget};
pub use error::{DmaError, EmulatorError, Result};
pub use gif::{GifUnit, GsSink};
pub use sif::Sif;
pub use system::System;
pub use timing::{Cycle, EventScheduler};
