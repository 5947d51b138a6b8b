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

//! PlayStation 2 DMA and scheduling core library
//!
//! This library models how data moves through a PlayStation 2: the EE DMA
//! controller, the GIF and SIF units it feeds, the interrupt controllers on
//! both processors, and the event schedulers that keep the EE and IOP clocks
//! in step.
//!
//! # Example
//!
//! ```
//! use ps2rx::core::config::CoreConfig;
//! use ps2rx::core::System;
//!
//! let mut system = System::new(CoreConfig::default()).unwrap();
//!
//! // Run 1000 EE cycles; the IOP follows at 1/8 the rate
//! system.run(1000);
//! assert_eq!(system.ee_cycle(), 1000);
//! assert_eq!(system.iop_cycle(), 125);
//! ```

pub mod core;
