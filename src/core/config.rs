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

//! Core configuration
//!
//! Every timing constant the DMA/scheduling core depends on lives here, with
//! defaults matching the retail hardware. Configuration is read from TOML;
//! missing keys fall back to the defaults.
//!
//! # Example
//!
//! ```
//! use ps2rx::core::config::CoreConfig;
//!
//! let config = CoreConfig::from_toml_str("cycles_per_qword = 4").unwrap();
//! assert_eq!(config.cycles_per_qword, 4);
//! assert_eq!(config.clock_ratio, 8);
//! ```

use crate::core::error::{EmulatorError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// EE main RAM size (32 MiB)
pub const DEFAULT_MAIN_RAM_SIZE: usize = 32 * 1024 * 1024;

/// IOP RAM size (2 MiB)
pub const DEFAULT_IOP_RAM_SIZE: usize = 2 * 1024 * 1024;

/// Tunable parameters of the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// EE cycles per IOP cycle
    pub clock_ratio: u32,

    /// Cycles between an EE interrupt line rising and the exception
    pub ee_irq_latency: u32,

    /// Cycles between an IOP interrupt line rising and the exception
    pub iop_irq_latency: u32,

    /// EE cycles charged per quadword moved by a DMA channel
    pub cycles_per_qword: u32,

    /// EE cycles charged for reading a chain tag
    pub tag_fetch_cycles: u32,

    /// Delay before a channel blocked on its downstream unit retries
    pub stall_retest_cycles: u32,

    /// PATH3 FIFO capacity in quadwords
    pub gif_fifo_qwords: usize,

    /// SIF FIFO capacity in 32-bit words
    pub sif_fifo_words: usize,

    /// Quadwords the GS consumes per drain event
    pub gs_drain_qwords: usize,

    /// EE cycles between GS drain events
    pub gs_drain_cycles: u32,

    /// IOP cycles charged per quadword moved by an IOP SIF channel
    pub iop_cycles_per_qword: u32,

    /// EE main RAM size in bytes
    pub main_ram_size: usize,

    /// IOP RAM size in bytes
    pub iop_ram_size: usize,

    /// Period of the EE counter event in EE cycles (0 = disabled)
    pub counter_period: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            clock_ratio: 8,
            ee_irq_latency: 4,
            iop_irq_latency: 2,
            cycles_per_qword: 2,
            tag_fetch_cycles: 4,
            stall_retest_cycles: 16,
            gif_fifo_qwords: 16,
            sif_fifo_words: 128,
            gs_drain_qwords: 4,
            gs_drain_cycles: 8,
            iop_cycles_per_qword: 1,
            main_ram_size: DEFAULT_MAIN_RAM_SIZE,
            iop_ram_size: DEFAULT_IOP_RAM_SIZE,
            counter_period: 0,
        }
    }
}

impl CoreConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: CoreConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded core configuration from {}", path.display());
        Ok(config)
    }

    /// Serialize the configuration back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Check that the values describe a usable machine
    pub fn validate(&self) -> Result<()> {
        if self.clock_ratio == 0 {
            return Err(EmulatorError::Config("clock_ratio must be at least 1".into()));
        }
        if self.gif_fifo_qwords == 0 {
            return Err(EmulatorError::Config(
                "gif_fifo_qwords must be at least 1".into(),
            ));
        }
        if self.sif_fifo_words < 4 || self.sif_fifo_words % 4 != 0 {
            return Err(EmulatorError::Config(format!(
                "sif_fifo_words must be a non-zero multiple of 4 (got {})",
                self.sif_fifo_words
            )));
        }
        if self.gs_drain_qwords == 0 {
            return Err(EmulatorError::Config(
                "gs_drain_qwords must be at least 1".into(),
            ));
        }
        if self.main_ram_size < 16 || self.iop_ram_size < 16 {
            return Err(EmulatorError::Config("RAM sizes are too small".into()));
        }
        Ok(())
    }
}
