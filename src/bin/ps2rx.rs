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

//! Replay a single DMA transfer against the core
//!
//! Loads a raw memory image into EE RAM, programs one channel, runs the core
//! until everything is idle (or the cycle budget is spent) and prints a JSON
//! summary on stdout.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::{error, info};
use serde::Serialize;

use ps2rx::core::config::CoreConfig;
use ps2rx::core::dma::{chcr, ctrl, reg, ChannelId, D_CTRL, D_STAT};
use ps2rx::core::error::{EmulatorError, Result};
use ps2rx::core::gif::GifPath;
use ps2rx::core::system::System;
use ps2rx::core::timing::{EeEvent, IopEvent};

/// Transfer mode written to CHCR.MOD
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Normal,
    Chain,
    Interleave,
}

impl Mode {
    fn bits(self) -> u32 {
        match self {
            Mode::Normal => 0,
            Mode::Chain => 1,
            Mode::Interleave => 2,
        }
    }
}

/// PlayStation 2 DMA replay tool
#[derive(Parser)]
#[command(name = "ps2rx")]
#[command(about = "Replay a DMA transfer through the PS2 data-movement core", long_about = None)]
struct Args {
    /// Raw image loaded into EE RAM
    image: PathBuf,

    /// EE RAM address the image is loaded at
    #[arg(long, default_value = "0", value_parser = parse_u32)]
    load_at: u32,

    /// Channel number (0 = VIF0 ... 9 = toSPR)
    #[arg(short = 'c', long, default_value = "2")]
    channel: usize,

    /// Transfer mode
    #[arg(short = 'm', long, value_enum, default_value = "chain")]
    mode: Mode,

    /// Transfer from memory (CHCR.DIR)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    from_memory: bool,

    /// MADR
    #[arg(long, default_value = "0", value_parser = parse_u32)]
    madr: u32,

    /// TADR (chain mode)
    #[arg(long, default_value = "0", value_parser = parse_u32)]
    tadr: u32,

    /// QWC
    #[arg(long, default_value = "0", value_parser = parse_u32)]
    qwc: u32,

    /// Unmask the channel interrupt in D_STAT
    #[arg(long)]
    irq: bool,

    /// Core configuration file (TOML), falls back to $PS2RX_CONFIG
    #[arg(long)]
    config: Option<PathBuf>,

    /// EE cycle budget
    #[arg(short = 'n', long, default_value = "1000000")]
    cycles: u64,
}

/// JSON report printed after the run
#[derive(Debug, Serialize)]
struct Summary {
    channel: &'static str,
    ee_cycles: u64,
    iop_cycles: u64,
    idle: bool,
    d_stat: u32,
    chcr: u32,
    madr: u32,
    tadr: u32,
    qwc: u32,
    gif_path_qwords: [u64; 3],
    ee_exceptions: Vec<u32>,
    iop_exceptions: Vec<u32>,
}

/// Accepts decimal or 0x-prefixed hex
fn parse_u32(text: &str) -> std::result::Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", text, e))
}

fn program_channel(system: &mut System, id: ChannelId, args: &Args) -> Result<()> {
    let base = id.base_address();
    system.ee_write32(D_CTRL, ctrl::DMAE)?;
    if args.irq {
        system.ee_write32(D_STAT, 1 << (16 + id.index()))?;
    }
    system.ee_write32(base + reg::MADR, args.madr)?;
    system.ee_write32(base + reg::QWC, args.qwc)?;
    system.ee_write32(base + reg::TADR, args.tadr)?;

    let mut value = chcr::STR | (args.mode.bits() << chcr::MOD_SHIFT);
    if args.from_memory {
        value |= chcr::DIR;
    }
    system.ee_write32(base + reg::CHCR, value)
}

fn exception_pending(system: &System) -> bool {
    system.ee_scheduler().is_armed(EeEvent::Exception)
        || system.iop_scheduler().is_armed(IopEvent::Exception)
}

fn replay(args: &Args) -> Result<Summary> {
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var_os("PS2RX_CONFIG").map(PathBuf::from));
    let config = match config_path {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    let id = ChannelId::from_index(args.channel).ok_or_else(|| {
        EmulatorError::Config(format!("no DMA channel {}", args.channel))
    })?;
    let slice = u64::from(config.ee_irq_latency.max(1)) * 64;

    let mut system = System::new(config)?;
    let image = fs::read(&args.image)?;
    system.memory_mut().load(args.load_at, &image)?;
    info!(
        "Loaded {} bytes at 0x{:08X}, starting {}",
        image.len(),
        args.load_at,
        id.name()
    );

    program_channel(&mut system, id, args)?;

    let mut ee_exceptions = Vec::new();
    let mut iop_exceptions = Vec::new();
    let mut spent = 0u64;
    while spent < args.cycles {
        let chunk = slice.min(args.cycles - spent);
        system.run(chunk);
        spent += chunk;
        ee_exceptions.extend(system.take_ee_exception());
        iop_exceptions.extend(system.take_iop_exception());
        if system.is_idle() && !exception_pending(&system) {
            break;
        }
    }

    let channel = system.dmac().channel(id);
    Ok(Summary {
        channel: id.name(),
        ee_cycles: system.ee_cycle(),
        iop_cycles: system.iop_cycle(),
        idle: system.is_idle(),
        d_stat: system.ee_read32(D_STAT)?,
        chcr: channel.chcr,
        madr: channel.madr,
        tadr: channel.tadr,
        qwc: channel.qwc,
        gif_path_qwords: [
            system.gif().transferred(GifPath::Path1),
            system.gif().transferred(GifPath::Path2),
            system.gif().transferred(GifPath::Path3),
        ],
        ee_exceptions,
        iop_exceptions,
    })
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("ps2rx v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let summary = match replay(&args) {
        Ok(summary) => summary,
        Err(e) => {
            error!("Replay failed: {}", e);
            return Err(Box::new(e));
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
