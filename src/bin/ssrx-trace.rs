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

//! Cache trace tool
//!
//! Drives a scripted access pattern through an SH-2 context and the flat
//! system bus, then prints hit/miss statistics. Useful for eyeballing the
//! replacement behavior and for profiling the hot path.

use clap::Parser;

use ssrx::core::config::CoreConfig;
use ssrx::core::cpu::{Sh2, Sh2Kind};
use ssrx::core::memory::SystemBus;

#[derive(Parser)]
#[command(name = "ssrx-trace", about = "SH-2 cache trace tool")]
struct Args {
    /// Path to a core config TOML file
    #[arg(short, long)]
    config: Option<String>,

    /// Path to a 512KB BIOS image to map at 0x00000000
    #[arg(short, long)]
    bios: Option<String>,

    /// Number of passes over the working set
    #[arg(short, long, default_value_t = 64)]
    passes: u32,

    /// Dump the final statistics as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    config.collect_stats = true;

    let mut bus = SystemBus::new();
    if let Some(path) = &args.bios {
        bus.load_bios(path)?;
        log::info!("BIOS loaded from {}", path);
    }

    // Seed high work RAM with a recognizable pattern
    for (i, byte) in bus.wram_high_mut().iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }

    let mut sh2 = Sh2::new(Sh2Kind::Master, config);
    sh2.write_cache_control(0x01);

    log::info!("Running {} passes", args.passes);

    // A working set of 96 lines in high work RAM: 64 fit the cache
    // cleanly, the rest force evictions, and a strided writer keeps the
    // write-through path busy
    for pass in 0..args.passes {
        for line in 0..96u32 {
            let addr = 0x0600_0000 + line * 0x10;
            sh2.read_long(&mut bus, addr);
            sh2.read_word(&mut bus, addr + 4);
            sh2.fetch_word(&mut bus, addr + 6);
            if line % 8 == 0 {
                sh2.write_byte(&mut bus, addr + 15, pass as u8);
            }
        }
        // Purge one set per pass to keep the invalidation path warm
        let purge_line = 0x0600_0000 + (pass % 64) * 0x10;
        sh2.write_long(&mut bus, 0x4000_0000 | purge_line, 0);
    }

    let stats = *sh2.stats();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!(
            "run finished at {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        println!("read hits:   {}", stats.read_hits);
        println!("read misses: {}", stats.read_misses);
        println!("writes:      {}", stats.writes);
        println!("hit rate:    {:.2}%", stats.hit_rate());
        println!("bus cycles:  {}", sh2.cycles());
    }

    Ok(())
}
