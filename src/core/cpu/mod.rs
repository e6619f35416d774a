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

use serde::{Deserialize, Serialize};

use crate::core::config::CoreConfig;
use crate::core::error::{EmulatorError, Result};
use crate::core::memory::MemoryBus;

/// SH-2 processor memory interface
///
/// The Saturn carries two SH-2 processors, each with its own independent
/// on-chip cache; every cache operation goes through one of these contexts
/// instead of any ambient "current processor" state, so composing the two
/// processors is explicit. The instruction executor itself lives outside
/// this crate and drives the load/store entry points here.
///
/// # Example
/// ```
/// use ssrx::core::config::CoreConfig;
/// use ssrx::core::cpu::{Sh2, Sh2Kind};
/// use ssrx::core::memory::SystemBus;
///
/// let mut bus = SystemBus::new();
/// let mut sh2 = Sh2::new(Sh2Kind::Master, CoreConfig::default());
/// sh2.write_cache_control(0x01); // CE
///
/// sh2.write_byte(&mut bus, 0x0600_0000, 0x42);
/// assert_eq!(sh2.read_byte(&mut bus, 0x0600_0000), 0x42);
/// ```
pub struct Sh2 {
    /// Master or slave processor
    kind: Sh2Kind,

    /// On-chip cache
    cache: CpuCache,

    /// Cycles consumed by memory traffic so far
    cycles: u64,
}

/// Which of the two Saturn SH-2 processors a context belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sh2Kind {
    /// The master SH-2
    Master,
    /// The slave SH-2
    Slave,
}

impl Sh2Kind {
    /// Diagnostic tag used in log output
    pub fn label(&self) -> &'static str {
        match self {
            Sh2Kind::Master => "SH2-M",
            Sh2Kind::Slave => "SH2-S",
        }
    }
}

// Module declarations
pub mod cache;

// Re-exports
pub use cache::{AccessKind, CacheControl, CacheStats, CpuCache};

impl Sh2 {
    /// Create a new processor context with a cleared, disabled cache
    pub fn new(kind: Sh2Kind, config: CoreConfig) -> Self {
        Self {
            kind,
            cache: CpuCache::new(kind, config),
            cycles: 0,
        }
    }

    /// Reset to the power-on state
    ///
    /// Zeroes the cache storage and the cycle counter.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.cycles = 0;
    }

    /// Which processor this context belongs to
    pub fn kind(&self) -> Sh2Kind {
        self.kind
    }

    /// Cycles consumed by memory traffic since the last reset
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Shared access to the on-chip cache
    pub fn cache(&self) -> &CpuCache {
        &self.cache
    }

    /// Mutable access to the on-chip cache
    pub fn cache_mut(&mut self) -> &mut CpuCache {
        &mut self.cache
    }

    /// Read the cache control register
    pub fn read_cache_control(&self) -> u8 {
        self.cache.read_control()
    }

    /// Write the cache control register
    pub fn write_cache_control(&mut self, value: u8) {
        self.cache.write_control(value);
    }

    /// Cache access counters
    pub fn stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    /// Read one byte from the processor's view of memory
    pub fn read_byte<B: MemoryBus>(&mut self, bus: &mut B, addr: u32) -> u8 {
        let (value, cycles) = self.cache.read_byte(bus, addr);
        self.cycles += u64::from(cycles);
        value
    }

    /// Read a 16-bit data word
    pub fn read_word<B: MemoryBus>(&mut self, bus: &mut B, addr: u32) -> u16 {
        let (value, cycles) = self.cache.read_word(bus, addr);
        self.cycles += u64::from(cycles);
        value
    }

    /// Fetch a 16-bit instruction word
    ///
    /// Misses use the instruction replacement bias instead of the data one.
    pub fn fetch_word<B: MemoryBus>(&mut self, bus: &mut B, addr: u32) -> u16 {
        let (value, cycles) = self.cache.fetch_word(bus, addr);
        self.cycles += u64::from(cycles);
        value
    }

    /// Read a 32-bit long
    pub fn read_long<B: MemoryBus>(&mut self, bus: &mut B, addr: u32) -> u32 {
        let (value, cycles) = self.cache.read_long(bus, addr);
        self.cycles += u64::from(cycles);
        value
    }

    /// Write one byte to the processor's view of memory
    pub fn write_byte<B: MemoryBus>(&mut self, bus: &mut B, addr: u32, value: u8) {
        let cycles = self.cache.write_byte(bus, addr, value);
        self.cycles += u64::from(cycles);
    }

    /// Write a 16-bit word
    pub fn write_word<B: MemoryBus>(&mut self, bus: &mut B, addr: u32, value: u16) {
        let cycles = self.cache.write_word(bus, addr, value);
        self.cycles += u64::from(cycles);
    }

    /// Write a 32-bit long
    pub fn write_long<B: MemoryBus>(&mut self, bus: &mut B, addr: u32, value: u32) {
        let cycles = self.cache.write_long(bus, addr, value);
        self.cycles += u64::from(cycles);
    }

    /// Serialize the processor state for a save state
    pub fn save_state(&self) -> Result<Vec<u8>> {
        let state = (&self.cache, self.cycles);
        Ok(bincode::serde::encode_to_vec(
            state,
            bincode::config::standard(),
        )?)
    }

    /// Restore processor state from a save state
    ///
    /// The current runtime configuration is kept; only the hardware state
    /// (cache contents and cycle counter) comes from the snapshot.
    pub fn load_state(&mut self, data: &[u8]) -> Result<()> {
        let ((mut cache, cycles), _): ((CpuCache, u64), usize) =
            bincode::serde::decode_from_slice(data, bincode::config::standard())?;
        if !cache.is_well_formed() {
            return Err(EmulatorError::CorruptSaveState);
        }
        cache.adopt_runtime_config(self.cache.runtime_config().clone());
        self.cache = cache;
        self.cycles = cycles;
        Ok(())
    }
}
