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

//! Runtime configuration for the emulator core
//!
//! Every toggle here is an ordinary runtime flag so that all combinations
//! stay testable from a single build. The flags are read by the SH-2 cache
//! core; nothing in the core ever writes them back.

use crate::core::error::Result;
use serde::{Deserialize, Serialize};

/// Core configuration that can be saved/loaded
///
/// # Example
///
/// ```
/// use ssrx::core::config::CoreConfig;
///
/// let config = CoreConfig::default();
/// assert!(config.use_cache);
/// assert!(!config.coherency_check);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Whether SH-2 cache emulation is in effect at all
    ///
    /// When false, enabling the cache through CCR is a no-op and every
    /// cacheable access goes straight to the bus.
    pub use_cache: bool,

    /// Verify every cache read hit against the backing store
    ///
    /// Debug aid: mismatches are logged, never acted upon. Slow.
    pub coherency_check: bool,

    /// Count cache hits/misses/writes
    pub collect_stats: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            coherency_check: false,
            collect_stats: false,
        }
    }
}

impl CoreConfig {
    /// Load configuration from TOML file
    ///
    /// Missing keys fall back to their defaults, so a partial file is fine.
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &str) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
