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

//! ssrx: A Sega Saturn (SH-2) emulator core
//!
//! This crate provides the SH-2 processor-side memory interface of a Saturn
//! emulator, centered on a cycle-exact emulation of the SH7604 on-chip cache.
//!
//! # Architecture
//!
//! The emulator core is organized into the following modules:
//!
//! - [`core`]: Core emulation components (SH-2 cache, memory bus, config)
//!
//! # Example
//!
//! ```
//! use ssrx::core::config::CoreConfig;
//! use ssrx::core::cpu::{Sh2, Sh2Kind};
//! use ssrx::core::memory::SystemBus;
//!
//! let mut bus = SystemBus::new();
//! let mut sh2 = Sh2::new(Sh2Kind::Master, CoreConfig::default());
//!
//! // Write through to high work RAM, then read it back through the cache
//! sh2.write_long(&mut bus, 0x2600_0000, 0x1234_5678);
//! sh2.cache_mut().enable();
//! assert_eq!(sh2.read_long(&mut bus, 0x0600_0000), 0x1234_5678);
//! ```
//!
//! # Modules
//!
//! - [`core::cpu`]: SH-2 processor context and on-chip cache emulation
//! - [`core::memory`]: Memory bus trait and the flat system bus
//! - [`core::config`]: Runtime configuration
//!
//! # Error Handling
//!
//! The cache access paths are total and infallible; fallible ambient
//! operations (BIOS loading, config parsing, save states) return
//! [`core::error::Result<T>`], an alias for `Result<T, EmulatorError>`.

pub mod core;

// Re-export commonly used types
pub use crate::core::error::{EmulatorError, Result};
