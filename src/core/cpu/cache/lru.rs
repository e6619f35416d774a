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

//! Pseudo-LRU replacement tables
//!
//! Each cache set carries 6 bits of pseudo-LRU state. A hit coarsens the
//! state through a per-way AND/OR mask pair; victim selection indexes a
//! 64-entry table with the (masked) state. Some states never arise from
//! the update function; the hardware treats those rows as "no replacement
//! candidate" and services the access uncached, which the table encodes as
//! `None`.

/// AND/OR mask pair applied to a set's LRU state when a way is used
struct LruTransition {
    and_mask: u8,
    or_mask: u8,
}

/// State transition per way index
const TRANSITIONS: [LruTransition; 4] = [
    LruTransition { and_mask: 0x07, or_mask: 0x00 },
    LruTransition { and_mask: 0x19, or_mask: 0x20 },
    LruTransition { and_mask: 0x2A, or_mask: 0x14 },
    LruTransition { and_mask: 0x34, or_mask: 0x0B },
];

/// Victim way per 6-bit LRU state; `None` rows force uncached service
#[rustfmt::skip]
const VICTIM: [Option<u8>; 64] = [
    Some(3), Some(2), None,    Some(2), Some(3), None,    Some(1), Some(1),
    None,    Some(2), None,    Some(2), None,    None,    Some(1), Some(1),
    Some(3), None,    None,    None,    Some(3), None,    Some(1), Some(1),
    None,    None,    None,    None,    None,    None,    Some(1), Some(1),
    Some(3), Some(2), None,    Some(2), Some(3), None,    None,    None,
    None,    Some(2), None,    Some(2), None,    None,    None,    None,
    Some(3), None,    None,    None,    Some(3), None,    None,    None,
    Some(0), Some(0), Some(0), Some(0), Some(0), Some(0), Some(0), Some(0),
];

/// Record that `way` was just used
#[inline(always)]
pub(super) fn update(lru: u8, way: usize) -> u8 {
    let t = &TRANSITIONS[way];
    (lru & t.and_mask) | t.or_mask
}

/// Pick the way to replace for the given LRU state
///
/// `mask` narrows the state before the table lookup and `bias` is OR'd
/// into the selected way; together they implement the two-way and
/// split instruction/data replacement modes.
#[inline(always)]
pub(super) fn select_victim(lru: u8, mask: u8, bias: u8) -> Option<u8> {
    VICTIM[(lru & mask) as usize].map(|way| way | bias)
}
