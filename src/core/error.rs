// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Error types for the emulator core
//!
//! The cache and bus access paths are total and never fail; errors only
//! arise from the ambient surface: loading a BIOS image, parsing a config
//! file, or encoding/decoding a save state.

use thiserror::Error;

/// Errors produced by the emulator core
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// BIOS file could not be found or opened
    #[error("BIOS file not found: {0}")]
    BiosNotFound(String),

    /// BIOS file exists but has the wrong size
    #[error("invalid BIOS size: expected {expected} bytes, got {got}")]
    InvalidBiosSize { expected: usize, got: usize },

    /// Config file could not be parsed as TOML
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config could not be serialized as TOML
    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Save state could not be encoded
    #[error("failed to encode save state: {0}")]
    SaveStateEncode(#[from] bincode::error::EncodeError),

    /// Save state could not be decoded
    #[error("failed to decode save state: {0}")]
    SaveStateDecode(#[from] bincode::error::DecodeError),

    /// Save state decoded but does not describe the expected hardware
    #[error("corrupt save state")]
    CorruptSaveState,

    /// Underlying I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, EmulatorError>;
