// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdock — Core types, error definitions, configuration and the bounded
// external-process runner shared across all crates.

pub mod config;
pub mod error;
pub mod process;
pub mod types;

pub use config::AgentConfig;
pub use error::{ConversionError, PrintdockError, PrinterError};
pub use types::*;
