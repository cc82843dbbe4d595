// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Minimal debug logging support.
//!
//! Decoding is driven entirely by the caller, so instead of threading a
//! logger instance through every parsing routine we gate two printing macros
//! on a process-wide verbosity level. The default level is [`OFF`], making
//! both macros no-ops unless a diagnosing user opts in. If we end up needing
//! more elaborate logging later, it is worth considering switching to the
//! `log` crate and a corresponding subscriber. However, for our current
//! needs this seemed overkill.

use std::sync::atomic::AtomicU8;

// Re-export to make the macros show up in this module in rustdoc.
pub use crate::{debug, trace};

/// Nothing is printed.
pub const OFF: u8 = 0;

/// [`debug`] messages are printed.
pub const DEBUG: u8 = 1;

/// Both [`debug`] and [`trace`] messages are printed.
pub const TRACE: u8 = 2;

/// Determines which messages are actually printed.
pub static LEVEL: AtomicU8 = AtomicU8::new(OFF);

/// Print to stderr if the log level is at least [`DEBUG`].
///
/// See [`eprintln`] documentation for usage.
#[macro_export]
macro_rules! debug {
    ( $($args:tt)* ) => {
        if $crate::dbglog::LEVEL.load(::std::sync::atomic::Ordering::Relaxed)
            >= $crate::dbglog::DEBUG
        {
            ::std::eprintln!( $($args)* );
        }
    }
}

/// Print to stderr if the log level is at least [`TRACE`].
///
/// See [`eprintln`] documentation for usage.
#[macro_export]
macro_rules! trace {
    ( $($args:tt)* ) => {
        if $crate::dbglog::LEVEL.load(::std::sync::atomic::Ordering::Relaxed)
            >= $crate::dbglog::TRACE
        {
            ::std::eprintln!( $($args)* );
        }
    }
}
