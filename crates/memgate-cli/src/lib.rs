//! Operator tooling for memgate
//!
//! Library half of the `memgate` binary, split out so the commands can be
//! tested without spawning a process.

#![warn(unreachable_pub)]

pub mod commands;
pub mod dry_run;
