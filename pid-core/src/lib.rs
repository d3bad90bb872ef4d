//! Time-aware PID control core with an injectable monotonic clock.
//!
//! For a runnable closed-loop demonstration, see the `motor-sim` binary.
#![cfg_attr(not(feature = "std"), no_std)]

pub mod utils;
