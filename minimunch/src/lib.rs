//! Client for the Minimunch food dispenser.
//!
//! Mirrors the dispenser record held in a realtime key-value store into
//! local display state, and writes switch and activation actions back to
//! the same record.

#[macro_use]
extern crate clap;

#[macro_use]
extern crate derive_more;

#[macro_use]
extern crate log;

pub mod app;
pub mod config;
pub mod data_structures;
pub mod prelude;
pub mod remote;
pub mod util;
pub mod view;

pub use prelude::*;
