//! Desktop stand-ins for the appliance's peripherals and a simulator that
//! runs the record/playback core on them.

pub mod audio;
pub mod buttons;
pub mod cli;
pub mod config;
pub mod error;
pub mod leds;
pub mod remote;
pub mod store;

pub use error::{Error, Result};

// Link the executor so embassy-time's timer-queue hooks resolve in test binaries.
#[cfg(test)]
extern crate embassy_executor as _;
