#![no_std]
//! Core of a two-button record/playback appliance.
//!
//! One poll loop owns the [`Controller`]: it debounces the Record and Play
//! buttons, arbitrates the two mutually exclusive modes and times out idle
//! activations. Started sessions are handed to a [`SessionRunner`], which owns
//! the audio transport and the byte store and streams WAV artifacts between
//! them. The two sides share nothing but the [`ModeFlags`].
//!
//! Hardware and process bootstrap stay outside this crate; collaborators are
//! reached through the [`ByteStore`], [`AudioTransport`] and
//! [`RemoteBlobStore`] traits.

// This must go first so the macros are visible to every other module.
mod fmt;

pub mod arbiter;
pub mod clock;
pub mod config;
pub mod controller;
pub mod indicator;
pub mod input;
pub mod mode;
pub mod remote;
pub mod runner;
pub mod session;
pub mod store;
pub mod transport;
pub mod wav;

pub use arbiter::{Arbiter, Decision, IgnoreReason};
pub use config::{AudioProfile, ConfigError, RecPlayConfig, RemoteConfig};
pub use controller::{ButtonLevels, Controller, EndCause, ModeSnapshot, PollOutcome};
pub use input::{ButtonChannel, Edge, Polarity};
pub use indicator::IndicatorLeds;
pub use mode::{ModeFlags, ModeId, SessionToken};
pub use remote::{NoRemote, RemoteBlobStore, SyncError};
pub use runner::{submit_session, PlaybackSource, Request, RunnerEvent, SessionRunner};
pub use session::{SessionError, SessionReport, StopReason};
pub use store::{ByteStore, OpenMode, StoreFile};
pub use transport::{AudioTransport, Direction};
pub use wav::{ContainerError, WavHeader};
