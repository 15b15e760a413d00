#![forbid(unsafe_code)]

//! TransitFlow runtime.
//!
//! A small Elm-style runtime for line-oriented console applications. The
//! application supplies a [`Model`]; the runtime owns the only thread that
//! touches it, runs [`Cmd::Task`] closures on background threads and feeds
//! their results back as messages, keeps the model's declared
//! [`Subscription`]s running, and redraws the text [`Frame`] when it changes.
//!
//! # Key Components
//!
//! - [`Program`] - the event loop
//! - [`Model`] - trait for application state and behavior
//! - [`Cmd`] - commands for side effects
//! - [`Subscription`] / [`Every`] - continuous message sources
//! - [`EventSource`] - where input lines come from
//! - [`ProgramSimulator`] - deterministic driver for tests
//! - [`StateRegistry`] - keyed blob persistence over a [`StorageBackend`]

pub mod event;
pub mod frame;
pub mod program;
pub mod simulator;
pub mod state_persistence;
pub mod subscription;

pub use event::{Event, EventSource, LineEventSource, ScriptedEventSource};
pub use frame::Frame;
pub use program::{Cmd, Model, PersistenceConfig, Program, ProgramConfig, TaskSpec};
pub use simulator::{CmdRecord, ProgramSimulator};
pub use state_persistence::{
    FileStorage, MemoryStorage, StateRegistry, StorageBackend, StorageError, StorageResult,
    StoredEntry,
};
pub use subscription::{Every, StopSignal, SubId, Subscription};
