//! # Streaks Core Library
//!
//! This library provides the core logic for tracking streaks: continuous
//! runs of daily activity that either keep growing, break after a grace
//! period, or get closed on purpose and archived into history.
//!
//! ## Architecture
//!
//! - **Engine**: pure state transitions on a streak snapshot, driven by an
//!   explicit "now" and the caller's timezone offset
//! - **Storage**: SQLite-backed record store and TOML-based configuration
//! - **Service**: the client-facing operations, each run as one store
//!   transaction on behalf of an explicit caller
//!
//! ## Key Components
//!
//! - [`StreakEngine`]: extend / end / create / patch transitions
//! - [`StreakService`]: owner-scoped operations over a [`StreakStore`]
//! - [`StreakDb`]: SQLite implementation of the store
//! - [`Config`]: application configuration management

pub mod clock;
pub mod engine;
pub mod error;
pub mod events;
pub mod service;
pub mod storage;
pub mod streak;
pub mod timezone;
pub mod view;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{
    run_length, ClosedRun, GracePolicy, MilestoneProgress, MilestoneTable, NextMilestone,
    StreakEngine, Transition,
};
pub use error::{ConfigError, CoreError, DatabaseError, ErrorKind, Result, ValidationError};
pub use events::StreakEvent;
pub use service::{ClientTime, EndOutcome, ExtendOutcome, StreakService};
pub use storage::{Config, Database, StreakDb, StreakStore};
pub use streak::{
    Caller, Color, HistoryEntry, OwnerId, PastStreaks, PositionUpdate, Run, Streak, StreakDraft,
    StreakId, StreakPatch,
};
pub use timezone::TimezoneOffset;
pub use view::StreakView;
