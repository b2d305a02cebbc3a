//! # DanceBud Core Library
//!
//! This library provides the real-time session-scoring engine behind the
//! DanceBud dance-practice coach. It turns camera, microphone and motion
//! sensor signals into a running assessment of a practice session and
//! persists the resulting summaries. The `dancebud` CLI is a thin host over
//! the same library.
//!
//! ## Architecture
//!
//! - **Session Engine**: a clock-driven state machine that requires the
//!   caller to periodically invoke `poll()`; no internal threads
//! - **Sensors**: pose, motion and tempo collaborators behind one
//!   start/poll/stop contract, each owning its hardware handle
//! - **Storage**: SQLite-based session storage and TOML-based configuration
//! - **Stats**: running totals re-derived from the full session history
//!
//! ## Key Components
//!
//! - [`SessionEngine`]: session lifecycle and aggregation
//! - [`PoseScorer`]: stateless posture score
//! - [`MotionTracker`]: step counting with synthetic fallback
//! - [`TempoEstimator`]: bass-energy tempo heuristic
//! - [`Database`]: session, settings and statistics persistence
//! - [`Config`]: application configuration management

pub mod error;
pub mod events;
pub mod motion;
pub mod pose;
pub mod sensors;
pub mod session;
pub mod stats;
pub mod storage;
pub mod tempo;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, SensorError, ValidationError};
pub use events::Event;
pub use motion::{MotionMode, MotionTracker, MotionUpdate};
pub use pose::{Keypoint, Pose, PoseScorer, PoseTracker};
pub use sensors::{PermissionGate, PermissionStatus, Reading, Sensor, SensorKind, StaticPermissions};
pub use session::{SessionEngine, SessionState, SessionSummary};
pub use stats::{RunningStatistics, StatsAggregator};
pub use storage::{Config, DataExport, Database, PersistenceGateway, SessionRecord};
pub use tempo::{AudioInput, TempoEstimator};
pub use timer::{Clock, ManualClock, SystemClock};
