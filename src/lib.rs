//! Synheart Face - Guided facial-expression capture protocol
//!
//! Face walks a subject through a short, timed sequence of expressions and turns
//! per-frame facial action-unit scores into a small biomarker record:
//! baseline → reset → smile → reset → frown → result.
//!
//! ## Modules
//!
//! - **Protocol**: stage sequencing, reset gating and task timers
//!   ([`session`], [`gate`], [`timer`], [`buffer`], [`blink`])
//! - **Metrics**: pure metric functions and record aggregation
//!   ([`metrics`], [`aggregator`])
//! - **Plumbing**: classifier/camera adapters, the capture loop, record encoding
//!   and persistence ([`adapters`], [`pipeline`], [`encoder`], [`store`], [`schema`])
//!
//! The summary label is a screening heuristic, not a diagnosis.

pub mod adapters;
pub mod aggregator;
pub mod blink;
pub mod buffer;
pub mod config;
pub mod encoder;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod store;
pub mod timer;
pub mod types;

pub use aggregator::BiomarkerAggregator;
pub use config::ProtocolConfig;
pub use encoder::{RecordEncoder, RecordEnvelope};
pub use error::{CaptureError, StoreError};
pub use pipeline::{run_session, CaptureRunner};
pub use session::{CaptureStateMachine, SessionEvent};
pub use store::{FileRecordStore, MemoryRecordStore, RecordStore};
pub use types::{BiomarkerRecord, SessionOutcome, Stage, Subject, Summary, UploadStatus};

// Schema exports
pub use schema::{FrameStreamAdapter, RecordedFrame, FRAME_SCHEMA_VERSION};

/// Face version embedded in every record envelope
pub const FACE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for record envelopes
pub const PRODUCER_NAME: &str = "synheart-face";
