//! Outreach Orchestration Pipeline
//!
//! Turns one accepted batch of prospects into exactly one webhook
//! delivery per prospect, through a fixed stage sequence:
//! ```text
//! Queue → Research → Scoring → Selection → Generation → Dispatch
//! ```
//!
//! Modules connected by traits:
//! - `queue`: strict FIFO intake buffer, single consumer
//! - `gate`: bounded retry-with-feedback around every capability call
//! - `runner`: drives one batch through the stages
//! - `llm`: Capabilities backed by an OpenAI-compatible endpoint
//! - `dispatch`: one webhook POST per result, in order
//! - `background`: the worker thread consuming the queue

pub mod error;
pub mod types;
pub mod traits;
pub mod queue;
pub mod gate;
pub mod runner;
pub mod llm;
pub mod dispatch;
pub mod background;

pub use error::{CapabilityError, DeliveryError, ValidationError};
pub use types::*;
pub use traits::*;
pub use queue::BatchQueue;
pub use gate::{Evaluation, GateOutcome, QualityGate};
pub use runner::{apply_selection, BatchRunner};
pub use llm::LlmCapabilities;
pub use dispatch::{dispatch_batch, DispatchSummary, WebhookSink};
pub use background::{start_worker, WorkerHandle, WorkerSettings};
