//! Domain models for one delivery invocation.
//!
//! # Design
//! - The trigger event keeps the wire shape of an object-created notification.
//! - Outcomes own their errors so an aggregate failure can name every record.

mod event;
mod outcome;

pub use event::{Record, TriggerEvent};
pub use outcome::{Delivered, InvocationReport, RecordFailure, Stage, StageStatus, TransferOutcome};
