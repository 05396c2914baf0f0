//! Domain models for documents, routing rules, and outbox events.

pub mod document;
pub mod mapping;
pub mod outbox;

pub use document::{
    Document, DocumentStatus, Identifiers, OverrideChange, OverrideRequest, UNKNOWN_IDENTIFIER,
};
pub use mapping::BucketMapping;
pub use outbox::{OutboxEvent, StatusPayload, SubmissionPayload};
