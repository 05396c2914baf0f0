//! Insurance document classification and routing pipeline.
//!
//! Documents enter through direct submission or email intake, are run
//! through OCR and LLM classification by a queue-fed worker, and are
//! copied to a hierarchical destination derived from their
//! classification and business identifiers. All broker traffic flows
//! through a transactional outbox so database state and published
//! messages never disagree.

pub mod broker;
pub mod classify;
pub mod cli;
pub mod config;
pub mod destination;
pub mod models;
pub mod ocr;
pub mod pii;
pub mod publisher;
pub mod repository;
pub mod schema;
pub mod services;
pub mod storage;
pub mod worker;
