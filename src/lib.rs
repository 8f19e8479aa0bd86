//! Bitforge - bulk media ingestion
//!
//! Scans an XML manifest for referenced files, produces an original copy, a
//! derivative and a metadata sidecar for each, and checkpoints progress so
//! an interrupted run resumes where it stopped.

pub mod checkpoint;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod persist;
pub mod processor;
pub mod run;
pub mod scanner;
pub mod service;
