//! Conversation Pipeline Relay
//!
//! This library provides the core functionality for the pipeline-relay
//! service, a thin orchestration shim that stages a referenced conversation
//! file, runs the external wire-pipeline executable against it, and delivers
//! the produced bundle inline, as a local path, or via a hosted download URL.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
