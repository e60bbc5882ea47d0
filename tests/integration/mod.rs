//! Integration test suite for sitecrew.
//!
//! These tests drive the pipeline from project files to a served site:
//! building the task graph, running tasks, parsing the generated blob,
//! deploying it and previewing it over HTTP.
//!
//! # Test Categories
//!
//! - `pipeline_e2e`: Project loading, task execution and deployment
//! - `server_lifecycle`: Preview server start, restart and stop
//!
//! # CI Compatibility
//!
//! Workers are scripted in-process and never spawn the real CLI.

mod fixtures;

mod pipeline_e2e;
mod server_lifecycle;
