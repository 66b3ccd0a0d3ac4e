// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! self-review library
//!
//! This module exports the core functionality of self-review for use in
//! integration tests and as a library: the commit store, period aggregation,
//! summary cache and the fetch, review and export pipelines behind the CLI.

mod migrations;

pub mod commands;
pub mod config;
pub mod db;
pub mod export;
pub mod ingest;
pub mod periods;
pub mod review;
pub mod settings;
pub mod store;
pub mod summary;
