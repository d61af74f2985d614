// Copyright 2026 Portico Contributors
// SPDX-License-Identifier: Apache-2.0

//! Portico runtime library — browser-driven academic portal automation.
//!
//! Drives a headless Chromium session through a portal's single-page
//! interface, captures the REST responses the interface fetches for
//! itself, and normalizes them into canonical course records. This
//! library crate exposes the core modules for integration testing.

pub mod audit;
pub mod browser;
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod portal;
