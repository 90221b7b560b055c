// crates/license-authority-config/src/lib.rs
// ============================================================================
// Module: License Authority Config Library
// Description: Configuration model and fail-closed validation.
// Purpose: Single source of truth for license-authority.toml semantics.
// Dependencies: license-authority-core, serde, toml
// ============================================================================

//! ## Overview
//! `license-authority-config` loads `license-authority.toml`, validates every
//! section against hard limits, and turns the result into the option structs
//! and backends consumed by the issuance engine and the scheduler.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
