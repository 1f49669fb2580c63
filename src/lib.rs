//! StarNotary - a private notary blockchain for signed star ownership claims
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`block`] - Block structure, canonical serialization and digest
//! - [`store`] - Durable key-value persistence (SQLite)
//! - [`chain`] - Chain management, genesis bootstrap and validation
//!
//! ## Admission
//! - [`mempool`] - Challenge/ticket state machine gating appends
//! - [`crypto`] - Wallet keys and recoverable signatures (secp256k1)
//!
//! ## Integration
//! - [`api`] - REST API server
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod block;
pub mod chain;
pub mod store;

// ============================================================================
// Admission
// ============================================================================
pub mod crypto;
pub mod mempool;

// ============================================================================
// Integration
// ============================================================================
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
