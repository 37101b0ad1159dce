//! TierChain - a tiered blockchain core
//!
//! # Architecture
//!
//! Transactions arrive in batches and are packed into a three-tier hierarchy:
//! mini-blocks (sealed by a short nonce search) grouped into sub-blocks, grouped
//! into main-blocks that form the chain.
//!
//! ## Core Blockchain
//! - [`blockchain`] - Block tiers, the chain and its validation
//! - [`transaction`] - Transaction and batch types
//! - [`merkle`] - Merkle roots and inclusion proofs
//! - [`amount`] - Fixed-point amounts
//!
//! ## Admission
//! - [`pipeline`] - Batch admission pipeline
//! - [`dedup`] - Replay protection
//! - [`allocator`] - Mini-block capacity allocation
//! - [`worker`] - Bounded worker pool
//!
//! ## Consensus & Sealing
//! - [`consensus`] - Validator quorum
//! - [`miner`] - Mini-block proof sealing
//! - [`economics`] - Block rewards
//!
//! ## Collaborators
//! - [`ledger`] - Token balances
//! - [`persistence`] - Post-commit storage hook
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`node`] - Node wiring
//! - [`cli`] - CLI utilities

#![forbid(unsafe_code)]

// ============================================================================
// Core Blockchain
// ============================================================================
pub mod amount;
pub mod blockchain;
pub mod merkle;
pub mod transaction;

// ============================================================================
// Admission
// ============================================================================
pub mod allocator;
pub mod dedup;
pub mod pipeline;
pub mod worker;

// ============================================================================
// Consensus & Sealing
// ============================================================================
pub mod consensus;
pub mod economics;
pub mod miner;

// ============================================================================
// Collaborators
// ============================================================================
pub mod ledger;
pub mod persistence;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod cli;
pub mod config;
pub mod error;
pub mod node;

pub use blockchain::is_chain_valid;
pub use error::{ChainError, Result};
pub use pipeline::{AdmissionPipeline, AdmissionReceipt, Rejection};
