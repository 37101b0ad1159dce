// Thin re-export module: implementation lives under `blockchain/core/`.

pub mod core;
pub use core::*;
