//! # Ports Layer
//!
//! - `outbound.rs` - Driven ports: where watch notifications and snapshots go

pub mod outbound;
