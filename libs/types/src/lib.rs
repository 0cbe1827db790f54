//! Types library for Merkle-gated vault disbursements
//!
//! Shared value types used by the batch authority and the disbursement
//! engine. Everything here is plain data with a fixed, deterministic byte
//! layout so both sides of the protocol agree on what a payout is.
//!
//! # Version
//! v1.0.0 - Frozen leaf layout
//!
//! # Modules
//! - `address`: 20-byte account/asset addresses
//! - `hash`: 32-byte digests used for leaves, nodes and roots
//! - `numeric`: 256-bit amounts and nonces, ether unit conversion
//! - `payout`: The payout record committed to by a Merkle root
//! - `errors`: Parse error taxonomy

pub mod address;
pub mod hash;
pub mod numeric;
pub mod payout;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::address::*;
    pub use crate::hash::*;
    pub use crate::numeric::*;
    pub use crate::payout::*;
    pub use crate::errors::*;
}
