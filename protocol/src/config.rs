//! # Protocol Configuration & Constants
//!
//! Every economic and timing constant of the HashDrop escrow lives here. The
//! values match the deployed settlement contracts; changing any of them
//! changes what an honest courier or emitter can expect, so they are
//! versioned together with [`PROTOCOL_VERSION`].
//!
//! Runtime-tunable copies of the timing and fee values are carried by
//! `EscrowParams` in the contracts crate, which defaults to these constants.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol version string. Bump on any change to fees, timeouts, message
/// formats or the delivery circuit.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Fee Parameters
// ---------------------------------------------------------------------------

/// Basis-point denominator. 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Protocol fee charged on the declared package value: 1%.
pub const PROTOCOL_FEE_BPS: u64 = 100;

/// Insurance fee charged on the declared package value: 0.5%.
pub const INSURANCE_FEE_BPS: u64 = 50;

/// Courier collateral as a fraction of package value: 110%.
///
/// The extra 10% over the package value is what makes abandoning a
/// picked-up package strictly worse for the courier than delivering it.
pub const COLLATERAL_BPS: u64 = 11_000;

// ---------------------------------------------------------------------------
// Timing Constants (seconds)
// ---------------------------------------------------------------------------

/// An OPEN order nobody accepted expires 24 hours after creation.
pub const ORDER_EXPIRY_SECS: u64 = 24 * 60 * 60;

/// A LOCKED order must be picked up within 2 hours of acceptance.
pub const PICKUP_TIMEOUT_SECS: u64 = 2 * 60 * 60;

/// A PICKED_UP order must be delivered within 6 hours of pickup.
pub const DELIVERY_TIMEOUT_SECS: u64 = 6 * 60 * 60;

/// Width of the pickup-signature window. Signatures bind
/// `floor(now / HOUR_WINDOW_SECS)`, not a raw timestamp.
pub const HOUR_WINDOW_SECS: u64 = 60 * 60;

// ---------------------------------------------------------------------------
// Message Formats
// ---------------------------------------------------------------------------

/// Literal tag mixed into the pickup message hash.
pub const PICKUP_TAG: &[u8] = b"PICKUP";

/// BLAKE3 derive-key context used when mapping an address into the BN254
/// scalar field for the delivery circuit.
pub const ADDRESS_FIELD_CONTEXT: &str = "hashdrop 2026 courier address to field v1";

/// Identifier of the delivery circuit. Proving and verifying keys are only
/// valid for the circuit they were generated for.
pub const DELIVERY_CIRCUIT_ID: &str = "hashdrop/delivery-proof/v1";

/// Random bytes drawn per delivery secret before reduction into the field.
/// 48 bytes = 384 bits, 130 bits above the 254-bit BN254 scalar field, so
/// the modular bias is below 2^-128.
pub const SECRET_SAMPLE_BYTES: usize = 48;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum dispute reason length in bytes.
pub const MAX_DISPUTE_REASON_LENGTH: usize = 512;

/// Maximum length of the encrypted-details reference (a CID or URL).
pub const MAX_DETAILS_REF_LENGTH: usize = 256;

/// Maximum number of evidence items attached to a single dispute.
pub const MAX_DISPUTE_EVIDENCE: usize = 32;

/// Returns the hour window containing `unix_secs`.
pub fn hour_window(unix_secs: u64) -> u64 {
    unix_secs / HOUR_WINDOW_SECS
}
