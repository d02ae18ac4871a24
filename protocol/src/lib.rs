// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # HashDrop Protocol — Core Library
//!
//! The cryptographic and arithmetic core of HashDrop, a peer-to-peer parcel
//! escrow. An emitter locks payment for a delivery, a courier locks
//! collateral to take the job, and money moves only when cryptographic
//! evidence of each handoff shows up.
//!
//! ## Architecture
//!
//! - **config** — Fee basis points, timeouts, message tags, limits.
//! - **crypto** — Ed25519 identities, BLAKE3 hashing, the signature scheme
//!   seam.
//! - **fees** — Fee and collateral arithmetic. Integers only.
//! - **pickup** — The emitter's hour-windowed pickup attestation.
//! - **zkp** — Poseidon secret commitments and the Groth16 delivery proof.
//!
//! The order state machine that ties these together lives in the
//! `hashdrop-contracts` crate.
//!
//! ## Design Philosophy
//!
//! 1. Verification returns `false`, it does not throw. Guards stay pure.
//! 2. No floating point near money.
//! 3. Every collaborator the escrow calls out to is a trait.
//! 4. If it touches money, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod fees;
pub mod pickup;
pub mod zkp;
