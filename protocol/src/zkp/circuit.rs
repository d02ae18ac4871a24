//! # Delivery Proof R1CS Circuit
//!
//! The statement proved by the courier at the receiver's door:
//!
//! ```text
//! "I know `secret` such that Poseidon(secret) = commitment,
//!  and this proof is for (order_id, courier)."
//! ```
//!
//! ## Binding the order and the courier
//!
//! `order_id` and `courier` take no part in the hash check, but they are
//! public inputs, and Groth16 verification fails if any public input
//! differs from the one the proof was generated with. A proof lifted from
//! one order or courier is worthless for another.
//!
//! Each binding input is squared into a throwaway witness so it appears in
//! at least one constraint. An input that appears in no constraint has a
//! zero column in the QAP, and some provers will let it float freely.
//!
//! ## Public inputs (in order)
//!
//! | index | value |
//! |-------|-------|
//! | 0     | secret commitment |
//! | 1     | `Fr::from(order_id)` |
//! | 2     | `address_to_field(courier)` |

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::constraints::CryptographicSpongeVar;
use ark_crypto_primitives::sponge::poseidon::constraints::PoseidonSpongeVar;
use ark_crypto_primitives::sponge::poseidon::PoseidonConfig;
use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar, fields::FieldVar};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::commitment::{DeliverySecret, SecretCommitment};
use crate::crypto::{address_to_field, Address};

/// Groth16 circuit for the delivery statement.
///
/// Witness slots are `Option` so the same struct serves key generation
/// (all `None`) and proving (all `Some`).
#[derive(Clone)]
pub struct DeliveryProofCircuit {
    /// Poseidon parameters, baked in as constants.
    pub config: PoseidonConfig<Fr>,

    // -- Private witness ----------------------------------------------------
    pub secret: Option<Fr>,

    // -- Public inputs ------------------------------------------------------
    pub commitment: Option<Fr>,
    pub order_id: Option<Fr>,
    pub courier: Option<Fr>,
}

impl DeliveryProofCircuit {
    /// Fully populated circuit for proving.
    pub fn new(
        config: &PoseidonConfig<Fr>,
        secret: &DeliverySecret,
        commitment: &SecretCommitment,
        order_id: u64,
        courier: &Address,
    ) -> Self {
        Self {
            config: config.clone(),
            secret: Some(*secret.as_field()),
            commitment: Some(*commitment.as_field()),
            order_id: Some(Fr::from(order_id)),
            courier: Some(address_to_field(courier.as_bytes())),
        }
    }

    /// Empty circuit for CRS generation. Same constraint topology.
    pub fn blank(config: &PoseidonConfig<Fr>) -> Self {
        Self {
            config: config.clone(),
            secret: None,
            commitment: None,
            order_id: None,
            courier: None,
        }
    }
}

impl ConstraintSynthesizer<Fr> for DeliveryProofCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // Public inputs. Allocation order is the public input order.
        let commitment_var = FpVar::<Fr>::new_input(ark_relations::ns!(cs, "commitment"), || {
            self.commitment.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let order_id_var = FpVar::<Fr>::new_input(ark_relations::ns!(cs, "order_id"), || {
            self.order_id.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let courier_var = FpVar::<Fr>::new_input(ark_relations::ns!(cs, "courier"), || {
            self.courier.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let secret_var = FpVar::<Fr>::new_witness(ark_relations::ns!(cs, "secret"), || {
            self.secret.ok_or(SynthesisError::AssignmentMissing)
        })?;

        // Poseidon(secret) == commitment
        let mut sponge = PoseidonSpongeVar::<Fr>::new(cs.clone(), &self.config);
        sponge.absorb(&secret_var)?;
        let squeezed = sponge.squeeze_field_elements(1)?;
        squeezed[0].enforce_equal(&commitment_var)?;

        // Bind order and courier.
        let _order_sq = order_id_var.square()?;
        let _courier_sq = courier_var.square()?;

        Ok(())
    }
}

/// Public input vector in circuit allocation order.
pub fn public_inputs(commitment: &SecretCommitment, order_id: u64, courier: &Address) -> Vec<Fr> {
    vec![
        *commitment.as_field(),
        Fr::from(order_id),
        address_to_field(courier.as_bytes()),
    ]
}
