//! # Poseidon Commitment Hash
//!
//! The delivery secret is committed with Poseidon over the BN254 scalar
//! field. Poseidon is cheap inside an R1CS (a few hundred constraints per
//! permutation), where BLAKE3 would cost tens of thousands.
//!
//! The same [`PoseidonConfig`] is used natively (commitment generation and
//! the pre-proof check) and inside [`super::circuit::DeliveryProofCircuit`].
//! If the two ever diverge every honest proof fails, so both sides read it
//! from [`poseidon_config`].
//!
//! ## Parameters
//!
//! | param          | value |
//! |----------------|-------|
//! | rate           | 2     |
//! | capacity       | 1     |
//! | alpha (S-box)  | 5     |
//! | full rounds    | 8     |
//! | partial rounds | 57    |
//!
//! Round constants and the MDS matrix come from the Grain LFSR procedure in
//! the Poseidon paper, so anyone can regenerate them.

use std::sync::OnceLock;

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::{
    find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge,
};
use ark_crypto_primitives::sponge::CryptographicSponge;
use ark_ff::PrimeField;

/// Sponge rate (field elements absorbed per permutation).
pub const POSEIDON_RATE: usize = 2;
/// Sponge capacity.
pub const POSEIDON_CAPACITY: usize = 1;
/// S-box exponent. 5 is the smallest `d` with `gcd(d, p - 1) = 1` for BN254.
pub const POSEIDON_ALPHA: u64 = 5;
/// Full rounds.
pub const POSEIDON_FULL_ROUNDS: usize = 8;
/// Partial rounds for width 3 at 128-bit security.
pub const POSEIDON_PARTIAL_ROUNDS: usize = 57;

/// The SNARK-friendly hash used for secret commitments.
///
/// Implementations must agree bit-for-bit with the hash the delivery
/// circuit enforces, or no proof will ever verify.
pub trait CommitmentHasher: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// `H(input)`.
    fn hash(&self, input: &Fr) -> Fr;
}

/// Poseidon-BN254 with the parameters above.
#[derive(Clone, Debug)]
pub struct PoseidonHasher {
    config: &'static PoseidonConfig<Fr>,
}

impl PoseidonHasher {
    pub fn new() -> Self {
        Self {
            config: poseidon_config(),
        }
    }

    /// The sponge configuration, for building the in-circuit gadget.
    pub fn config(&self) -> &PoseidonConfig<Fr> {
        self.config
    }
}

impl Default for PoseidonHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitmentHasher for PoseidonHasher {
    fn name(&self) -> &'static str {
        "poseidon-bn254-x5-3"
    }

    fn hash(&self, input: &Fr) -> Fr {
        poseidon_hash(self.config, input)
    }
}

/// Process-wide Poseidon configuration, derived once on first use.
pub fn poseidon_config() -> &'static PoseidonConfig<Fr> {
    static CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();
    CONFIG.get_or_init(|| {
        let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
            Fr::MODULUS_BIT_SIZE as u64,
            POSEIDON_RATE,
            POSEIDON_FULL_ROUNDS as u64,
            POSEIDON_PARTIAL_ROUNDS as u64,
            0,
        );
        PoseidonConfig::new(
            POSEIDON_FULL_ROUNDS,
            POSEIDON_PARTIAL_ROUNDS,
            POSEIDON_ALPHA,
            mds,
            ark,
            POSEIDON_RATE,
            POSEIDON_CAPACITY,
        )
    })
}

/// Absorb one element, squeeze one element.
pub fn poseidon_hash(config: &PoseidonConfig<Fr>, input: &Fr) -> Fr {
    let mut sponge = PoseidonSponge::<Fr>::new(config);
    sponge.absorb(input);
    let out: Vec<Fr> = sponge.squeeze_field_elements(1);
    out[0]
}
