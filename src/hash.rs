//! Poseidon sponge hash over the STARK field.
//!
//! A single implementation backs both the single-input and multi-input
//! forms the protocol needs: the view tag hashes one felt (the shared
//! secret), while address recomputation and future extensions may hash
//! several.

use crate::curve::Felt;

/// Hash a sequence of felts to a single felt using the chain's standard
/// Poseidon permutation.
///
/// Deterministic and collision-resistant under standard assumptions;
/// callers never need to pad or length-prefix the input themselves.
pub fn poseidon_hash(inputs: &[Felt]) -> Felt {
    match inputs {
        [] => starknet_crypto::poseidon_hash_many(&[]),
        [single] => starknet_crypto::poseidon_hash_single(*single),
        many => starknet_crypto::poseidon_hash_many(many),
    }
}

/// The low byte of `poseidon_hash([shared_secret])`, used as a 1-in-256
/// fast filter during announcement scanning.
pub fn view_tag(shared_secret: Felt) -> u8 {
    let digest = poseidon_hash(&[shared_secret]);
    let bytes = digest.to_bytes_be();
    bytes[31]
}

/// Pedersen hash of two felts, used by the counterfactual contract-address
/// formula (§4.3, §6.4) rather than by the stealth protocol itself.
pub fn pedersen_hash(a: Felt, b: Felt) -> Felt {
    starknet_crypto::pedersen_hash(&a, &b)
}
