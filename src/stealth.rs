//! Stealth-address generation, match verification, and spending-key
//! recovery (§4.3).
//!
//! # Protocol
//!
//! Sender side, given a recipient's meta-address `(K_spend, K_view)`:
//! 1. Sample an ephemeral keypair `(r, R = r·G)`.
//! 2. ECDH: `s = x(r·K_view)`.
//! 3. `stealth_pub = x(K_spend + H(s)·G)`.
//! 4. `stealth_addr = contract_address(stealth_pub, class_hash, salt=stealth_pub)`.
//!
//! Recipient side, given an announcement `(addr, R, t, …)` and the keys
//! `(k_view, K_spend, k_spend)`: recompute `s` from `k_view·R`, reject on
//! view-tag mismatch, reconstruct `stealth_pub`/`stealth_addr` and reject on
//! address mismatch, then derive `p = (k_spend + H(s)) mod N`.
//!
//! The even-y convention (see `curve`) is what lets both sides recover the
//! identical point from an x-only public key; recovering `K_spend` and
//! adding `H(s)·G` may land on a point whose y is odd, but the sum's x is
//! still the correct stealth public key, and `p·G`'s x still matches it,
//! because x is parity-invariant under negation and every private key this
//! crate imports or generates is normalized to even y at the boundary
//! (`KeyPair::from_private`, `StealthKeys::generate`).

use rand::{CryptoRng, RngCore};

use crate::codec;
use crate::curve::{self, Felt};
use crate::error::Result;
use crate::hash;
use crate::types::{Announcement, KeyPair, MetaAddress, StealthKeys, ViewingKeyExport};

impl KeyPair {
    /// Build a keypair from a raw private key, normalizing its parity
    /// (§3) so that `y(private_key * G)` is even.
    pub fn from_private(private_key: Felt) -> Result<Self> {
        let private_key = curve::normalize_parity(private_key)?;
        let public_key = curve::derive_pub(private_key)?;
        Ok(KeyPair { private_key, public_key })
    }

    /// Sample a fresh, normalized keypair from the given RNG.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        Self::from_private(curve::random_scalar(rng)?)
    }
}

impl StealthKeys {
    /// Sample a fresh spending/viewing keypair with independent entropy.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        Ok(StealthKeys {
            spending: KeyPair::generate(rng)?,
            viewing: KeyPair::generate(rng)?,
        })
    }

    /// The public meta-address a recipient publishes once.
    pub fn meta_address(&self, chain_tag: &str) -> MetaAddress {
        MetaAddress {
            chain_tag: chain_tag.to_string(),
            spending_pubkey: self.spending.public_key,
            viewing_pubkey: self.viewing.public_key,
        }
    }

    /// A watch-only capability derived from these keys.
    pub fn export_viewing_key(&self, chain_tag: &str) -> ViewingKeyExport {
        ViewingKeyExport {
            chain_tag: chain_tag.to_string(),
            viewing_private_key: self.viewing.private_key,
            spending_public_key: self.spending.public_key,
        }
    }
}

/// The output of sender-side stealth-address generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StealthAddressResult {
    pub stealth_address: Felt,
    pub stealth_pubkey: Felt,
    pub ephemeral_pubkey: Felt,
    pub view_tag: u8,
}

/// `stealth_pub = x(recover(K_spend) + H(s)·G)`, shared by both the
/// sender's generation path and the recipient's match-verification path.
fn derive_stealth_pubkey(spending_pubkey: Felt, shared_secret: Felt) -> Result<Felt> {
    let spend_point = curve::recover(spending_pubkey)?;
    let offset = hash::poseidon_hash(&[shared_secret]);
    let offset_point = curve::mul_base(offset)?;
    curve::add(spend_point, offset_point).x()
}

/// The prefix Starknet's counterfactual-deployment formula hashes first:
/// the ASCII string `"STARKNET_CONTRACT_ADDRESS"` packed into a felt.
fn contract_address_prefix() -> Felt {
    let bytes = b"STARKNET_CONTRACT_ADDRESS";
    let mut buf = [0u8; 32];
    buf[32 - bytes.len()..].copy_from_slice(bytes);
    Felt::from_bytes_be(&buf)
}

/// Starknet's `compute_hash_on_elements`: fold a Pedersen hash over the
/// elements starting from zero, then hash in the element count.
fn pedersen_hash_chain(elements: &[Felt]) -> Felt {
    let folded = elements
        .iter()
        .fold(Felt::ZERO, |acc, e| hash::pedersen_hash(acc, *e));
    hash::pedersen_hash(folded, Felt::from(elements.len() as u64))
}

/// The deterministic deployment address for a stealth account (§4.3, §6.4):
/// a Pedersen hash chain over the deployment tag, deployer (always zero —
/// counterfactual), salt, class hash, and the Pedersen hash of the single
/// constructor argument `[pubkey]`.
pub fn contract_address(pubkey: Felt, class_hash: Felt, salt: Felt) -> Felt {
    let constructor_calldata_hash = pedersen_hash_chain(&[pubkey]);
    pedersen_hash_chain(&[
        contract_address_prefix(),
        Felt::ZERO,
        salt,
        class_hash,
        constructor_calldata_hash,
    ])
}

/// Sender-side stealth-address generation (§4.3 step 1-6). Samples a fresh
/// ephemeral keypair; callers must never cache or reuse the ephemeral
/// secret across calls (doing so collides the deployment salt and breaks
/// unlinkability).
pub fn generate_stealth_address<R: RngCore + CryptoRng>(
    rng: &mut R,
    meta: &MetaAddress,
    class_hash: Felt,
) -> Result<StealthAddressResult> {
    let r = curve::random_scalar(rng)?;
    let ephemeral_pubkey = curve::derive_pub(r)?;

    let viewing_point = curve::recover(meta.viewing_pubkey)?;
    let shared_secret = curve::mul_point(r, viewing_point)?.x()?;
    let view_tag = hash::view_tag(shared_secret);

    let stealth_pubkey = derive_stealth_pubkey(meta.spending_pubkey, shared_secret)?;
    let stealth_address = contract_address(stealth_pubkey, class_hash, stealth_pubkey);

    Ok(StealthAddressResult {
        stealth_address,
        stealth_pubkey,
        ephemeral_pubkey,
        view_tag,
    })
}

/// Recipient-side match verification (§4.3 steps 1-5). Returns `None` on a
/// view-tag miss (the fast path, ~255/256 of announcements) or on an
/// address-reconstruction mismatch (the defense against view-tag
/// collisions); returns the shared secret and stealth public key on a
/// confirmed match.
pub fn match_announcement(
    announcement: &Announcement,
    viewing_private_key: Felt,
    spending_pubkey: Felt,
    class_hash: Felt,
) -> Result<Option<(Felt, Felt)>> {
    let ephemeral_point = curve::recover(announcement.ephemeral_pubkey)?;
    let shared_secret = curve::mul_point(viewing_private_key, ephemeral_point)?.x()?;

    if hash::view_tag(shared_secret) != announcement.view_tag {
        return Ok(None);
    }

    let stealth_pubkey = derive_stealth_pubkey(spending_pubkey, shared_secret)?;
    let reconstructed = contract_address(stealth_pubkey, class_hash, stealth_pubkey);

    let reconstructed_canon = codec::canonicalize(&codec::felt_to_hex(&reconstructed))?;
    let announced_canon = codec::canonicalize(&codec::felt_to_hex(&announcement.stealth_address))?;
    if reconstructed_canon != announced_canon {
        return Ok(None);
    }

    Ok(Some((shared_secret, stealth_pubkey)))
}

/// Derive the stealth spending private key once a match is confirmed:
/// `p = (k_spend + H(s)) mod N`.
pub fn derive_spending_key(spending_private_key: Felt, shared_secret: Felt) -> Result<Felt> {
    let offset = hash::poseidon_hash(&[shared_secret]);
    curve::add_scalars_mod_n(spending_private_key, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    fn class_hash() -> Felt {
        Felt::from(0x1234u64)
    }

    #[test]
    fn stealth_round_trip() {
        let mut r = rng();
        let keys = StealthKeys::generate(&mut r).unwrap();
        let meta = keys.meta_address("starknet");

        let sent = generate_stealth_address(&mut r, &meta, class_hash()).unwrap();

        let announcement = Announcement {
            stealth_address: sent.stealth_address,
            ephemeral_pubkey: sent.ephemeral_pubkey,
            view_tag: sent.view_tag,
            metadata: vec![],
            block_number: None,
            tx_hash: None,
        };

        let (shared_secret, stealth_pubkey) = match_announcement(
            &announcement,
            keys.viewing.private_key,
            keys.spending.public_key,
            class_hash(),
        )
        .unwrap()
        .expect("recipient must recognize their own payment");

        assert_eq!(stealth_pubkey, sent.stealth_pubkey);

        let p = derive_spending_key(keys.spending.private_key, shared_secret).unwrap();
        assert_eq!(curve::derive_pub(p).unwrap(), stealth_pubkey);
    }

    #[test]
    fn wrong_recipient_does_not_match() {
        let mut r = rng();
        let keys_a = StealthKeys::generate(&mut r).unwrap();
        let keys_b = StealthKeys::generate(&mut r).unwrap();
        let meta_b = keys_b.meta_address("starknet");

        let sent = generate_stealth_address(&mut r, &meta_b, class_hash()).unwrap();
        let announcement = Announcement {
            stealth_address: sent.stealth_address,
            ephemeral_pubkey: sent.ephemeral_pubkey,
            view_tag: sent.view_tag,
            metadata: vec![],
            block_number: None,
            tx_hash: None,
        };

        let result = match_announcement(
            &announcement,
            keys_a.viewing.private_key,
            keys_a.spending.public_key,
            class_hash(),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn successive_generations_are_unlinkable() {
        let mut r = rng();
        let keys = StealthKeys::generate(&mut r).unwrap();
        let meta = keys.meta_address("starknet");

        let first = generate_stealth_address(&mut r, &meta, class_hash()).unwrap();
        let second = generate_stealth_address(&mut r, &meta, class_hash()).unwrap();

        assert_ne!(first.stealth_address, second.stealth_address);
        assert_ne!(first.ephemeral_pubkey, second.ephemeral_pubkey);
    }

    #[test]
    fn contract_address_is_deterministic() {
        let pubkey = Felt::from(123u64);
        let class_hash = Felt::from(456u64);
        let a = contract_address(pubkey, class_hash, pubkey);
        let b = contract_address(pubkey, class_hash, pubkey);
        assert_eq!(a, b);
    }
}
