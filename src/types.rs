//! Data model for the amora stealth-address SDK.
//!
//! These types mirror §3 of the protocol: long-lived key material
//! (`StealthKeys`, `MetaAddress`), the wire record a sender publishes
//! (`Announcement`), and the results a scan produces (`StealthPayment`,
//! watch-only variant).

use crate::curve::Felt;

/// A private/public keypair on the STARK curve.
///
/// Invariant: `public == x(private * G)`, and `y(private * G)` is even
/// (§3's parity-normalization invariant). Both fields are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyPair {
    pub private_key: Felt,
    pub public_key: Felt,
}

/// A recipient's long-lived stealth key material: a spending keypair and
/// an independent viewing keypair. Created once, persisted, registered
/// on-chain once, used to scan forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StealthKeys {
    pub spending: KeyPair,
    pub viewing: KeyPair,
}

/// The public half of `StealthKeys`, published once and never rotated.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetaAddress {
    pub chain_tag: String,
    pub spending_pubkey: Felt,
    pub viewing_pubkey: Felt,
}

/// A watch-only capability: the viewing private key plus the spending
/// public key, sufficient to detect (but not spend) incoming payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewingKeyExport {
    pub chain_tag: String,
    pub viewing_private_key: Felt,
    pub spending_public_key: Felt,
}

/// A stealth-payment announcement as emitted by the registry contract
/// (§6.2). `metadata` is treated as an opaque felt sequence by the core;
/// by convention it encodes `[token_address, amount_low, amount_high,
/// ...optional_memo_felts]`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Announcement {
    pub stealth_address: Felt,
    pub ephemeral_pubkey: Felt,
    pub view_tag: u8,
    pub metadata: Vec<Felt>,
    pub block_number: Option<u64>,
    pub tx_hash: Option<Felt>,
}

/// The output of a successful full scan: everything needed to spend.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StealthPayment {
    pub announcement: Announcement,
    pub shared_secret: Felt,
    pub stealth_pubkey: Felt,
    pub stealth_private_key: Felt,
}

/// The output of a watch-only scan: detection without the ability to spend.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WatchOnlyMatch {
    pub announcement: Announcement,
    pub shared_secret: Felt,
    pub stealth_pubkey: Felt,
}

/// A neutral on-chain call record: the typed-request-builder shape every
/// on-chain operation (`register_keys`, `announce`, `transfer`, …) produces
/// instead of a dynamic "call a method by name" object.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Call {
    pub target: Felt,
    pub selector: String,
    pub calldata: Vec<Felt>,
}

/// A raw announcement event as returned by `ChainClient::get_events`,
/// before `Client::fetch_announcements` has parsed its data fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub keys: Vec<Felt>,
    pub data: Vec<Felt>,
    pub block_number: Option<u64>,
    pub tx_hash: Option<Felt>,
}

/// Reasons the scanner or the client skip a single announcement instead of
/// failing the whole batch (§4.8, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanSkipReason {
    /// The event had fewer than 4 data fields.
    TooFewFields,
    /// `metadata_len` exceeded the remaining data fields.
    MetadataLenOverflow,
}
