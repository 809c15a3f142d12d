//! # amora
//!
//! A client-side SDK for a non-interactive stealth-address payment
//! protocol over the STARK elliptic-curve group, using a Poseidon sponge
//! hash for shared-secret derivation and view tags.
//!
//! The core (`curve`, `hash`, `stealth`, `scanner`, `codec`) is pure and
//! synchronous: no I/O, no background tasks, no global state. `client`
//! binds that core to an injected chain transport.
//!
//! ## Quick start
//!
//! ```rust
//! use amora::{codec, stealth, types::StealthKeys};
//! use rand::rngs::OsRng;
//!
//! let mut rng = OsRng;
//! let recipient = StealthKeys::generate(&mut rng).unwrap();
//! let meta = recipient.meta_address("starknet");
//!
//! // Sender, given only the recipient's published meta-address:
//! let class_hash = amora::curve::Felt::from(0x1234u64);
//! let sent = stealth::generate_stealth_address(&mut rng, &meta, class_hash).unwrap();
//!
//! let encoded = codec::encode_meta_address(&meta);
//! assert_eq!(codec::parse_meta_address(&encoded).unwrap(), meta);
//! ```

pub mod client;
pub mod codec;
pub mod curve;
pub mod error;
pub mod hash;
pub mod scanner;
pub mod stealth;
pub mod types;

pub use client::{ChainClient, Client, ClientConfig, WithdrawAmount};
pub use codec::SCHEME_ID_STARK;
pub use error::{Error, Result};
pub use scanner::{scan_announcements, scan_with_viewing_key};
pub use stealth::{generate_stealth_address, match_announcement, StealthAddressResult};
pub use types::{
    Announcement, Call, KeyPair, MetaAddress, RawEvent, ScanSkipReason, StealthKeys, StealthPayment,
    ViewingKeyExport, WatchOnlyMatch,
};

/// SDK version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
