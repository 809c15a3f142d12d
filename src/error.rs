//! Error types for the amora stealth-address SDK.

use thiserror::Error;

/// Result type for amora operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for amora operations.
#[derive(Error, Debug)]
pub enum Error {
    /// String/URI/event parse failure: wrong prefix, wrong field count,
    /// invalid hex, or malformed memo encoding.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// A felt is `>= 2^252`, or a scalar is not in `[1, N-1]`.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// An x-coordinate is not a quadratic residue for `y^2 = x^3 + a*x + b`.
    #[error("point is not on the curve")]
    NotOnCurve,

    /// A point is the identity element where a non-identity point was required.
    #[error("point is the identity element")]
    ZeroPoint,

    /// Opaque pass-through from the injected chain client.
    #[error("chain error: {0}")]
    ChainError(String),

    /// The requested operation has no implementation in this build.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}
