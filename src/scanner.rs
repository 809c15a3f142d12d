//! Announcement scanning (§4.4): full scans that recover a spending key,
//! and watch-only scans that detect a payment without the ability to spend
//! it. Both are pure functions over a finite sequence — not streaming, not
//! long-lived — and both preserve input order in their output.

use tracing::debug;

use crate::curve::Felt;
use crate::error::Result;
use crate::stealth;
use crate::types::{Announcement, StealthPayment, WatchOnlyMatch};

/// Full scan (§4.4): returns a `StealthPayment` — including the recovered
/// spending private key — for every announcement whose view tag and
/// reconstructed address both match.
pub fn scan_announcements(
    announcements: &[Announcement],
    viewing_private_key: Felt,
    spending_pubkey: Felt,
    spending_private_key: Felt,
    class_hash: Felt,
) -> Result<Vec<StealthPayment>> {
    let mut payments = Vec::new();
    for announcement in announcements {
        let matched =
            stealth::match_announcement(announcement, viewing_private_key, spending_pubkey, class_hash)?;
        let Some((shared_secret, stealth_pubkey)) = matched else {
            continue;
        };
        let stealth_private_key = stealth::derive_spending_key(spending_private_key, shared_secret)?;
        payments.push(StealthPayment {
            announcement: announcement.clone(),
            shared_secret,
            stealth_pubkey,
            stealth_private_key,
        });
    }
    debug!(
        scanned = announcements.len(),
        matched = payments.len(),
        "full scan complete"
    );
    Ok(payments)
}

/// Watch-only scan (§4.4): identical pipeline, but omits spending-key
/// recovery since only the viewing key is available.
pub fn scan_with_viewing_key(
    announcements: &[Announcement],
    viewing_private_key: Felt,
    spending_pubkey: Felt,
    class_hash: Felt,
) -> Result<Vec<WatchOnlyMatch>> {
    let mut matches = Vec::new();
    for announcement in announcements {
        let matched =
            stealth::match_announcement(announcement, viewing_private_key, spending_pubkey, class_hash)?;
        let Some((shared_secret, stealth_pubkey)) = matched else {
            continue;
        };
        matches.push(WatchOnlyMatch {
            announcement: announcement.clone(),
            shared_secret,
            stealth_pubkey,
        });
    }
    debug!(
        scanned = announcements.len(),
        matched = matches.len(),
        "watch-only scan complete"
    );
    Ok(matches)
}
