//! Textual wire encodings the protocol depends on for interoperability:
//! the meta-address string, the viewing-key export string, the payment-link
//! URI, the UTF-8 memo codec, and address canonicalization (§4.5, §6.3).

use crate::curve::Felt;
use crate::error::{Error, Result};
use crate::types::{MetaAddress, ViewingKeyExport};

/// Chain tags the meta-address parser accepts. A deliberately short,
/// explicit allowlist rather than accepting any string — the wire format
/// is meant for one chain family at a time.
pub const KNOWN_CHAIN_TAGS: &[&str] = &["starknet"];

/// The ASCII bytes `"STARK"` packed big-endian into a `u64`, used as a
/// conformance pin for this scheme's identifier (distinct from the
/// `chain_tag` string carried in the wire encodings above).
pub const SCHEME_ID_STARK: u64 = 0x535441524B;

/// Felt values on this wire format must be strictly less than `2^252`.
fn fits_wire_range(buf: &[u8; 32]) -> bool {
    buf[0] <= 0x0f
}

/// Render a felt as minimal-width, `0x`-prefixed lowercase hex (no padding).
pub fn felt_to_hex(f: &Felt) -> String {
    let encoded = hex::encode(f.to_bytes_be());
    let trimmed = encoded.trim_start_matches('0');
    if trimmed.is_empty() {
        "0x0".to_string()
    } else {
        format!("0x{trimmed}")
    }
}

/// Parse a `0x`-prefixed hex felt, accepted with or without leading zeros,
/// rejecting values `>= 2^252` (§6.3).
pub fn parse_hex_felt(s: &str) -> Result<Felt> {
    let body = s
        .strip_prefix("0x")
        .ok_or_else(|| Error::InvalidFormat(format!("expected 0x-prefixed hex, got {s}")))?;
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidFormat(format!("invalid hex digits: {s}")));
    }
    let padded = if body.len() % 2 == 1 {
        format!("0{body}")
    } else {
        body.to_string()
    };
    let bytes = hex::decode(&padded).map_err(|e| Error::InvalidFormat(e.to_string()))?;
    if bytes.len() > 32 {
        return Err(Error::OutOfRange(format!("felt exceeds 256 bits: {s}")));
    }
    let mut buf = [0u8; 32];
    buf[32 - bytes.len()..].copy_from_slice(&bytes);
    if !fits_wire_range(&buf) {
        return Err(Error::OutOfRange(format!(
            "felt must be strictly less than 2^252: {s}"
        )));
    }
    Ok(Felt::from_bytes_be(&buf))
}

/// Encode a meta-address: `st:<chain>:<hex_spending>:<hex_viewing>`.
pub fn encode_meta_address(meta: &MetaAddress) -> String {
    format!(
        "st:{}:{}:{}",
        meta.chain_tag,
        felt_to_hex(&meta.spending_pubkey),
        felt_to_hex(&meta.viewing_pubkey)
    )
}

/// Parse a meta-address string. Requires exactly 4 colon-separated parts,
/// the `st` prefix, a known chain tag, and two in-range hex felts.
pub fn parse_meta_address(s: &str) -> Result<MetaAddress> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 4 || parts[0] != "st" {
        return Err(Error::InvalidFormat(format!(
            "expected st:<chain>:<hex>:<hex>, got {s}"
        )));
    }
    if !KNOWN_CHAIN_TAGS.contains(&parts[1]) {
        return Err(Error::InvalidFormat(format!("unknown chain tag: {}", parts[1])));
    }
    Ok(MetaAddress {
        chain_tag: parts[1].to_string(),
        spending_pubkey: parse_hex_felt(parts[2])?,
        viewing_pubkey: parse_hex_felt(parts[3])?,
    })
}

/// Encode a viewing-key export: `vk:<chain>:<hex_priv>:<hex_pub>`.
pub fn encode_viewing_key(vk: &ViewingKeyExport) -> String {
    format!(
        "vk:{}:{}:{}",
        vk.chain_tag,
        felt_to_hex(&vk.viewing_private_key),
        felt_to_hex(&vk.spending_public_key)
    )
}

/// Parse a viewing-key export string. Both hex values must be non-zero.
pub fn parse_viewing_key(s: &str) -> Result<ViewingKeyExport> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 4 || parts[0] != "vk" {
        return Err(Error::InvalidFormat(format!(
            "expected vk:<chain>:<hex>:<hex>, got {s}"
        )));
    }
    let viewing_private_key = parse_hex_felt(parts[2])?;
    let spending_public_key = parse_hex_felt(parts[3])?;
    if viewing_private_key == Felt::ZERO || spending_public_key == Felt::ZERO {
        return Err(Error::InvalidFormat(
            "viewing-key hex values must be non-zero".to_string(),
        ));
    }
    Ok(ViewingKeyExport {
        chain_tag: parts[1].to_string(),
        viewing_private_key,
        spending_public_key,
    })
}

/// A parsed (or to-be-encoded) `amora://pay` payment link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLink {
    pub meta: String,
    pub token: Option<Felt>,
    pub amount: Option<String>,
    pub memo: Option<String>,
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.as_bytes() {
        let c = *b as char;
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~') {
            out.push(c);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn percent_decode(s: &str) -> Result<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .ok_or_else(|| Error::InvalidFormat("truncated percent-encoding".to_string()))?;
                let hex = std::str::from_utf8(hex).map_err(|e| Error::InvalidFormat(e.to_string()))?;
                let byte = u8::from_str_radix(hex, 16)
                    .map_err(|_| Error::InvalidFormat(format!("invalid percent-encoding: %{hex}")))?;
                out.push(byte);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|e| Error::InvalidFormat(e.to_string()))
}

/// Encode a payment link: `amora://pay?meta=...[&token=...][&amount=...][&memo=...]`.
pub fn encode_payment_link(link: &PaymentLink) -> String {
    let mut uri = format!("amora://pay?meta={}", percent_encode(&link.meta));
    if let Some(token) = &link.token {
        uri.push_str(&format!("&token={}", felt_to_hex(token)));
    }
    if let Some(amount) = &link.amount {
        uri.push_str(&format!("&amount={amount}"));
    }
    if let Some(memo) = &link.memo {
        uri.push_str(&format!("&memo={}", percent_encode(memo)));
    }
    uri
}

/// Parse a payment link. Validates the scheme/host and requires `meta=`;
/// `token`, `amount`, and `memo` are optional. Unknown query fields are
/// ignored for forward compatibility.
pub fn parse_payment_link(uri: &str) -> Result<PaymentLink> {
    let rest = uri
        .strip_prefix("amora://pay?")
        .ok_or_else(|| Error::InvalidFormat(format!("expected amora://pay? URI, got {uri}")))?;

    let mut meta = None;
    let mut token = None;
    let mut amount = None;
    let mut memo = None;

    for pair in rest.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::InvalidFormat(format!("malformed query pair: {pair}")))?;
        match key {
            "meta" => meta = Some(percent_decode(value)?),
            "token" => token = Some(parse_hex_felt(&percent_decode(value)?)?),
            "amount" => amount = Some(percent_decode(value)?),
            "memo" => memo = Some(percent_decode(value)?),
            _ => {}
        }
    }

    let meta = meta.ok_or_else(|| Error::InvalidFormat("payment link missing meta=".to_string()))?;
    Ok(PaymentLink { meta, token, amount, memo })
}

/// Bytes packed per memo felt: a felt has 252 usable bits, so 31 bytes
/// (248 bits) is the largest chunk that always fits with room to spare.
const MEMO_CHUNK_BYTES: usize = 31;

/// Encode a UTF-8 string as `[byte_len, chunk_0, chunk_1, ...]`. Each chunk
/// packs up to 31 bytes big-endian into the low 31 bytes of a felt; the
/// last chunk is right-padded with zero bytes when the string's length
/// isn't a multiple of 31. The empty string encodes as a single `0` felt.
pub fn encode_memo(s: &str) -> Vec<Felt> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(1 + bytes.len() / MEMO_CHUNK_BYTES + 1);
    out.push(Felt::from(bytes.len() as u64));
    for chunk in bytes.chunks(MEMO_CHUNK_BYTES) {
        let mut buf = [0u8; 32];
        buf[1..1 + chunk.len()].copy_from_slice(chunk);
        out.push(Felt::from_bytes_be(&buf));
    }
    out
}

/// Decode a memo felt sequence back into the original UTF-8 string. The
/// length prefix drives the total byte count pulled out of the chunks.
pub fn decode_memo(felts: &[Felt]) -> Result<String> {
    let (len_felt, chunks) = felts
        .split_first()
        .ok_or_else(|| Error::InvalidFormat("empty memo".to_string()))?;

    let len_bytes = len_felt.to_bytes_be();
    if len_bytes[..24].iter().any(|&b| b != 0) {
        return Err(Error::InvalidFormat("memo length out of range".to_string()));
    }
    let len = u64::from_be_bytes(len_bytes[24..32].try_into().unwrap()) as usize;

    let mut bytes = Vec::with_capacity(chunks.len() * MEMO_CHUNK_BYTES);
    for chunk in chunks {
        bytes.extend_from_slice(&chunk.to_bytes_be()[1..32]);
    }
    if bytes.len() < len {
        return Err(Error::InvalidFormat(
            "memo data shorter than declared length".to_string(),
        ));
    }
    bytes.truncate(len);
    String::from_utf8(bytes).map_err(|e| Error::InvalidFormat(e.to_string()))
}

/// Lower-case, strip `0x` and all leading zero nibbles, re-prepend `0x`.
/// Used only for address equality comparisons.
pub fn canonicalize(hex_str: &str) -> Result<String> {
    let body = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidFormat(format!("not hex: {hex_str}")));
    }
    let lower = body.to_ascii_lowercase();
    let trimmed = lower.trim_start_matches('0');
    Ok(format!("0x{}", if trimmed.is_empty() { "0" } else { trimmed }))
}
