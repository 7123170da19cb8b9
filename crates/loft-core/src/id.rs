//! Short identifiers for sessions and stored assets

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Generate a short, URL-safe random identifier.
///
/// A v4 UUID re-encoded in base62 (~22 chars), used for render session ids
/// and stored-asset filenames where the dashed UUID form is too noisy.
pub fn short_id() -> String {
    encode_base62(uuid::Uuid::new_v4().as_u128())
}

/// Generate a prefixed identifier, e.g. `project_4fZ…`
pub fn prefixed_id(prefix: &str) -> String {
    format!("{}_{}", prefix, short_id())
}

fn encode_base62(mut n: u128) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(ALPHABET[(n % 62) as usize]);
        n /= 62;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
