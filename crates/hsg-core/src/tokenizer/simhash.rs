//! 64-bit SimHash over canonical tokens.
//! The per-token hash is FNV-1a, reused here from a single hash into
//! SimHash's 64-wide bit-vote scheme rather than a feature vector.

/// Near-duplicate rule: Hamming distance ≤ this is a duplicate.
pub const DEDUP_HAMMING_THRESHOLD: u32 = 3;

fn fnv1a(token: &str) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for byte in token.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Compute the 64-bit SimHash over a token multiset, returned as a
/// 16-character lowercase hex string.
pub fn simhash_hex(tokens: &[String]) -> String {
    format!("{:016x}", simhash_u64(tokens))
}

/// Compute the 64-bit SimHash over a token multiset.
pub fn simhash_u64(tokens: &[String]) -> u64 {
    let mut votes = [0i64; 64];
    for token in tokens {
        let h = fnv1a(token);
        for (bit, vote) in votes.iter_mut().enumerate() {
            if (h >> bit) & 1 == 1 {
                *vote += 1;
            } else {
                *vote -= 1;
            }
        }
    }
    let mut out: u64 = 0;
    for (bit, vote) in votes.iter().enumerate() {
        if *vote > 0 {
            out |= 1 << bit;
        }
    }
    out
}

/// Hamming distance between two 64-bit simhashes.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Parse a 16-char hex simhash back into a `u64`.
pub fn parse_hex(hex: &str) -> Option<u64> {
    u64::from_str_radix(hex, 16).ok()
}

/// True iff the two simhashes are within the near-duplicate threshold.
pub fn is_near_duplicate(a: u64, b: u64) -> bool {
    hamming_distance(a, b) <= DEDUP_HAMMING_THRESHOLD
}
