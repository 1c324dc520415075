//! Embeds a payload into a canary DNS hostname.
//!
//! The layout follows the canarytokens.org DNS token convention: the payload
//! is base32 encoded without padding, split into 63 character labels, and
//! followed by a magic `.G<d><d>` label in front of the token hostname.

use base32::Alphabet;
use rand::Rng;

/// Longest hostname a resolver will accept.
pub const MAX_HOSTNAME_LEN: usize = 253;
/// Longest single DNS label.
pub const LABEL_LEN: usize = 63;
/// `.G` followed by two digits.
pub const MAGIC_SEGMENT_LEN: usize = 4;

const PAYLOAD_ALPHABET: Alphabet = Alphabet::RFC4648 { padding: false };
const SEPARATOR: char = '.';

/// Returns `hostname` with `payload` encoded in front of it.
///
/// An empty payload leaves the hostname untouched. When the encoded payload
/// does not fit in [`MAX_HOSTNAME_LEN`] it is cut to the remaining budget by
/// character count; the magic segment and the hostname are never shortened.
pub fn hostname_with_payload<R: Rng + ?Sized>(
    hostname: &str,
    payload: &str,
    rng: &mut R,
) -> String {
    if payload.is_empty() {
        return hostname.to_string();
    }
    let mut encoded = chunk_labels(&base32::encode(PAYLOAD_ALPHABET, payload.as_bytes()));

    let host_with_magic = format!("{}{}{}", magic_segment(rng), SEPARATOR, hostname);
    let budget = MAX_HOSTNAME_LEN.saturating_sub(host_with_magic.len());
    // base32 output and separators are ASCII, any index is a char boundary
    encoded.truncate(budget);
    encoded + &host_with_magic
}

/// `.G` and two independently drawn decimal digits.
pub fn magic_segment<R: Rng + ?Sized>(rng: &mut R) -> String {
    let first: u8 = rng.gen_range(0..10);
    let second: u8 = rng.gen_range(0..10);
    format!(".G{}{}", first, second)
}

fn chunk_labels(encoded: &str) -> String {
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LABEL_LEN);
    for (i, c) in encoded.chars().enumerate() {
        out.push(c);
        if i != 0 && i != 1 && (i + 1) % LABEL_LEN == 0 {
            out.push(SEPARATOR);
        }
    }
    out
}
