//! Random identifiers
//!
//! Short alphanumeric identifiers used as session ids, page ids and upload
//! filename prefixes. Characters are drawn by rejection sampling over single
//! random bytes so every position is uniform over the 62-symbol alphabet.

use std::io;

use rand::rngs::OsRng;
use rand::RngCore;

/// Identifier alphabet: digits, upper case, lower case
pub const ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of session ids, page ids and upload prefixes
pub const ID_LEN: usize = 15;

/// Length of ids handed out by the debug endpoint
pub const DEBUG_ID_LEN: usize = 12;

/// Bytes at or above this value are rejected (largest multiple of 62 <= 256)
const REJECT_THRESHOLD: u16 = 256 - (256 % ALPHABET.len() as u16);

/// Generate an identifier of `len` characters from the given random source.
///
/// A zero length yields an empty string. Any failure of the source is
/// returned as an I/O error; it is never retried.
pub fn generate<R: RngCore + ?Sized>(rng: &mut R, len: usize) -> io::Result<String> {
    let mut out = String::with_capacity(len);
    let mut byte = [0u8; 1];

    while out.len() < len {
        rng.try_fill_bytes(&mut byte).map_err(io::Error::other)?;

        if u16::from(byte[0]) >= REJECT_THRESHOLD {
            continue;
        }
        out.push(ALPHABET[byte[0] as usize % ALPHABET.len()] as char);
    }

    Ok(out)
}

/// Generate an identifier from the operating system CSPRNG
pub fn generate_id(len: usize) -> io::Result<String> {
    generate(&mut OsRng, len)
}

/// Check that `value` looks like an identifier we issued
pub fn is_valid_id(value: &str) -> bool {
    value.len() == ID_LEN && value.bytes().all(|b| ALPHABET.contains(&b))
}


#[cfg(test)]
mod tests {
    use super::test_rng::ScriptedRng;
    use super::*;

    #[test]
    fn test_length_and_alphabet() {
        for len in [1, 2, 15, 64] {
            let id = generate_id(len).unwrap();
            assert_eq!(id.len(), len);
            assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_zero_length_is_empty() {
        assert_eq!(generate_id(0).unwrap(), "");
    }

    #[test]
    fn test_threshold_bytes_are_rejected() {
        // 248..=255 are discarded; 0, 61 and 247 map to '0', 'z' and 247 % 62 = 61
        let mut rng = ScriptedRng::new([248, 255, 0, 250, 61, 247]);
        assert_eq!(generate(&mut rng, 3).unwrap(), "0zz");
    }

    #[test]
    fn test_modulo_wraps_alphabet() {
        let mut rng = ScriptedRng::new([62, 124, 186]);
        assert_eq!(generate(&mut rng, 3).unwrap(), "000");
    }

    #[test]
    fn test_source_failure_is_io_error() {
        let mut rng = ScriptedRng::new([1, 2]);
        let err = generate(&mut rng, 5).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn test_scripted_ids_round_trip() {
        let mut rng = ScriptedRng::for_ids(["abcXYZ0123456789"]);
        assert_eq!(generate(&mut rng, 16).unwrap(), "abcXYZ0123456789");
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("A1b2C3d4E5f6G7h"));
        assert!(!is_valid_id("short"));
        assert!(!is_valid_id("../../etc/passw"));
        assert!(!is_valid_id("A1b2C3d4E5f6G7h8"));
    }

    #[test]
    fn test_distribution_has_no_bias() {
        // 62 * 2000 draws; each symbol expected 2000 times
        let draws = ALPHABET.len() * 2000;
        let id = generate_id(draws).unwrap();

        let mut counts = [0usize; 62];
        for b in id.bytes() {
            let pos = ALPHABET.iter().position(|a| *a == b).unwrap();
            counts[pos] += 1;
        }

        let expected = 2000.0f64;
        let chi_square: f64 = counts
            .iter()
            .map(|&c| {
                let diff = c as f64 - expected;
                diff * diff / expected
            })
            .sum();

        // 61 degrees of freedom; p < 1e-6 lies far above 140
        assert!(chi_square < 140.0, "chi-square {chi_square} suggests bias");
    }
}
