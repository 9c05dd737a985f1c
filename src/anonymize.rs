//! Deterministic anonymization of personally-identifiable fields.
//!
//! Every identifiable string is replaced by an 8-character pseudonym over
//! `[a-zA-Z0-9]`. The transform is a pure function with no seed and no
//! secret key, so independent writers (a reindex racing the listener, a
//! retried flush, another process) converge on identical target records.
//! It is one-way by construction: each output symbol is a 32-bit hash
//! reduced to one of 62 symbols, which discards most of the input.
//!
//! Collisions are tolerated; this is pseudonymization, not cryptography.

use serde_json::{Map, Value};

use crate::types::{fields, Document};

/// Output alphabet: lowercase, uppercase, digits.
const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Fixed pseudonym length.
const HASH_LENGTH: usize = 8;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a folded over Unicode code points.
///
/// Code points, not UTF-16 units: a character outside the BMP is consumed
/// as a single value.
fn fnv1a(s: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for cp in s.chars() {
        hash ^= cp as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Produce the 8-character pseudonym for an arbitrary input string.
///
/// The empty string maps to the first eight alphabet symbols. Inputs
/// shorter than eight code points are mirror-padded from the front of the
/// string (wrapping for very short inputs), never by repeating the last
/// character. Longer inputs are compressed into exactly eight buckets by
/// position modulo eight, so every code point contributes to the output.
pub fn pseudonym(input: &str) -> String {
    let mut chars: Vec<char> = input.chars().collect();
    if chars.is_empty() {
        return ALPHABET[..HASH_LENGTH].iter().map(|&b| b as char).collect();
    }

    let len = chars.len();
    for i in len..HASH_LENGTH {
        let idx = (HASH_LENGTH - i - 1) % len;
        chars.push(chars[idx]);
    }

    let mut buckets = vec![String::new(); HASH_LENGTH];
    for (i, c) in chars.iter().enumerate() {
        buckets[i % HASH_LENGTH].push(*c);
    }

    buckets
        .iter()
        .map(|bucket| ALPHABET[(fnv1a(bucket) % ALPHABET.len() as u32) as usize] as char)
        .collect()
}

/// Anonymize an email address, keeping the domain intact.
///
/// Only the local part identifies a person; the domain keeps the value
/// realistic-shaped for downstream consumers. A value without an `@` is
/// pseudonymized whole.
pub fn pseudonym_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => format!("{}@{}", pseudonym(local), domain),
        None => pseudonym(email),
    }
}

/// Apply the anonymization transform to every identifiable field present
/// in a pending field set.
///
/// Handles both full documents (nested `address` object) and partial
/// update deltas (dotted paths such as `address.line1`). Fields that are
/// absent stay absent, so a delta flush leaves the target's other fields
/// untouched. Unknown fields and non-string values pass through unchanged.
pub fn anonymize_fields(pending: &Document) -> Document {
    let mut out = Map::new();
    for (key, value) in pending {
        out.insert(key.clone(), anonymize_value(key, value));
    }
    out
}

fn anonymize_value(key: &str, value: &Value) -> Value {
    match (key, value) {
        (fields::FIRST_NAME | fields::LAST_NAME, Value::String(s)) => {
            Value::String(pseudonym(s))
        }
        (fields::EMAIL, Value::String(s)) => Value::String(pseudonym_email(s)),
        (fields::ADDRESS, Value::Object(address)) => anonymize_address(address),
        // Dotted paths from partial update deltas.
        ("address.line1" | "address.line2" | "address.postcode", Value::String(s)) => {
            Value::String(pseudonym(s))
        }
        _ => value.clone(),
    }
}

fn anonymize_address(address: &Map<String, Value>) -> Value {
    let mut out = address.clone();
    for key in [fields::LINE1, fields::LINE2, fields::POSTCODE] {
        if let Some(Value::String(s)) = address.get(key) {
            out.insert(key.to_string(), Value::String(pseudonym(s)));
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_alphabet(s: &str) -> bool {
        s.bytes().all(|b| ALPHABET.contains(&b))
    }

    #[test]
    fn test_pseudonym_is_deterministic() {
        for input in ["Ann", "ann@x.com", "1 High Street", "日本語のテキスト", "x"] {
            assert_eq!(pseudonym(input), pseudonym(input));
        }
    }

    #[test]
    fn test_pseudonym_length_and_alphabet() {
        let inputs = [
            "",
            "a",
            "abc",
            "abcdefgh",
            "a much longer input string than eight characters",
            "émile-çédille",
            "𝔘𝔫𝔦𝔠𝔬𝔡𝔢",
        ];
        for input in inputs {
            let out = pseudonym(input);
            assert_eq!(out.len(), HASH_LENGTH, "input {:?}", input);
            assert!(in_alphabet(&out), "input {:?} -> {:?}", input, out);
        }
    }

    #[test]
    fn test_empty_string_maps_to_fixed_constant() {
        assert_eq!(pseudonym(""), "abcdefgh");
    }

    #[test]
    fn test_short_inputs_are_mirror_padded() {
        // Padding appends characters mirrored from the front of the input,
        // so a short input hashes identically to its padded form.
        assert_eq!(pseudonym("abcd"), pseudonym("abcddcba"));
        assert_eq!(pseudonym("abcde"), pseudonym("abcdecba"));
        assert_eq!(pseudonym("abcdefg"), pseudonym("abcdefga"));
        // Not plain repetition of the final character.
        assert_ne!(pseudonym("abcd"), pseudonym("abcddddd"));
    }

    #[test]
    fn test_distinct_inputs_rarely_collide() {
        let mut outputs = std::collections::HashSet::new();
        for i in 0..100 {
            outputs.insert(pseudonym(&format!("customer-record-number-{:04}", i * 7)));
        }
        // Full-length distinct inputs differ in every bucket; a collision
        // would need all eight positions to coincide.
        assert_eq!(outputs.len(), 100);
    }

    #[test]
    fn test_every_position_of_long_input_contributes() {
        let base = "abcdefghijklmnop"; // 16 chars, two per bucket
        let reference = pseudonym(base);
        let mut changed = 0;
        for i in 0..base.len() {
            let mut mutated: Vec<char> = base.chars().collect();
            mutated[i] = 'Z';
            let mutated: String = mutated.into_iter().collect();
            if pseudonym(&mutated) != reference {
                changed += 1;
            }
        }
        // Each single-character change touches one bucket; a per-position
        // collision happens with probability 1/62, so requiring 12 of 16
        // leaves no realistic flake.
        assert!(changed >= 12, "only {} of 16 mutations changed the output", changed);
    }

    #[test]
    fn test_email_keeps_domain() {
        let out = pseudonym_email("ann@x.com");
        assert!(out.ends_with("@x.com"));
        assert_eq!(out, format!("{}@x.com", pseudonym("ann")));
        // No '@' at all: pseudonymize the whole value.
        assert_eq!(pseudonym_email("not-an-email"), pseudonym("not-an-email"));
    }

    #[test]
    fn test_anonymize_full_document() {
        let customer = crate::types::Customer {
            id: "c-1".to_string(),
            first_name: "Ann".to_string(),
            last_name: "Onym".to_string(),
            email: "ann@x.com".to_string(),
            address: crate::types::Address {
                line1: "1 High St".to_string(),
                line2: "Apt. 2".to_string(),
                postcode: "12345".to_string(),
                city: "Springfield".to_string(),
                state: "OR".to_string(),
                country: "US".to_string(),
            },
            created_at: chrono::Utc::now(),
        };

        let out = anonymize_fields(&customer.document());
        assert_eq!(out[fields::FIRST_NAME], Value::String(pseudonym("Ann")));
        assert_eq!(out[fields::LAST_NAME], Value::String(pseudonym("Onym")));
        assert_eq!(
            out[fields::EMAIL],
            Value::String(format!("{}@x.com", pseudonym("ann")))
        );

        let address = out[fields::ADDRESS].as_object().unwrap();
        assert_eq!(address[fields::LINE1], Value::String(pseudonym("1 High St")));
        assert_eq!(address[fields::LINE2], Value::String(pseudonym("Apt. 2")));
        assert_eq!(address[fields::POSTCODE], Value::String(pseudonym("12345")));
        // Non-identifying address fields are untouched.
        assert_eq!(address["city"], Value::String("Springfield".to_string()));
        assert_eq!(address["country"], Value::String("US".to_string()));

        // The timestamp is not identifying and passes through.
        assert_eq!(out[fields::CREATED_AT], customer.document()[fields::CREATED_AT]);
    }

    #[test]
    fn test_anonymize_partial_delta_with_dotted_paths() {
        let mut delta = Document::new();
        delta.insert("lastName".to_string(), Value::String("Smith".to_string()));
        delta.insert("address.postcode".to_string(), Value::String("90210".to_string()));
        delta.insert("address.city".to_string(), Value::String("Beverly Hills".to_string()));

        let out = anonymize_fields(&delta);
        assert_eq!(out["lastName"], Value::String(pseudonym("Smith")));
        assert_eq!(out["address.postcode"], Value::String(pseudonym("90210")));
        assert_eq!(out["address.city"], Value::String("Beverly Hills".to_string()));
        assert!(out.get("firstName").is_none());
    }
}
