//! # Identifiers
//!
//! Entity ids, business numbers and the ticket entry payload.
//!
//! ```text
//! id             UUID v4                    "3f2c...-..."   relations
//! order_number   10 × [A-Z0-9]              "K7Q2M0ZP4D"    customer facing
//! ticket_number  12 × [0-9A-F] (48 bits)    "9C41E07A2B5D"  printed on pass
//! entry_payload  TICKET:{n}:EVENT:{e}:USER:{u}               scanned at door
//! ```
//!
//! Generation is random, so uniqueness is ultimately enforced by UNIQUE
//! indexes in the database; callers regenerate on collision.

use uuid::Uuid;

const ORDER_NUMBER_LEN: usize = 10;
const TICKET_NUMBER_LEN: usize = 12;
const ORDER_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Fresh UUID v4 string for an entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a ticket number: the first 12 hex digits of a UUID v4,
/// uppercased. Those digits precede the version nibble, so all 48 bits are
/// random.
pub fn generate_ticket_number() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    simple[..TICKET_NUMBER_LEN].to_ascii_uppercase()
}

/// Generates a 10-character uppercase alphanumeric order number.
pub fn generate_order_number() -> String {
    Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(ORDER_NUMBER_LEN)
        .map(|b| ORDER_ALPHABET[(*b as usize) % ORDER_ALPHABET.len()] as char)
        .collect()
}

/// Builds the opaque payload encoded into a ticket's entry pass.
///
/// Deterministic in its inputs; stored once when the ticket is issued.
///
/// ```rust
/// use horizon_core::identity::entry_payload;
///
/// assert_eq!(
///     entry_payload("9C41E07A2B5D", "evt-1", "user-7"),
///     "TICKET:9C41E07A2B5D:EVENT:evt-1:USER:user-7"
/// );
/// ```
pub fn entry_payload(ticket_number: &str, event_id: &str, user_id: &str) -> String {
    format!("TICKET:{ticket_number}:EVENT:{event_id}:USER:{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ticket_number_format() {
        let number = generate_ticket_number();
        assert_eq!(number.len(), 12);
        assert!(number
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        assert_eq!(number.len(), 10);
        assert!(number
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_numbers_are_not_reused_in_practice() {
        let numbers: HashSet<String> = (0..1000).map(|_| generate_ticket_number()).collect();
        assert_eq!(numbers.len(), 1000);
    }

    #[test]
    fn test_entry_payload_is_deterministic() {
        let a = entry_payload("ABC", "e", "u");
        let b = entry_payload("ABC", "e", "u");
        assert_eq!(a, b);
        assert_ne!(a, entry_payload("ABD", "e", "u"));
    }
}
