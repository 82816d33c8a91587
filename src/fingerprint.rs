//! Content hash over the client-visible deck payload.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::DeckPayload;

/// Lowercase hex SHA-256 of the payload's compact JSON form.
///
/// The payload holds only client-visible fields in canonical order, so equal
/// visible content always hashes equal.
pub fn fingerprint(payload: &DeckPayload) -> Result<String> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardEntry;
    use crate::provider::Provider;

    fn payload(quantity: u32) -> DeckPayload {
        DeckPayload {
            provider: Provider::Archidekt,
            deck_id: "1".into(),
            images: vec![CardEntry {
                name: "Sol Ring".into(),
                quantity,
                foil: false,
                category: "Artifacts".into(),
                set_code: None,
                collector_number: None,
                front_image_url: "https://img/sol-ring.jpg".into(),
                back_image_url: None,
            }],
            category_order: vec!["Artifacts".into()],
        }
    }

    #[test]
    fn equal_payloads_hash_equal() {
        assert_eq!(fingerprint(&payload(1)).unwrap(), fingerprint(&payload(1)).unwrap());
    }

    #[test]
    fn visible_change_changes_hash() {
        assert_ne!(fingerprint(&payload(1)).unwrap(), fingerprint(&payload(2)).unwrap());
    }

    #[test]
    fn hash_is_hex_sha256() {
        let fp = fingerprint(&payload(1)).unwrap();
        assert_eq!(fp.len(), 64);
        assert!(fp.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }
}
