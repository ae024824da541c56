use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Separator between field names in the manifest payload.
const FIELD_SEPARATOR: &str = "||";

/// Seal a list of field names into the tamper-resistant value carried by
/// the fields-present hidden parameter.
///
/// Layout: `base64(payload) . base64(sha256(secret || payload))`. The seal
/// detects tampering with either half; it is not encryption — field names
/// are not secrets, their integrity is what matters.
#[must_use]
pub fn seal_fields(fields: &[&str], secret: &[u8]) -> String {
    let payload = fields.join(FIELD_SEPARATOR);
    let digest = keyed_digest(secret, payload.as_bytes());
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(payload.as_bytes()),
        URL_SAFE_NO_PAD.encode(digest)
    )
}

/// Unseal a fields-present value. `None` when the value is malformed, the
/// digest does not verify, or the secret differs — callers treat all three
/// as "no manifest".
#[must_use]
pub fn unseal_fields(value: &str, secret: &[u8]) -> Option<Vec<String>> {
    let (payload_b64, digest_b64) = value.rsplit_once('.')?;
    let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let digest = URL_SAFE_NO_PAD.decode(digest_b64).ok()?;

    let expected = keyed_digest(secret, &payload);
    if digest != expected {
        warn!("Fields-present manifest failed integrity check");
        return None;
    }

    let payload = String::from_utf8(payload).ok()?;
    if payload.is_empty() {
        return Some(Vec::new());
    }
    Some(payload.split(FIELD_SEPARATOR).map(String::from).collect())
}

fn keyed_digest(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(payload);
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn round_trip_preserves_field_names() {
        let sealed = seal_fields(&["agree", "tags", "user.name"], SECRET);
        let fields = unseal_fields(&sealed, SECRET).expect("unseal");
        assert_eq!(fields, vec!["agree", "tags", "user.name"]);
    }

    #[test]
    fn tampered_values_do_not_unseal() {
        let sealed = seal_fields(&["agree"], SECRET);
        let mut tampered = sealed.clone();
        tampered.insert(0, 'x');
        assert!(unseal_fields(&tampered, SECRET).is_none());
    }

    #[test]
    fn wrong_secret_does_not_unseal() {
        let sealed = seal_fields(&["agree"], SECRET);
        assert!(unseal_fields(&sealed, b"other-secret").is_none());
    }
}
