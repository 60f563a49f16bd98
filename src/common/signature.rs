// src/common/signature.rs

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::common::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 do corpo, em hex minúsculo (formato do cabeçalho X-Signature).
pub fn sign_hex(secret: &str, body: &[u8]) -> String {
    // HMAC aceita chave de qualquer tamanho
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Compara em tempo constante. Assinaturas que não são hex válido falham.
pub fn verify_hex(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Confere o cabeçalho X-Signature. Sem segredo configurado a verificação é desligada.
pub fn check_signature(secret: Option<&str>, body: &[u8], signature: Option<&str>) -> Result<(), AppError> {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    match signature {
        Some(signature) if verify_hex(secret, body, signature) => Ok(()),
        _ => Err(AppError::InvalidSignature),
    }
}

/// SHA-256 em hex; usado para guardar tokens sem guardar o valor.
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trips_and_rejects_tampering() {
        let body = br#"{"meta":{"event_name":"order_created"}}"#;
        let signature = sign_hex("whsec", body);

        assert_eq!(signature.len(), 64);
        assert!(verify_hex("whsec", body, &signature));
        assert!(verify_hex("whsec", body, &signature.to_uppercase()));
        assert!(!verify_hex("other", body, &signature));
        assert!(!verify_hex("whsec", b"{}", &signature));
        assert!(!verify_hex("whsec", body, "not-hex"));
        assert!(!verify_hex("whsec", body, ""));
    }

    #[test]
    fn signature_is_required_only_with_a_secret() {
        let body = b"{}";
        assert!(check_signature(None, body, None).is_ok());
        assert!(check_signature(Some(""), body, None).is_ok());

        let good = sign_hex("whsec", body);
        assert!(check_signature(Some("whsec"), body, Some(&good)).is_ok());
        assert!(matches!(check_signature(Some("whsec"), body, None), Err(AppError::InvalidSignature)));
        assert!(matches!(
            check_signature(Some("whsec"), body, Some("deadbeef")),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn known_hmac_vector() {
        // RFC 4231, caso 2
        assert_eq!(
            sign_hex("Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn token_hash_is_stable() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
