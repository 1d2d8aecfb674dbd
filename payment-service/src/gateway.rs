//! Payment gateway adapter
//!
//! Pure functions over an ordered parameter map, independent of any web
//! framework type, so signing and verification are unit-testable without
//! network mocking.
//!
//! The signature scheme: take every non-empty field except the hash field
//! itself, sort lexicographically by key, join the *values* with `&`,
//! prefix the shared integrity salt and another `&`, then HMAC-SHA256 the
//! result keyed with the same salt and hex-encode. Any parameter mutation
//! after signing invalidates the hash.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use shared::models::PaymentStatus;
use shared::{AppError, Money};

/// Field carrying the signature; excluded from its own computation
pub const SECURE_HASH_FIELD: &str = "pp_SecureHash";

/// Gateway credentials and endpoints
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub merchant_id: String,
    pub password: String,
    /// Shared HMAC secret
    pub integrity_salt: String,
    pub return_url: String,
    /// Gateway form submission URL
    pub api_url: String,
}

/// A signed, ready-to-submit payment request
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub params: BTreeMap<String, String>,
    pub transaction_id: String,
    pub gateway_url: String,
}

/// Fresh gateway transaction reference
pub fn generate_transaction_id() -> String {
    format!("T{}", Utc::now().timestamp_millis())
}

/// Canonicalize `params` and key the MAC (the hash field is skipped)
///
/// Fails closed: a missing shared secret rejects rather than signing with
/// an empty key. Single home of the canonicalization, shared by signing and
/// verification.
fn canonical_mac(
    params: &BTreeMap<String, String>,
    integrity_salt: &str,
) -> Result<Hmac<Sha256>, AppError> {
    if integrity_salt.is_empty() {
        return Err(AppError::internal("gateway integrity salt is not configured"));
    }

    // BTreeMap iterates in lexicographic key order
    let mut hash_string = integrity_salt.to_string();
    for (key, value) in params {
        if key == SECURE_HASH_FIELD || value.is_empty() {
            continue;
        }
        hash_string.push('&');
        hash_string.push_str(value);
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(integrity_salt.as_bytes())
        .map_err(|_| AppError::internal("invalid HMAC key"))?;
    mac.update(hash_string.as_bytes());
    Ok(mac)
}

/// Compute the secure hash over `params`
pub fn compute_hash(
    params: &BTreeMap<String, String>,
    integrity_salt: &str,
) -> Result<String, AppError> {
    Ok(hex::encode(
        canonical_mac(params, integrity_salt)?.finalize().into_bytes(),
    ))
}

/// Build the canonical signed parameter set for a payment
pub fn create_payment_request(
    config: &GatewayConfig,
    order_id: &str,
    amount: &Money,
    customer_email: &str,
    customer_phone: &str,
) -> Result<SignedRequest, AppError> {
    let transaction_id = generate_transaction_id();
    let now = Utc::now();
    let expiry = now + Duration::hours(1);
    let minor_units = amount
        .minor_units()
        .ok_or_else(|| AppError::validation("payment amount out of range"))?;

    let mut params = BTreeMap::from([
        ("pp_Version".to_string(), "1.1".to_string()),
        ("pp_TxnType".to_string(), "MWALLET".to_string()),
        ("pp_Language".to_string(), "EN".to_string()),
        ("pp_MerchantID".to_string(), config.merchant_id.clone()),
        ("pp_SubMerchantID".to_string(), String::new()),
        ("pp_Password".to_string(), config.password.clone()),
        ("pp_TxnRefNo".to_string(), transaction_id.clone()),
        ("pp_Amount".to_string(), minor_units.to_string()),
        (
            "pp_TxnCurrency".to_string(),
            amount.currency.code().to_string(),
        ),
        (
            "pp_TxnDateTime".to_string(),
            now.format("%Y%m%dT%H%M%S").to_string(),
        ),
        ("pp_BillReference".to_string(), order_id.to_string()),
        (
            "pp_Description".to_string(),
            format!("Payment for order {order_id}"),
        ),
        (
            "pp_TxnExpiryDateTime".to_string(),
            expiry.format("%Y%m%dT%H%M%S").to_string(),
        ),
        ("pp_ReturnURL".to_string(), config.return_url.clone()),
        ("ppmpf_1".to_string(), customer_email.to_string()),
        ("ppmpf_2".to_string(), customer_phone.to_string()),
    ]);

    let hash = compute_hash(&params, &config.integrity_salt)?;
    params.insert(SECURE_HASH_FIELD.to_string(), hash);

    Ok(SignedRequest {
        params,
        transaction_id,
        gateway_url: config.api_url.clone(),
    })
}

/// Verify a callback's signature
///
/// Recomputes the hash over every field except the received hash and
/// compares in constant time. Fails closed on a missing salt or absent
/// hash field.
pub fn verify_callback(
    params: &BTreeMap<String, String>,
    integrity_salt: &str,
) -> Result<(), AppError> {
    let received = params
        .get(SECURE_HASH_FIELD)
        .filter(|h| !h.is_empty())
        .ok_or_else(AppError::signature_invalid)?;

    let mac = canonical_mac(params, integrity_salt).map_err(|_| AppError::signature_invalid())?;
    let received_bytes = hex::decode(received).map_err(|_| AppError::signature_invalid())?;
    mac.verify_slice(&received_bytes)
        .map_err(|_| AppError::signature_invalid())
}

/// Map a gateway response code onto a payment status
///
/// Total over all inputs; unknown codes are FAILED, never success.
pub fn map_response_code(code: &str) -> PaymentStatus {
    match code {
        "000" | "121" | "200" => PaymentStatus::Complete,
        "124" | "125" => PaymentStatus::Pending,
        _ => PaymentStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::Currency;

    const SALT: &str = "test-salt-1234";

    fn config() -> GatewayConfig {
        GatewayConfig {
            merchant_id: "MC12345".into(),
            password: "pw".into(),
            integrity_salt: SALT.into(),
            return_url: "http://localhost:3004/api/payments/callback".into(),
            api_url: "https://gateway.example/pay".into(),
        }
    }

    fn money(amount: Decimal) -> Money {
        Money::new(amount, Currency::Pkr)
    }

    #[test]
    fn signed_request_verifies() {
        let request = create_payment_request(
            &config(),
            "order-1",
            &money(Decimal::new(57000, 2)),
            "a@b.c",
            "+921234567",
        )
        .unwrap();

        assert!(request.transaction_id.starts_with('T'));
        assert_eq!(request.params["pp_Amount"], "57000");
        assert_eq!(request.params["pp_TxnCurrency"], "PKR");
        assert_eq!(request.params["pp_BillReference"], "order-1");
        assert!(verify_callback(&request.params, SALT).is_ok());
    }

    #[test]
    fn mutating_any_field_breaks_the_signature() {
        let request = create_payment_request(
            &config(),
            "order-1",
            &money(Decimal::from(570)),
            "a@b.c",
            "",
        )
        .unwrap();

        for key in ["pp_Amount", "pp_BillReference", "ppmpf_1"] {
            let mut tampered = request.params.clone();
            tampered.insert(key.to_string(), "evil".to_string());
            assert!(
                verify_callback(&tampered, SALT).is_err(),
                "mutation of {key} must invalidate the hash"
            );
        }
    }

    #[test]
    fn tampered_hash_is_rejected() {
        let request = create_payment_request(
            &config(),
            "order-1",
            &money(Decimal::from(100)),
            "a@b.c",
            "",
        )
        .unwrap();
        let mut tampered = request.params.clone();
        tampered.insert(SECURE_HASH_FIELD.to_string(), "00".repeat(32));
        assert!(verify_callback(&tampered, SALT).is_err());
    }

    #[test]
    fn empty_fields_are_excluded_from_the_hash() {
        // pp_SubMerchantID and ppmpf_2 are empty; dropping them entirely
        // must not change the signature
        let request = create_payment_request(
            &config(),
            "order-1",
            &money(Decimal::from(100)),
            "a@b.c",
            "",
        )
        .unwrap();
        let mut without_empties = request.params.clone();
        without_empties.retain(|_, v| !v.is_empty());
        assert!(verify_callback(&without_empties, SALT).is_ok());
    }

    #[test]
    fn missing_salt_fails_closed() {
        let request = create_payment_request(
            &config(),
            "order-1",
            &money(Decimal::from(100)),
            "a@b.c",
            "",
        )
        .unwrap();
        assert!(verify_callback(&request.params, "").is_err());

        let mut bad_config = config();
        bad_config.integrity_salt = String::new();
        assert!(create_payment_request(
            &bad_config,
            "order-1",
            &money(Decimal::from(100)),
            "a@b.c",
            ""
        )
        .is_err());
    }

    #[test]
    fn response_code_mapping_is_total_with_failed_default() {
        assert_eq!(map_response_code("000"), PaymentStatus::Complete);
        assert_eq!(map_response_code("121"), PaymentStatus::Complete);
        assert_eq!(map_response_code("200"), PaymentStatus::Complete);
        assert_eq!(map_response_code("124"), PaymentStatus::Pending);
        assert_eq!(map_response_code("125"), PaymentStatus::Pending);
        assert_eq!(map_response_code("999"), PaymentStatus::Failed);
        assert_eq!(map_response_code(""), PaymentStatus::Failed);
        assert_eq!(map_response_code("garbage"), PaymentStatus::Failed);
    }
}
