use jsonwebtoken::{DecodingKey, Validation, decode};

use atelier_types::api::Claims;

use crate::error::GatewayError;

/// Pull the bearer token out of the upgrade request: an explicit `token`
/// query field wins, otherwise an `Authorization: Bearer <token>` header.
pub fn token_from_request(
    query_token: Option<&str>,
    authorization: Option<&str>,
) -> Option<String> {
    if let Some(token) = query_token {
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    authorization
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
}

/// Validate a bearer token and extract its claims. Signature, expiry and
/// shape failures all collapse into `InvalidCredential` — callers must not
/// be able to probe which check failed.
pub fn verify(secret: &str, token: &str) -> Result<Claims, GatewayError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| GatewayError::InvalidCredential)
}

/// Full handshake check: extract then verify. A missing token is the same
/// failure as an invalid one.
pub fn authenticate(
    secret: &str,
    query_token: Option<&str>,
    authorization: Option<&str>,
) -> Result<Claims, GatewayError> {
    let token = token_from_request(query_token, authorization)
        .ok_or(GatewayError::InvalidCredential)?;
    verify(secret, &token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_types::models::Role;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use uuid::Uuid;

    fn make_token(secret: &str, exp_offset_secs: i64) -> String {
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "tailor@example.com".into(),
            role: Role::Consumer,
            exp: (chrono::Utc::now().timestamp() + exp_offset_secs) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_roundtrips() {
        let token = make_token("s3cret", 3600);
        let claims = verify("s3cret", &token).unwrap();
        assert_eq!(claims.email, "tailor@example.com");
        assert_eq!(claims.role, Role::Consumer);
    }

    #[test]
    fn expired_and_garbage_fail_identically() {
        let expired = verify("s3cret", &make_token("s3cret", -3600)).unwrap_err();
        let garbage = verify("s3cret", "not-a-jwt").unwrap_err();
        let wrong_key = verify("other", &make_token("s3cret", 3600)).unwrap_err();

        for err in [&expired, &garbage, &wrong_key] {
            assert!(matches!(err, GatewayError::InvalidCredential));
        }
    }

    #[test]
    fn token_extraction_prefers_query_then_header() {
        assert_eq!(
            token_from_request(Some("abc"), Some("Bearer xyz")).as_deref(),
            Some("abc")
        );
        assert_eq!(
            token_from_request(None, Some("Bearer xyz")).as_deref(),
            Some("xyz")
        );
        assert_eq!(token_from_request(None, Some("Basic xyz")), None);
        assert_eq!(token_from_request(Some(""), None), None);
    }

    #[test]
    fn missing_token_is_invalid_credential() {
        let err = authenticate("s3cret", None, None).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidCredential));
    }
}
