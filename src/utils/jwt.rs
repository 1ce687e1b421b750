use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// 令牌由外部身份子系统签发（共享密钥），本服务只做校验。
/// 会员字段随消费者令牌携带；`pass_expires_at` 保持原样字符串，
/// 有效性判定交给访问评估器。
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub actor: String, // "consumer" or "vendor"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<i64>,
    #[serde(default)]
    pub is_pass_member: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_expires_at: Option<String>,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String, // "access"
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires_in: i64,
}

impl JwtService {
    pub fn new(secret: &str, access_expires_in: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expires_in: access_expires_in,
        }
    }

    pub fn generate_consumer_token(
        &self,
        user_id: i64,
        is_pass_member: bool,
        pass_expires_at: Option<String>,
    ) -> AppResult<String> {
        self.generate_token(user_id, "consumer", None, is_pass_member, pass_expires_at)
    }

    pub fn generate_vendor_token(&self, user_id: i64, vendor_id: i64) -> AppResult<String> {
        self.generate_token(user_id, "vendor", Some(vendor_id), false, None)
    }

    fn generate_token(
        &self,
        user_id: i64,
        actor: &str,
        vendor_id: Option<i64>,
        is_pass_member: bool,
        pass_expires_at: Option<String>,
    ) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_token_expires_in);

        let claims = Claims {
            sub: user_id.to_string(),
            actor: actor.to_string(),
            vendor_id,
            is_pass_member,
            pass_expires_at,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            token_type: "access".to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AppError::JwtError)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)?;

        if claims.token_type != "access" {
            return Err(AppError::AuthError("Invalid access token type".to_string()));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("test-secret", 3600)
    }

    #[test]
    fn test_consumer_token_round_trip_keeps_membership_fields() {
        let svc = service();
        let token = svc
            .generate_consumer_token(42, true, Some("2027-01-01T00:00:00Z".to_string()))
            .unwrap();
        let claims = svc.verify_access_token(&token).unwrap();

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.actor, "consumer");
        assert!(claims.is_pass_member);
        assert_eq!(
            claims.pass_expires_at.as_deref(),
            Some("2027-01-01T00:00:00Z")
        );
        assert!(claims.vendor_id.is_none());
    }

    #[test]
    fn test_vendor_token_carries_vendor_id() {
        let svc = service();
        let token = svc.generate_vendor_token(7, 99).unwrap();
        let claims = svc.verify_access_token(&token).unwrap();

        assert_eq!(claims.actor, "vendor");
        assert_eq!(claims.vendor_id, Some(99));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = service().generate_vendor_token(7, 99).unwrap();
        let other = JwtService::new("other-secret", 3600);
        assert!(other.verify_access_token(&token).is_err());
    }
}
