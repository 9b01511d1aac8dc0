use axum::async_trait;
use axum::extract::FromRef;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use clap::ValueEnum;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use sb_common::model::UserRole;
use serde::Deserialize;

use crate::error::ApiError;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum AuthMode {
    ApiKey,
    Jwt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum JwtAlgorithm {
    Hs256,
    Hs384,
    Hs512,
    Rs256,
    Es256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtKeyKind {
    Secret,
    RsaPem,
    EcPem,
}

impl JwtAlgorithm {
    pub fn algorithm(self) -> Algorithm {
        match self {
            JwtAlgorithm::Hs256 => Algorithm::HS256,
            JwtAlgorithm::Hs384 => Algorithm::HS384,
            JwtAlgorithm::Hs512 => Algorithm::HS512,
            JwtAlgorithm::Rs256 => Algorithm::RS256,
            JwtAlgorithm::Es256 => Algorithm::ES256,
        }
    }

    pub fn key_kind(self) -> JwtKeyKind {
        match self {
            JwtAlgorithm::Hs256 | JwtAlgorithm::Hs384 | JwtAlgorithm::Hs512 => JwtKeyKind::Secret,
            JwtAlgorithm::Rs256 => JwtKeyKind::RsaPem,
            JwtAlgorithm::Es256 => JwtKeyKind::EcPem,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub api_key: Option<String>,
    pub jwt_secret: Option<String>,
    pub jwt_public_key: Option<String>,
    pub jwt_algorithm: JwtAlgorithm,
}

/// The authenticated caller. API-key callers are services acting as admin
/// and carry no user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub subject: String,
    pub user_id: Option<i64>,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins pass every role guard.
    pub fn require_role(&self, roles: &[UserRole]) -> Result<(), ApiError> {
        if self.is_admin() || roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "role {} may not perform this action",
                self.role.as_ref()
            )))
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        self.require_role(&[])
    }

    /// The caller's user id; service callers have none.
    pub fn user_id(&self) -> Result<i64, ApiError> {
        self.user_id
            .ok_or_else(|| ApiError::Forbidden("this action requires a user account".into()))
    }
}

/// Optional authentication for public routes: absent credentials yield
/// `None`, invalid ones are still rejected.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(AuthUser::is_admin)
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    role: UserRole,
    #[allow(dead_code)]
    exp: usize,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AuthConfig::from_ref(state);

        match config.mode {
            AuthMode::ApiKey => authorize_api_key(parts, &config),
            AuthMode::Jwt => authorize_jwt(parts, &config),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let has_credentials = parts.headers.contains_key(AUTHORIZATION)
            || parts.headers.contains_key(API_KEY_HEADER);
        if !has_credentials {
            return Ok(MaybeAuthUser(None));
        }
        AuthUser::from_request_parts(parts, state)
            .await
            .map(|user| MaybeAuthUser(Some(user)))
    }
}

fn authorize_api_key(parts: &Parts, config: &AuthConfig) -> Result<AuthUser, ApiError> {
    let expected = config
        .api_key
        .as_deref()
        .ok_or_else(|| ApiError::Unauthorized("missing SB_API_KEY".into()))?;

    let provided = parts
        .headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing X-API-Key header".into()))?;

    if provided != expected {
        return Err(ApiError::Unauthorized("invalid API key".into()));
    }

    Ok(AuthUser {
        subject: "api_key".to_string(),
        user_id: None,
        role: UserRole::Admin,
    })
}

fn decoding_key(config: &AuthConfig) -> Result<DecodingKey, ApiError> {
    match config.jwt_algorithm.key_kind() {
        JwtKeyKind::Secret => config
            .jwt_secret
            .as_deref()
            .map(|secret| DecodingKey::from_secret(secret.as_bytes()))
            .ok_or_else(|| ApiError::Unauthorized("missing JWT_SECRET".into())),
        kind => {
            let pem = config
                .jwt_public_key
                .as_deref()
                .ok_or_else(|| ApiError::Unauthorized("missing JWT_PUBLIC_KEY".into()))?;
            let key = if kind == JwtKeyKind::RsaPem {
                DecodingKey::from_rsa_pem(pem.as_bytes())
            } else {
                DecodingKey::from_ec_pem(pem.as_bytes())
            };
            key.map_err(|err| ApiError::Internal(format!("invalid JWT_PUBLIC_KEY: {err}")))
        }
    }
}

fn authorize_jwt(parts: &Parts, config: &AuthConfig) -> Result<AuthUser, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("expected Bearer token".into()))?;

    let key = decoding_key(config)?;
    let validation = Validation::new(config.jwt_algorithm.algorithm());

    let data = decode::<Claims>(token, &key, &validation)
        .map_err(|err| ApiError::Unauthorized(format!("invalid token: {err}")))?;

    let user_id = data
        .claims
        .sub
        .parse::<i64>()
        .map_err(|_| ApiError::Unauthorized("token subject is not a user id".into()))?;

    Ok(AuthUser {
        subject: data.claims.sub,
        user_id: Some(user_id),
        role: data.claims.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    const SECRET: &str = "test-secret";

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        role: &'a str,
        exp: usize,
    }

    fn jwt_config() -> AuthConfig {
        AuthConfig {
            mode: AuthMode::Jwt,
            api_key: None,
            jwt_secret: Some(SECRET.into()),
            jwt_public_key: None,
            jwt_algorithm: JwtAlgorithm::Hs256,
        }
    }

    fn token(sub: &str, role: &str, exp: usize) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &TestClaims { sub, role, exp },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    fn parts_with(header: &str, value: &str) -> Parts {
        Request::builder()
            .header(header, value)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn accepts_valid_bearer_token() {
        let parts = parts_with("authorization", &format!("Bearer {}", token("42", "worker", far_future())));
        let user = authorize_jwt(&parts, &jwt_config()).unwrap();
        assert_eq!(user.user_id, Some(42));
        assert_eq!(user.role, UserRole::Worker);
        assert!(user.require_role(&[UserRole::Worker]).is_ok());
        assert!(user.require_role(&[UserRole::Employer]).is_err());
    }

    #[test]
    fn rejects_expired_and_malformed_tokens() {
        let expired = parts_with("authorization", &format!("Bearer {}", token("42", "worker", 1)));
        assert!(matches!(authorize_jwt(&expired, &jwt_config()), Err(ApiError::Unauthorized(_))));

        let non_numeric = parts_with(
            "authorization",
            &format!("Bearer {}", token("abc", "worker", far_future())),
        );
        assert!(matches!(authorize_jwt(&non_numeric, &jwt_config()), Err(ApiError::Unauthorized(_))));

        let basic = parts_with("authorization", "Basic Zm9vOmJhcg==");
        assert!(matches!(authorize_jwt(&basic, &jwt_config()), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn api_key_callers_act_as_admin_without_user() {
        let config = AuthConfig {
            mode: AuthMode::ApiKey,
            api_key: Some("k".into()),
            ..jwt_config()
        };
        let user = authorize_api_key(&parts_with("x-api-key", "k"), &config).unwrap();
        assert!(user.is_admin());
        assert!(user.require_role(&[UserRole::Worker]).is_ok());
        assert!(user.user_id().is_err());

        assert!(authorize_api_key(&parts_with("x-api-key", "nope"), &config).is_err());
    }

    #[test]
    fn key_kinds_follow_algorithm_family() {
        assert_eq!(JwtAlgorithm::Hs512.key_kind(), JwtKeyKind::Secret);
        assert_eq!(JwtAlgorithm::Rs256.key_kind(), JwtKeyKind::RsaPem);
        assert_eq!(JwtAlgorithm::Es256.key_kind(), JwtKeyKind::EcPem);
    }
}
