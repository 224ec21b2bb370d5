//! Custom Axum extractors.
//!
//! Request metadata:
//! - `CorrelationId`: Extract or generate request correlation IDs
//! - `ClientIp`: Client IP address from proxy headers or the connection
//! - `UserAgent`: `User-Agent` header
//! - `BearerToken`: raw token from `Authorization: Bearer <token>`
//!
//! Access control, over any state implementing [`HasAccessGate`]:
//! - `AuthenticatedUser`: a valid access token, any role
//! - `RequireAdmin`: a valid access token carrying the admin role
//!
//! # Examples
//!
//! ```
//! use axum::Json;
//! use ticketbook_web::extractors::{ClientIp, RequireAdmin};
//!
//! async fn purge_activities(
//!     RequireAdmin(admin): RequireAdmin,
//!     client_ip: ClientIp,
//! ) -> Json<String> {
//!     tracing::info!(user_id = %admin.user_id, ip = %client_ip.0, "Purge requested");
//!     Json("ok".to_string())
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use ticketbook_auth::gate::bearer_token;
use ticketbook_auth::{AccessGate, AuthError, Principal, Role};
use uuid::Uuid;

/// Header carrying a caller-supplied correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Correlation ID for request tracing.
///
/// Taken from the `X-Correlation-ID` header when it holds a UUID, otherwise
/// a fresh UUID v4.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Client IP address.
///
/// # Priority
///
/// 1. `X-Forwarded-For` (first IP in the list)
/// 2. `X-Real-IP`
/// 3. Connection IP, when the server was started with connect info
/// 4. `127.0.0.1`
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

impl ClientIp {
    /// The address as recorded in activity entries.
    #[must_use]
    pub fn to_audit_string(self) -> String {
        self.0.to_string()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = extract_client_ip(&parts.headers, parts.extensions.get());

        Ok(Self(ip))
    }
}

fn extract_client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> IpAddr {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    let real_ip = headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());
    if let Some(ip) = real_ip {
        return ip;
    }

    connect_info.map_or(IpAddr::V4(Ipv4Addr::LOCALHOST), |info| info.0.ip())
}

/// User-Agent header, or `"Unknown"`.
#[derive(Debug, Clone)]
pub struct UserAgent(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("Unknown")
            .to_string();

        Ok(Self(user_agent))
    }
}

/// Raw bearer token, for endpoints that take a refresh token in the header.
///
/// Rejects with 401 when the header is missing or not a `Bearer` credential.
/// The token itself is not validated.
pub struct BearerToken(pub String);

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        authorization(&parts.headers)
            .and_then(bearer_token)
            .map(|token| Self(token.to_string()))
            .ok_or_else(|| AppError::unauthorized("authorization header must be a Bearer token"))
    }
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Application state that can authenticate requests.
pub trait HasAccessGate {
    /// The gate used to verify bearer tokens.
    fn access_gate(&self) -> &AccessGate;
}

fn authenticate<S: HasAccessGate>(parts: &Parts, state: &S) -> Result<Principal, AuthError> {
    state
        .access_gate()
        .authenticate(authorization(&parts.headers))
        .inspect_err(|e| {
            tracing::debug!(error = %e, uri = %parts.uri, "Request authentication failed");
            metrics::counter!("ticketbook_http_auth_rejections_total", "reason" => "unauthenticated")
                .increment(1);
        })
}

/// Caller holding a valid access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: HasAccessGate + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(authenticate(parts, state)?))
    }
}

/// Caller holding a valid access token with the admin role.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: HasAccessGate + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = authenticate(parts, state)?;
        AccessGate::authorize(&principal, &[Role::Admin]).inspect_err(|_| {
            metrics::counter!("ticketbook_http_auth_rejections_total", "reason" => "forbidden")
                .increment(1);
        })?;
        Ok(Self(principal))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use ticketbook_auth::{SecretString, TokenIssuer, TokenKind, TokenTtls, UserId};

    struct TestState {
        gate: AccessGate,
        issuer: Arc<TokenIssuer>,
    }

    impl TestState {
        fn new() -> Self {
            let issuer = Arc::new(
                TokenIssuer::new(&SecretString::from("extractor-secret"), TokenTtls::default())
                    .unwrap(),
            );
            Self {
                gate: AccessGate::new(Arc::clone(&issuer)),
                issuer,
            }
        }

        fn bearer(&self, kind: TokenKind, role: Option<Role>) -> String {
            let issued = self.issuer.issue(kind, UserId::new(), role).unwrap();
            format!("Bearer {}", issued.token.expose_secret())
        }
    }

    impl HasAccessGate for TestState {
        fn access_gate(&self) -> &AccessGate {
            &self.gate
        }
    }

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let mut parts = parts(&[(CORRELATION_ID_HEADER, uuid.to_string().as_str())]);
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_generated_when_absent_or_malformed() {
        let mut missing = parts(&[]);
        let first = CorrelationId::from_request_parts(&mut missing, &()).await.unwrap();

        let mut malformed = parts(&[(CORRELATION_ID_HEADER, "not-a-uuid")]);
        let second = CorrelationId::from_request_parts(&mut malformed, &()).await.unwrap();

        assert_eq!(first.0.get_version_num(), 4);
        assert_eq!(second.0.get_version_num(), 4);
        assert_ne!(first.0, second.0);
    }

    #[tokio::test]
    async fn test_client_ip_priority() {
        let mut forwarded = parts(&[
            ("X-Forwarded-For", "203.0.113.1, 198.51.100.1"),
            ("X-Real-IP", "198.51.100.42"),
        ]);
        let ip = ClientIp::from_request_parts(&mut forwarded, &()).await.unwrap();
        assert_eq!(ip.to_audit_string(), "203.0.113.1");

        let mut real = parts(&[("X-Real-IP", "198.51.100.42")]);
        let ip = ClientIp::from_request_parts(&mut real, &()).await.unwrap();
        assert_eq!(ip.0.to_string(), "198.51.100.42");

        let mut connected = parts(&[]);
        connected
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 9], 40_000))));
        let ip = ClientIp::from_request_parts(&mut connected, &()).await.unwrap();
        assert_eq!(ip.0.to_string(), "192.0.2.9");

        let mut bare = parts(&[]);
        let ip = ClientIp::from_request_parts(&mut bare, &()).await.unwrap();
        assert_eq!(ip.0.to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_user_agent_fallback() {
        let mut parts = parts(&[]);
        let user_agent = UserAgent::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user_agent.0, "Unknown");
    }

    #[tokio::test]
    async fn bearer_token_requires_scheme() {
        let mut ok = parts(&[("Authorization", "Bearer abc.def.ghi")]);
        let token = BearerToken::from_request_parts(&mut ok, &()).await.unwrap();
        assert_eq!(token.0, "abc.def.ghi");
        assert_eq!(format!("{token:?}"), "BearerToken([REDACTED])");

        let mut basic = parts(&[("Authorization", "Basic dXNlcjpwYXNz")]);
        let err = BearerToken::from_request_parts(&mut basic, &()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authenticated_user_accepts_access_token() {
        let state = TestState::new();
        let header = state.bearer(TokenKind::Access, Some(Role::User));
        let mut parts = parts(&[("Authorization", header.as_str())]);

        let AuthenticatedUser(principal) =
            AuthenticatedUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(principal.role, Role::User);
    }

    #[tokio::test]
    async fn authenticated_user_rejects_refresh_token() {
        let state = TestState::new();
        let header = state.bearer(TokenKind::Refresh, None);
        let mut parts = parts(&[("Authorization", header.as_str())]);

        let err = AuthenticatedUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn require_admin_forbids_plain_users() {
        let state = TestState::new();

        let user = state.bearer(TokenKind::Access, Some(Role::User));
        let mut user_parts = parts(&[("Authorization", user.as_str())]);
        let err = RequireAdmin::from_request_parts(&mut user_parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "FORBIDDEN");

        let admin = state.bearer(TokenKind::Access, Some(Role::Admin));
        let mut admin_parts = parts(&[("Authorization", admin.as_str())]);
        let RequireAdmin(principal) =
            RequireAdmin::from_request_parts(&mut admin_parts, &state).await.unwrap();
        assert_eq!(principal.role, Role::Admin);

        let mut anonymous = parts(&[]);
        let err = RequireAdmin::from_request_parts(&mut anonymous, &state)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
