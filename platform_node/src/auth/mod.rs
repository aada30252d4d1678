//! Identity resolution: bearer credential -> verified account.
//!
//! Verification is a trait seam so the server wires a JWT verifier while
//! tests inject a static one. The resolver is read-only; it never creates
//! accounts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::storage::Store;
use crate::types::Account;

pub mod policy;

/// Claims carried by a verified bearer credential.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Account id of the authenticated subject.
    pub sub: String,
    pub exp: usize,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify an opaque bearer token and return its claims.
    async fn verify(&self, token: &str) -> EngineResult<TokenClaims>;
}

/// HS256 JWT verifier backed by a shared secret.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> EngineResult<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| EngineError::Unauthenticated)
    }
}

/// Fixed token -> subject map for tests.
#[derive(Default)]
pub struct StaticVerifier {
    subjects: HashMap<String, Uuid>,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, subject: Uuid) -> Self {
        self.subjects.insert(token.to_string(), subject);
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> EngineResult<TokenClaims> {
        self.subjects
            .get(token)
            .map(|id| TokenClaims {
                sub: id.to_string(),
                exp: usize::MAX,
            })
            .ok_or(EngineError::Unauthenticated)
    }
}

/// Strip the `Bearer ` scheme off an Authorization header value.
pub fn parse_bearer_token(header: Option<&str>) -> Option<&str> {
    header?.strip_prefix("Bearer ")
}

/// Resolves a request's bearer credential to a local account.
pub struct IdentityResolver {
    verifier: Arc<dyn TokenVerifier>,
    store: Arc<dyn Store>,
}

impl IdentityResolver {
    pub fn new(verifier: Arc<dyn TokenVerifier>, store: Arc<dyn Store>) -> Self {
        Self { verifier, store }
    }

    /// Resolve an Authorization header to a verified account.
    ///
    /// A missing or malformed header fails before the verifier is called.
    /// A verified subject without a local profile is `ProfileMissing`,
    /// distinct from an invalid credential.
    pub async fn resolve(&self, authorization: Option<&str>) -> EngineResult<Account> {
        let token = parse_bearer_token(authorization).ok_or(EngineError::Unauthenticated)?;
        let claims = self.verifier.verify(token).await?;
        let subject: Uuid = claims
            .sub
            .parse()
            .map_err(|_| EngineError::Unauthenticated)?;
        self.store
            .account(subject)
            .await?
            .ok_or(EngineError::ProfileMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::Role;
    use chrono::Utc;

    async fn seeded_store(id: Uuid) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let account = Account {
            id,
            email: "student@example.com".to_string(),
            full_name: "Student".to_string(),
            role: Role::Student,
            created_at: Utc::now(),
        };
        store.insert_account(account).await.unwrap();
        store
    }

    #[test]
    fn parse_bearer_token_requires_the_scheme() {
        assert_eq!(parse_bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(parse_bearer_token(Some("Basic abc")), None);
        assert_eq!(parse_bearer_token(None), None);
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated_without_verifier_call() {
        let id = Uuid::new_v4();
        let resolver = IdentityResolver::new(Arc::new(StaticVerifier::new()), seeded_store(id).await);
        let err = resolver.resolve(None).await.unwrap_err();
        assert!(matches!(err, EngineError::Unauthenticated));
    }

    #[tokio::test]
    async fn unknown_token_is_unauthenticated() {
        let id = Uuid::new_v4();
        let resolver = IdentityResolver::new(Arc::new(StaticVerifier::new()), seeded_store(id).await);
        let err = resolver.resolve(Some("Bearer nope")).await.unwrap_err();
        assert!(matches!(err, EngineError::Unauthenticated));
    }

    #[tokio::test]
    async fn verified_subject_without_profile_is_profile_missing() {
        let verifier = StaticVerifier::new().with_token("tok", Uuid::new_v4());
        let resolver =
            IdentityResolver::new(Arc::new(verifier), Arc::new(MemoryStore::new()));
        let err = resolver.resolve(Some("Bearer tok")).await.unwrap_err();
        assert!(matches!(err, EngineError::ProfileMissing));
    }

    #[tokio::test]
    async fn valid_token_resolves_the_account() {
        let id = Uuid::new_v4();
        let verifier = StaticVerifier::new().with_token("tok", id);
        let resolver = IdentityResolver::new(Arc::new(verifier), seeded_store(id).await);
        let account = resolver.resolve(Some("Bearer tok")).await.unwrap();
        assert_eq!(account.id, id);
    }

    #[tokio::test]
    async fn jwt_verifier_rejects_garbage() {
        let verifier = JwtVerifier::new("test-secret");
        let err = verifier.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, EngineError::Unauthenticated));
    }
}
