use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::AppState;

/// The caller behind a request's bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    user_id: String,
    admin: bool,
}

impl CurrentUser {
    pub fn new(user_id: impl Into<String>, admin: bool) -> Self {
        Self {
            user_id: user_id.into(),
            admin,
        }
    }

    pub fn current_user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }

    pub fn can_access(&self, owner: &str) -> bool {
        self.admin || self.user_id == owner
    }

    /// Owner to filter listings by; admins see everything.
    pub fn owner_filter(&self) -> Option<&str> {
        if self.admin {
            None
        } else {
            Some(&self.user_id)
        }
    }
}

/// Pre-provisioned bearer tokens, parsed from `token=user[:admin]` entries
/// separated by commas.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, CurrentUser>,
}

impl TokenRegistry {
    pub fn parse(entries: &str) -> Result<Self> {
        let mut tokens = HashMap::new();

        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((token, user)) = entry.split_once('=') else {
                bail!("Invalid token entry '{}': expected token=user", entry);
            };
            let (user_id, admin) = match user.split_once(':') {
                Some((user_id, "admin")) => (user_id, true),
                Some((_, role)) => bail!("Unknown role '{}' in token entry", role),
                None => (user, false),
            };
            let (token, user_id) = (token.trim(), user_id.trim());
            if token.is_empty() || user_id.is_empty() {
                bail!("Invalid token entry '{}': token and user must be non-empty", entry);
            }
            if tokens.insert(token.to_string(), CurrentUser::new(user_id, admin)).is_some() {
                bail!("Duplicate token for user '{}'", user_id);
            }
        }

        Ok(Self { tokens })
    }

    pub fn resolve(&self, token: &str) -> Option<CurrentUser> {
        self.tokens.get(token).cloned()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        state.config.tokens.resolve(token).ok_or_else(|| {
            tracing::warn!("Rejected request with unknown bearer token");
            AppError::Unauthorized("Invalid bearer token".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tokens() {
        let registry = TokenRegistry::parse("t1=alice, t2=root:admin,").unwrap();
        assert_eq!(registry.len(), 2);

        let alice = registry.resolve("t1").unwrap();
        assert_eq!(alice.current_user_id(), "alice");
        assert!(!alice.is_admin());
        assert_eq!(alice.owner_filter(), Some("alice"));
        assert!(alice.can_access("alice"));
        assert!(!alice.can_access("bob"));

        let root = registry.resolve("t2").unwrap();
        assert!(root.is_admin());
        assert_eq!(root.owner_filter(), None);
        assert!(root.can_access("bob"));

        assert!(registry.resolve("t3").is_none());
    }

    #[test]
    fn test_parse_rejects_bad_entries() {
        assert!(TokenRegistry::parse("no-separator").is_err());
        assert!(TokenRegistry::parse("t=alice:owner").is_err());
        assert!(TokenRegistry::parse("=alice").is_err());
        assert!(TokenRegistry::parse("t=alice,t=bob").is_err());
        assert!(TokenRegistry::parse("").unwrap().is_empty());
    }
}
