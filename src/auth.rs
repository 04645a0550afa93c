use crate::store::Store;

/// Outcome of the API-Key Authenticator (§4.7).
#[derive(Debug, PartialEq, Eq)]
pub enum AuthResult {
    /// Key resolved to a client identifier.
    Accepted(String),
    /// `X-API-Key` header missing — 401.
    MissingKey,
    /// Key not found in the store — 403.
    UnknownKey,
    /// Store was unreachable — 500 (auth fails closed).
    StoreUnavailable,
}

/// Looks up `api_key:{key} -> client_id`. `None` for `api_key` means the
/// header was absent from the request.
pub async fn authenticate(store: &Store, api_key: Option<&str>) -> AuthResult {
    let Some(key) = api_key else {
        return AuthResult::MissingKey;
    };
    if key.is_empty() {
        return AuthResult::MissingKey;
    }

    match store.get(&format!("api_key:{key}")).await {
        Ok(Some(client_id)) => AuthResult::Accepted(client_id),
        Ok(None) => AuthResult::UnknownKey,
        Err(_) => AuthResult::StoreUnavailable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let store = Store::in_memory();
        assert_eq!(authenticate(&store, None).await, AuthResult::MissingKey);
    }

    #[tokio::test]
    async fn test_empty_header_rejected() {
        let store = Store::in_memory();
        assert_eq!(authenticate(&store, Some("")).await, AuthResult::MissingKey);
    }

    #[tokio::test]
    async fn test_unknown_key_rejected() {
        let store = Store::in_memory();
        assert_eq!(authenticate(&store, Some("nope")).await, AuthResult::UnknownKey);
    }

    #[tokio::test]
    async fn test_known_key_accepted() {
        let store = Store::in_memory();
        store.test_set_string("api_key:k1", "c1");
        assert_eq!(
            authenticate(&store, Some("k1")).await,
            AuthResult::Accepted("c1".to_string())
        );
    }
}
