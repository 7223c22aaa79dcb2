//! User registration.

use std::sync::Arc;

use ledger_store::{DEFAULT_ROLE_ID, LedgerStore, NewUser, User, UserId};

use crate::{Argon2Hasher, CredentialHasher, InventoryError};

/// Values for a new user. The password is plaintext until hashed here.
#[derive(Clone, PartialEq, Eq)]
pub struct RegisterUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role_id: Option<i32>,
}

impl std::fmt::Debug for RegisterUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role_id", &self.role_id)
            .finish()
    }
}

/// Service registering users with hashed credentials.
pub struct UserService<S: LedgerStore> {
    store: S,
    hasher: Arc<dyn CredentialHasher>,
}

impl<S: LedgerStore> UserService<S> {
    /// Creates a service hashing passwords with Argon2.
    pub fn new(store: S) -> Self {
        Self::with_hasher(store, Arc::new(Argon2Hasher))
    }

    pub fn with_hasher(store: S, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { store, hasher }
    }

    /// Registers a user. Emails are unique; the role defaults to the least
    /// privileged one.
    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterUser) -> Result<User, InventoryError> {
        let name = request.name.trim();
        let email = request.email.trim();
        if name.is_empty() || email.is_empty() || request.password.is_empty() {
            return Err(InventoryError::InvalidInput(
                "name, email and password are required".to_string(),
            ));
        }

        let hasher = Arc::clone(&self.hasher);
        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| InventoryError::Credential(e.to_string()))??;

        let inserted = self
            .store
            .insert_user(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
                role_id: request.role_id.unwrap_or(DEFAULT_ROLE_ID),
            })
            .await;

        match inserted {
            Ok(user) => {
                tracing::info!(user_id = %user.id, role_id = user.role_id, "user registered");
                Ok(user)
            }
            Err(err) => {
                self.store.handle_failure(&err).await;
                Err(err.into())
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_user(&self, user_id: UserId) -> Result<User, InventoryError> {
        match self.store.get_user(user_id).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(InventoryError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            }),
            Err(err) => {
                self.store.handle_failure(&err).await;
                Err(err.into())
            }
        }
    }
}
