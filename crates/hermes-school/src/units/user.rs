//! User accounts: creation, login and updates.

use std::sync::Arc;

use hermes_auth::{password, LongTokenClaims, Role, TokenService};
use hermes_core::{DispatchError, DispatchResult, JsonMap};
use hermes_router::{OperationInput, Outcome, Unit};
use serde_json::{json, Value};

use super::{filter, find_or_404, pick, str_field, updates, Actor, INVALID_ROLE, SCHOOLS, USERS};
use crate::schemas;
use crate::store::{Record, RecordStore, ID};

/// The `user` unit.
pub struct UserUnit {
    store: Arc<dyn RecordStore>,
    tokens: Arc<TokenService>,
}

impl UserUnit {
    /// Builds the unit.
    pub fn unit(store: &Arc<dyn RecordStore>, tokens: &Arc<TokenService>) -> Unit {
        let state = Arc::new(Self {
            store: Arc::clone(store),
            tokens: Arc::clone(tokens),
        });
        Unit::builder("user")
            .expose("post=create")
            .expose("post=login")
            .expose("put=update")
            .method(
                "create",
                "{ __shortToken, username, email, password, role, schoolId }",
                &state,
                Self::create,
            )
            .method("login", "{ email, password }", &state, Self::login)
            .method("update", "{ __shortToken, userId, updates }", &state, Self::update)
            .intercept_operations()
            .build()
    }

    async fn create(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        Actor::require(self.store.as_ref(), &input, &[Role::Superadmin], INVALID_ROLE).await?;

        let fields = pick(&input, &["username", "email", "password", "role", "schoolId"]);
        let valid = schemas::user_create().validate(&fields)?;
        if let Some(school_id) = str_field(&valid, "schoolId") {
            find_or_404(self.store.as_ref(), SCHOOLS, "School", school_id).await?;
        }

        let user = insert_user(self.store.as_ref(), valid).await?;
        let long_token = self.long_token(&user)?;
        tracing::info!(user_id = str_field(&user, ID), role = str_field(&user, "role"), "user created");
        Ok(Outcome::Data(json!({ "user": public(user), "longToken": long_token })))
    }

    async fn login(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        let valid = schemas::user_login().validate(&pick(&input, &["email", "password"]))?;
        let email = str_field(&valid, "email").unwrap_or_default();
        let given = str_field(&valid, "password").unwrap_or_default();

        let Some(user) = self
            .store
            .find_where(USERS, filter("email", email))
            .await?
            .into_iter()
            .next()
        else {
            return Err(DispatchError::not_found("User not found"));
        };

        let stored = str_field(&user, "password").unwrap_or_default();
        if !verify(given, stored).await? {
            tracing::debug!(user_id = str_field(&user, ID), "login rejected");
            return Err(DispatchError::authentication("Invalid credentials"));
        }

        let long_token = self.long_token(&user)?;
        Ok(Outcome::Data(json!({ "user": public(user), "longToken": long_token })))
    }

    async fn update(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        Actor::require(self.store.as_ref(), &input, &[Role::Superadmin], INVALID_ROLE).await?;

        let mut patch = updates(&input, schemas::user_update())?;
        let user_id = input.require_str("userId")?;
        if let Some(plain) = str_field(&patch, "password") {
            let digest = hash(plain).await?;
            patch.insert("password".into(), Value::String(digest));
        }

        let updated = self
            .store
            .update(USERS, user_id, patch)
            .await?
            .ok_or_else(|| DispatchError::not_found_resource("User", user_id))?;
        Ok(Outcome::Data(public(updated)))
    }

    fn long_token(&self, user: &Record) -> DispatchResult<String> {
        let claims = LongTokenClaims::new(
            str_field(user, ID).unwrap_or_default(),
            str_field(user, "key").unwrap_or_default(),
        )
        .with_role(str_field(user, "role").unwrap_or(Role::Student.as_str()))
        .with_school(str_field(user, "schoolId").map(str::to_string));
        self.tokens
            .gen_long_token(claims)
            .map_err(|e| DispatchError::internal_with_source("failed to sign long token", e))
    }
}

impl std::fmt::Debug for UserUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserUnit").finish_non_exhaustive()
    }
}

/// Creates a superadmin unless one already exists. Returns the new user.
pub async fn seed_superadmin(
    store: &dyn RecordStore,
    username: &str,
    email: &str,
    password: &str,
) -> DispatchResult<Option<Value>> {
    let existing = store
        .find_where(USERS, filter("role", Role::Superadmin.as_str()))
        .await?;
    if !existing.is_empty() {
        return Ok(None);
    }
    let fields = json!({
        "username": username,
        "email": email,
        "password": password,
        "role": Role::Superadmin.as_str(),
    });
    let valid = schemas::user_create().validate_value("bootstrap", Some(&fields))?;
    insert_user(store, valid).await.map(|user| Some(public(user)))
}

async fn insert_user(store: &dyn RecordStore, mut valid: JsonMap) -> DispatchResult<Record> {
    let plain = str_field(&valid, "password").unwrap_or_default().to_string();
    valid.insert("password".into(), Value::String(hash(&plain).await?));
    valid.insert("key".into(), Value::String(password::generate_user_key()));
    Ok(store.create(USERS, valid).await?)
}

/// Argon2 runs on the blocking pool; a hash takes tens of milliseconds.
async fn hash(plain: &str) -> DispatchResult<String> {
    let plain = plain.to_string();
    tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| DispatchError::internal_with_source("password hashing task failed", e))?
        .map_err(|e| DispatchError::internal_with_source("failed to hash password", e))
}

/// Checks `given` against a stored hash. A malformed hash never matches.
async fn verify(given: &str, stored: &str) -> DispatchResult<bool> {
    let (given, stored) = (given.to_string(), stored.to_string());
    tokio::task::spawn_blocking(move || password::verify_password(&given, &stored).unwrap_or(false))
        .await
        .map_err(|e| DispatchError::internal_with_source("password check task failed", e))
}

/// A user record without its password hash.
fn public(mut user: Record) -> Value {
    user.remove("password");
    Value::Object(user)
}
