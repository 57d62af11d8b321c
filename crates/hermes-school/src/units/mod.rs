//! Domain units exposed over HTTP and the bus.
//!
//! Authorization is decided from the stored user record, not the token: the
//! short token identifies the caller and the record supplies the role and
//! school.

mod classroom;
mod school;
mod student;
mod token;
mod user;

use std::sync::Arc;

use hermes_auth::{Role, ShortTokenClaims, TokenService};
use hermes_core::{DispatchError, DispatchResult, JsonMap};
use hermes_middleware::stages::SHORT_TOKEN;
use hermes_router::{OperationInput, Unit};
use serde_json::Value;

use crate::store::{Record, RecordStore};

pub use classroom::ClassroomUnit;
pub use school::SchoolUnit;
pub use student::StudentUnit;
pub use token::TokenUnit;
pub use user::{seed_superadmin, UserUnit};

/// Users collection.
pub const USERS: &str = "users";
/// Schools collection.
pub const SCHOOLS: &str = "schools";
/// Classrooms collection.
pub const CLASSROOMS: &str = "classrooms";
/// Students collection.
pub const STUDENTS: &str = "students";

/// Message for callers whose role may not run an operation.
pub const INVALID_ROLE: &str = "Forbidden: Invalid role";

/// Builds every unit over shared services.
pub fn all(store: &Arc<dyn RecordStore>, tokens: &Arc<TokenService>) -> Vec<Arc<Unit>> {
    vec![
        Arc::new(TokenUnit::unit(tokens)),
        Arc::new(UserUnit::unit(store, tokens)),
        Arc::new(SchoolUnit::unit(store)),
        Arc::new(ClassroomUnit::unit(store)),
        Arc::new(StudentUnit::unit(store)),
    ]
}

/// The user behind a short token, as currently stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Actor {
    pub id: String,
    pub role: Role,
    pub school_id: Option<String>,
}

impl Actor {
    /// Loads the caller and checks its role against `allowed`.
    pub async fn require(
        store: &dyn RecordStore,
        input: &OperationInput,
        allowed: &[Role],
        denied: &str,
    ) -> DispatchResult<Self> {
        let claims: ShortTokenClaims = input.contribution(SHORT_TOKEN)?;
        let actor = store
            .find_by_id(USERS, &claims.user_id)
            .await?
            .and_then(|record| Self::from_record(&claims.user_id, &record));
        match actor {
            Some(actor) if allowed.contains(&actor.role) => Ok(actor),
            Some(actor) => {
                tracing::debug!(user_id = %actor.id, role = %actor.role, denied, "role rejected");
                Err(DispatchError::authorization(denied))
            }
            None => {
                tracing::debug!(user_id = %claims.user_id, "token names an unknown user");
                Err(DispatchError::authorization(denied))
            }
        }
    }

    fn from_record(id: &str, record: &Record) -> Option<Self> {
        let role = str_field(record, "role")?.parse().ok()?;
        Some(Self {
            id: id.to_string(),
            role,
            school_id: str_field(record, "schoolId").map(str::to_string),
        })
    }

    /// Fails unless the caller may manage `what` in `school_id`.
    pub fn ensure_manages(&self, school_id: &str, what: &str) -> DispatchResult<()> {
        if self.role == Role::SchoolAdmin && self.school_id.as_deref() != Some(school_id) {
            return Err(DispatchError::authorization(format!(
                "Forbidden: You can only manage {what} for your school"
            )));
        }
        Ok(())
    }
}

/// A string field of a record.
pub(crate) fn str_field<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// Record by id or a 404 naming it.
pub(crate) async fn find_or_404(
    store: &dyn RecordStore,
    collection: &str,
    label: &str,
    id: &str,
) -> DispatchResult<Record> {
    store
        .find_by_id(collection, id)
        .await?
        .ok_or_else(|| DispatchError::not_found_resource(label, id))
}

/// Builds a `{ key: value }` filter.
pub(crate) fn filter(key: &str, value: &str) -> JsonMap {
    let mut map = JsonMap::new();
    map.insert(key.to_string(), Value::String(value.to_string()));
    map
}

/// Adds the referenced record under `as_key`, when it still exists.
pub(crate) async fn populate(
    store: &dyn RecordStore,
    record: &mut Record,
    id_key: &str,
    collection: &str,
    as_key: &str,
) -> DispatchResult<()> {
    let Some(id) = str_field(record, id_key).map(str::to_string) else {
        return Ok(());
    };
    let related = store.find_by_id(collection, &id).await?;
    record.insert(as_key.to_string(), related.map_or(Value::Null, Value::Object));
    Ok(())
}

/// `updates` object from the input, validated.
pub(crate) fn updates(input: &OperationInput, schema: &crate::validation::Schema) -> DispatchResult<JsonMap> {
    schema.validate_value("updates", input.get("updates"))
}

/// Picks `keys` out of the input.
pub(crate) fn pick(input: &OperationInput, keys: &[&str]) -> JsonMap {
    keys.iter()
        .filter_map(|key| input.get(key).map(|v| ((*key).to_string(), v.clone())))
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the unit tests.

    use super::*;
    use crate::store::MemoryStore;
    use hermes_core::ResponseHandle;
    use serde_json::json;

    pub fn store() -> Arc<dyn RecordStore> {
        Arc::new(MemoryStore::new().with_unique(USERS, "email").with_unique(USERS, "username"))
    }

    pub async fn seed_user(store: &Arc<dyn RecordStore>, role: &str, school_id: Option<&str>) -> String {
        let mut record = json!({
            "username": format!("{role}-{}", uuid::Uuid::now_v7()),
            "email": format!("{}@example.com", uuid::Uuid::now_v7()),
            "role": role,
            "key": "k",
        })
        .as_object()
        .cloned()
        .unwrap_or_default();
        if let Some(school) = school_id {
            record.insert("schoolId".into(), json!(school));
        }
        let created = store.create(USERS, record).await.unwrap();
        created["id"].as_str().unwrap().to_string()
    }

    pub async fn seed(store: &Arc<dyn RecordStore>, collection: &str, value: Value) -> String {
        let created = store
            .create(collection, value.as_object().cloned().unwrap())
            .await
            .unwrap();
        created["id"].as_str().unwrap().to_string()
    }

    /// Input as the HTTP front would build it for `user_id`.
    pub fn input(user_id: &str, body: Value) -> OperationInput {
        let mut data = body.as_object().cloned().unwrap();
        data.insert(
            SHORT_TOKEN.into(),
            json!({
                "userId": user_id,
                "userKey": "k",
                "sessionId": "s",
                "deviceId": "d",
                "iat": 0,
                "exp": 0,
            }),
        );
        OperationInput::new(data, ResponseHandle::new())
    }

    pub fn anonymous(body: Value) -> OperationInput {
        OperationInput::detached(body.as_object().cloned().unwrap())
    }
}
