//! Schools and their administrators.

use std::sync::Arc;

use hermes_auth::Role;
use hermes_core::{DispatchError, DispatchResult, JsonMap};
use hermes_router::{OperationInput, Outcome, Unit};
use serde_json::{json, Value};

use super::{filter, find_or_404, pick, str_field, updates, Actor, INVALID_ROLE, SCHOOLS, USERS};
use crate::schemas;
use crate::store::RecordStore;

/// The `school` unit.
pub struct SchoolUnit {
    store: Arc<dyn RecordStore>,
}

impl SchoolUnit {
    /// Builds the unit.
    pub fn unit(store: &Arc<dyn RecordStore>) -> Unit {
        let state = Arc::new(Self {
            store: Arc::clone(store),
        });
        Unit::builder("school")
            .expose("post=create")
            .expose("get=get")
            .expose("put=update")
            .expose("delete=delete")
            .expose("get=list")
            .expose("post=assignSchoolAdmin")
            .method("create", "{ __shortToken, name, address }", &state, Self::create)
            .method("get", "{ schoolId }", &state, Self::get)
            .method("update", "{ __shortToken, schoolId, updates }", &state, Self::update)
            .method("delete", "{ __shortToken, schoolId }", &state, Self::delete)
            .method("list", "", &state, Self::list)
            .method(
                "assignSchoolAdmin",
                "{ __shortToken, schoolId, adminId }",
                &state,
                Self::assign_school_admin,
            )
            .intercept_operations()
            .build()
    }

    async fn create(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        Actor::require(self.store.as_ref(), &input, &[Role::Superadmin], INVALID_ROLE).await?;
        let valid = schemas::school_create().validate(&pick(&input, &["name", "address"]))?;
        let school = self.store.create(SCHOOLS, valid).await?;
        tracing::info!(school_id = str_field(&school, "id"), "school created");
        Ok(Outcome::Data(Value::Object(school)))
    }

    async fn get(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        let school_id = input.require_str("schoolId")?;
        let school = find_or_404(self.store.as_ref(), SCHOOLS, "School", school_id).await?;
        Ok(Outcome::Data(Value::Object(school)))
    }

    async fn update(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        Actor::require(
            self.store.as_ref(),
            &input,
            &[Role::Superadmin],
            "Forbidden: Only superadmins can update schools",
        )
        .await?;
        let patch = updates(&input, schemas::school_update())?;
        let school_id = input.require_str("schoolId")?;
        let school = self
            .store
            .update(SCHOOLS, school_id, patch)
            .await?
            .ok_or_else(|| DispatchError::not_found_resource("School", school_id))?;
        Ok(Outcome::Data(Value::Object(school)))
    }

    async fn delete(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        Actor::require(
            self.store.as_ref(),
            &input,
            &[Role::Superadmin],
            "Forbidden: Only superadmins can delete schools",
        )
        .await?;
        let school_id = input.require_str("schoolId")?;
        if self.store.delete(SCHOOLS, school_id).await?.is_none() {
            return Err(DispatchError::not_found(format!(
                "Failed to delete school with ID {school_id}"
            )));
        }

        let members = self.store.find_where(USERS, filter("schoolId", school_id)).await?;
        let mut unset = JsonMap::new();
        unset.insert("schoolId".into(), Value::Null);
        for user in &members {
            if let Some(user_id) = str_field(user, "id") {
                self.store.update(USERS, user_id, unset.clone()).await?;
            }
        }
        tracing::info!(%school_id, detached_users = members.len(), "school deleted");
        Ok(Outcome::Data(json!({ "success": true })))
    }

    async fn list(self: Arc<Self>, _input: OperationInput) -> DispatchResult<Outcome> {
        let schools = self.store.find_where(SCHOOLS, JsonMap::new()).await?;
        Ok(Outcome::Data(Value::Array(
            schools.into_iter().map(Value::Object).collect(),
        )))
    }

    async fn assign_school_admin(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        Actor::require(self.store.as_ref(), &input, &[Role::Superadmin], INVALID_ROLE).await?;
        let school_id = input.require_str("schoolId")?;
        let admin_id = input.require_str("adminId")?;

        let school = find_or_404(self.store.as_ref(), SCHOOLS, "School", school_id).await?;
        let admin = self
            .store
            .find_by_id(USERS, admin_id)
            .await?
            .filter(|user| str_field(user, "role") == Some(Role::SchoolAdmin.as_str()))
            .ok_or_else(|| DispatchError::validation("Invalid school_admin ID or role"))?;

        let mut patch = JsonMap::new();
        patch.insert("schoolId".into(), Value::String(school_id.to_string()));
        self.store.update(USERS, admin_id, patch).await?;

        Ok(Outcome::Data(json!({
            "message": format!(
                "Admin {} assigned to school {}",
                str_field(&admin, "username").unwrap_or(admin_id),
                str_field(&school, "name").unwrap_or(school_id),
            )
        })))
    }
}

impl std::fmt::Debug for SchoolUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchoolUnit").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    async fn data(unit: &Unit, op: &str, input: OperationInput) -> DispatchResult<Value> {
        match unit.invoke(op, input).await? {
            Outcome::Data(value) => Ok(value),
            Outcome::SelfHandled => panic!("unexpected self-handled"),
        }
    }

    fn north() -> Value {
        json!({ "name": "North High", "address": "12 Long Road, Springfield" })
    }

    #[tokio::test]
    async fn test_create_get_and_list() {
        let store = store();
        let root = seed_user(&store, "superadmin", None).await;
        let unit = SchoolUnit::unit(&store);

        let created = data(&unit, "create", input(&root, north())).await.unwrap();
        let id = created["id"].as_str().unwrap();

        let fetched = data(&unit, "get", anonymous(json!({ "schoolId": id }))).await.unwrap();
        assert_eq!(fetched["name"], "North High");

        let all = data(&unit, "list", anonymous(json!({}))).await.unwrap();
        assert_eq!(all.as_array().unwrap().len(), 1);

        let err = data(&unit, "get", anonymous(json!({ "schoolId": "nope" }))).await.unwrap_err();
        assert_eq!(err.message(), "School with ID nope not found");
    }

    #[tokio::test]
    async fn test_only_superadmins_write() {
        let store = store();
        let admin = seed_user(&store, "school_admin", None).await;
        let unit = SchoolUnit::unit(&store);

        let err = data(&unit, "create", input(&admin, north())).await.unwrap_err();
        assert_eq!(err.message(), "Forbidden: Invalid role");
        let err = data(&unit, "update", input(&admin, json!({ "schoolId": "x", "updates": {} })))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Forbidden: Only superadmins can update schools");
        let err = data(&unit, "delete", input(&admin, json!({ "schoolId": "x" })))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Forbidden: Only superadmins can delete schools");
    }

    #[tokio::test]
    async fn test_update_validates_and_applies() {
        let store = store();
        let root = seed_user(&store, "superadmin", None).await;
        let unit = SchoolUnit::unit(&store);
        let id = seed(&store, SCHOOLS, north()).await;

        let updated = data(
            &unit,
            "update",
            input(&root, json!({ "schoolId": id, "updates": { "name": "South High" } })),
        )
        .await
        .unwrap();
        assert_eq!(updated["name"], "South High");
        assert_eq!(updated["address"], "12 Long Road, Springfield");

        let err = data(
            &unit,
            "update",
            input(&root, json!({ "schoolId": id, "updates": { "name": "S" } })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_delete_detaches_members() {
        let store = store();
        let root = seed_user(&store, "superadmin", None).await;
        let id = seed(&store, SCHOOLS, north()).await;
        let member = seed_user(&store, "school_admin", Some(&id)).await;
        let unit = SchoolUnit::unit(&store);

        let out = data(&unit, "delete", input(&root, json!({ "schoolId": id }))).await.unwrap();
        assert_eq!(out, json!({ "success": true }));
        let member = store.find_by_id(USERS, &member).await.unwrap().unwrap();
        assert!(!member.contains_key("schoolId"));

        let err = data(&unit, "delete", input(&root, json!({ "schoolId": id }))).await.unwrap_err();
        assert_eq!(err.message(), format!("Failed to delete school with ID {id}"));
    }

    #[tokio::test]
    async fn test_assign_school_admin() {
        let store = store();
        let root = seed_user(&store, "superadmin", None).await;
        let admin = seed_user(&store, "school_admin", None).await;
        let student = seed_user(&store, "student", None).await;
        let school = seed(&store, SCHOOLS, north()).await;
        let unit = SchoolUnit::unit(&store);

        let out = data(
            &unit,
            "assignSchoolAdmin",
            input(&root, json!({ "schoolId": school, "adminId": admin })),
        )
        .await
        .unwrap();
        assert!(out["message"].as_str().unwrap().ends_with("assigned to school North High"));
        let stored = store.find_by_id(USERS, &admin).await.unwrap().unwrap();
        assert_eq!(stored["schoolId"], json!(school));

        let err = data(
            &unit,
            "assignSchoolAdmin",
            input(&root, json!({ "schoolId": school, "adminId": student })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code().as_u16(), 400);
        assert_eq!(err.message(), "Invalid school_admin ID or role");

        let err = data(
            &unit,
            "assignSchoolAdmin",
            input(&root, json!({ "schoolId": "gone", "adminId": admin })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code().as_u16(), 404);
    }
}
