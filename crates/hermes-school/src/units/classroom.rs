//! Classrooms, scoped to a school.

use std::sync::Arc;

use hermes_auth::Role;
use hermes_core::DispatchResult;
use hermes_router::{OperationInput, Outcome, Unit};
use serde_json::{json, Value};

use super::{
    filter, find_or_404, pick, populate, str_field, updates, Actor, CLASSROOMS, INVALID_ROLE, SCHOOLS,
};
use crate::schemas;
use crate::store::RecordStore;

const MANAGERS: &[Role] = &[Role::Superadmin, Role::SchoolAdmin];

/// The `classroom` unit.
pub struct ClassroomUnit {
    store: Arc<dyn RecordStore>,
}

impl ClassroomUnit {
    /// Builds the unit.
    pub fn unit(store: &Arc<dyn RecordStore>) -> Unit {
        let state = Arc::new(Self {
            store: Arc::clone(store),
        });
        Unit::builder("classroom")
            .expose("post=create")
            .expose("get=get")
            .expose("put=update")
            .expose("delete=delete")
            .expose("get=list")
            .method(
                "create",
                "{ __shortToken, schoolId, name, capacity, resources }",
                &state,
                Self::create,
            )
            .method("get", "{ classroomId }", &state, Self::get)
            .method("update", "{ __shortToken, classroomId, updates }", &state, Self::update)
            .method("delete", "{ __shortToken, classroomId }", &state, Self::delete)
            .method("list", "{ schoolId }", &state, Self::list)
            .intercept_operations()
            .build()
    }

    async fn create(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        let fields = pick(&input, &["schoolId", "name", "capacity", "resources"]);
        let valid = schemas::classroom_create().validate(&fields)?;
        let school_id = str_field(&valid, "schoolId").unwrap_or_default();

        let actor = Actor::require(self.store.as_ref(), &input, MANAGERS, INVALID_ROLE).await?;
        actor.ensure_manages(school_id, "classrooms")?;
        find_or_404(self.store.as_ref(), SCHOOLS, "School", school_id).await?;

        let classroom = self.store.create(CLASSROOMS, valid).await?;
        Ok(Outcome::Data(Value::Object(classroom)))
    }

    async fn get(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        let classroom_id = input.require_str("classroomId")?;
        let mut classroom = find_or_404(self.store.as_ref(), CLASSROOMS, "Classroom", classroom_id).await?;
        populate(self.store.as_ref(), &mut classroom, "schoolId", SCHOOLS, "school").await?;
        Ok(Outcome::Data(Value::Object(classroom)))
    }

    async fn update(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        let patch = updates(&input, schemas::classroom_update())?;
        let actor = Actor::require(self.store.as_ref(), &input, MANAGERS, INVALID_ROLE).await?;
        let classroom_id = input.require_str("classroomId")?;

        let classroom = find_or_404(self.store.as_ref(), CLASSROOMS, "Classroom", classroom_id).await?;
        actor.ensure_manages(str_field(&classroom, "schoolId").unwrap_or_default(), "classrooms")?;

        let updated = self
            .store
            .update(CLASSROOMS, classroom_id, patch)
            .await?
            .unwrap_or(classroom);
        Ok(Outcome::Data(Value::Object(updated)))
    }

    async fn delete(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        let actor = Actor::require(self.store.as_ref(), &input, MANAGERS, INVALID_ROLE).await?;
        let classroom_id = input.require_str("classroomId")?;

        let classroom = find_or_404(self.store.as_ref(), CLASSROOMS, "Classroom", classroom_id).await?;
        actor.ensure_manages(str_field(&classroom, "schoolId").unwrap_or_default(), "classrooms")?;

        self.store.delete(CLASSROOMS, classroom_id).await?;
        Ok(Outcome::Data(json!({ "success": true })))
    }

    async fn list(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        let school_id = input.require_str("schoolId")?;
        let classrooms = self.store.find_where(CLASSROOMS, filter("schoolId", school_id)).await?;
        Ok(Outcome::Data(Value::Array(
            classrooms.into_iter().map(Value::Object).collect(),
        )))
    }
}

impl std::fmt::Debug for ClassroomUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassroomUnit").finish_non_exhaustive()
    }
}
