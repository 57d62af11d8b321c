//! Students, enrolled in a classroom of a school.

use std::sync::Arc;

use hermes_auth::Role;
use hermes_core::{DispatchError, DispatchResult};
use hermes_router::{OperationInput, Outcome, Unit};
use serde_json::{json, Value};

use super::{
    filter, find_or_404, pick, populate, str_field, updates, Actor, CLASSROOMS, INVALID_ROLE, SCHOOLS,
    STUDENTS,
};
use crate::schemas;
use crate::store::RecordStore;

const MANAGERS: &[Role] = &[Role::Superadmin, Role::SchoolAdmin];

/// The `student` unit.
pub struct StudentUnit {
    store: Arc<dyn RecordStore>,
}

impl StudentUnit {
    /// Builds the unit.
    pub fn unit(store: &Arc<dyn RecordStore>) -> Unit {
        let state = Arc::new(Self {
            store: Arc::clone(store),
        });
        Unit::builder("student")
            .expose("post=create")
            .expose("put=update")
            .expose("delete=delete")
            .expose("get=get")
            .expose("get=list")
            .method(
                "create",
                "{ __shortToken, schoolId, classId, name, age, grade, profile }",
                &state,
                Self::create,
            )
            .method("update", "{ __shortToken, studentId, updates }", &state, Self::update)
            .method("delete", "{ __shortToken, studentId }", &state, Self::delete)
            .method("get", "{ studentId }", &state, Self::get)
            .method("list", "{ schoolId }", &state, Self::list)
            .intercept_operations()
            .build()
    }

    async fn create(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        let fields = pick(&input, &["schoolId", "classId", "name", "age", "grade", "profile"]);
        let valid = schemas::student_create().validate(&fields)?;
        let school_id = str_field(&valid, "schoolId").unwrap_or_default();
        let class_id = str_field(&valid, "classId").unwrap_or_default();

        let actor = Actor::require(self.store.as_ref(), &input, MANAGERS, INVALID_ROLE).await?;
        actor.ensure_manages(school_id, "students")?;
        find_or_404(self.store.as_ref(), SCHOOLS, "School", school_id).await?;

        let enrolled = self
            .store
            .find_by_id(CLASSROOMS, class_id)
            .await?
            .is_some_and(|classroom| str_field(&classroom, "schoolId") == Some(school_id));
        if !enrolled {
            return Err(DispatchError::not_found(format!(
                "Classroom with ID {class_id} does not belong to School {school_id}"
            )));
        }

        let student = self.store.create(STUDENTS, valid).await?;
        Ok(Outcome::Data(Value::Object(student)))
    }

    async fn update(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        let patch = updates(&input, schemas::student_update())?;
        let actor = Actor::require(self.store.as_ref(), &input, MANAGERS, INVALID_ROLE).await?;
        let student_id = input.require_str("studentId")?;

        let student = find_or_404(self.store.as_ref(), STUDENTS, "Student", student_id).await?;
        actor.ensure_manages(str_field(&student, "schoolId").unwrap_or_default(), "students")?;

        let updated = self
            .store
            .update(STUDENTS, student_id, patch)
            .await?
            .unwrap_or(student);
        Ok(Outcome::Data(Value::Object(updated)))
    }

    async fn delete(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        let actor = Actor::require(self.store.as_ref(), &input, MANAGERS, INVALID_ROLE).await?;
        let student_id = input.require_str("studentId")?;

        let student = find_or_404(self.store.as_ref(), STUDENTS, "Student", student_id).await?;
        actor.ensure_manages(str_field(&student, "schoolId").unwrap_or_default(), "students")?;

        self.store.delete(STUDENTS, student_id).await?;
        Ok(Outcome::Data(json!({ "success": true })))
    }

    async fn get(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        let student_id = input.require_str("studentId")?;
        let mut student = find_or_404(self.store.as_ref(), STUDENTS, "Student", student_id).await?;
        populate(self.store.as_ref(), &mut student, "schoolId", SCHOOLS, "school").await?;
        populate(self.store.as_ref(), &mut student, "classId", CLASSROOMS, "classroom").await?;
        Ok(Outcome::Data(Value::Object(student)))
    }

    async fn list(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        let school_id = input.require_str("schoolId")?;
        let mut students = self.store.find_where(STUDENTS, filter("schoolId", school_id)).await?;
        for student in &mut students {
            populate(self.store.as_ref(), student, "classId", CLASSROOMS, "classroom").await?;
        }
        Ok(Outcome::Data(Value::Array(
            students.into_iter().map(Value::Object).collect(),
        )))
    }
}

impl std::fmt::Debug for StudentUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudentUnit").finish_non_exhaustive()
    }
}
