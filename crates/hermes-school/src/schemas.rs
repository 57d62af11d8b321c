//! Input schemas for the school units.

use std::sync::OnceLock;

use crate::validation::{Field, Schema};

/// Roles a user record may hold.
pub const ROLES: &[&str] = &["superadmin", "school_admin", "student"];

const USERNAME_RANGE: &str = "Username must be between 3 and 50 characters.";
const EMAIL_FORMAT: &str = "Please provide a valid email address.";
const PASSWORD_RANGE: &str = "Password must be at least 6 characters long.";
const ROLE_FORMAT: &str = "Role must be one of: superadmin, school_admin, or student.";
const SCHOOL_ID_RANGE: &str = "School ID must be between 10 and 100 characters.";

const STUDENT_NAME_RANGE: &str = "Name must be between 3 and 50 characters.";
const STUDENT_AGE_RANGE: &str = "Age must be between 5 and 100 years.";
const GRADE_RANGE: &str = "Grade must be between 1 and 10 characters.";
const PROFILE_FORMAT: &str = "Profile must be a valid JSON object.";

macro_rules! schema {
    ($name:ident, $build:expr) => {
        #[doc = concat!("The `", stringify!($name), "` schema.")]
        pub fn $name() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| $build)
        }
    };
}

fn username() -> Field {
    Field::string("username")
        .length(3, 50)
        .range_message(USERNAME_RANGE)
}

fn email() -> Field {
    Field::string("email").email().format_message(EMAIL_FORMAT)
}

fn password() -> Field {
    Field::string("password").min_length(6).range_message(PASSWORD_RANGE)
}

fn role() -> Field {
    Field::string("role").one_of(ROLES).format_message(ROLE_FORMAT)
}

fn school_ref() -> Field {
    Field::string("schoolId")
        .length(10, 100)
        .range_message(SCHOOL_ID_RANGE)
}

schema!(
    user_create,
    Schema::new()
        .field(username().required().required_message("Username is required."))
        .field(email().required().required_message("Email Address is required."))
        .field(password().required().required_message("Password is required."))
        .field(role().default_value("student"))
        .field(school_ref())
);

schema!(
    user_login,
    Schema::new()
        .field(email().required().required_message("Email Address is required."))
        .field(password().required().required_message("Password is required."))
);

schema!(
    user_update,
    Schema::new()
        .field(username())
        .field(email())
        .field(password())
        .field(role())
        .field(school_ref())
);

schema!(
    school_create,
    Schema::new()
        .field(Field::string("name").required().length(3, 100))
        .field(Field::string("address").required().length(10, 200))
);

schema!(
    school_update,
    Schema::new()
        .field(Field::string("name").length(3, 100))
        .field(Field::string("address").length(10, 200))
);

schema!(
    classroom_create,
    Schema::new()
        .field(Field::string("schoolId").required())
        .field(Field::string("name").required().length(3, 100))
        .field(Field::number("capacity").required().range(1.0, 40.0))
        .field(Field::object("resources"))
);

schema!(
    classroom_update,
    Schema::new()
        .field(Field::string("name").length(3, 100))
        .field(Field::number("capacity").range(1.0, 500.0))
        .field(Field::object("resources"))
);

schema!(
    student_create,
    Schema::new()
        .field(
            Field::string("name")
                .required()
                .length(3, 50)
                .range_message(STUDENT_NAME_RANGE)
                .required_message("Name is required."),
        )
        .field(
            Field::number("age")
                .required()
                .range(5.0, 100.0)
                .range_message(STUDENT_AGE_RANGE)
                .required_message("Age is required."),
        )
        .field(
            Field::string("grade")
                .required()
                .length(1, 10)
                .range_message(GRADE_RANGE)
                .required_message("Grade is required."),
        )
        .field(
            Field::string("schoolId")
                .required()
                .length(10, 100)
                .range_message("School ID must be valid.")
                .required_message("School ID is required."),
        )
        .field(
            Field::string("classId")
                .required()
                .length(10, 100)
                .range_message("Classroom ID must be valid.")
                .required_message("Classroom ID is required."),
        )
        .field(Field::object("profile").format_message(PROFILE_FORMAT))
);

schema!(
    student_update,
    Schema::new()
        .field(Field::string("name").length(3, 50).range_message(STUDENT_NAME_RANGE))
        .field(Field::number("age").range(5.0, 100.0).range_message(STUDENT_AGE_RANGE))
        .field(Field::string("grade").length(1, 10).range_message(GRADE_RANGE))
        .field(Field::object("profile").format_message(PROFILE_FORMAT))
);
