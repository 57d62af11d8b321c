//! End-to-end flows through the assembled service.

use hermes_bus::BusEnvelope;
use hermes_config::{AuthConfig, BootstrapConfig, HermesConfig};
use hermes_school::{App, RecordStore};
use hermes_test::TestClient;
use serde_json::{json, Value};

const ADMIN_EMAIL: &str = "root@hermes.test";
const ADMIN_PASSWORD: &str = "correct-horse";

fn config() -> HermesConfig {
    HermesConfig {
        auth: AuthConfig {
            long_token_secret: Some("long-secret".to_string()),
            short_token_secret: Some("short-secret".to_string()),
        },
        bootstrap: BootstrapConfig {
            superadmin_username: Some("root".to_string()),
            superadmin_email: Some(ADMIN_EMAIL.to_string()),
            superadmin_password: Some(ADMIN_PASSWORD.to_string()),
        },
        ..HermesConfig::default()
    }
}

async fn app() -> (App, TestClient) {
    let app = App::build(config()).await.unwrap();
    let client = TestClient::new(app.front().clone()).with_default_header("user-agent", "scenarios");
    (app, client)
}

/// Logs in and trades the long token for a short one.
async fn session(client: &TestClient, email: &str, password: &str) -> String {
    let login = client
        .post("/api/user/login")
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await;
    login.assert_status(200).assert_ok();
    let long_token = login.data()["longToken"].as_str().unwrap().to_string();

    let short = client
        .post("/api/token/v1_createShortToken")
        .token(long_token)
        .send()
        .await;
    short.assert_status(200).assert_ok();
    short.data()["shortToken"].as_str().unwrap().to_string()
}

async fn create_school(client: &TestClient, token: &str, name: &str) -> String {
    let response = client
        .post("/api/school/create")
        .token(token)
        .json(&json!({ "name": name, "address": "1 Long Street, Springfield" }))
        .send()
        .await;
    response.assert_status(200).assert_ok();
    response.data()["id"].as_str().unwrap().to_string()
}

async fn create_school_admin(client: &TestClient, token: &str, school_id: &str, email: &str) {
    client
        .post("/api/user/create")
        .token(token)
        .json(&json!({
            "username": email.split('@').next().unwrap(),
            "email": email,
            "password": "admin-pass",
            "role": "school_admin",
            "schoolId": school_id,
        }))
        .send()
        .await
        .assert_status(200)
        .assert_ok();
}

#[tokio::test]
async fn test_protected_operation_without_token_is_unauthorized() {
    let (app, client) = app().await;
    let response = client
        .post("/api/school/create")
        .json(&json!({ "name": "North High", "address": "1 Long Street, Springfield" }))
        .send()
        .await;

    response.assert_status(401);
    assert_eq!(
        response.value(),
        json!({ "ok": false, "data": {}, "errors": ["Unauthorized"], "message": "Unauthorized" })
    );
    let schools = app
        .store()
        .find_where("schools", serde_json::Map::new())
        .await
        .unwrap();
    assert!(schools.is_empty());
}

#[tokio::test]
async fn test_login_rejections() {
    let (_app, client) = app().await;

    let unknown = client
        .post("/api/user/login")
        .json(&json!({ "email": "ghost@hermes.test", "password": "whatever" }))
        .send()
        .await;
    unknown.assert_status(404);
    assert_eq!(unknown.message(), "User not found");

    let wrong = client
        .post("/api/user/login")
        .json(&json!({ "email": ADMIN_EMAIL, "password": "not-the-one" }))
        .send()
        .await;
    wrong.assert_status(401);
    assert_eq!(wrong.message(), "Invalid credentials");

    let invalid = client
        .post("/api/user/login")
        .json(&json!({ "email": "nope" }))
        .send()
        .await;
    invalid.assert_status(400);
    assert_eq!(invalid.message(), "Validation failed");
    assert_eq!(invalid.errors().len(), 2);
}

#[tokio::test]
async fn test_long_token_cannot_stand_in_for_short_token() {
    let (_app, client) = app().await;
    let login = client
        .post("/api/user/login")
        .json(&json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
        .send()
        .await;
    let long_token = login.data()["longToken"].as_str().unwrap().to_string();

    client
        .post("/api/school/create")
        .token(long_token)
        .json(&json!({ "name": "North High", "address": "1 Long Street, Springfield" }))
        .send()
        .await
        .assert_status(401);
}

#[tokio::test]
async fn test_superadmin_manages_schools() {
    let (_app, client) = app().await;
    let token = session(&client, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let school_id = create_school(&client, &token, "North High").await;

    let fetched = client
        .get("/api/school/get")
        .json(&json!({ "schoolId": school_id }))
        .send()
        .await;
    fetched.assert_status(200);
    assert_eq!(fetched.data()["name"], "North High");

    let updated = client
        .put("/api/school/update")
        .token(&token)
        .json(&json!({ "schoolId": school_id, "updates": { "name": "North Academy" } }))
        .send()
        .await;
    updated.assert_status(200);
    assert_eq!(updated.data()["name"], "North Academy");

    let listed = client.get("/api/school/list").send().await;
    assert_eq!(listed.data().as_array().map(Vec::len), Some(1));

    client
        .delete("/api/school/delete")
        .token(&token)
        .json(&json!({ "schoolId": school_id }))
        .send()
        .await
        .assert_status(200);

    let missing = client
        .get("/api/school/get")
        .json(&json!({ "schoolId": school_id }))
        .send()
        .await;
    missing.assert_status(404);
    assert_eq!(missing.message(), format!("School with ID {school_id} not found"));
}

#[tokio::test]
async fn test_wrong_verb_is_not_found() {
    let (_app, client) = app().await;
    client.get("/api/school/create").send().await.assert_status(404);
    client.post("/api/nowhere/create").send().await.assert_status(404);
}

#[tokio::test]
async fn test_school_admin_is_scoped_to_own_school() {
    let (_app, client) = app().await;
    let root = session(&client, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let north = create_school(&client, &root, "North High").await;
    let south = create_school(&client, &root, "South High").await;
    create_school_admin(&client, &root, &north, "north@hermes.test").await;

    let admin = session(&client, "north@hermes.test", "admin-pass").await;

    let denied = client
        .post("/api/school/create")
        .token(&admin)
        .json(&json!({ "name": "Rogue School", "address": "9 Back Alley, Nowhere" }))
        .send()
        .await;
    denied.assert_status(403);
    assert_eq!(denied.message(), "Forbidden: Invalid role");

    let elsewhere = client
        .post("/api/classroom/create")
        .token(&admin)
        .json(&json!({ "schoolId": south, "name": "Room 1", "capacity": 20 }))
        .send()
        .await;
    elsewhere.assert_status(403);
    assert_eq!(
        elsewhere.message(),
        "Forbidden: You can only manage classrooms for your school"
    );

    let classroom = client
        .post("/api/classroom/create")
        .token(&admin)
        .json(&json!({ "schoolId": north, "name": "Room 1", "capacity": 20 }))
        .send()
        .await;
    classroom.assert_status(200);
    let classroom_id = classroom.data()["id"].as_str().unwrap().to_string();

    let student = client
        .post("/api/student/create")
        .token(&admin)
        .json(&json!({
            "schoolId": north,
            "classId": classroom_id,
            "name": "Ada Lovelace",
            "age": 12,
            "grade": "7",
        }))
        .send()
        .await;
    student.assert_status(200);
    let student_id = student.data()["id"].as_str().unwrap().to_string();

    let fetched = client
        .get("/api/student/get")
        .json(&json!({ "studentId": student_id }))
        .send()
        .await;
    fetched.assert_status(200);
    assert_eq!(fetched.data()["classroom"]["name"], "Room 1");
    assert_eq!(fetched.data()["school"]["name"], "North High");
}

#[tokio::test]
async fn test_student_in_foreign_classroom_is_rejected() {
    let (_app, client) = app().await;
    let root = session(&client, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let north = create_school(&client, &root, "North High").await;
    let south = create_school(&client, &root, "South High").await;

    let classroom = client
        .post("/api/classroom/create")
        .token(&root)
        .json(&json!({ "schoolId": south, "name": "Room 9", "capacity": 10 }))
        .send()
        .await;
    let classroom_id = classroom.data()["id"].as_str().unwrap().to_string();

    let response = client
        .post("/api/student/create")
        .token(&root)
        .json(&json!({
            "schoolId": north,
            "classId": classroom_id,
            "name": "Grace Hopper",
            "age": 11,
            "grade": "6",
        }))
        .send()
        .await;
    response.assert_status(404);
    assert_eq!(
        response.message(),
        format!("Classroom with ID {classroom_id} does not belong to School {north}")
    );
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let (_app, client) = app().await;
    let root = session(&client, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let response = client
        .post("/api/user/create")
        .token(&root)
        .json(&json!({ "username": "other", "email": ADMIN_EMAIL, "password": "secret-pass" }))
        .send()
        .await;
    response.assert_status(409);
    assert_eq!(response.message(), "email already exists");
}

#[tokio::test]
async fn test_bus_reaches_the_same_operations() {
    let (app, client) = app().await;
    let root = session(&client, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    create_school(&client, &root, "North High").await;

    let bus_front = app.spawn_bus_front().unwrap();
    let bus = app.bus();

    let schools = bus
        .call(BusEnvelope::new("school", "list"))
        .await
        .unwrap();
    assert_eq!(schools.as_array().map(Vec::len), Some(1));
    assert_eq!(schools[0]["name"], "North High");

    let missing = bus
        .call(BusEnvelope::new("school", "rename"))
        .await
        .unwrap();
    assert_eq!(
        missing,
        json!({ "error": "Module school or method rename not found" })
    );

    let failed: Value = bus
        .call(BusEnvelope::new("school", "get").with_data(json!({ "schoolId": "0000000000" })))
        .await
        .unwrap();
    assert_eq!(
        failed,
        json!({ "error": "Failed to execute get: School with ID 0000000000 not found" })
    );

    bus_front.shutdown().await;
}

#[tokio::test]
async fn test_missing_secrets_refuse_to_build() {
    let err = App::build(HermesConfig::default()).await.unwrap_err();
    assert!(err.to_string().contains("long_token_secret"));
}

#[tokio::test]
async fn test_missing_classroom_names_the_id() {
    let (_app, client) = app().await;
    let response = client
        .get("/api/classroom/get")
        .json(&json!({ "classroomId": "no-such-classroom" }))
        .send()
        .await;
    response.assert_status(404);
    assert!(!response.ok());
    assert_eq!(
        response.message(),
        "Classroom with ID no-such-classroom not found"
    );
}

#[tokio::test]
async fn test_bus_message_for_unknown_unit_gets_one_reply() {
    let (app, _client) = app().await;
    let bus_front = app.spawn_bus_front().unwrap();

    let reply = app
        .bus()
        .call(BusEnvelope::new("library", "lend"))
        .await
        .unwrap();
    assert_eq!(
        reply,
        json!({ "error": "Module library or method lend not found" })
    );

    bus_front.shutdown().await;
}
