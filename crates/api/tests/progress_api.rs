//! HTTP-level integration tests for the progress endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, get_auth, put_json_auth, register_and_login};
use serde_json::json;
use sqlx::PgPool;
use studyplan_core::document::empty_document_value;
use studyplan_core::envelope::{derive_key_with, encrypt, KDF_SALT};
use studyplan_db::repositories::{ProgressRepo, UserRepo};

fn canonical(vod: bool, test: bool) -> serde_json::Value {
    let stamp = |c: bool| c.then_some("2024-03-01T09:30:00.000Z");
    json!({
        "vod": { "checked": vod, "timestamp": stamp(vod) },
        "test": { "checked": test, "timestamp": stamp(test) },
        "note": "",
        "tasks": [],
        "pinned": false
    })
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn progress_requires_auth(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/api/v1/progress").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn new_user_gets_the_default_document(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = register_and_login(app.clone(), "ada").await;

    let response = get_auth(app, "/api/v1/progress", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"], empty_document_value());
    assert!(json["updated_at"].is_string());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn put_then_get_returns_the_saved_document(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = register_and_login(app.clone(), "ada").await;

    let document = json!({
        "settings": { "theme": "dark" },
        "lectures": { "math": { "1": canonical(true, false), "_subjectPinned": true } }
    });

    let response = put_json_auth(app.clone(), "/api/v1/progress", &token, document.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(get_auth(app, "/api/v1/progress", &token).await).await;
    assert_eq!(json["data"]["settings"]["theme"], "dark");
    assert_eq!(json["data"]["lectures"]["math"]["1"], canonical(true, false));
    assert_eq!(json["data"]["lectures"]["math"]["_subjectPinned"], true);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn legacy_shapes_are_rejected_on_save(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = register_and_login(app.clone(), "ada").await;

    let response = put_json_auth(
        app,
        "/api/v1/progress",
        &token,
        json!({ "lectures": { "math": { "1": true } } }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn encrypted_envelope_is_stored_opaquely(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = register_and_login(app.clone(), "ada").await;

    let key = derive_key_with(common::TEST_PASSWORD, KDF_SALT, 1000);
    let envelope = encrypt(&empty_document_value(), &key).unwrap();

    let response = put_json_auth(
        app.clone(),
        "/api/v1/progress",
        &token,
        json!({ "encrypted": envelope }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(get_auth(app.clone(), "/api/v1/progress", &token).await).await;
    assert_eq!(json["data"], json!({ "encrypted": envelope }));

    let response = get_auth(app, "/api/v1/progress/summary", &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn truncated_envelope_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = register_and_login(app.clone(), "ada").await;

    let response = put_json_auth(
        app,
        "/api/v1/progress",
        &token,
        json!({ "encrypted": "AAAA" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn summary_counts_planned_chapters(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = register_and_login(app.clone(), "ada").await;

    put_json_auth(
        app.clone(),
        "/api/v1/progress",
        &token,
        json!({
            "lectures": {
                "math": { "1": canonical(true, true), "2": canonical(true, false) },
                "physics": null
            }
        }),
    )
    .await;

    let response = get_auth(app, "/api/v1/progress/summary", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let math = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["subject_id"] == "math")
        .unwrap()
        .clone();
    assert_eq!(math["planned"], 30);
    assert_eq!(math["vod_done"], 2);
    assert_eq!(math["test_done"], 1);
    assert_eq!(math["completion_percent"], 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn summary_tolerates_odd_stored_documents(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = register_and_login(app.clone(), "ada").await;
    let user = UserRepo::find_by_username(&pool, "ada").await.unwrap().unwrap();

    ProgressRepo::upsert(
        &pool,
        user.id,
        &json!({
            "settings": { "theme": "auto" },
            "lectures": { "math": 5, "physics": { "1": canonical(true, false) } }
        }),
    )
    .await
    .unwrap();

    let response = get_auth(app.clone(), "/api/v1/progress/summary", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let subjects = json["data"].as_array().unwrap();
    let math = subjects.iter().find(|s| s["subject_id"] == "math").unwrap();
    assert_eq!(math["vod_done"], 0);
    let physics = subjects.iter().find(|s| s["subject_id"] == "physics").unwrap();
    assert_eq!(physics["vod_done"], 1);

    let json = body_json(get_auth(app, "/api/v1/progress", &token).await).await;
    assert_eq!(json["data"]["settings"]["theme"], "auto");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn users_only_see_their_own_progress(pool: PgPool) {
    let app = common::build_test_app(pool);
    let ada = register_and_login(app.clone(), "ada").await;
    let grace = register_and_login(app.clone(), "grace").await;

    put_json_auth(
        app.clone(),
        "/api/v1/progress",
        &ada,
        json!({ "settings": { "theme": "dark" }, "lectures": {} }),
    )
    .await;

    let json = body_json(get_auth(app, "/api/v1/progress", &grace).await).await;
    assert_eq!(json["data"], empty_document_value());
}
