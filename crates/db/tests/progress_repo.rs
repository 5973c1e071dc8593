use assert_matches::assert_matches;
use serde_json::json;
use sqlx::PgPool;
use studyplan_core::document::empty_document_value;
use studyplan_db::models::user::CreateUser;
use studyplan_db::repositories::{ProgressRepo, UserRepo};

async fn seed_user(pool: &PgPool, username: &str) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn default_row_holds_the_empty_document(pool: PgPool) {
    let user_id = seed_user(&pool, "ada").await;
    let created = ProgressRepo::create_default(&pool, user_id).await.unwrap();
    assert_eq!(created.data, empty_document_value());

    let found = ProgressRepo::find_by_user(&pool, user_id).await.unwrap().unwrap();
    assert_eq!(found.data, empty_document_value());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn upsert_is_last_write_wins(pool: PgPool) {
    let user_id = seed_user(&pool, "grace").await;

    let first = json!({ "settings": { "theme": "dark" }, "lectures": {} });
    let second = json!({ "encrypted": "AAAA" });

    let inserted = ProgressRepo::upsert(&pool, user_id, &first).await.unwrap();
    assert_eq!(inserted.data, first);

    let replaced = ProgressRepo::upsert(&pool, user_id, &second).await.unwrap();
    assert_eq!(replaced.data, second);
    assert!(replaced.updated_at >= inserted.updated_at);

    // Repeating the same save is harmless.
    ProgressRepo::upsert(&pool, user_id, &second).await.unwrap();
    let ids = ProgressRepo::list_user_ids(&pool).await.unwrap();
    assert_eq!(ids, vec![user_id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_row_is_none(pool: PgPool) {
    let user_id = seed_user(&pool, "linus").await;
    assert!(ProgressRepo::find_by_user(&pool, user_id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_username_violates_unique_constraint(pool: PgPool) {
    seed_user(&pool, "ada").await;
    let err = UserRepo::create(
        &pool,
        &CreateUser {
            username: "ada".into(),
            password_hash: "x".into(),
        },
    )
    .await
    .unwrap_err();

    assert_matches!(
        err,
        sqlx::Error::Database(db) if db.constraint() == Some("uq_users_username")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deleting_a_user_removes_their_progress(pool: PgPool) {
    let user_id = seed_user(&pool, "ada").await;
    ProgressRepo::create_default(&pool, user_id).await.unwrap();

    assert!(UserRepo::delete(&pool, user_id).await.unwrap());
    assert!(ProgressRepo::find_by_user(&pool, user_id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn record_login_sets_timestamp(pool: PgPool) {
    let user_id = seed_user(&pool, "ada").await;
    assert!(UserRepo::find_by_id(&pool, user_id)
        .await
        .unwrap()
        .unwrap()
        .last_login_at
        .is_none());

    UserRepo::record_login(&pool, user_id).await.unwrap();
    let user = UserRepo::find_by_username(&pool, "ada").await.unwrap().unwrap();
    assert!(user.last_login_at.is_some());
}
