use std::time::Duration;

use taskboard_contracts::UserRole;
use taskboard_store::Store;

fn test_db_url() -> Option<String> {
    std::env::var("TASKBOARD_TEST_DB_URL")
        .ok()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn schema_db_url(base: &str, schema: &str) -> String {
    let separator = if base.contains('?') { "&" } else { "?" };
    format!("{base}{separator}options=-csearch_path%3D{schema}")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn privilege_oracle_reflects_durable_role_changes() {
    let Some(db_url) = test_db_url() else {
        eprintln!("skipping DB store test; set TASKBOARD_TEST_DB_URL to enable");
        return;
    };

    let schema = format!("taskboard_test_{}", ulid::Ulid::new());

    let admin_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await
        .expect("DB connect should succeed");

    sqlx::query(&format!("CREATE SCHEMA {}", schema))
        .execute(&admin_pool)
        .await
        .expect("create schema should succeed");

    let store = Store::connect_and_migrate(
        &schema_db_url(&db_url, &schema),
        Duration::from_millis(2000),
    )
    .await
    .expect("store should connect and migrate");

    store.migrate().await.expect("migrate is idempotent");
    store.ping().await.expect("ping should succeed");

    let admin_id = store
        .insert_user("admin@example.com", UserRole::Admin)
        .await
        .expect("insert admin");
    let user_id = store
        .insert_user("user@example.com", UserRole::User)
        .await
        .expect("insert user");

    assert!(store.is_administrator(admin_id).await.unwrap());
    assert!(!store.is_administrator(user_id).await.unwrap());
    assert!(!store.is_administrator(admin_id + user_id + 1000).await.unwrap());

    assert_eq!(
        store.find_user_role(user_id).await.unwrap(),
        Some(UserRole::User)
    );
    assert_eq!(store.find_user_role(99_999_999).await.unwrap(), None);

    // Promotion shows up on the very next oracle read.
    assert!(store.update_user_role(user_id, UserRole::Admin).await.unwrap());
    assert!(store.is_administrator(user_id).await.unwrap());
    assert!(!store.update_user_role(99_999_999, UserRole::Admin).await.unwrap());

    let comment_id = store
        .insert_comment(1, user_id, "looks good")
        .await
        .expect("insert comment");
    assert!(store.delete_comment(comment_id).await.unwrap());
    assert!(!store.delete_comment(comment_id).await.unwrap());

    store.close().await;

    sqlx::query(&format!("DROP SCHEMA {} CASCADE", schema))
        .execute(&admin_pool)
        .await
        .expect("drop schema should succeed");
}
