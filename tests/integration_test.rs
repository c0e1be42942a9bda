use tempfile::TempDir;

use vetigram::auth::tokens::{self, TokenError};
use vetigram::config::AuthConfig;
use vetigram::state::DbPool;
use vetigram::{comments, db, likes, posts, users};

// Helper to create a test database backed by a real file
fn create_test_db() -> (TempDir, DbPool) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let pool = db::create_pool(&db_path).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");
    (temp_dir, pool)
}

fn test_auth() -> AuthConfig {
    AuthConfig {
        access_token_secret: "integration-access-secret".to_string(),
        refresh_token_secret: "integration-refresh-secret".to_string(),
        access_ttl_minutes: 15,
        refresh_ttl_days: 30,
        google_client_id: None,
    }
}

fn refresh_rows(pool: &DbPool, user_id: &str) -> i64 {
    let conn = pool.get().unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM refresh_tokens WHERE user_id = ?",
        rusqlite::params![user_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn test_full_feed_flow_from_registration_to_comment() {
    let (_temp_dir, pool) = create_test_db();
    let auth = test_auth();

    // Register two users: a pet owner and a vet
    let alice = users::create(&pool, "alice@example.com", "alice", "pw12345678", false).unwrap();
    let bob = users::create(&pool, "bob@example.com", "bob", "pw87654321", true).unwrap();

    // Credentials verify, and an issued access token identifies the user
    let found = users::find_by_identifier(&pool, "alice").unwrap().unwrap();
    assert!(users::verify_password(&found, "pw12345678").unwrap());
    assert!(!users::verify_password(&found, "wrong").unwrap());

    let pair = tokens::issue_pair(&pool, &auth, &alice.id).unwrap();
    assert_eq!(
        tokens::verify_access(&auth, &pair.access_token).unwrap(),
        alice.id
    );

    // Alice posts, Bob likes and comments
    let post = posts::create(&pool, &alice.id, "Limping terrier", "Rear left leg").unwrap();
    assert_eq!(post.owner.id, alice.id);
    assert_eq!(post.owner.username, "alice");

    let status = likes::set(&pool, &post.id, &bob.id, true).unwrap();
    assert!(status.liked);
    assert_eq!(status.likes_count, 1);

    let comment = comments::create(&pool, &post.id, &bob.id, "Check the cruciate ligament").unwrap();
    assert!(comment.is_owner_vet, "Bob is a vet, the badge should be set");
    assert_eq!(comment.owner.username, "bob");

    // The feed shows the post; the owner filter isolates it
    let feed = posts::list(&pool, None).unwrap();
    assert_eq!(feed.len(), 1);
    assert!(posts::list(&pool, Some(&bob.id)).unwrap().is_empty());

    let listed = comments::list_by_post(&pool, &post.id).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].comment, "Check the cruciate ligament");
}

#[test]
fn test_comment_badge_survives_vet_flag_change() {
    let (_temp_dir, pool) = create_test_db();

    let alice = users::create(&pool, "alice@example.com", "alice", "pw12345678", false).unwrap();
    let bob = users::create(&pool, "bob@example.com", "bob", "pw87654321", true).unwrap();
    let post = posts::create(&pool, &alice.id, "Case", "").unwrap();

    let vet_comment = comments::create(&pool, &post.id, &bob.id, "As a vet...").unwrap();
    assert!(vet_comment.is_owner_vet);

    // Bob loses the vet flag after commenting
    let conn = pool.get().unwrap();
    conn.execute(
        "UPDATE users SET is_vet = 0 WHERE id = ?",
        rusqlite::params![bob.id],
    )
    .unwrap();
    drop(conn);

    // The old comment keeps the badge it was created with
    let reread = comments::view(&pool, &vet_comment.id).unwrap().unwrap();
    assert!(reread.is_owner_vet, "Badge is frozen at creation time");

    // A new comment snapshots the current flag
    let later = comments::create(&pool, &post.id, &bob.id, "Second opinion").unwrap();
    assert!(!later.is_owner_vet);
}

#[test]
fn test_rotation_reuse_empties_the_session_list() {
    let (_temp_dir, pool) = create_test_db();
    let auth = test_auth();

    let alice = users::create(&pool, "alice@example.com", "alice", "pw12345678", false).unwrap();

    let first = tokens::issue_pair(&pool, &auth, &alice.id).unwrap();
    assert_eq!(refresh_rows(&pool, &alice.id), 1);

    // Normal rotation swaps the stored token
    let second = tokens::rotate(&pool, &auth, &first.refresh_token).unwrap();
    assert_ne!(first.refresh_token, second.refresh_token);
    assert_eq!(refresh_rows(&pool, &alice.id), 1);

    // Replaying the rotated-out token is reuse and clears the whole list
    let replay = tokens::rotate(&pool, &auth, &first.refresh_token);
    assert!(matches!(replay, Err(TokenError::Reuse)));
    assert_eq!(refresh_rows(&pool, &alice.id), 0);

    // The still-signed successor is dead too; only a fresh login recovers
    let successor = tokens::rotate(&pool, &auth, &second.refresh_token);
    assert!(matches!(successor, Err(TokenError::Reuse)));

    let fresh = tokens::issue_pair(&pool, &auth, &alice.id).unwrap();
    assert_eq!(refresh_rows(&pool, &alice.id), 1);
    assert!(tokens::rotate(&pool, &auth, &fresh.refresh_token).is_ok());
}

#[test]
fn test_logout_is_idempotent_for_live_tokens() {
    let (_temp_dir, pool) = create_test_db();
    let auth = test_auth();

    let alice = users::create(&pool, "alice@example.com", "alice", "pw12345678", false).unwrap();
    let pair = tokens::issue_pair(&pool, &auth, &alice.id).unwrap();

    assert!(tokens::revoke(&pool, &auth, &pair.refresh_token).unwrap());
    assert_eq!(refresh_rows(&pool, &alice.id), 0);

    // A second revoke of the same verifiable token is a no-op, not an error
    assert!(!tokens::revoke(&pool, &auth, &pair.refresh_token).unwrap());

    // The revoked token can no longer rotate
    assert!(tokens::rotate(&pool, &auth, &pair.refresh_token).is_err());
}

#[test]
fn test_deleting_a_post_cascades_comments_and_likes() {
    let (_temp_dir, pool) = create_test_db();

    let alice = users::create(&pool, "alice@example.com", "alice", "pw12345678", false).unwrap();
    let bob = users::create(&pool, "bob@example.com", "bob", "pw87654321", true).unwrap();

    let post = posts::create(&pool, &alice.id, "Case", "Details").unwrap();
    comments::create(&pool, &post.id, &bob.id, "Comment").unwrap();
    likes::set(&pool, &post.id, &bob.id, true).unwrap();
    likes::set(&pool, &post.id, &alice.id, true).unwrap();

    posts::delete(&pool, &post.id, &alice.id).unwrap();

    let conn = pool.get().unwrap();
    let comment_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
        .unwrap();
    let like_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM likes", [], |row| row.get(0))
        .unwrap();
    let user_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();

    assert_eq!(comment_count, 0, "Comments should be removed with the post");
    assert_eq!(like_count, 0, "Likes should be removed with the post");
    assert_eq!(user_count, 2, "Users are untouched by post deletion");
    assert!(posts::view(&pool, &post.id).unwrap().is_none());
}

#[test]
fn test_cross_owner_mutations_are_rejected() {
    let (_temp_dir, pool) = create_test_db();

    let alice = users::create(&pool, "alice@example.com", "alice", "pw12345678", false).unwrap();
    let bob = users::create(&pool, "bob@example.com", "bob", "pw87654321", true).unwrap();

    let post = posts::create(&pool, &alice.id, "Case", "").unwrap();
    let comment = comments::create(&pool, &post.id, &bob.id, "Mine").unwrap();

    // Bob cannot edit or delete Alice's post
    assert!(posts::update(&pool, &post.id, &bob.id, Some("Hijack"), None).is_err());
    assert!(posts::delete(&pool, &post.id, &bob.id).is_err());

    // Alice cannot delete Bob's comment, even on her own post
    assert!(comments::delete(&pool, &comment.id, &alice.id).is_err());
    assert!(comments::delete(&pool, &comment.id, &bob.id).is_ok());

    // The post survived all of it
    assert!(posts::view(&pool, &post.id).unwrap().is_some());
}

#[tokio::test]
async fn test_media_layout_matches_guard_expectations() {
    use vetigram::media::guard::{self, Access};
    use vetigram::media::MediaStore;

    let temp_dir = TempDir::new().unwrap();
    let store = MediaStore::new(
        temp_dir.path().to_path_buf(),
        "http://localhost:4000".to_string(),
    );

    let filename = store
        .save_post_image("u1", "xray.png", bytes::Bytes::from_static(b"png bytes"))
        .await
        .unwrap();

    // The file lands under the owner's partition
    let on_disk = temp_dir.path().join("posts").join("u1").join(&filename);
    assert!(on_disk.exists());

    // And the guard admits exactly the owner on that path
    let rel_path = format!("posts/u1/{filename}");
    assert_eq!(guard::check(&rel_path, Some("u1")), Access::Granted);
    assert_eq!(guard::check(&rel_path, Some("u2")), Access::Denied);
    assert_eq!(guard::check(&rel_path, None), Access::Denied);

    // Profile images are public
    let profile = store
        .save_profile_image("u1", "me.jpg", bytes::Bytes::from_static(b"jpg bytes"))
        .await
        .unwrap();
    assert_eq!(profile, "u1.jpg");
    assert_eq!(
        guard::check(&format!("profile/{profile}"), None),
        Access::Granted
    );

    // Removal unlinks the stored post image
    store.remove_post_image("u1", &filename).await;
    assert!(!on_disk.exists());
}
