//! Like engine: at most one row per (user, post), lazily materialized on
//! first contact and then only toggled. A `false` row records "seen but not
//! liked".

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatus {
    pub liked: bool,
    pub likes_count: i64,
}

fn require_post(conn: &Connection, post_id: &str) -> AppResult<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound("Post not found".into()))
    }
}

fn count_for(conn: &Connection, post_id: &str) -> AppResult<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE post_id = ?1 AND is_liked = 1",
        params![post_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// Two concurrent first touches race on the (user_id, post_id) unique index;
// exactly one insert wins and the loser falls through to the re-read.
fn insert_first_touch(conn: &Connection, post_id: &str, user_id: &str) -> AppResult<()> {
    let id = uuid::Uuid::now_v7().to_string();
    match conn.execute(
        "INSERT INTO likes (id, user_id, post_id, is_liked) VALUES (?1, ?2, ?3, 0)",
        params![id, user_id, post_id],
    ) {
        Ok(_) => Ok(()),
        Err(e) if db::is_unique_violation(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Current like state for (user, post), creating the `false` row on first
/// contact.
pub fn status(pool: &DbPool, post_id: &str, user_id: &str) -> AppResult<LikeStatus> {
    let conn = pool.get()?;
    require_post(&conn, post_id)?;

    let existing: Option<bool> = conn
        .query_row(
            "SELECT is_liked FROM likes WHERE user_id = ?1 AND post_id = ?2",
            params![user_id, post_id],
            |row| row.get(0),
        )
        .optional()?;

    let liked = match existing {
        Some(state) => state,
        None => {
            insert_first_touch(&conn, post_id, user_id)?;
            conn.query_row(
                "SELECT is_liked FROM likes WHERE user_id = ?1 AND post_id = ?2",
                params![user_id, post_id],
                |row| row.get(0),
            )?
        }
    };

    Ok(LikeStatus {
        liked,
        likes_count: count_for(&conn, post_id)?,
    })
}

/// Idempotent upsert of the like state.
pub fn set(pool: &DbPool, post_id: &str, user_id: &str, new_state: bool) -> AppResult<LikeStatus> {
    let conn = pool.get()?;
    require_post(&conn, post_id)?;

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO likes (id, user_id, post_id, is_liked) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id, post_id) DO UPDATE SET is_liked = excluded.is_liked",
        params![id, user_id, post_id, new_state],
    )?;

    Ok(LikeStatus {
        liked: new_state,
        likes_count: count_for(&conn, post_id)?,
    })
}
