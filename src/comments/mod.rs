//! Comment repository. The author's vet flag is frozen onto the comment at
//! creation time and never recomputed, so the badge reflects authorship.

use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::{CommentView, OwnerView};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

const VIEW_QUERY: &str = "SELECT c.id, c.post_id, c.comment, c.is_owner_vet,
       u.id, u.username, u.image_name, u.is_vet
FROM comments c JOIN users u ON u.id = c.user_id";

fn row_to_view(row: &Row) -> rusqlite::Result<CommentView> {
    Ok(CommentView {
        id: row.get(0)?,
        post_id: row.get(1)?,
        comment: row.get(2)?,
        is_owner_vet: row.get(3)?,
        owner: OwnerView {
            id: row.get(4)?,
            username: row.get(5)?,
            image_name: row.get(6)?,
            is_vet: row.get(7)?,
        },
    })
}

pub fn create(pool: &DbPool, post_id: &str, author_id: &str, text: &str) -> AppResult<CommentView> {
    let conn = pool.get()?;

    let post_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    if !post_exists {
        return Err(AppError::NotFound("Post not found".into()));
    }

    // Snapshot of the author's vet flag at creation time
    let is_vet: bool = conn
        .query_row(
            "SELECT is_vet FROM users WHERE id = ?1",
            params![author_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, comment, is_owner_vet)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, post_id, author_id, text, is_vet],
    )?;
    drop(conn);

    view(pool, &id)?.ok_or_else(|| AppError::Internal("comment vanished after insert".into()))
}

pub fn view(pool: &DbPool, id: &str) -> AppResult<Option<CommentView>> {
    let conn = pool.get()?;
    let comment = conn
        .query_row(
            &format!("{VIEW_QUERY} WHERE c.id = ?1"),
            params![id],
            row_to_view,
        )
        .optional()?;
    Ok(comment)
}

/// Comments for a post, oldest first. Unknown post ids yield an empty list.
pub fn list_by_post(pool: &DbPool, post_id: &str) -> AppResult<Vec<CommentView>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!("{VIEW_QUERY} WHERE c.post_id = ?1 ORDER BY c.rowid"))?;
    let rows = stmt.query_map(params![post_id], row_to_view)?;
    let mut comments = Vec::new();
    for row in rows {
        comments.push(row?);
    }
    Ok(comments)
}

/// Author-only delete.
pub fn delete(pool: &DbPool, id: &str, principal: &str) -> AppResult<()> {
    let conn = pool.get()?;
    let author: Option<String> = conn
        .query_row(
            "SELECT user_id FROM comments WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;

    match author {
        None => Err(AppError::NotFound("Comment not found".into())),
        Some(author_id) if author_id != principal => {
            Err(AppError::Forbidden("Not the comment author".into()))
        }
        Some(_) => {
            conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
            Ok(())
        }
    }
}
