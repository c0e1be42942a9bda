//! Post repository. Read paths join-populate the owner so the client
//! renders a feed without a second lookup.

use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::{OwnerView, Post, PostView};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

const VIEW_QUERY: &str = "SELECT p.id, p.title, p.content, p.image_name,
       u.id, u.username, u.image_name, u.is_vet
FROM posts p JOIN users u ON u.id = p.user_id";

fn row_to_view(row: &Row) -> rusqlite::Result<PostView> {
    Ok(PostView {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        image_name: row.get(3)?,
        owner: OwnerView {
            id: row.get(4)?,
            username: row.get(5)?,
            image_name: row.get(6)?,
            is_vet: row.get(7)?,
        },
    })
}

fn row_to_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        image_name: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn create(pool: &DbPool, owner_id: &str, title: &str, content: &str) -> AppResult<PostView> {
    let id = uuid::Uuid::now_v7().to_string();
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO posts (id, user_id, title, content) VALUES (?1, ?2, ?3, ?4)",
        params![id, owner_id, title, content],
    )?;
    drop(conn);

    view(pool, &id)?.ok_or_else(|| AppError::Internal("post vanished after insert".into()))
}

pub fn view(pool: &DbPool, id: &str) -> AppResult<Option<PostView>> {
    let conn = pool.get()?;
    let post = conn
        .query_row(
            &format!("{VIEW_QUERY} WHERE p.id = ?1"),
            params![id],
            row_to_view,
        )
        .optional()?;
    Ok(post)
}

pub fn list(pool: &DbPool, owner: Option<&str>) -> AppResult<Vec<PostView>> {
    let conn = pool.get()?;
    let mut posts = Vec::new();
    match owner {
        Some(owner_id) => {
            let mut stmt =
                conn.prepare(&format!("{VIEW_QUERY} WHERE p.user_id = ?1 ORDER BY p.rowid"))?;
            let rows = stmt.query_map(params![owner_id], row_to_view)?;
            for row in rows {
                posts.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!("{VIEW_QUERY} ORDER BY p.rowid"))?;
            let rows = stmt.query_map([], row_to_view)?;
            for row in rows {
                posts.push(row?);
            }
        }
    }
    Ok(posts)
}

pub fn find(pool: &DbPool, id: &str) -> AppResult<Option<Post>> {
    let conn = pool.get()?;
    let post = conn
        .query_row(
            "SELECT id, user_id, title, content, image_name, created_at FROM posts WHERE id = ?1",
            params![id],
            row_to_post,
        )
        .optional()?;
    Ok(post)
}

/// Owner-only update of title and/or content; absent fields keep their
/// value. A provided title must stay non-empty.
pub fn update(
    pool: &DbPool,
    id: &str,
    principal: &str,
    title: Option<&str>,
    content: Option<&str>,
) -> AppResult<PostView> {
    let title = title.map(str::trim);
    if title.is_some_and(|t| t.is_empty()) {
        return Err(AppError::BadRequest("Title is required".into()));
    }

    let post = find(pool, id)?.ok_or_else(|| AppError::NotFound("Post not found".into()))?;
    if post.user_id != principal {
        return Err(AppError::Forbidden("Not the post owner".into()));
    }

    let conn = pool.get()?;
    conn.execute(
        "UPDATE posts SET title = COALESCE(?1, title), content = COALESCE(?2, content) WHERE id = ?3",
        params![title, content, id],
    )?;
    drop(conn);

    view(pool, id)?.ok_or_else(|| AppError::NotFound("Post not found".into()))
}

pub fn set_image_name(pool: &DbPool, id: &str, image_name: &str) -> AppResult<()> {
    let conn = pool.get()?;
    let updated = conn.execute(
        "UPDATE posts SET image_name = ?1 WHERE id = ?2",
        params![image_name, id],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound("Post not found".into()));
    }
    Ok(())
}

/// Owner-only delete; removes the post's comments and likes in the same
/// transaction. Returns the deleted row so the caller can unlink the image.
pub fn delete(pool: &DbPool, id: &str, principal: &str) -> AppResult<Post> {
    let post = find(pool, id)?.ok_or_else(|| AppError::NotFound("Post not found".into()))?;
    if post.user_id != principal {
        return Err(AppError::Forbidden("Not the post owner".into()));
    }

    let conn = pool.get()?;
    conn.execute("BEGIN IMMEDIATE", [])?;

    let result: Result<(), rusqlite::Error> = (|| {
        conn.execute("DELETE FROM comments WHERE post_id = ?1", params![id])?;
        conn.execute("DELETE FROM likes WHERE post_id = ?1", params![id])?;
        conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute("COMMIT", [])?;
            Ok(post)
        }
        Err(e) => {
            conn.execute("ROLLBACK", [])?;
            Err(e.into())
        }
    }
}
