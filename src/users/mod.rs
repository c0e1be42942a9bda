//! Credential store: user identities, password hashes and profile fields.

use rusqlite::{params, OptionalExtension, Row};

use crate::db;
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        is_vet: row.get(4)?,
        image_name: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const USER_COLUMNS: &str = "id, email, username, password_hash, is_vet, image_name, created_at";

pub fn create(
    pool: &DbPool,
    email: &str,
    username: &str,
    password_plain: &str,
    is_vet: bool,
) -> AppResult<User> {
    let password_hash = bcrypt::hash(password_plain, bcrypt::DEFAULT_COST)?;
    let id = uuid::Uuid::now_v7().to_string();

    let conn = pool.get()?;
    let result = conn.execute(
        "INSERT INTO users (id, email, username, password_hash, is_vet) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, email, username, password_hash, is_vet],
    );
    match result {
        Ok(_) => {}
        Err(e) if db::is_unique_violation(&e) => {
            return Err(AppError::Conflict("Email or username already in use".into()));
        }
        Err(e) => return Err(e.into()),
    }
    drop(conn);

    find_by_id(pool, &id)?.ok_or_else(|| AppError::Internal("user vanished after insert".into()))
}

/// Look up by email or username.
pub fn find_by_identifier(pool: &DbPool, identifier: &str) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 OR username = ?1"),
            params![identifier],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn find_by_id(pool: &DbPool, id: &str) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn find_by_email(pool: &DbPool, email: &str) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn username_exists(pool: &DbPool, username: &str) -> AppResult<bool> {
    let conn = pool.get()?;
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn update_username(pool: &DbPool, id: &str, username: &str) -> AppResult<User> {
    let conn = pool.get()?;
    let result = conn.execute(
        "UPDATE users SET username = ?1 WHERE id = ?2",
        params![username, id],
    );
    match result {
        Ok(0) => return Err(AppError::NotFound("User not found".into())),
        Ok(_) => {}
        Err(e) if db::is_unique_violation(&e) => {
            return Err(AppError::Conflict("Username already in use".into()));
        }
        Err(e) => return Err(e.into()),
    }
    drop(conn);

    find_by_id(pool, id)?.ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub fn set_profile_image_name(pool: &DbPool, id: &str, image_name: &str) -> AppResult<()> {
    let conn = pool.get()?;
    let updated = conn.execute(
        "UPDATE users SET image_name = ?1 WHERE id = ?2",
        params![image_name, id],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound("User not found".into()));
    }
    Ok(())
}

pub fn verify_password(user: &User, password_plain: &str) -> AppResult<bool> {
    Ok(bcrypt::verify(password_plain, &user.password_hash)?)
}
