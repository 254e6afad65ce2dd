use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};

use wander_types::query::UserQuery;

use super::{Filters, OptionalExt};
use crate::Database;
use crate::models::{UserChanges, UserRow};

const USER_COLUMNS: &str =
    "id, email, name, password_hash, role, email_verified, created_at, updated_at";

impl Database {
    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        name: &str,
        password_hash: &str,
        role: &str,
        verification_token: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, name, password_hash, role, verification_token)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, email, name, password_hash, role, verification_token],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn list_users(&self, query: &UserQuery) -> Result<(Vec<UserRow>, u64)> {
        let mut filters = Filters::default();
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = Value::Text(search.to_lowercase());
            filters.push(
                "(instr(lower(email), ?) > 0 OR instr(lower(name), ?) > 0)",
                [needle.clone(), needle],
            );
        }
        if let Some(role) = query.role {
            filters.push("role = ?", [Value::Text(role.as_str().to_string())]);
        }
        let window = query.pagination();

        self.with_conn(|conn| {
            let where_sql = filters.where_sql();
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM users {}", where_sql),
                params_from_iter(filters.params.iter()),
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users {} ORDER BY created_at DESC, email ASC LIMIT ? OFFSET ?",
                USER_COLUMNS, where_sql
            ))?;
            let rows = stmt
                .query_map(
                    params_from_iter(filters.with_window(window.limit, window.offset())),
                    map_user,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }

    /// Returns false when no such user exists.
    pub fn update_user(&self, id: &str, changes: &UserChanges) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    email = COALESCE(?2, email),
                    name = COALESCE(?3, name),
                    password_hash = COALESCE(?4, password_hash),
                    role = COALESCE(?5, role),
                    updated_at = datetime('now')
                 WHERE id = ?1",
                params![id, changes.email, changes.name, changes.password_hash, changes.role],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Marks the owner of `token` as verified. Returns false for unknown tokens.
    pub fn verify_email(&self, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET email_verified = 1, verification_token = NULL,
                    updated_at = datetime('now')
                 WHERE verification_token = ?1",
                [token],
            )?;
            Ok(changed > 0)
        })
    }

    /// Stores a reset token digest that expires `ttl_minutes` from now.
    pub fn set_reset_token(&self, user_id: &str, token_hash: &str, ttl_minutes: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET reset_token_hash = ?2,
                    reset_token_expires_at = datetime('now', ?3)
                 WHERE id = ?1",
                params![user_id, token_hash, format!("{:+} minutes", ttl_minutes)],
            )?;
            Ok(())
        })
    }

    /// Swaps in a new password hash if the reset token is known and unexpired.
    /// The token is consumed either way once matched.
    pub fn reset_password(&self, token_hash: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let valid: Option<bool> = tx
                .query_row(
                    "SELECT reset_token_expires_at > datetime('now')
                     FROM users WHERE reset_token_hash = ?1",
                    [token_hash],
                    |r| r.get(0),
                )
                .optional()?;

            let Some(valid) = valid else {
                return Ok(false);
            };

            if valid {
                tx.execute(
                    "UPDATE users SET password_hash = ?2, reset_token_hash = NULL,
                        reset_token_expires_at = NULL, updated_at = datetime('now')
                     WHERE reset_token_hash = ?1",
                    params![token_hash, password_hash],
                )?;
            } else {
                tx.execute(
                    "UPDATE users SET reset_token_hash = NULL, reset_token_expires_at = NULL
                     WHERE reset_token_hash = ?1",
                    [token_hash],
                )?;
            }
            tx.commit()?;
            Ok(valid)
        })
    }

    pub fn count_admins(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 =
                conn.query_row("SELECT COUNT(*) FROM users WHERE role = 'ADMIN'", [], |r| r.get(0))?;
            Ok(n as u64)
        })
    }
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, predicate))?;
    stmt.query_row([value], map_user).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        email_verified: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
