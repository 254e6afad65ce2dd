use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Row, params, params_from_iter};

use wander_types::query::{ReviewQuery, ReviewSort, SortOrder};

use super::{Filters, OptionalExt};
use crate::Database;
use crate::models::ReviewRow;

const REVIEW_SELECT: &str = "
    SELECT rv.id, rv.user_id, u.name, rv.destination_id, rv.rating, rv.comment,
           rv.created_at, rv.updated_at
    FROM reviews rv
    JOIN users u ON u.id = rv.user_id";

impl Database {
    pub fn create_review(
        &self,
        id: &str,
        user_id: &str,
        destination_id: &str,
        rating: u8,
        comment: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reviews (id, user_id, destination_id, rating, comment)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, user_id, destination_id, rating, comment],
            )?;
            Ok(())
        })
    }

    pub fn get_review(&self, id: &str) -> Result<Option<ReviewRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} WHERE rv.id = ?1", REVIEW_SELECT))?;
            stmt.query_row([id], map_review).optional()
        })
    }

    /// Id of the review `user_id` left on `destination_id`, if any.
    pub fn find_user_review(&self, user_id: &str, destination_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id FROM reviews WHERE user_id = ?1 AND destination_id = ?2",
                [user_id, destination_id],
                |r| r.get(0),
            )
            .optional()
        })
    }

    pub fn list_reviews(&self, query: &ReviewQuery) -> Result<(Vec<ReviewRow>, u64)> {
        let mut filters = Filters::default();
        if let Some(destination_id) = query.destination_id {
            filters.push("rv.destination_id = ?", [Value::Text(destination_id.to_string())]);
        }
        if let Some(user_id) = query.user_id {
            filters.push("rv.user_id = ?", [Value::Text(user_id.to_string())]);
        }
        if let Some(min_rating) = query.min_rating {
            filters.push("rv.rating >= ?", [Value::Integer(i64::from(min_rating))]);
        }

        let sort_column = match query.sort {
            ReviewSort::CreatedAt => "rv.created_at",
            ReviewSort::Rating => "rv.rating",
        };
        let order = query.order.unwrap_or(SortOrder::Desc);
        let window = query.pagination();

        self.with_conn(|conn| {
            let where_sql = filters.where_sql();
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM reviews rv {}", where_sql),
                params_from_iter(filters.params.iter()),
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "{} {} ORDER BY {} {}, rv.rowid DESC LIMIT ? OFFSET ?",
                REVIEW_SELECT,
                where_sql,
                sort_column,
                order.as_sql()
            ))?;
            let rows = stmt
                .query_map(
                    params_from_iter(filters.with_window(window.limit, window.offset())),
                    map_review,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }

    pub fn update_review(&self, id: &str, rating: u8, comment: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE reviews SET rating = ?2, comment = ?3, updated_at = datetime('now')
                 WHERE id = ?1",
                params![id, rating, comment],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_review(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM reviews WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

fn map_review(row: &Row<'_>) -> rusqlite::Result<ReviewRow> {
    Ok(ReviewRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        destination_id: row.get(3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
