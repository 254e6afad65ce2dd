use anyhow::Result;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row, params, params_from_iter};

use wander_types::query::{DestinationQuery, DestinationSort};

use super::{Filters, OptionalExt};
use crate::Database;
use crate::models::{DestinationFields, DestinationRow};

/// Destination columns plus the review aggregate, aliased `d` and `r`.
pub(super) const DESTINATION_SELECT: &str = "
    SELECT d.id, d.name, d.country, d.city, d.description, d.latitude, d.longitude, d.images,
           r.average_rating, COALESCE(r.review_count, 0), d.created_at, d.updated_at
    FROM destinations d
    LEFT JOIN (
        SELECT destination_id, AVG(rating) AS average_rating, COUNT(*) AS review_count
        FROM reviews GROUP BY destination_id
    ) r ON r.destination_id = d.id";

impl Database {
    pub fn create_destination(&self, id: &str, fields: &DestinationFields) -> Result<()> {
        let images = serde_json::to_string(&fields.images)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO destinations
                    (id, name, country, city, description, latitude, longitude, images)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    fields.name,
                    fields.country,
                    fields.city,
                    fields.description,
                    fields.latitude,
                    fields.longitude,
                    images,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_destination(&self, id: &str) -> Result<Option<DestinationRow>> {
        self.with_conn(|conn| query_destination(conn, id))
    }

    /// Id of the destination with this exact name/country/city, if any.
    pub fn find_destination_by_key(
        &self,
        name: &str,
        country: &str,
        city: &str,
    ) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id FROM destinations WHERE name = ?1 AND country = ?2 AND city = ?3",
                params![name, country, city],
                |r| r.get(0),
            )
            .optional()
        })
    }

    /// Returns the ids from `ids` that do not name a destination.
    pub fn missing_destinations(&self, ids: &[String]) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT 1 FROM destinations WHERE id = ?1")?;
            let mut missing = Vec::new();
            for id in ids {
                if !stmt.exists([id])? && !missing.contains(id) {
                    missing.push(id.clone());
                }
            }
            Ok(missing)
        })
    }

    pub fn list_destinations(&self, query: &DestinationQuery) -> Result<(Vec<DestinationRow>, u64)> {
        let mut filters = Filters::default();
        if let Some(country) = non_blank(&query.country) {
            filters.push("d.country = ? COLLATE NOCASE", [Value::Text(country)]);
        }
        if let Some(city) = non_blank(&query.city) {
            filters.push("d.city = ? COLLATE NOCASE", [Value::Text(city)]);
        }
        if let Some(search) = non_blank(&query.search) {
            filters.push("instr(lower(d.name), ?) > 0", [Value::Text(search.to_lowercase())]);
        }

        let sort_column = match query.sort {
            DestinationSort::Name => "d.name",
            DestinationSort::Country => "d.country",
            DestinationSort::City => "d.city",
            DestinationSort::Rating => "COALESCE(r.average_rating, 0)",
            DestinationSort::CreatedAt => "d.created_at",
        };
        let window = query.pagination();

        self.with_conn(|conn| {
            let where_sql = filters.where_sql();
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM destinations d {}", where_sql),
                params_from_iter(filters.params.iter()),
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "{} {} ORDER BY {} {}, d.name ASC, d.id ASC LIMIT ? OFFSET ?",
                DESTINATION_SELECT,
                where_sql,
                sort_column,
                query.order.as_sql()
            ))?;
            let rows = stmt
                .query_map(
                    params_from_iter(filters.with_window(window.limit, window.offset())),
                    map_destination,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }

    /// Overwrites every writable column. Returns false when the id is unknown.
    pub fn update_destination(&self, id: &str, fields: &DestinationFields) -> Result<bool> {
        let images = serde_json::to_string(&fields.images)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE destinations SET
                    name = ?2, country = ?3, city = ?4, description = ?5,
                    latitude = ?6, longitude = ?7, images = ?8,
                    updated_at = datetime('now')
                 WHERE id = ?1",
                params![
                    id,
                    fields.name,
                    fields.country,
                    fields.city,
                    fields.description,
                    fields.latitude,
                    fields.longitude,
                    images,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_destination(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM destinations WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

fn query_destination(conn: &Connection, id: &str) -> Result<Option<DestinationRow>> {
    let mut stmt = conn.prepare(&format!("{} WHERE d.id = ?1", DESTINATION_SELECT))?;
    stmt.query_row([id], map_destination).optional()
}

pub(super) fn map_destination(row: &Row<'_>) -> rusqlite::Result<DestinationRow> {
    let images: String = row.get(7)?;
    let images = serde_json::from_str(&images)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(DestinationRow {
        id: row.get(0)?,
        name: row.get(1)?,
        country: row.get(2)?,
        city: row.get(3)?,
        description: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        images,
        average_rating: row.get(8)?,
        review_count: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
