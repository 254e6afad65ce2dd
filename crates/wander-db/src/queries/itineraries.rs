use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, Transaction, params, params_from_iter};

use wander_types::query::Pagination;

use super::{Filters, OptionalExt};
use crate::Database;
use crate::models::{ItineraryFields, ItineraryRow, StopFields, StopRow};

const ITINERARY_COLUMNS: &str =
    "id, user_id, title, description, start_date, end_date, is_public, created_at, updated_at";

/// Which itineraries a listing may return.
#[derive(Debug, Clone, Copy)]
pub enum ItineraryScope<'a> {
    All,
    Owner(&'a str),
    Public,
}

impl Database {
    /// Inserts the itinerary and its stops atomically.
    pub fn create_itinerary(
        &self,
        id: &str,
        user_id: &str,
        fields: &ItineraryFields,
        stops: &[StopFields],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO itineraries
                    (id, user_id, title, description, start_date, end_date, is_public)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    user_id,
                    fields.title,
                    fields.description,
                    fields.start_date,
                    fields.end_date,
                    fields.is_public,
                ],
            )?;
            insert_stops(&tx, id, stops)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_itinerary(&self, id: &str) -> Result<Option<ItineraryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM itineraries WHERE id = ?1",
                ITINERARY_COLUMNS
            ))?;
            stmt.query_row([id], map_itinerary).optional()
        })
    }

    /// Stops ordered by day, then position within the day.
    pub fn get_itinerary_stops(&self, itinerary_id: &str) -> Result<Vec<StopRow>> {
        self.with_conn(|conn| query_stops(conn, itinerary_id))
    }

    pub fn list_itineraries(
        &self,
        scope: ItineraryScope<'_>,
        window: Pagination,
    ) -> Result<(Vec<ItineraryRow>, u64)> {
        let mut filters = Filters::default();
        match scope {
            ItineraryScope::All => {}
            ItineraryScope::Owner(user_id) => {
                filters.push("user_id = ?", [Value::Text(user_id.to_string())])
            }
            ItineraryScope::Public => filters.push("is_public = 1", std::iter::empty()),
        }

        self.with_conn(|conn| {
            let where_sql = filters.where_sql();
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM itineraries {}", where_sql),
                params_from_iter(filters.params.iter()),
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM itineraries {}
                 ORDER BY start_date DESC, created_at DESC, rowid DESC LIMIT ? OFFSET ?",
                ITINERARY_COLUMNS, where_sql
            ))?;
            let rows = stmt
                .query_map(
                    params_from_iter(filters.with_window(window.limit, window.offset())),
                    map_itinerary,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }

    /// Overwrites the itinerary columns and, when `stops` is given, replaces
    /// every stop (delete then insert) in the same transaction.
    pub fn update_itinerary(
        &self,
        id: &str,
        fields: &ItineraryFields,
        stops: Option<&[StopFields]>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE itineraries SET
                    title = ?2, description = ?3, start_date = ?4, end_date = ?5,
                    is_public = ?6, updated_at = datetime('now')
                 WHERE id = ?1",
                params![
                    id,
                    fields.title,
                    fields.description,
                    fields.start_date,
                    fields.end_date,
                    fields.is_public,
                ],
            )?;
            if changed == 0 {
                return Ok(false);
            }

            if let Some(stops) = stops {
                tx.execute("DELETE FROM itinerary_destinations WHERE itinerary_id = ?1", [id])?;
                insert_stops(&tx, id, stops)?;
            }
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn delete_itinerary(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM itineraries WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Places one stop on its day. `order_index` beyond the end of the day (or
    /// `None`) appends; otherwise later stops shift down by one. Returns the
    /// index the stop ended up at.
    pub fn insert_stop(
        &self,
        itinerary_id: &str,
        destination_id: &str,
        day: u32,
        order_index: Option<u32>,
        notes: Option<&str>,
    ) -> Result<u32> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let len: u32 = tx.query_row(
                "SELECT COUNT(*) FROM itinerary_destinations WHERE itinerary_id = ?1 AND day = ?2",
                params![itinerary_id, day],
                |r| r.get(0),
            )?;
            let position = order_index.map_or(len, |p| p.min(len));

            tx.execute(
                "UPDATE itinerary_destinations SET order_index = order_index + 1
                 WHERE itinerary_id = ?1 AND day = ?2 AND order_index >= ?3",
                params![itinerary_id, day, position],
            )?;
            tx.execute(
                "INSERT INTO itinerary_destinations
                    (itinerary_id, destination_id, day, order_index, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![itinerary_id, destination_id, day, position, notes],
            )?;
            touch_itinerary(&tx, itinerary_id)?;
            tx.commit()?;
            Ok(position)
        })
    }

    /// Removes a stop and closes the gap it leaves in its day.
    pub fn remove_stop(&self, itinerary_id: &str, destination_id: &str, day: u32) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let position: Option<u32> = tx
                .query_row(
                    "SELECT order_index FROM itinerary_destinations
                     WHERE itinerary_id = ?1 AND destination_id = ?2 AND day = ?3",
                    params![itinerary_id, destination_id, day],
                    |r| r.get(0),
                )
                .optional()?;

            let Some(position) = position else {
                return Ok(false);
            };

            tx.execute(
                "DELETE FROM itinerary_destinations
                 WHERE itinerary_id = ?1 AND destination_id = ?2 AND day = ?3",
                params![itinerary_id, destination_id, day],
            )?;
            tx.execute(
                "UPDATE itinerary_destinations SET order_index = order_index - 1
                 WHERE itinerary_id = ?1 AND day = ?2 AND order_index > ?3",
                params![itinerary_id, day, position],
            )?;
            touch_itinerary(&tx, itinerary_id)?;
            tx.commit()?;
            Ok(true)
        })
    }
}

fn insert_stops(tx: &Transaction<'_>, itinerary_id: &str, stops: &[StopFields]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO itinerary_destinations (itinerary_id, destination_id, day, order_index, notes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for stop in stops {
        stmt.execute(params![
            itinerary_id,
            stop.destination_id,
            stop.day,
            stop.order_index,
            stop.notes,
        ])?;
    }
    Ok(())
}

fn touch_itinerary(tx: &Transaction<'_>, itinerary_id: &str) -> Result<()> {
    tx.execute(
        "UPDATE itineraries SET updated_at = datetime('now') WHERE id = ?1",
        [itinerary_id],
    )?;
    Ok(())
}

fn query_stops(conn: &Connection, itinerary_id: &str) -> Result<Vec<StopRow>> {
    let mut stmt = conn.prepare(
        "SELECT s.destination_id, d.name, d.city, d.country, s.day, s.order_index, s.notes
         FROM itinerary_destinations s
         JOIN destinations d ON d.id = s.destination_id
         WHERE s.itinerary_id = ?1
         ORDER BY s.day ASC, s.order_index ASC",
    )?;

    let rows = stmt
        .query_map([itinerary_id], |row| {
            Ok(StopRow {
                destination_id: row.get(0)?,
                destination_name: row.get(1)?,
                city: row.get(2)?,
                country: row.get(3)?,
                day: row.get(4)?,
                order_index: row.get(5)?,
                notes: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn map_itinerary(row: &Row<'_>) -> rusqlite::Result<ItineraryRow> {
    Ok(ItineraryRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        is_public: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::*;

    fn fields(title: &str, is_public: bool) -> ItineraryFields {
        ItineraryFields {
            title: title.into(),
            description: None,
            start_date: "2026-05-01".into(),
            end_date: "2026-05-03".into(),
            is_public,
        }
    }

    fn stop(destination_id: &str, day: u32, order_index: u32) -> StopFields {
        StopFields { destination_id: destination_id.into(), day, order_index, notes: None }
    }

    fn seeded() -> Database {
        let db = db();
        user(&db, "u1", "ada@example.com");
        user(&db, "u2", "grace@example.com");
        destination(&db, "d1", "Louvre", "France", "Paris");
        destination(&db, "d2", "Eiffel Tower", "France", "Paris");
        destination(&db, "d3", "Versailles", "France", "Versailles");
        db
    }

    fn order(db: &Database, id: &str) -> Vec<(String, u32, u32)> {
        db.get_itinerary_stops(id)
            .unwrap()
            .into_iter()
            .map(|s| (s.destination_id, s.day, s.order_index))
            .collect()
    }

    #[test]
    fn create_writes_itinerary_and_stops_together() {
        let db = seeded();
        db.create_itinerary("i1", "u1", &fields("Paris", false), &[stop("d2", 1, 1), stop("d1", 1, 0)])
            .unwrap();

        let row = db.get_itinerary("i1").unwrap().unwrap();
        assert_eq!(row.start_date, "2026-05-01");
        assert_eq!(
            order(&db, "i1"),
            [("d1".to_string(), 1, 0), ("d2".to_string(), 1, 1)]
        );
    }

    #[test]
    fn failed_stop_insert_rolls_back_itinerary() {
        let db = seeded();
        let res = db.create_itinerary("i1", "u1", &fields("Paris", false), &[stop("ghost", 1, 0)]);
        assert!(res.is_err());
        assert!(db.get_itinerary("i1").unwrap().is_none());
    }

    #[test]
    fn update_replaces_stop_list() {
        let db = seeded();
        db.create_itinerary("i1", "u1", &fields("Paris", false), &[stop("d1", 1, 0), stop("d2", 1, 1)])
            .unwrap();

        let replaced = [stop("d3", 2, 0)];
        assert!(db.update_itinerary("i1", &fields("Paris again", true), Some(&replaced)).unwrap());
        assert_eq!(order(&db, "i1"), [("d3".to_string(), 2, 0)]);

        // Without a stop list the stops stay put.
        assert!(db.update_itinerary("i1", &fields("Renamed", true), None).unwrap());
        assert_eq!(order(&db, "i1").len(), 1);
        assert_eq!(db.get_itinerary("i1").unwrap().unwrap().title, "Renamed");

        assert!(!db.update_itinerary("missing", &fields("x", true), None).unwrap());
    }

    #[test]
    fn insert_stop_shifts_and_clamps() {
        let db = seeded();
        db.create_itinerary("i1", "u1", &fields("Paris", false), &[stop("d1", 1, 0), stop("d2", 1, 1)])
            .unwrap();

        assert_eq!(db.insert_stop("i1", "d3", 1, Some(0), Some("early")).unwrap(), 0);
        assert_eq!(
            order(&db, "i1"),
            [("d3".to_string(), 1, 0), ("d1".to_string(), 1, 1), ("d2".to_string(), 1, 2)]
        );

        // Beyond the end appends.
        assert_eq!(db.insert_stop("i1", "d1", 2, Some(9), None).unwrap(), 0);
        assert_eq!(db.insert_stop("i1", "d2", 2, None, None).unwrap(), 1);

        // Same destination twice on one day violates the key.
        assert!(db.insert_stop("i1", "d1", 2, None, None).is_err());
    }

    #[test]
    fn remove_stop_closes_gap() {
        let db = seeded();
        db.create_itinerary(
            "i1",
            "u1",
            &fields("Paris", false),
            &[stop("d1", 1, 0), stop("d2", 1, 1), stop("d3", 1, 2)],
        )
        .unwrap();

        assert!(db.remove_stop("i1", "d1", 1).unwrap());
        assert_eq!(
            order(&db, "i1"),
            [("d2".to_string(), 1, 0), ("d3".to_string(), 1, 1)]
        );
        assert!(!db.remove_stop("i1", "d1", 1).unwrap());
    }

    #[test]
    fn listing_scopes() {
        let db = seeded();
        db.create_itinerary("i1", "u1", &fields("Mine", false), &[]).unwrap();
        db.create_itinerary("i2", "u1", &fields("Mine public", true), &[]).unwrap();
        db.create_itinerary("i3", "u2", &fields("Theirs", false), &[]).unwrap();

        let window = Pagination::default();
        assert_eq!(db.list_itineraries(ItineraryScope::All, window).unwrap().1, 3);
        assert_eq!(db.list_itineraries(ItineraryScope::Owner("u1"), window).unwrap().1, 2);

        let (rows, total) = db.list_itineraries(ItineraryScope::Public, window).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, "i2");
    }

    #[test]
    fn deleting_destination_cascades_to_stops() {
        let db = seeded();
        db.create_itinerary("i1", "u1", &fields("Paris", false), &[stop("d1", 1, 0)]).unwrap();
        assert!(db.delete_destination("d1").unwrap());
        assert!(order(&db, "i1").is_empty());
    }
}
