use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Row, params, params_from_iter};

use wander_types::query::Pagination;

use super::destinations::{DESTINATION_SELECT, map_destination};
use super::{Filters, OptionalExt};
use crate::Database;
use crate::models::{DestinationRow, WishlistRow};

const WISHLIST_SELECT: &str = "
    SELECT w.id, w.user_id, w.name,
           (SELECT COUNT(*) FROM wishlist_destinations wd WHERE wd.wishlist_id = w.id),
           w.created_at, w.updated_at
    FROM wishlists w";

impl Database {
    pub fn create_wishlist(&self, id: &str, user_id: &str, name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO wishlists (id, user_id, name) VALUES (?1, ?2, ?3)",
                [id, user_id, name],
            )?;
            Ok(())
        })
    }

    pub fn get_wishlist(&self, id: &str) -> Result<Option<WishlistRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} WHERE w.id = ?1", WISHLIST_SELECT))?;
            stmt.query_row([id], map_wishlist).optional()
        })
    }

    /// Lists every wishlist, or only those of `owner` when given.
    pub fn list_wishlists(
        &self,
        owner: Option<&str>,
        window: Pagination,
    ) -> Result<(Vec<WishlistRow>, u64)> {
        let mut filters = Filters::default();
        if let Some(owner) = owner {
            filters.push("w.user_id = ?", [Value::Text(owner.to_string())]);
        }

        self.with_conn(|conn| {
            let where_sql = filters.where_sql();
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM wishlists w {}", where_sql),
                params_from_iter(filters.params.iter()),
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "{} {} ORDER BY w.created_at DESC, w.rowid DESC LIMIT ? OFFSET ?",
                WISHLIST_SELECT, where_sql
            ))?;
            let rows = stmt
                .query_map(
                    params_from_iter(filters.with_window(window.limit, window.offset())),
                    map_wishlist,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }

    /// Destinations saved in a wishlist, oldest addition first.
    pub fn get_wishlist_destinations(&self, wishlist_id: &str) -> Result<Vec<DestinationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} JOIN wishlist_destinations wd ON wd.destination_id = d.id
                 WHERE wd.wishlist_id = ?1
                 ORDER BY wd.added_at ASC, wd.rowid ASC",
                DESTINATION_SELECT
            ))?;
            let rows = stmt
                .query_map([wishlist_id], map_destination)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn rename_wishlist(&self, id: &str, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE wishlists SET name = ?2, updated_at = datetime('now') WHERE id = ?1",
                [id, name],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_wishlist(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM wishlists WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Returns false if the destination was already on the list.
    pub fn add_wishlist_destination(&self, wishlist_id: &str, destination_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO wishlist_destinations (wishlist_id, destination_id)
                 VALUES (?1, ?2)",
                [wishlist_id, destination_id],
            )?;
            if changed > 0 {
                touch_wishlist(conn, wishlist_id)?;
            }
            Ok(changed > 0)
        })
    }

    pub fn remove_wishlist_destination(&self, wishlist_id: &str, destination_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM wishlist_destinations WHERE wishlist_id = ?1 AND destination_id = ?2",
                params![wishlist_id, destination_id],
            )?;
            if changed > 0 {
                touch_wishlist(conn, wishlist_id)?;
            }
            Ok(changed > 0)
        })
    }
}

fn touch_wishlist(conn: &rusqlite::Connection, wishlist_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE wishlists SET updated_at = datetime('now') WHERE id = ?1",
        [wishlist_id],
    )?;
    Ok(())
}

fn map_wishlist(row: &Row<'_>) -> rusqlite::Result<WishlistRow> {
    Ok(WishlistRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        destination_count: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::*;

    fn seeded() -> Database {
        let db = db();
        user(&db, "u1", "ada@example.com");
        user(&db, "u2", "grace@example.com");
        destination(&db, "d1", "Louvre", "France", "Paris");
        destination(&db, "d2", "Colosseum", "Italy", "Rome");
        db
    }

    #[test]
    fn adding_twice_is_reported() {
        let db = seeded();
        db.create_wishlist("w1", "u1", "Someday").unwrap();

        assert!(db.add_wishlist_destination("w1", "d1").unwrap());
        assert!(!db.add_wishlist_destination("w1", "d1").unwrap());
        assert!(db.add_wishlist_destination("w1", "d2").unwrap());

        let row = db.get_wishlist("w1").unwrap().unwrap();
        assert_eq!(row.destination_count, 2);

        let names: Vec<_> = db
            .get_wishlist_destinations("w1")
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["Louvre", "Colosseum"]);
    }

    #[test]
    fn removing_unknown_entry_is_reported() {
        let db = seeded();
        db.create_wishlist("w1", "u1", "Someday").unwrap();
        db.add_wishlist_destination("w1", "d1").unwrap();

        assert!(db.remove_wishlist_destination("w1", "d1").unwrap());
        assert!(!db.remove_wishlist_destination("w1", "d1").unwrap());
    }

    #[test]
    fn listing_by_owner() {
        let db = seeded();
        db.create_wishlist("w1", "u1", "A").unwrap();
        db.create_wishlist("w2", "u1", "B").unwrap();
        db.create_wishlist("w3", "u2", "C").unwrap();

        let window = Pagination::default();
        assert_eq!(db.list_wishlists(Some("u1"), window).unwrap().1, 2);
        assert_eq!(db.list_wishlists(None, window).unwrap().1, 3);
    }

    #[test]
    fn rename_and_delete() {
        let db = seeded();
        db.create_wishlist("w1", "u1", "A").unwrap();
        db.add_wishlist_destination("w1", "d1").unwrap();

        assert!(db.rename_wishlist("w1", "Beaches").unwrap());
        assert_eq!(db.get_wishlist("w1").unwrap().unwrap().name, "Beaches");
        assert!(db.delete_wishlist("w1").unwrap());
        assert!(db.get_wishlist("w1").unwrap().is_none());
        assert!(!db.rename_wishlist("w1", "Gone").unwrap());
    }
}
