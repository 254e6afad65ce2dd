mod destinations;
mod itineraries;
mod reviews;
mod users;
mod wishlists;

pub use itineraries::ItineraryScope;

use anyhow::Result;
use rusqlite::types::Value;

use crate::Database;
use crate::models::TableCounts;

impl Database {
    /// Row counts for the admin dashboard.
    pub fn table_counts(&self) -> Result<TableCounts> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64> {
                let n: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
                Ok(n as u64)
            };

            Ok(TableCounts {
                users: count("users")?,
                destinations: count("destinations")?,
                itineraries: count("itineraries")?,
                reviews: count("reviews")?,
                wishlists: count("wishlists")?,
            })
        })
    }
}

/// Accumulates `WHERE` clauses with their positional parameters.
#[derive(Default)]
struct Filters {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Filters {
    /// `clause` uses a bare `?` for each parameter, in order.
    fn push(&mut self, clause: &str, values: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.to_string());
        self.params.extend(values);
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Params followed by LIMIT and OFFSET values.
    fn with_window(&self, limit: u32, offset: u64) -> Vec<Value> {
        let mut params = self.params.clone();
        params.push(Value::Integer(i64::from(limit)));
        params.push(Value::Integer(offset as i64));
        params
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;

    #[test]
    fn table_counts_track_inserts() {
        let db = db();
        user(&db, "u1", "a@example.com");
        destination(&db, "d1", "Louvre", "France", "Paris");
        destination(&db, "d2", "Colosseum", "Italy", "Rome");

        let counts = db.table_counts().unwrap();
        assert_eq!(counts.users, 1);
        assert_eq!(counts.destinations, 2);
        assert_eq!(counts.reviews, 0);
    }
}
