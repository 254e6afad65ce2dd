use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                      TEXT PRIMARY KEY,
                email                   TEXT NOT NULL UNIQUE COLLATE NOCASE,
                name                    TEXT NOT NULL,
                password_hash           TEXT NOT NULL,
                role                    TEXT NOT NULL DEFAULT 'USER'
                                        CHECK (role IN ('USER', 'ADMIN')),
                email_verified          INTEGER NOT NULL DEFAULT 0,
                verification_token      TEXT UNIQUE,
                reset_token_hash        TEXT UNIQUE,
                reset_token_expires_at  TEXT,
                created_at              TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at              TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE destinations (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                country     TEXT NOT NULL,
                city        TEXT NOT NULL,
                description TEXT,
                latitude    REAL,
                longitude   REAL,
                images      TEXT NOT NULL DEFAULT '[]',
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (name, country, city)
            );

            CREATE TABLE itineraries (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                description TEXT,
                start_date  TEXT NOT NULL,
                end_date    TEXT NOT NULL,
                is_public   INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_itineraries_user ON itineraries(user_id);

            CREATE TABLE itinerary_destinations (
                itinerary_id    TEXT NOT NULL REFERENCES itineraries(id) ON DELETE CASCADE,
                destination_id  TEXT NOT NULL REFERENCES destinations(id) ON DELETE CASCADE,
                day             INTEGER NOT NULL CHECK (day >= 1),
                order_index     INTEGER NOT NULL CHECK (order_index >= 0),
                notes           TEXT,
                PRIMARY KEY (itinerary_id, destination_id, day)
            );

            CREATE INDEX idx_itinerary_destinations_order
                ON itinerary_destinations(itinerary_id, day, order_index);

            CREATE TABLE reviews (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                destination_id  TEXT NOT NULL REFERENCES destinations(id) ON DELETE CASCADE,
                rating          INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment         TEXT,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (user_id, destination_id)
            );

            CREATE INDEX idx_reviews_destination ON reviews(destination_id);

            CREATE TABLE wishlists (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_wishlists_user ON wishlists(user_id);

            CREATE TABLE wishlist_destinations (
                wishlist_id     TEXT NOT NULL REFERENCES wishlists(id) ON DELETE CASCADE,
                destination_id  TEXT NOT NULL REFERENCES destinations(id) ON DELETE CASCADE,
                added_at        TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (wishlist_id, destination_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
