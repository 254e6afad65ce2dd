//! Row → wire conversions. Corrupt stored values are logged and replaced
//! with defaults rather than failing the whole response.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use wander_db::models::{DestinationRow, ItineraryRow, ReviewRow, StopRow, UserRow, WishlistRow};
use wander_types::models::{Destination, Itinerary, ItineraryStop, Review, Role, User, Wishlist};

pub fn parse_id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", raw, e);
        Uuid::default()
    })
}

pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            // Parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub fn parse_date(raw: &str) -> NaiveDate {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt date '{}': {}", raw, e);
        NaiveDate::default()
    })
}

pub fn user(row: UserRow) -> User {
    let role = row.role.parse().unwrap_or_else(|e| {
        warn!("Corrupt role on user '{}': {}", row.id, e);
        Role::User
    });

    User {
        id: parse_id(&row.id),
        email: row.email,
        name: row.name,
        role,
        email_verified: row.email_verified,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

pub fn destination(row: DestinationRow) -> Destination {
    Destination {
        id: parse_id(&row.id),
        name: row.name,
        country: row.country,
        city: row.city,
        description: row.description,
        latitude: row.latitude,
        longitude: row.longitude,
        images: row.images,
        // One decimal place is plenty for a 1-5 scale.
        average_rating: row.average_rating.map(|r| (r * 10.0).round() / 10.0),
        review_count: row.review_count.max(0) as u32,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

pub fn itinerary(row: ItineraryRow) -> Itinerary {
    Itinerary {
        id: parse_id(&row.id),
        user_id: parse_id(&row.user_id),
        title: row.title,
        description: row.description,
        start_date: parse_date(&row.start_date),
        end_date: parse_date(&row.end_date),
        is_public: row.is_public,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

pub fn stop(row: StopRow) -> ItineraryStop {
    ItineraryStop {
        destination_id: parse_id(&row.destination_id),
        destination_name: row.destination_name,
        city: row.city,
        country: row.country,
        day: row.day,
        order_index: row.order_index,
        notes: row.notes,
    }
}

pub fn review(row: ReviewRow) -> Review {
    Review {
        id: parse_id(&row.id),
        user_id: parse_id(&row.user_id),
        user_name: row.user_name,
        destination_id: parse_id(&row.destination_id),
        rating: row.rating,
        comment: row.comment,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

pub fn wishlist(row: WishlistRow) -> Wishlist {
    Wishlist {
        id: parse_id(&row.id),
        user_id: parse_id(&row.user_id),
        name: row.name,
        destination_count: row.destination_count.max(0) as u32,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn sqlite_timestamps_parse_as_utc() {
        let ts = parse_timestamp("2026-03-14 09:26:53");
        assert_eq!((ts.year(), ts.month(), ts.day()), (2026, 3, 14));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (9, 26, 53));
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        assert_eq!(parse_id("not-a-uuid"), Uuid::default());
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::default());
        assert_eq!(parse_date("2026-02-30"), NaiveDate::default());
    }

    #[test]
    fn destination_rating_is_rounded() {
        let row = DestinationRow {
            id: Uuid::new_v4().to_string(),
            name: "Louvre".into(),
            country: "France".into(),
            city: "Paris".into(),
            description: None,
            latitude: None,
            longitude: None,
            images: vec![],
            average_rating: Some(4.3333),
            review_count: 3,
            created_at: "2026-01-01 00:00:00".into(),
            updated_at: "2026-01-01 00:00:00".into(),
        };
        let dest = destination(row);
        assert_eq!(dest.average_rating, Some(4.3));
        assert_eq!(dest.review_count, 3);
    }
}
