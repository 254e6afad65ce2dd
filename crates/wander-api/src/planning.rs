//! Day/position bookkeeping for itinerary stops.
//!
//! Clients send stops as `(destination, day, optional order_index)`. Within a
//! day, explicit indexes sort first by value, stops without one follow, and
//! ties keep submission order. The result is renumbered densely from zero, so
//! colliding indexes never reach the database.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use uuid::Uuid;

use wander_db::models::StopFields;
use wander_types::api::StopInput;

use crate::error::ApiError;
use crate::validate::optional_text;

/// Longest trip accepted, in days.
pub const MAX_TRIP_DAYS: u32 = 365;

/// Longest note accepted on a single stop.
pub const MAX_NOTES_CHARS: usize = 1000;

/// Inclusive number of days between the two dates.
pub fn trip_days(start: NaiveDate, end: NaiveDate) -> Result<u32, ApiError> {
    if end < start {
        return Err(ApiError::validation("end_date must not be before start_date"));
    }
    let days = (end - start).num_days() + 1;
    if days > i64::from(MAX_TRIP_DAYS) {
        return Err(ApiError::validation(format!(
            "itineraries may span at most {} days",
            MAX_TRIP_DAYS
        )));
    }
    Ok(days as u32)
}

/// Checks that `day` falls inside a trip of `trip_days` days.
pub fn check_day(day: u32, trip_days: u32) -> Result<(), ApiError> {
    if day == 0 || day > trip_days {
        return Err(ApiError::validation(format!(
            "day must be between 1 and {}",
            trip_days
        )));
    }
    Ok(())
}

/// Validates the stops and resolves their final order.
pub fn plan_stops(stops: Vec<StopInput>, trip_days: u32) -> Result<Vec<StopFields>, ApiError> {
    let mut seen: HashSet<(Uuid, u32)> = HashSet::new();
    let mut days: BTreeMap<u32, Vec<(u32, usize, StopInput)>> = BTreeMap::new();

    for (position, stop) in stops.into_iter().enumerate() {
        check_day(stop.day, trip_days)?;
        if !seen.insert((stop.destination_id, stop.day)) {
            return Err(ApiError::validation(format!(
                "destination {} appears twice on day {}",
                stop.destination_id, stop.day
            )));
        }
        let key = stop.order_index.unwrap_or(u32::MAX);
        days.entry(stop.day).or_default().push((key, position, stop));
    }

    let mut planned = Vec::new();
    for (day, mut entries) in days {
        entries.sort_by_key(|(key, position, _)| (*key, *position));
        for (index, (_, _, stop)) in entries.into_iter().enumerate() {
            planned.push(StopFields {
                destination_id: stop.destination_id.to_string(),
                day,
                order_index: index as u32,
                notes: optional_text("notes", stop.notes, MAX_NOTES_CHARS)?,
            });
        }
    }

    Ok(planned)
}

/// Distinct destination ids referenced by a plan.
pub fn referenced_destinations(plan: &[StopFields]) -> Vec<String> {
    let mut ids: Vec<String> = plan.iter().map(|s| s.destination_id.clone()).collect();
    ids.sort();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(destination: Uuid, day: u32, order_index: Option<u32>) -> StopInput {
        StopInput { destination_id: destination, day, order_index, notes: None }
    }

    fn layout(plan: &[StopFields]) -> Vec<(String, u32, u32)> {
        plan.iter().map(|s| (s.destination_id.clone(), s.day, s.order_index)).collect()
    }

    #[test]
    fn trip_length_is_inclusive() {
        let d = |s: &str| s.parse::<NaiveDate>().unwrap();
        assert_eq!(trip_days(d("2026-07-01"), d("2026-07-01")).unwrap(), 1);
        assert_eq!(trip_days(d("2026-07-01"), d("2026-07-05")).unwrap(), 5);
        assert!(trip_days(d("2026-07-05"), d("2026-07-01")).is_err());
        assert!(trip_days(d("2026-01-01"), d("2027-01-01")).is_err());
    }

    #[test]
    fn explicit_indexes_sort_and_renumber_densely() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let plan = plan_stops(
            vec![input(a, 1, Some(10)), input(b, 1, Some(3)), input(c, 1, Some(7))],
            3,
        )
        .unwrap();

        assert_eq!(
            layout(&plan),
            [(b.to_string(), 1, 0), (c.to_string(), 1, 1), (a.to_string(), 1, 2)]
        );
    }

    #[test]
    fn colliding_indexes_keep_submission_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let plan = plan_stops(vec![input(a, 2, Some(0)), input(b, 2, Some(0))], 2).unwrap();
        assert_eq!(layout(&plan), [(a.to_string(), 2, 0), (b.to_string(), 2, 1)]);
    }

    #[test]
    fn unindexed_stops_follow_indexed_ones() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let plan =
            plan_stops(vec![input(a, 1, None), input(b, 1, Some(5)), input(c, 1, None)], 1).unwrap();
        assert_eq!(
            layout(&plan),
            [(b.to_string(), 1, 0), (a.to_string(), 1, 1), (c.to_string(), 1, 2)]
        );
    }

    #[test]
    fn days_are_numbered_independently_and_in_order() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let plan =
            plan_stops(vec![input(a, 3, None), input(b, 1, None), input(c, 3, Some(0))], 3).unwrap();
        assert_eq!(
            layout(&plan),
            [(b.to_string(), 1, 0), (c.to_string(), 3, 0), (a.to_string(), 3, 1)]
        );
    }

    #[test]
    fn same_destination_may_repeat_on_other_days_only() {
        let a = Uuid::new_v4();
        assert!(plan_stops(vec![input(a, 1, None), input(a, 2, None)], 2).is_ok());
        assert!(plan_stops(vec![input(a, 1, None), input(a, 1, Some(4))], 2).is_err());
    }

    #[test]
    fn days_outside_the_trip_are_rejected() {
        let a = Uuid::new_v4();
        assert!(plan_stops(vec![input(a, 0, None)], 2).is_err());
        assert!(plan_stops(vec![input(a, 3, None)], 2).is_err());
    }

    #[test]
    fn notes_are_trimmed() {
        let a = Uuid::new_v4();
        let mut stop = input(a, 1, None);
        stop.notes = Some("  bring tickets ".into());
        let plan = plan_stops(vec![stop], 1).unwrap();
        assert_eq!(plan[0].notes.as_deref(), Some("bring tickets"));
    }

    #[test]
    fn referenced_destinations_are_deduplicated() {
        let a = Uuid::new_v4();
        let plan = plan_stops(vec![input(a, 1, None), input(a, 2, None)], 2).unwrap();
        assert_eq!(referenced_destinations(&plan), [a.to_string()]);
    }
}
