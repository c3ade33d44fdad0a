//! Google Calendar links for itinerary events

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::Url;

use crate::models::ItineraryEvent;

const CALENDAR_URL: &str = "https://calendar.google.com/calendar/render";
const DEFAULT_EVENT_MINUTES: i64 = 90;
const STAMP: &str = "%Y%m%dT%H%M%S";

/// Parses the loose times the model writes: "09:00", "9:30 PM", "21:15:00", "7pm".
pub fn parse_event_time(raw: &str) -> Option<NaiveTime> {
    let lowered = raw.trim().to_lowercase();
    let (clock, meridiem) = if let Some(rest) = lowered.strip_suffix("am") {
        (rest.trim(), Some(false))
    } else if let Some(rest) = lowered.strip_suffix("pm") {
        (rest.trim(), Some(true))
    } else {
        (lowered.as_str(), None)
    };

    let mut pieces = clock.split(':');
    let mut hours: u32 = pieces.next()?.trim().parse().ok()?;
    let minutes: u32 = match pieces.next() {
        Some(m) => m.trim().parse().ok()?,
        None if meridiem.is_some() => 0,
        None => return None,
    };

    match meridiem {
        Some(true) if hours < 12 => hours += 12,
        Some(false) if hours == 12 => hours = 0,
        _ => {}
    }

    NaiveTime::from_hms_opt(hours, minutes, 0)
}

fn date_range(event: &ItineraryEvent, day: NaiveDate) -> Option<String> {
    let Some(start_time) = parse_event_time(&event.time) else {
        // all-day entry
        let next = day.succ_opt()?;
        return Some(format!("{}/{}", day.format("%Y%m%d"), next.format("%Y%m%d")));
    };

    let start: NaiveDateTime = day.and_time(start_time);
    let end = event
        .end_time
        .as_deref()
        .and_then(parse_event_time)
        .map(|t| day.and_time(t))
        .filter(|end| *end > start)
        .unwrap_or(start + Duration::minutes(DEFAULT_EVENT_MINUTES));

    Some(format!("{}/{}", start.format(STAMP), end.format(STAMP)))
}

/// "Add to calendar" link for an event held on `date` (YYYY-MM-DD).
pub fn google_calendar_link(event: &ItineraryEvent, date: &str) -> Option<String> {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let dates = date_range(event, day)?;

    let location = event
        .address
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or(event.location_name.as_str());

    let details = format!(
        "{}\n\nCost: {} {}\nContact: {}\nTransport: {}",
        event.description,
        event.cost_estimate,
        event.currency,
        event.phone_number.as_deref().unwrap_or("N/A"),
        event.transport_method,
    );

    let title = format!("Trip: {}", event.activity);
    let url = Url::parse_with_params(
        CALENDAR_URL,
        &[
            ("action", "TEMPLATE"),
            ("text", title.as_str()),
            ("dates", dates.as_str()),
            ("details", details.as_str()),
            ("location", location),
        ],
    )
    .ok()?;

    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::event;
    use std::collections::HashMap;

    fn query(link: &str) -> HashMap<String, String> {
        Url::parse(link)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_parse_event_time_variants() {
        assert_eq!(parse_event_time("09:00 AM"), NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(parse_event_time("12:15 am"), NaiveTime::from_hms_opt(0, 15, 0));
        assert_eq!(parse_event_time("7:30 PM"), NaiveTime::from_hms_opt(19, 30, 0));
        assert_eq!(parse_event_time("12:00 PM"), NaiveTime::from_hms_opt(12, 0, 0));
        assert_eq!(parse_event_time("21:15:00"), NaiveTime::from_hms_opt(21, 15, 0));
        assert_eq!(parse_event_time("7pm"), NaiveTime::from_hms_opt(19, 0, 0));
        assert_eq!(parse_event_time("Morning"), None);
        assert_eq!(parse_event_time("25:00"), None);
    }

    #[test]
    fn test_link_defaults_to_ninety_minutes() {
        let evt = event("e1", "Water puppet show");
        let link = google_calendar_link(&evt, "2023-10-27").unwrap();
        let params = query(&link);

        assert!(link.starts_with(CALENDAR_URL));
        assert_eq!(params["action"], "TEMPLATE");
        assert_eq!(params["text"], "Trip: Water puppet show");
        assert_eq!(params["dates"], "20231027T090000/20231027T103000");
        assert_eq!(params["location"], "1 Trang Tien, Hoan Kiem, Hanoi");
        assert!(params["details"].contains("Cost: 10 USD"));
        assert!(params["details"].contains("Contact: N/A"));
    }

    #[test]
    fn test_link_uses_end_time_and_location_fallback() {
        let mut evt = event("e1", "Cooking class");
        evt.end_time = Some("1:00 PM".to_string());
        evt.address = Some("   ".to_string());

        let params = query(&google_calendar_link(&evt, "2023-10-28").unwrap());
        assert_eq!(params["dates"], "20231028T090000/20231028T130000");
        assert_eq!(params["location"], "Cooking class venue");
    }

    #[test]
    fn test_unparseable_time_gives_all_day_entry() {
        let mut evt = event("e1", "Ha Long cruise");
        evt.time = "All day".to_string();

        let params = query(&google_calendar_link(&evt, "2023-10-31").unwrap());
        assert_eq!(params["dates"], "20231031/20231101");
    }

    #[test]
    fn test_bad_date_gives_none() {
        assert!(google_calendar_link(&event("e1", "x"), "Day 1").is_none());
    }
}
