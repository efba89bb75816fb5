use std::collections::{BTreeMap, HashSet};

use tracing::info;

use crate::models::{MonthlyPricingSent, NotificationRecord};
use crate::normalize;

/// Notification events that count as a priced estimate reaching a customer.
pub const PRICING_EVENTS: &[&str] = &["send_dashboard", "estimates_sent"];

/// Keeps pricing events only, then the first send per customer per month.
pub fn dedupe_notifications(records: &[NotificationRecord]) -> Vec<NotificationRecord> {
    let mut seen: HashSet<(&str, Option<&str>)> = HashSet::new();
    let mut kept = Vec::new();

    for record in records {
        if !PRICING_EVENTS.contains(&record.event_type.as_str()) {
            continue;
        }
        if seen.insert((record.customer_id.as_str(), record.year_month.as_deref())) {
            kept.push(record.clone());
        }
    }
    kept
}

/// Counts deduplicated sends per month, in chronological order. Sends
/// without a month are not counted.
pub fn monthly_pricing_sent(deduped: &[NotificationRecord]) -> Vec<MonthlyPricingSent> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for record in deduped {
        if let Some(month) = record.year_month.as_deref() {
            *counts.entry(month).or_insert(0) += 1;
        }
    }

    let mut rows: Vec<MonthlyPricingSent> = counts
        .into_iter()
        .map(|(year_month, pricing_sent)| MonthlyPricingSent {
            year_month: year_month.to_string(),
            pricing_sent,
        })
        .collect();
    normalize::sort_chronologically(&mut rows, |row| row.year_month.as_str());

    info!(
        notifications = deduped.len(),
        months = rows.len(),
        "pricing sent derived from notifications"
    );
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(customer: &str, month: Option<&str>, event: &str) -> NotificationRecord {
        NotificationRecord {
            datetime_sent: month.and_then(normalize::parse_month_label),
            year_month: month.map(str::to_string),
            customer_id: customer.to_string(),
            event_type: event.to_string(),
        }
    }

    #[test]
    fn repeat_sends_count_once_per_month() {
        let records = vec![
            notification("c-1", Some("Jan. 2024"), "send_dashboard"),
            notification("c-1", Some("Jan. 2024"), "send_dashboard"),
            notification("c-2", Some("Jan. 2024"), "estimates_sent"),
        ];

        let counts = monthly_pricing_sent(&dedupe_notifications(&records));
        assert_eq!(
            counts,
            vec![MonthlyPricingSent {
                year_month: "Jan. 2024".to_string(),
                pricing_sent: 2,
            }]
        );
    }

    #[test]
    fn first_occurrence_wins() {
        let records = vec![
            notification("c-1", Some("Mar. 2024"), "estimates_sent"),
            notification("c-1", Some("Mar. 2024"), "send_dashboard"),
        ];

        let deduped = dedupe_notifications(&records);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].event_type, "estimates_sent");
    }

    #[test]
    fn at_most_one_row_per_customer_month() {
        let records = vec![
            notification("a", Some("Jan. 2024"), "send_dashboard"),
            notification("a", Some("Feb. 2024"), "send_dashboard"),
            notification("b", Some("Jan. 2024"), "estimates_sent"),
            notification("a", Some("Jan. 2024"), "estimates_sent"),
            notification("b", Some("Jan. 2024"), "send_dashboard"),
        ];

        let deduped = dedupe_notifications(&records);
        let mut keys: Vec<(&str, Option<&str>)> = deduped
            .iter()
            .map(|r| (r.customer_id.as_str(), r.year_month.as_deref()))
            .collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total);
        assert_eq!(total, 3);
    }

    #[test]
    fn other_events_and_undated_sends_are_ignored() {
        let records = vec![
            notification("a", Some("Jan. 2024"), "appointment_reminder"),
            notification("b", None, "send_dashboard"),
            notification("c", Some("Dec. 2023"), "send_dashboard"),
        ];

        let counts = monthly_pricing_sent(&dedupe_notifications(&records));
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].year_month, "Dec. 2023");
        assert_eq!(counts[0].pricing_sent, 1);
    }

    #[test]
    fn months_come_out_in_calendar_order() {
        let records = vec![
            notification("a", Some("Mar. 2024"), "send_dashboard"),
            notification("a", Some("Dec. 2023"), "send_dashboard"),
            notification("a", Some("Jan. 2024"), "send_dashboard"),
        ];

        let months: Vec<String> = monthly_pricing_sent(&dedupe_notifications(&records))
            .into_iter()
            .map(|row| row.year_month)
            .collect();
        assert_eq!(months, vec!["Dec. 2023", "Jan. 2024", "Mar. 2024"]);
    }

    #[test]
    fn empty_input_gives_empty_counts() {
        assert!(monthly_pricing_sent(&dedupe_notifications(&[])).is_empty());
    }
}
