use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::models::{AttributionRecord, NotificationRecord, OrderRecord, RawRow};
use crate::ratios;

pub const CAMPAIGN_SENTINEL: &str = "N/A";
pub const CANCELLED_STATUS: &str = "CANCELLED";
pub const EARLIEST_ORDER_YEAR: i32 = 2020;

const MONTH_LABEL_FORMAT: &str = "%b. %Y";

// Two-digit-year layouts come before their four-digit twins: `%Y` would
// read "24" as year 24, while `%y` rejects a four-digit year outright.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%m/%d/%y %I:%M:%S %p",
    "%m/%d/%y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

// Layouts without a day; parsed as the first of the month.
const MONTH_FORMATS: &[&str] = &["%b. %Y", "%b %Y", "%B %Y", "%Y-%m"];

// Anything earlier is a truncated year read through `%Y`.
const MIN_PLAUSIBLE_YEAR: i32 = 1000;

/// Tries each known layout in order; the first that parses wins. A trailing
/// zone name or offset ("UTC", "+0000") is dropped when nothing matches
/// with it attached.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    parse_layouts(value).or_else(|| strip_zone(value).and_then(parse_layouts))
}

fn parse_layouts(value: &str) -> Option<NaiveDate> {
    let plausible = |date: NaiveDate| date.year() >= MIN_PLAUSIBLE_YEAR;

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.date_naive()).filter(|d| plausible(*d));
    }
    let datetimes = DATETIME_FORMATS
        .iter()
        .filter_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|parsed| parsed.date());
    let dates = DATE_FORMATS
        .iter()
        .filter_map(|format| NaiveDate::parse_from_str(value, format).ok());
    let with_day = format!("1 {value}");
    let months = MONTH_FORMATS.iter().filter_map(|format| {
        NaiveDate::parse_from_str(&with_day, &format!("%d {format}")).ok()
    });

    datetimes.chain(dates).chain(months).find(|date| plausible(*date))
}

fn strip_zone(value: &str) -> Option<&str> {
    let (rest, zone) = value.rsplit_once(' ')?;
    let is_name = (2..=5).contains(&zone.len())
        && zone.chars().all(|c| c.is_ascii_alphabetic())
        && !zone.eq_ignore_ascii_case("AM")
        && !zone.eq_ignore_ascii_case("PM");
    let is_offset = zone.len() > 1
        && zone.starts_with(['+', '-'])
        && zone[1..].chars().all(|c| c.is_ascii_digit() || c == ':');

    (is_name || is_offset).then(|| rest.trim_end())
}

/// `2024-05-17` -> `"May. 2024"`.
pub fn month_label(date: NaiveDate) -> String {
    date.format(MONTH_LABEL_FORMAT).to_string()
}

/// Inverse of [`month_label`], used for chronological ordering.
pub fn parse_month_label(label: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("1 {}", label.trim()), &format!("%d {MONTH_LABEL_FORMAT}"))
        .ok()
        .or_else(|| parse_date(label))
}

/// Sorts labels by the month they name. Unparseable labels go last, in
/// their original relative order.
pub fn sort_chronologically<T>(items: &mut [T], label: impl Fn(&T) -> &str) {
    items.sort_by_key(|item| match parse_month_label(label(item)) {
        Some(date) => (0u8, Some(date)),
        None => (1u8, None),
    });
}

/// Text to number. Blank or non-numeric cells become 0.
pub fn coerce_number(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

fn cell<'a>(row: &'a RawRow, column: &str) -> Option<&'a str> {
    row.get(column).map(String::as_str)
}

fn text(row: &RawRow, column: &str) -> String {
    cell(row, column).unwrap_or_default().trim().to_string()
}

fn whole(row: &RawRow, column: &str) -> f64 {
    ratios::round_to(coerce_number(cell(row, column)), 0)
}

pub fn normalize_attribution(rows: &[RawRow]) -> Vec<AttributionRecord> {
    let records: Vec<AttributionRecord> = rows
        .iter()
        .map(|row| {
            let time_period = cell(row, "Time Period").and_then(parse_date);
            let source = text(row, "Source");
            let campaign_name = match text(row, "Campaign Name") {
                name if name.is_empty() => CAMPAIGN_SENTINEL.to_string(),
                name => name,
            };
            let display_source = if campaign_name == CAMPAIGN_SENTINEL {
                source.clone()
            } else {
                campaign_name.clone()
            };

            let inquiries = whole(row, "Inquiries");
            let total_job_amount = whole(row, "Total Job Amount");
            let campaign_cost = whole(row, "Campaign Cost");
            let roi_numeric = ratios::roi(total_job_amount, campaign_cost);

            AttributionRecord {
                time_period,
                year_month: time_period.map(month_label),
                source,
                campaign_name,
                display_source,
                inquiries,
                pricing_sent: whole(row, "Pricing Sent"),
                orders: whole(row, "Orders"),
                paid_orders: whole(row, "Paid Orders"),
                total_job_amount,
                campaign_cost,
                cost_per_closed_sale: whole(row, "Cost per Closed Sale"),
                cost_per_lead: ratios::cost_per_lead(campaign_cost, inquiries),
                roi_numeric,
                roi_display: ratios::percent_label(roi_numeric),
            }
        })
        .collect();

    log_dates("attribution", records.iter().map(|r| r.time_period));
    records
}

/// Normalizes order rows and keeps only the active set: not cancelled,
/// dated 2020 or later.
pub fn normalize_orders(rows: &[RawRow]) -> Vec<OrderRecord> {
    let parsed: Vec<OrderRecord> = rows
        .iter()
        .map(|row| {
            let timeslot_datetime = cell(row, "timeslot datetime").and_then(parse_date);
            let services_price = coerce_number(cell(row, "Services price"));
            let discount_amount = coerce_number(cell(row, "discount amount"));

            OrderRecord {
                timeslot_datetime,
                year_month: timeslot_datetime.map(month_label),
                services_price,
                discount_amount,
                order_total: ratios::round_to(services_price - discount_amount, 0),
                status: text(row, "status"),
            }
        })
        .collect();

    log_dates("orders", parsed.iter().map(|r| r.timeslot_datetime));

    let active: Vec<OrderRecord> = parsed
        .into_iter()
        .filter(|order| order.status != CANCELLED_STATUS)
        .filter(|order| {
            order
                .timeslot_datetime
                .is_some_and(|date| date.year() >= EARLIEST_ORDER_YEAR)
        })
        .collect();

    info!(active = active.len(), "orders filtered to active set");
    active
}

pub fn normalize_notifications(rows: &[RawRow]) -> Vec<NotificationRecord> {
    let records: Vec<NotificationRecord> = rows
        .iter()
        .map(|row| {
            let datetime_sent = cell(row, "datetime sent").and_then(parse_date);
            NotificationRecord {
                datetime_sent,
                year_month: datetime_sent.map(month_label),
                customer_id: text(row, "Customer id"),
                event_type: text(row, "Notification event"),
            }
        })
        .collect();

    log_dates("notifications", records.iter().map(|r| r.datetime_sent));
    records
}

fn log_dates(table: &str, dates: impl Iterator<Item = Option<NaiveDate>>) {
    let mut rows = 0usize;
    let mut nulls = 0usize;
    let mut first: Option<NaiveDate> = None;
    let mut last: Option<NaiveDate> = None;

    for date in dates {
        rows += 1;
        match date {
            Some(date) => {
                first = Some(first.map_or(date, |f| f.min(date)));
                last = Some(last.map_or(date, |l| l.max(date)));
            }
            None => nulls += 1,
        }
    }

    info!(table, rows, null_dates = nulls, "normalized table");
    if let (Some(first), Some(last)) = (first, last) {
        debug!(table, %first, %last, "date span");
    }
}
