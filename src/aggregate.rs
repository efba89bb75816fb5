use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dedupe;
use crate::error::{DashboardError, Result};
use crate::models::{
    AggregatedGroupRow, AttributionRecord, GroupingKey, MonthlyPricingSent, MonthlySummaryRow,
    OrderRecord, QueryResult, RawTables, RevenueRow, Snapshot,
};
use crate::normalize;
use crate::ratios::{self, Ratios};

/// Month preselected as the range start when the data reaches back that far.
pub const DEFAULT_START_MONTH: &str = "May. 2024";

/// Normalizes the raw extracts once at session start.
pub fn build_snapshot(raw: RawTables, diagnostics: Vec<String>) -> Snapshot {
    let attribution = normalize::normalize_attribution(&raw.attribution);
    let orders = normalize::normalize_orders(&raw.orders);
    let notifications =
        dedupe::dedupe_notifications(&normalize::normalize_notifications(&raw.notifications));
    let pricing_sent = dedupe::monthly_pricing_sent(&notifications);

    info!(
        attribution = attribution.len(),
        orders = orders.len(),
        notifications = notifications.len(),
        pricing_months = pricing_sent.len(),
        "snapshot ready"
    );

    Snapshot {
        attribution,
        orders,
        notifications,
        pricing_sent,
        diagnostics,
    }
}

/// Distinct attribution months, oldest first.
pub fn available_months(attribution: &[AttributionRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut months: Vec<String> = attribution
        .iter()
        .filter_map(|record| record.year_month.clone())
        .filter(|month| seen.insert(month.clone()))
        .collect();
    normalize::sort_chronologically(&mut months, |month| month.as_str());
    months
}

/// `start` defaults to [`DEFAULT_START_MONTH`] when present, else the
/// earliest month; `end` to the latest.
pub fn default_range(months: &[String]) -> Option<(String, String)> {
    let first = months.first()?;
    let last = months.last()?;
    let start = months
        .iter()
        .find(|month| month.as_str() == DEFAULT_START_MONTH)
        .unwrap_or(first);
    Some((start.clone(), last.clone()))
}

/// The contiguous run of `months` from `start` through `end`. A start that
/// sorts after the end selects nothing.
pub fn select_months(months: &[String], start: &str, end: &str) -> Result<Vec<String>> {
    let position = |label: &str| {
        months
            .iter()
            .position(|month| month == label)
            .ok_or_else(|| DashboardError::MonthOutOfRange {
                month: label.to_string(),
                available: months.to_vec(),
            })
    };
    let start_idx = position(start)?;
    let end_idx = position(end)?;

    if start_idx > end_idx {
        warn!(start, end, "start month is after end month, nothing selected");
        return Ok(Vec::new());
    }
    Ok(months[start_idx..=end_idx].to_vec())
}

pub fn period_label(start: &str, end: &str) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start} - {end}")
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    inquiries: f64,
    pricing_sent: f64,
    orders: f64,
    paid_orders: f64,
    total_job_amount: f64,
    campaign_cost: f64,
}

impl Totals {
    fn add(&mut self, record: &AttributionRecord) {
        self.inquiries += record.inquiries;
        self.pricing_sent += record.pricing_sent;
        self.orders += record.orders;
        self.paid_orders += record.paid_orders;
        self.total_job_amount += record.total_job_amount;
        self.campaign_cost += record.campaign_cost;
    }
}

fn in_months(year_month: Option<&str>, selected: &HashSet<&str>) -> bool {
    year_month.is_some_and(|month| selected.contains(month))
}

/// Sums attribution rows in the selected months per source (or display
/// source) and derives the funnel ratios for each group.
pub fn grouped_rollup(
    attribution: &[AttributionRecord],
    selected: &[String],
    key: GroupingKey,
    period: &str,
) -> Vec<AggregatedGroupRow> {
    let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();
    let mut groups: BTreeMap<&str, Totals> = BTreeMap::new();

    for record in attribution
        .iter()
        .filter(|record| in_months(record.year_month.as_deref(), &selected))
    {
        let group = match key {
            GroupingKey::Source => record.source.as_str(),
            GroupingKey::Campaign => record.display_source.as_str(),
        };
        groups.entry(group).or_default().add(record);
    }

    groups
        .into_iter()
        .map(|(group, totals)| {
            let ratios = Ratios::derive(
                totals.inquiries,
                totals.pricing_sent,
                totals.orders,
                totals.total_job_amount,
                totals.campaign_cost,
            );
            AggregatedGroupRow {
                display_source: group.to_string(),
                period: period.to_string(),
                inquiries: totals.inquiries,
                pricing_sent: totals.pricing_sent,
                orders: totals.orders,
                paid_orders: totals.paid_orders,
                total_job_amount: totals.total_job_amount,
                campaign_cost: totals.campaign_cost,
                cost_per_lead: ratios.cost_per_lead,
                conversion_rate: ratios.conversion_rate,
                booking_rate: ratios.booking_rate,
                roi_numeric: ratios.roi_numeric,
                roi_display: ratios.roi_display(),
            }
        })
        .collect()
}

/// Per-month attribution totals for the selected months, joined with
/// pricing-sent counts and order totals, oldest month first.
///
/// "New orders" are attributed orders from the marketing data and "total
/// orders" counts active order rows; the two are kept apart because not
/// every order is attributed.
pub fn monthly_rollup(
    attribution: &[AttributionRecord],
    pricing_sent: &[MonthlyPricingSent],
    orders: &[OrderRecord],
    selected: &[String],
) -> Vec<MonthlySummaryRow> {
    let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();
    let mut months: HashMap<&str, Totals> = HashMap::new();
    for record in attribution {
        if let Some(month) = record.year_month.as_deref() {
            if selected.contains(month) {
                months.entry(month).or_default().add(record);
            }
        }
    }

    let pricing: HashMap<&str, u64> = pricing_sent
        .iter()
        .map(|row| (row.year_month.as_str(), row.pricing_sent))
        .collect();

    let mut order_sums: HashMap<&str, (f64, u64)> = HashMap::new();
    for order in orders {
        if let Some(month) = order.year_month.as_deref() {
            let entry = order_sums.entry(month).or_insert((0.0, 0));
            entry.0 += order.order_total;
            entry.1 += 1;
        }
    }

    let mut rows: Vec<MonthlySummaryRow> = months
        .into_iter()
        .map(|(month, totals)| {
            let pricing_sent = pricing.get(month).copied().unwrap_or(0) as f64;
            let (order_total, total_orders) = order_sums.get(month).copied().unwrap_or((0.0, 0));
            let ratios = Ratios::derive(
                totals.inquiries,
                pricing_sent,
                totals.orders,
                totals.total_job_amount,
                totals.campaign_cost,
            );
            MonthlySummaryRow {
                year_month: month.to_string(),
                inquiries: totals.inquiries,
                new_orders: totals.orders,
                campaign_cost: totals.campaign_cost,
                total_job_amount: totals.total_job_amount,
                pricing_sent,
                order_total: ratios::round_to(order_total, 0),
                total_orders,
                cost_per_lead: ratios.cost_per_lead,
                conversion_rate: ratios.conversion_rate,
                booking_rate: ratios.booking_rate,
                roi_numeric: ratios.roi_numeric,
                roi_display: ratios.roi_display(),
            }
        })
        .collect();

    // HashMap iteration order is arbitrary; settle ties before the stable sort.
    rows.sort_by(|a, b| a.year_month.cmp(&b.year_month));
    normalize::sort_chronologically(&mut rows, |row| row.year_month.as_str());
    rows
}

/// Order revenue per selected month, oldest first.
pub fn revenue_rollup(orders: &[OrderRecord], selected: &[String]) -> Vec<RevenueRow> {
    let selected_set: HashSet<&str> = selected.iter().map(String::as_str).collect();
    let mut revenue: HashMap<&str, f64> = HashMap::new();

    for order in orders
        .iter()
        .filter(|order| in_months(order.year_month.as_deref(), &selected_set))
    {
        if let Some(month) = order.year_month.as_deref() {
            *revenue.entry(month).or_insert(0.0) += order.order_total;
        }
    }

    selected
        .iter()
        .filter_map(|month| {
            revenue.get(month.as_str()).map(|total| RevenueRow {
                year_month: month.clone(),
                order_total: *total,
            })
        })
        .collect()
}

/// The query boundary: one full recomputation for a month range and
/// grouping key.
pub fn query(snapshot: &Snapshot, start: &str, end: &str, key: GroupingKey) -> Result<QueryResult> {
    if snapshot.attribution.is_empty() {
        warn!("attribution data is empty");
        return Ok(QueryResult::default());
    }

    let months = available_months(&snapshot.attribution);
    let selected = select_months(&months, start, end)?;
    debug!(?selected, ?key, "selected months");

    let period = period_label(start, end);
    let grouped = grouped_rollup(&snapshot.attribution, &selected, key, &period);
    let monthly = monthly_rollup(
        &snapshot.attribution,
        &snapshot.pricing_sent,
        &snapshot.orders,
        &selected,
    );
    let revenue = revenue_rollup(&snapshot.orders, &selected);

    debug!(
        groups = grouped.len(),
        months = monthly.len(),
        revenue_months = revenue.len(),
        "query complete"
    );

    Ok(QueryResult {
        grouped,
        monthly,
        revenue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRow;

    fn raw(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn attribution_row(
        month: &str,
        source: &str,
        campaign: &str,
        inquiries: &str,
        pricing: &str,
        orders: &str,
        cost: &str,
        amount: &str,
    ) -> RawRow {
        raw(&[
            ("Time Period", month),
            ("Source", source),
            ("Campaign Name", campaign),
            ("Inquiries", inquiries),
            ("Pricing Sent", pricing),
            ("Orders", orders),
            ("Paid Orders", orders),
            ("Campaign Cost", cost),
            ("Total Job Amount", amount),
        ])
    }

    fn order_row(when: &str, price: &str, status: &str) -> RawRow {
        raw(&[
            ("timeslot datetime", when),
            ("Services price", price),
            ("discount amount", "0"),
            ("status", status),
        ])
    }

    fn notification_row(when: &str, customer: &str) -> RawRow {
        raw(&[
            ("datetime sent", when),
            ("Customer id", customer),
            ("Notification event", "send_dashboard"),
        ])
    }

    fn sample_snapshot() -> Snapshot {
        let raw = RawTables {
            attribution: vec![
                attribution_row("Feb. 2024", "Google", "Spring", "40", "20", "4", "200", "900"),
                attribution_row("Jan. 2024", "Google", "N/A", "100", "50", "10", "500", "2000"),
                attribution_row("Jan. 2024", "Yelp", "N/A", "10", "5", "1", "0", "300"),
                attribution_row("Mar. 2024", "Google", "Spring", "30", "10", "3", "300", "600"),
                attribution_row("Dec. 2023", "Yelp", "N/A", "8", "4", "2", "80", "400"),
                attribution_row("bogus", "Yelp", "N/A", "999", "0", "0", "0", "0"),
            ],
            orders: vec![
                order_row("2024-01-05", "100", "COMPLETED"),
                order_row("2024-01-20", "250", "COMPLETED"),
                order_row("2024-02-11", "400", "CANCELLED"),
                order_row("2024-02-12", "150", "COMPLETED"),
                order_row("2024-03-02", "75", "SCHEDULED"),
            ],
            notifications: vec![
                notification_row("2024-01-03 10:00:00", "c1"),
                notification_row("2024-01-09 10:00:00", "c1"),
                notification_row("2024-01-10 10:00:00", "c2"),
                notification_row("2024-02-01 08:00:00", "c1"),
            ],
        };
        build_snapshot(raw, Vec::new())
    }

    fn months(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn available_months_are_chronological_and_skip_bad_dates() {
        let snapshot = sample_snapshot();
        assert_eq!(
            available_months(&snapshot.attribution),
            months(&["Dec. 2023", "Jan. 2024", "Feb. 2024", "Mar. 2024"])
        );
    }

    #[test]
    fn selection_is_a_contiguous_slice() {
        let all = months(&["Dec. 2023", "Jan. 2024", "Feb. 2024", "Mar. 2024"]);
        assert_eq!(
            select_months(&all, "Jan. 2024", "Mar. 2024").unwrap(),
            months(&["Jan. 2024", "Feb. 2024", "Mar. 2024"])
        );
        assert!(select_months(&all, "Mar. 2024", "Jan. 2024")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unknown_endpoint_is_out_of_range() {
        let all = months(&["Jan. 2024", "Feb. 2024"]);
        let err = select_months(&all, "Jan. 2024", "Jul. 2030").unwrap_err();
        match err {
            DashboardError::MonthOutOfRange { month, available } => {
                assert_eq!(month, "Jul. 2030");
                assert_eq!(available, all);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn default_range_prefers_may_2024() {
        let all = months(&["Apr. 2024", "May. 2024", "Jun. 2024"]);
        assert_eq!(
            default_range(&all),
            Some(("May. 2024".to_string(), "Jun. 2024".to_string()))
        );
        let early = months(&["Jan. 2024", "Feb. 2024"]);
        assert_eq!(
            default_range(&early),
            Some(("Jan. 2024".to_string(), "Feb. 2024".to_string()))
        );
        assert_eq!(default_range(&[]), None);
    }

    #[test]
    fn single_month_ratios_match_worked_example() {
        let snapshot = sample_snapshot();
        let result = query(&snapshot, "Jan. 2024", "Jan. 2024", GroupingKey::Source).unwrap();

        let google = result
            .grouped
            .iter()
            .find(|row| row.display_source == "Google")
            .unwrap();
        assert_eq!(google.period, "Jan. 2024");
        assert_eq!(google.cost_per_lead, 5.0);
        assert_eq!(google.booking_rate, 0.5);
        assert_eq!(google.conversion_rate, 0.2);
        assert_eq!(google.roi_numeric, 3.0);
        assert_eq!(google.roi_display, "300%");

        let yelp = result
            .grouped
            .iter()
            .find(|row| row.display_source == "Yelp")
            .unwrap();
        assert_eq!(yelp.roi_numeric, 0.0);
        assert_eq!(yelp.cost_per_lead, 0.0);
    }

    #[test]
    fn grouped_inquiries_sum_to_selected_rows() {
        let snapshot = sample_snapshot();
        let selected = months(&["Jan. 2024", "Feb. 2024"]);
        let grouped = grouped_rollup(
            &snapshot.attribution,
            &selected,
            GroupingKey::Campaign,
            "Jan. 2024 - Feb. 2024",
        );

        let grouped_total: f64 = grouped.iter().map(|row| row.inquiries).sum();
        let expected: f64 = snapshot
            .attribution
            .iter()
            .filter(|r| {
                r.year_month
                    .as_ref()
                    .is_some_and(|m| selected.contains(m))
            })
            .map(|r| r.inquiries)
            .sum();
        assert_eq!(grouped_total, expected);
        assert_eq!(grouped_total, 150.0);
    }

    #[test]
    fn campaign_grouping_uses_display_source() {
        let snapshot = sample_snapshot();
        let result = query(&snapshot, "Jan. 2024", "Mar. 2024", GroupingKey::Campaign).unwrap();
        let groups: Vec<&str> = result
            .grouped
            .iter()
            .map(|row| row.display_source.as_str())
            .collect();
        assert_eq!(groups, vec!["Google", "Spring", "Yelp"]);
        assert!(result
            .grouped
            .iter()
            .all(|row| row.period == "Jan. 2024 - Mar. 2024"));
    }

    #[test]
    fn monthly_rollup_joins_pricing_and_orders() {
        let snapshot = sample_snapshot();
        let result = query(&snapshot, "Dec. 2023", "Feb. 2024", GroupingKey::Source).unwrap();

        let labels: Vec<&str> = result
            .monthly
            .iter()
            .map(|row| row.year_month.as_str())
            .collect();
        assert_eq!(labels, vec!["Dec. 2023", "Jan. 2024", "Feb. 2024"]);

        let jan = &result.monthly[1];
        assert_eq!(jan.inquiries, 110.0);
        assert_eq!(jan.new_orders, 11.0);
        assert_eq!(jan.pricing_sent, 2.0);
        assert_eq!(jan.order_total, 350.0);
        assert_eq!(jan.total_orders, 2);
        assert_eq!(jan.booking_rate, 0.02);
        assert_eq!(jan.conversion_rate, 5.5);

        let feb = &result.monthly[2];
        assert_eq!(feb.pricing_sent, 1.0);
        assert_eq!(feb.total_orders, 1);
        assert_eq!(feb.order_total, 150.0);

        let dec = &result.monthly[0];
        assert_eq!(dec.pricing_sent, 0.0);
        assert_eq!(dec.total_orders, 0);
        assert_eq!(dec.conversion_rate, 0.0);
    }

    #[test]
    fn monthly_rollup_stays_inside_the_range() {
        let snapshot = sample_snapshot();
        let result = query(&snapshot, "Jan. 2024", "Jan. 2024", GroupingKey::Source).unwrap();

        assert_eq!(result.monthly.len(), 1);
        assert_eq!(result.monthly[0].year_month, "Jan. 2024");

        let metrics = crate::report::key_metrics(&result, "Jan. 2024").unwrap();
        assert_eq!(metrics.total_orders, 2);
        assert_eq!(metrics.total_revenue, 350.0);
    }

    #[test]
    fn monthly_rollup_is_chronological() {
        let snapshot = sample_snapshot();
        let all = available_months(&snapshot.attribution);
        let monthly = monthly_rollup(
            &snapshot.attribution,
            &snapshot.pricing_sent,
            &snapshot.orders,
            &all,
        );
        assert_eq!(monthly.len(), 4);
        let dates: Vec<_> = monthly
            .iter()
            .map(|row| normalize::parse_month_label(&row.year_month))
            .collect();
        assert!(dates.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn revenue_covers_selected_months_only() {
        let snapshot = sample_snapshot();
        let result = query(&snapshot, "Feb. 2024", "Mar. 2024", GroupingKey::Source).unwrap();
        assert_eq!(
            result.revenue,
            vec![
                RevenueRow {
                    year_month: "Feb. 2024".to_string(),
                    order_total: 150.0,
                },
                RevenueRow {
                    year_month: "Mar. 2024".to_string(),
                    order_total: 75.0,
                },
            ]
        );
    }

    #[test]
    fn empty_attribution_yields_empty_tables() {
        let snapshot = build_snapshot(RawTables::default(), Vec::new());
        let result = query(&snapshot, "Jan. 2024", "Feb. 2024", GroupingKey::Campaign).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn query_does_not_touch_snapshot() {
        let snapshot = sample_snapshot();
        let before = snapshot.attribution.clone();
        let _ = query(&snapshot, "Dec. 2023", "Mar. 2024", GroupingKey::Campaign).unwrap();
        assert_eq!(snapshot.attribution, before);
    }
}
