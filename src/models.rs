use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

/// One untyped row as it arrives from a worksheet: header -> cell text.
pub type RawRow = HashMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub attribution: Vec<RawRow>,
    pub orders: Vec<RawRow>,
    pub notifications: Vec<RawRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributionRecord {
    pub time_period: Option<NaiveDate>,
    pub year_month: Option<String>,
    pub source: String,
    pub campaign_name: String,
    pub display_source: String,
    pub inquiries: f64,
    pub pricing_sent: f64,
    pub orders: f64,
    pub paid_orders: f64,
    pub total_job_amount: f64,
    pub campaign_cost: f64,
    pub cost_per_closed_sale: f64,
    pub cost_per_lead: f64,
    pub roi_numeric: f64,
    pub roi_display: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub timeslot_datetime: Option<NaiveDate>,
    pub year_month: Option<String>,
    pub services_price: f64,
    pub discount_amount: f64,
    pub order_total: f64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub datetime_sent: Option<NaiveDate>,
    pub year_month: Option<String>,
    pub customer_id: String,
    pub event_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPricingSent {
    pub year_month: String,
    pub pricing_sent: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GroupingKey {
    /// Raw marketing source
    Source,
    /// Campaign name, or the source when there is no campaign
    Campaign,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedGroupRow {
    pub display_source: String,
    pub period: String,
    pub inquiries: f64,
    pub pricing_sent: f64,
    pub orders: f64,
    pub paid_orders: f64,
    pub total_job_amount: f64,
    pub campaign_cost: f64,
    pub cost_per_lead: f64,
    pub conversion_rate: f64,
    pub booking_rate: f64,
    pub roi_numeric: f64,
    pub roi_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummaryRow {
    pub year_month: String,
    pub inquiries: f64,
    pub new_orders: f64,
    pub campaign_cost: f64,
    pub total_job_amount: f64,
    pub pricing_sent: f64,
    pub order_total: f64,
    pub total_orders: u64,
    pub cost_per_lead: f64,
    pub conversion_rate: f64,
    pub booking_rate: f64,
    pub roi_numeric: f64,
    pub roi_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueRow {
    pub year_month: String,
    pub order_total: f64,
}

/// The three tables a query produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub grouped: Vec<AggregatedGroupRow>,
    pub monthly: Vec<MonthlySummaryRow>,
    pub revenue: Vec<RevenueRow>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.grouped.is_empty() && self.monthly.is_empty() && self.revenue.is_empty()
    }
}

/// Normalized data for one session. Built once, read by every query.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub attribution: Vec<AttributionRecord>,
    pub orders: Vec<OrderRecord>,
    pub notifications: Vec<NotificationRecord>,
    pub pricing_sent: Vec<MonthlyPricingSent>,
    /// Problems hit while loading, shown to the viewer.
    pub diagnostics: Vec<String>,
}
