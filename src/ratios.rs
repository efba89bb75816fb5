/// Rounds to `places` decimals, ties to even.
pub fn round_to(value: f64, places: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(places);
    let rounded = (value * factor).round_ties_even() / factor;
    // keeps -0.0 out of display strings
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Division where a zero denominator yields 0.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let value = numerator / denominator;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratios {
    pub cost_per_lead: f64,
    pub conversion_rate: f64,
    pub booking_rate: f64,
    pub roi_numeric: f64,
}

impl Ratios {
    pub fn derive(
        inquiries: f64,
        pricing_sent: f64,
        orders: f64,
        total_job_amount: f64,
        campaign_cost: f64,
    ) -> Self {
        Self {
            cost_per_lead: cost_per_lead(campaign_cost, inquiries),
            conversion_rate: round_to(safe_div(orders, pricing_sent), 2),
            booking_rate: round_to(safe_div(pricing_sent, inquiries), 2),
            roi_numeric: roi(total_job_amount, campaign_cost),
        }
    }

    pub fn roi_display(&self) -> String {
        percent_label(self.roi_numeric)
    }
}

pub fn cost_per_lead(campaign_cost: f64, inquiries: f64) -> f64 {
    round_to(safe_div(campaign_cost, inquiries), 0)
}

pub fn roi(total_job_amount: f64, campaign_cost: f64) -> f64 {
    round_to(safe_div(total_job_amount - campaign_cost, campaign_cost), 2)
}

/// `0.25` -> `"25%"`.
pub fn percent_label(ratio: f64) -> String {
    format!("{}%", round_to(ratio * 100.0, 0) as i64)
}
