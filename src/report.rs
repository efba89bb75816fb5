use std::fmt::Write;

use serde::Serialize;

use crate::models::{AggregatedGroupRow, GroupingKey, MonthlySummaryRow, QueryResult, RevenueRow};
use crate::ratios::{self, percent_label, round_to, safe_div};

/// `1234567.4` -> `"1,234,567"`.
pub fn format_count(value: f64) -> String {
    let whole = round_to(value, 0) as i64;
    let digits = whole.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if whole < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// `1234.0` -> `"$1,234"`, `-50.0` -> `"-$50"`.
pub fn format_currency(value: f64) -> String {
    let formatted = format_count(value);
    match formatted.strip_prefix('-') {
        Some(rest) => format!("-${rest}"),
        None => format!("${formatted}"),
    }
}

/// Headline numbers for the selected period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMetrics {
    pub period: String,
    pub total_revenue: f64,
    pub total_inquiries: f64,
    pub total_orders: u64,
    pub total_pricing_sent: f64,
    pub avg_cost_per_lead: f64,
    /// Percent, one decimal.
    pub conversion_rate: f64,
    /// Percent, one decimal.
    pub booking_rate: f64,
}

/// `None` when the grouped rollup is empty.
pub fn key_metrics(result: &QueryResult, period: &str) -> Option<KeyMetrics> {
    if result.grouped.is_empty() {
        return None;
    }

    let total_inquiries: f64 = result.grouped.iter().map(|row| row.inquiries).sum();
    let total_pricing_sent: f64 = result.grouped.iter().map(|row| row.pricing_sent).sum();
    let attributed_orders: f64 = result.grouped.iter().map(|row| row.orders).sum();
    let campaign_cost: f64 = result.grouped.iter().map(|row| row.campaign_cost).sum();

    Some(KeyMetrics {
        period: period.to_string(),
        total_revenue: result.revenue.iter().map(|row| row.order_total).sum(),
        total_inquiries,
        total_orders: result.monthly.iter().map(|row| row.total_orders).sum(),
        total_pricing_sent,
        avg_cost_per_lead: ratios::cost_per_lead(campaign_cost, total_inquiries),
        conversion_rate: round_to(safe_div(attributed_orders, total_pricing_sent) * 100.0, 1),
        booking_rate: round_to(safe_div(total_pricing_sent, total_inquiries) * 100.0, 1),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub stage: &'static str,
    pub value: f64,
    pub percent_of_inquiries: f64,
}

/// Inquiries -> pricing sent -> orders -> paid orders across all groups.
pub fn funnel(grouped: &[AggregatedGroupRow]) -> Vec<FunnelStage> {
    if grouped.is_empty() {
        return Vec::new();
    }

    let total = |f: fn(&AggregatedGroupRow) -> f64| grouped.iter().map(f).sum::<f64>();
    let inquiries = total(|row| row.inquiries);
    let stages = [
        ("Inquiries", inquiries),
        ("Pricing Sent", total(|row| row.pricing_sent)),
        ("Orders", total(|row| row.orders)),
        ("Paid Orders", total(|row| row.paid_orders)),
    ];

    stages
        .into_iter()
        .map(|(stage, value)| FunnelStage {
            stage,
            value,
            percent_of_inquiries: round_to(safe_div(value, inquiries) * 100.0, 1),
        })
        .collect()
}

/// Each group's share of inquiries, in percent with one decimal.
pub fn inquiry_shares(grouped: &[AggregatedGroupRow]) -> Vec<(String, f64)> {
    let total: f64 = grouped.iter().map(|row| row.inquiries).sum();
    grouped
        .iter()
        .map(|row| {
            (
                row.display_source.clone(),
                round_to(safe_div(row.inquiries, total) * 100.0, 1),
            )
        })
        .collect()
}

/// Display-ready strings. The numeric rows they come from are left alone.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayTable {
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

pub fn group_table(rows: &[AggregatedGroupRow], key: GroupingKey) -> DisplayTable {
    let label = match key {
        GroupingKey::Source => "Source",
        GroupingKey::Campaign => "Campaign",
    };
    DisplayTable {
        headers: vec![
            label,
            "Month",
            "Inquiries",
            "Pricing Sent",
            "Orders",
            "Paid Orders",
            "Total Job Amount",
            "Campaign Cost",
            "Cost per Lead",
            "Conversion Rate",
            "Booking Rate",
            "ROI",
        ],
        rows: rows
            .iter()
            .map(|row| {
                vec![
                    row.display_source.clone(),
                    row.period.clone(),
                    format_count(row.inquiries),
                    format_count(row.pricing_sent),
                    format_count(row.orders),
                    format_count(row.paid_orders),
                    format_currency(row.total_job_amount),
                    format_currency(row.campaign_cost),
                    format_currency(row.cost_per_lead),
                    percent_label(row.conversion_rate),
                    percent_label(row.booking_rate),
                    percent_label(row.roi_numeric),
                ]
            })
            .collect(),
    }
}

pub fn monthly_table(rows: &[MonthlySummaryRow]) -> DisplayTable {
    DisplayTable {
        headers: vec![
            "Month",
            "Inquiries",
            "New Orders",
            "Total Orders",
            "Pricing Sent",
            "Campaign Cost",
            "Total Job Amount",
            "Order Total",
            "Cost per Lead",
            "Conversion Rate",
            "Booking Rate",
            "ROI",
        ],
        rows: rows
            .iter()
            .map(|row| {
                vec![
                    row.year_month.clone(),
                    format_count(row.inquiries),
                    format_count(row.new_orders),
                    format_count(row.total_orders as f64),
                    format_count(row.pricing_sent),
                    format_currency(row.campaign_cost),
                    format_currency(row.total_job_amount),
                    format_currency(row.order_total),
                    format_currency(row.cost_per_lead),
                    percent_label(row.conversion_rate),
                    percent_label(row.booking_rate),
                    percent_label(row.roi_numeric),
                ]
            })
            .collect(),
    }
}

pub fn revenue_table(rows: &[RevenueRow]) -> DisplayTable {
    DisplayTable {
        headers: vec!["Month", "Revenue"],
        rows: rows
            .iter()
            .map(|row| vec![row.year_month.clone(), format_currency(row.order_total)])
            .collect(),
    }
}

fn write_markdown_table(output: &mut String, table: &DisplayTable) {
    let _ = writeln!(output, "| {} |", table.headers.join(" | "));
    let _ = writeln!(
        output,
        "|{}",
        table.headers.iter().map(|_| " --- |").collect::<String>()
    );
    for row in &table.rows {
        let _ = writeln!(output, "| {} |", row.join(" | "));
    }
}

fn write_text_table(output: &mut String, table: &DisplayTable) {
    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.len()).collect();
    for row in &table.rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let _ = writeln!(output, "{}", line(table.headers.clone()).trim_end());
    let _ = writeln!(
        output,
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  ")
    );
    for row in &table.rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        let _ = writeln!(output, "{}", line(cells).trim_end());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Text,
    Markdown,
}

fn render(
    style: Style,
    result: &QueryResult,
    key: GroupingKey,
    period: &str,
    diagnostics: &[String],
) -> String {
    let mut output = String::new();
    let heading = |output: &mut String, title: &str| {
        let _ = match style {
            Style::Markdown => writeln!(output, "## {title}"),
            Style::Text => writeln!(output, "{title}\n{}", "=".repeat(title.len())),
        };
    };
    let table = |output: &mut String, table: &DisplayTable| match style {
        Style::Markdown => write_markdown_table(output, table),
        Style::Text => write_text_table(output, table),
    };
    let bullet = match style {
        Style::Markdown => "- ",
        Style::Text => "  ",
    };

    if style == Style::Markdown {
        let _ = writeln!(output, "# Marketing Attribution Report");
        let _ = writeln!(output, "Period: {period}");
        let _ = writeln!(output);
    }

    for diagnostic in diagnostics {
        let _ = writeln!(output, "{bullet}Warning: {diagnostic}");
    }
    if !diagnostics.is_empty() {
        let _ = writeln!(output);
    }

    heading(&mut output, "Key Metrics");
    match key_metrics(result, period) {
        Some(metrics) => {
            let lines = [
                ("Total Revenue", format_currency(metrics.total_revenue)),
                ("Total Inquiries", format_count(metrics.total_inquiries)),
                ("Total Orders", format_count(metrics.total_orders as f64)),
                ("Pricing Sent", format_count(metrics.total_pricing_sent)),
                ("Cost per Lead", format_currency(metrics.avg_cost_per_lead)),
                ("Conversion Rate", format!("{:.1}%", metrics.conversion_rate)),
                ("Booking Rate", format!("{:.1}%", metrics.booking_rate)),
                ("Period", metrics.period),
            ];
            for (label, value) in lines {
                let _ = writeln!(output, "{bullet}{label}: {value}");
            }
        }
        None => {
            let _ = writeln!(output, "No metrics data to display.");
        }
    }

    let _ = writeln!(output);
    heading(&mut output, "Monthly Revenue Trend");
    if result.revenue.is_empty() {
        let _ = writeln!(output, "No revenue trend data to display.");
    } else {
        table(&mut output, &revenue_table(&result.revenue));
    }

    let _ = writeln!(output);
    heading(&mut output, "Marketing Funnel");
    let stages = funnel(&result.grouped);
    if stages.is_empty() {
        let _ = writeln!(output, "No funnel data to display.");
    } else {
        for stage in stages {
            let _ = writeln!(
                output,
                "{bullet}{}: {} ({:.1}%)",
                stage.stage,
                format_count(stage.value),
                stage.percent_of_inquiries
            );
        }
    }

    let _ = writeln!(output);
    heading(&mut output, "Inquiries by Source/Campaign");
    let shares = inquiry_shares(&result.grouped);
    if shares.is_empty() {
        let _ = writeln!(output, "No attribution data to display.");
    } else {
        for (group, share) in shares {
            let _ = writeln!(output, "{bullet}{group}: {share:.1}%");
        }
    }

    let _ = writeln!(output);
    heading(&mut output, "Monthly Summary");
    if result.monthly.is_empty() {
        let _ = writeln!(output, "No monthly data to display.");
    } else {
        table(&mut output, &monthly_table(&result.monthly));
    }

    let _ = writeln!(output);
    let summary_title = match key {
        GroupingKey::Source => "Source Summary",
        GroupingKey::Campaign => "Campaign Summary",
    };
    heading(&mut output, summary_title);
    if result.grouped.is_empty() {
        let _ = writeln!(output, "No summary data to display.");
    } else {
        table(&mut output, &group_table(&result.grouped, key));
    }

    output
}

/// Plain-text rendering for the terminal.
pub fn build_summary(
    result: &QueryResult,
    key: GroupingKey,
    period: &str,
    diagnostics: &[String],
) -> String {
    render(Style::Text, result, key, period, diagnostics)
}

pub fn build_report(
    result: &QueryResult,
    key: GroupingKey,
    period: &str,
    diagnostics: &[String],
) -> String {
    render(Style::Markdown, result, key, period, diagnostics)
}
