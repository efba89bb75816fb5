use std::path::PathBuf;

use crate::error::{DashboardError, Result};

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://docs.google.com/spreadsheets/d";

/// Worksheet (or CSV file stem) names for the three extracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetNames {
    pub attribution: String,
    pub orders: String,
    pub notifications: String,
}

impl Default for SheetNames {
    fn default() -> Self {
        Self {
            attribution: "attribution_data".to_string(),
            orders: "orders_data".to_string(),
            notifications: "notifications_data".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// A directory of `<sheet>.csv` exports.
    CsvDir(PathBuf),
    /// A remote spreadsheet read through its CSV export endpoint.
    Spreadsheet {
        base_url: String,
        sheet_id: String,
        token: Option<String>,
    },
}

impl SourceConfig {
    /// Exactly one of `csv_dir` and `sheet_id` must be set.
    pub fn resolve(
        csv_dir: Option<PathBuf>,
        sheet_id: Option<String>,
        base_url: String,
        token: Option<String>,
    ) -> Result<Self> {
        let sheet_id = sheet_id.filter(|id| !id.trim().is_empty());
        let token = token.filter(|t| !t.trim().is_empty());

        match (csv_dir, sheet_id) {
            (Some(dir), None) => Ok(Self::CsvDir(dir)),
            (None, Some(sheet_id)) => Ok(Self::Spreadsheet {
                base_url: base_url.trim_end_matches('/').to_string(),
                sheet_id,
                token,
            }),
            (Some(_), Some(_)) => Err(DashboardError::Config(
                "set either a CSV directory or a spreadsheet id, not both".to_string(),
            )),
            (None, None) => Err(DashboardError::Config(
                "no data source: set DASHBOARD_CSV_DIR or DASHBOARD_SHEET_ID".to_string(),
            )),
        }
    }
}
