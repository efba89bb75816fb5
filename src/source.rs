use std::io::Read;
use std::path::Path;

use reqwest::Url;
use tracing::{error, info};

use crate::config::{SheetNames, SourceConfig};
use crate::error::{DashboardError, Result};
use crate::models::{RawRow, RawTables};

/// Reads a headed CSV body into untyped rows. Short rows simply lack the
/// trailing columns; bytes that are not UTF-8 become U+FFFD in that cell
/// only.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.byte_headers()?.iter().map(decode).collect();
    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), decode(value)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn decode(field: &[u8]) -> String {
    String::from_utf8_lossy(field).trim().to_string()
}

pub fn load_csv_dir(dir: &Path, names: &SheetNames) -> Result<RawTables> {
    let load = |name: &str| -> Result<Vec<RawRow>> {
        let path = dir.join(format!("{name}.csv"));
        let file = std::fs::File::open(&path).map_err(|e| DashboardError::Source {
            resource: path.display().to_string(),
            message: e.to_string(),
        })?;
        let rows = read_rows(file)?;
        info!(worksheet = name, rows = rows.len(), "loaded CSV extract");
        Ok(rows)
    };

    Ok(RawTables {
        attribution: load(&names.attribution)?,
        orders: load(&names.orders)?,
        notifications: load(&names.notifications)?,
    })
}

/// CSV export URL for one worksheet of a spreadsheet.
pub fn sheet_export_url(base_url: &str, sheet_id: &str, worksheet: &str) -> Result<Url> {
    let endpoint = format!("{base_url}/{sheet_id}/gviz/tq");
    Url::parse_with_params(&endpoint, &[("tqx", "out:csv"), ("sheet", worksheet)]).map_err(|e| {
        DashboardError::Config(format!("invalid spreadsheet URL {endpoint:?}: {e}"))
    })
}

async fn fetch_worksheet(
    client: &reqwest::Client,
    base_url: &str,
    sheet_id: &str,
    token: Option<&str>,
    worksheet: &str,
) -> Result<Vec<RawRow>> {
    let url = sheet_export_url(base_url, sheet_id, worksheet)?;
    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let body = request.send().await?.error_for_status()?.text().await?;
    let rows = read_rows(body.as_bytes())?;
    info!(worksheet, rows = rows.len(), "fetched worksheet");
    Ok(rows)
}

pub async fn fetch_spreadsheet(
    base_url: &str,
    sheet_id: &str,
    token: Option<&str>,
    names: &SheetNames,
) -> Result<RawTables> {
    let client = reqwest::Client::new();
    Ok(RawTables {
        attribution: fetch_worksheet(&client, base_url, sheet_id, token, &names.attribution)
            .await?,
        orders: fetch_worksheet(&client, base_url, sheet_id, token, &names.orders).await?,
        notifications: fetch_worksheet(&client, base_url, sheet_id, token, &names.notifications)
            .await?,
    })
}

pub async fn extract(config: &SourceConfig, names: &SheetNames) -> Result<RawTables> {
    match config {
        SourceConfig::CsvDir(dir) => load_csv_dir(dir, names),
        SourceConfig::Spreadsheet {
            base_url,
            sheet_id,
            token,
        } => fetch_spreadsheet(base_url, sheet_id, token.as_deref(), names).await,
    }
}

/// Runs the one-shot extraction. Any failure is logged and turned into
/// empty tables plus a diagnostic for the viewer.
pub async fn load_or_empty(
    config: Result<SourceConfig>,
    names: &SheetNames,
) -> (RawTables, Vec<String>) {
    let outcome = match config {
        Ok(config) => extract(&config, names).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(tables) => (tables, Vec::new()),
        Err(e) => {
            error!(error = %e, "data extraction failed, continuing with empty tables");
            (
                RawTables::default(),
                vec![format!("No data loaded: {e}")],
            )
        }
    }
}
