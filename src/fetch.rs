use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::{Dimension, MetricRow, MetricTable};

const API_BASE: &str = "https://www.googleapis.com/webmasters/v3/sites";
const PAGE_SIZE: usize = 25_000;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    Contains,
    NotContains,
}

#[derive(Debug, Clone, Serialize)]
pub struct DimensionFilter {
    pub dimension: Dimension,
    pub operator: FilterOperator,
    pub expression: String,
}

impl DimensionFilter {
    pub fn equals(dimension: Dimension, expression: impl Into<String>) -> Self {
        Self {
            dimension,
            operator: FilterOperator::Equals,
            expression: expression.into(),
        }
    }

    pub fn contains(dimension: Dimension, expression: impl Into<String>) -> Self {
        Self {
            dimension,
            operator: FilterOperator::Contains,
            expression: expression.into(),
        }
    }

    pub fn not_contains(dimension: Dimension, expression: impl Into<String>) -> Self {
        Self {
            dimension,
            operator: FilterOperator::NotContains,
            expression: expression.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    start_date: &'a str,
    end_date: &'a str,
    dimensions: &'a [Dimension],
    row_limit: usize,
    start_row: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dimension_filter_groups: Vec<FilterGroup<'a>>,
}

#[derive(Debug, Serialize)]
struct FilterGroup<'a> {
    filters: &'a [DimensionFilter],
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rows: Vec<ApiRow>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiRow {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    clicks: f64,
    #[serde(default)]
    impressions: f64,
    #[serde(default)]
    ctr: f64,
    #[serde(default)]
    position: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiteListResponse {
    #[serde(default)]
    site_entry: Vec<SiteEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiteEntry {
    site_url: String,
}

pub struct SearchConsoleClient {
    http: reqwest::blocking::Client,
    access_token: String,
}

impl SearchConsoleClient {
    pub fn new(http: reqwest::blocking::Client, access_token: String) -> Self {
        Self { http, access_token }
    }

    pub fn list_properties(&self) -> Result<Vec<String>> {
        let response = self
            .http
            .get(API_BASE)
            .bearer_auth(&self.access_token)
            .send()
            .context("site list request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("site list rejected ({status}): {body}");
        }

        let listing: SiteListResponse = response
            .json()
            .context("failed to parse site list response")?;
        let sites: Vec<String> = listing
            .site_entry
            .into_iter()
            .map(|entry| entry.site_url)
            .collect();
        info!(count = sites.len(), "listed properties");
        Ok(sites)
    }

    pub fn fetch_performance(
        &self,
        site_url: &str,
        start_date: &str,
        end_date: &str,
        dimensions: &[Dimension],
        filters: &[DimensionFilter],
    ) -> Result<MetricTable> {
        let mut table = MetricTable::new(dimensions.to_vec());
        let mut start_row = 0_usize;

        loop {
            let request = QueryRequest {
                start_date,
                end_date,
                dimensions,
                row_limit: PAGE_SIZE,
                start_row,
                dimension_filter_groups: if filters.is_empty() {
                    Vec::new()
                } else {
                    vec![FilterGroup { filters }]
                },
            };

            let rows = match self.query_page(site_url, &request) {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(start_row, error = %err, "fetch error, keeping partial results");
                    break;
                }
            };

            let fetched = rows.len();
            debug!(fetched, start_row, "fetched page");
            if fetched == 0 {
                break;
            }

            for row in rows {
                table.rows.push(map_row(row, dimensions.len()));
            }
            start_row += fetched;

            if fetched < PAGE_SIZE {
                break;
            }
        }

        info!(
            rows = table.len(),
            dimensions = ?dimensions,
            "fetch complete"
        );
        Ok(table)
    }

    fn query_page(&self, site_url: &str, request: &QueryRequest<'_>) -> Result<Vec<ApiRow>> {
        let url = format!(
            "{API_BASE}/{}/searchAnalytics/query",
            encode_site_url(site_url)
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .with_context(|| format!("search analytics request for {site_url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("search analytics query rejected ({status}): {body}");
        }

        let payload: QueryResponse = response
            .json()
            .context("failed to parse search analytics response")?;
        Ok(payload.rows)
    }
}

fn map_row(row: ApiRow, dimension_count: usize) -> MetricRow {
    let mut keys = row.keys;
    keys.resize(dimension_count, String::new());
    MetricRow {
        keys,
        clicks: row.clicks.round() as u64,
        impressions: row.impressions.round() as u64,
        ctr: row.ctr,
        position: row.position,
    }
}

fn encode_site_url(site_url: &str) -> String {
    url::form_urlencoded::byte_serialize(site_url.as_bytes()).collect()
}
