use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Page,
    Query,
    Date,
    Device,
    Country,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Page => "page",
            Dimension::Query => "query",
            Dimension::Date => "date",
            Dimension::Device => "device",
            Dimension::Country => "country",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub keys: Vec<String>,
    pub clicks: u64,
    pub impressions: u64,
    pub ctr: f64,
    pub position: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricTable {
    pub dimensions: Vec<Dimension>,
    pub rows: Vec<MetricRow>,
}

impl MetricTable {
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        Self {
            dimensions,
            rows: Vec::new(),
        }
    }

    pub fn dimension_index(&self, dimension: Dimension) -> Option<usize> {
        self.dimensions.iter().position(|d| *d == dimension)
    }

    pub fn value<'a>(&self, row: &'a MetricRow, dimension: Dimension) -> Option<&'a str> {
        self.dimension_index(dimension)
            .and_then(|idx| row.keys.get(idx))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub segment: String,
    pub clicks: u64,
    pub impressions: u64,
    pub ctr: f64,
    pub avg_position: f64,
}

#[derive(Debug, Clone)]
pub struct GroupStats {
    pub key: String,
    pub clicks: u64,
    pub impressions: u64,
    pub ctr: f64,
    pub position: f64,
}

#[derive(Debug, Clone)]
pub struct DailyMetric {
    pub date: NaiveDate,
    pub clicks: u64,
    pub impressions: u64,
    pub ctr: f64,
    pub position: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyRecord {
    pub month_label: String,
    pub month: NaiveDate,
    pub clicks: u64,
    pub impressions: u64,
    pub ctr: f64,
    pub avg_position: f64,
    pub delta_clicks: Option<i64>,
    pub pct_clicks: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyAverageRecord {
    pub segment: String,
    pub clicks: f64,
    pub impressions: f64,
    pub ctr: f64,
    pub avg_position: f64,
}

#[derive(Debug, Clone)]
pub struct AnomalyRecord {
    pub date: NaiveDate,
    pub value: f64,
    pub roll_mean: f64,
    pub roll_std: f64,
    pub z_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FolderAssociation {
    pub folder: String,
    pub page: String,
    pub clicks: u64,
    pub impressions: u64,
    pub ctr: f64,
    pub avg_position: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderRecord {
    pub folder: String,
    pub url_count: usize,
    pub clicks: u64,
    pub impressions: u64,
    pub avg_ctr: f64,
    pub avg_position: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopFolderRecord {
    pub folder: String,
    pub clicks: u64,
    pub impressions: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderUrlsRecord {
    pub folder: String,
    pub urls: String,
    pub url_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpportunityRecord {
    pub page: String,
    pub query: String,
    pub clicks: u64,
    pub impressions: u64,
    pub ctr: f64,
    pub position: f64,
    pub ctr_calc: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditPaths {
    pub out_dir: String,
    pub tables_dir: String,
    pub markdown_path: Option<String>,
    pub html_path: Option<String>,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditCounts {
    pub fetched_rows: usize,
    pub date_query_rows: usize,
    pub branded_rows: usize,
    pub non_branded_rows: usize,
    pub unclassified_rows: usize,
    pub top_pages: usize,
    pub top_queries: usize,
    pub months_overall: usize,
    pub anomalous_days_clicks: usize,
    pub anomalous_days_impressions: usize,
    pub opportunity_rows: usize,
    pub multi_level_folders: usize,
    pub tables_written: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub site_url: String,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub paths: AuditPaths,
    pub counts: AuditCounts,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}
