use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use regex::Regex;
use tracing::{info, warn};

use crate::analysis::anomaly::{self, MetricKind};
use crate::analysis::{aggregate, folders, monthly, opportunity, segment};
use crate::cli::AuditArgs;
use crate::config::{AuditConfig, load_config};
use crate::fetch::{DimensionFilter, SearchConsoleClient};
use crate::model::{
    AuditCounts, AuditPaths, AuditRunManifest, Dimension, GroupStats, MetricTable, SummaryRecord,
    TopFolderRecord,
};
use crate::report::tables::SheetWriter;
use crate::report::{html, markdown};
use crate::util::{
    ensure_directory, now_utc_string, parse_iso_date, utc_compact_string, write_json_pretty,
    write_text,
};

const TOP_LIMIT: usize = 20;
const FOLDER_LIMIT: usize = 10;

pub fn run(args: AuditArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let config = load_config(&args.config)?;
    let branded_pattern = Regex::new(&config.branded.pattern)
        .with_context(|| format!("invalid branded pattern: {:?}", config.branded.pattern))?;
    let start_date = config.dates.start_date.clone();
    let start_day = parse_iso_date(&start_date)?;

    let client = super::search_console_client(Path::new(&config.auth.token_path))?;
    let site_url = resolve_site(&client, &config, args.property.as_deref())?;

    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.dir));
    ensure_directory(&out_dir)?;

    let stamp = utc_compact_string(started_ts);
    let tables_dir = out_dir.join(format!("tables_{stamp}"));
    let markdown_path = config
        .output
        .markdown
        .then(|| out_dir.join(format!("audit_{stamp}.md")));
    let html_path = config
        .output
        .html
        .then(|| out_dir.join(format!("audit_{stamp}.html")));
    let manifest_path = out_dir.join(format!("audit_run_{stamp}.json"));

    info!(site_url = %site_url, run_id = %run_id, "starting audit");

    let mut warnings: Vec<String> = Vec::new();

    let end_date = resolve_end_date(&client, &site_url, &config)?;
    let end_day = parse_iso_date(&end_date)?;

    let base_filters = country_filters(&config);

    let page_query = client.fetch_performance(
        &site_url,
        &start_date,
        &end_date,
        &[Dimension::Page, Dimension::Query],
        &base_filters,
    )?;
    let date_query = client.fetch_performance(
        &site_url,
        &start_date,
        &end_date,
        &[Dimension::Date, Dimension::Query],
        &base_filters,
    )?;

    let segments = segment::segment(&page_query, &branded_pattern);
    let summaries = vec![
        aggregate::summarize(&page_query, "Overall"),
        aggregate::summarize(&segments.branded, "Branded"),
        aggregate::summarize(&segments.non_branded, "Non-Branded"),
        aggregate::summarize(&segments.unclassified, "Unclassified"),
    ];
    info!(
        rows = page_query.len(),
        branded = segments.branded.len(),
        non_branded = segments.non_branded.len(),
        unclassified = segments.unclassified.len(),
        "segmented fetched rows"
    );

    let top_pages = aggregate::top_by(&page_query, Dimension::Page, TOP_LIMIT);
    let top_queries = aggregate::top_by(&page_query, Dimension::Query, TOP_LIMIT);

    let top_folder_sheets = segment_folder_rollups(&page_query, &segments, &mut warnings);

    let (folder_summary, folder_urls) = match folders::expand(&page_query) {
        Ok(associations) => (
            folders::summarize_folders(&associations),
            folders::folder_url_listing(&associations),
        ),
        Err(err) => {
            warn!(error = %err, "multi-level folder expansion failed");
            warnings.push(format!("multi-level folder expansion failed: {err:#}"));
            (Vec::new(), Vec::new())
        }
    };

    let date_segments = segment::segment(&date_query, &branded_pattern);
    let mom_overall = monthly::compute_mom(&date_query)?;
    let mom_branded = monthly::compute_mom(&date_segments.branded)?;
    let mom_non_branded = monthly::compute_mom(&date_segments.non_branded)?;
    let monthly_avgs = vec![
        monthly::monthly_averages("Overall", &mom_overall),
        monthly::monthly_averages("Branded", &mom_branded),
        monthly::monthly_averages("Non-Branded", &mom_non_branded),
    ];

    let daily = aggregate::daily_series(&date_query)?;
    let anomaly_cfg = &config.thresholds.anomaly;
    let anomalies_clicks = anomaly::detect(
        &daily,
        MetricKind::Clicks,
        anomaly_cfg.window,
        anomaly_cfg.z_threshold,
    );
    let anomalies_impressions = anomaly::detect(
        &daily,
        MetricKind::Impressions,
        anomaly_cfg.window,
        anomaly_cfg.z_threshold,
    );
    info!(
        days = daily.len(),
        clicks_flagged = anomalies_clicks.len(),
        impressions_flagged = anomalies_impressions.len(),
        "anomaly scan complete"
    );

    let opportunity_cfg = &config.thresholds.opportunity;
    let opportunities = opportunity::find(
        &page_query,
        opportunity_cfg.min_impressions,
        opportunity_cfg.max_ctr,
    );

    let devices = if config.output.html {
        fetch_device_breakdown(
            &client,
            &site_url,
            &start_date,
            &end_date,
            &base_filters,
            &config.branded.pattern,
            &mut warnings,
        )
    } else {
        Vec::new()
    };

    let mut sheets = SheetWriter::create(&tables_dir)?;
    sheets.write_metric_table("RawFull", &page_query)?;
    sheets.write_metric_table("RawBranded", &segments.branded)?;
    sheets.write_metric_table("RawNonBranded", &segments.non_branded)?;
    sheets.write_records("Summary", &summaries)?;
    sheets.write_records("MonthlyAverages", &monthly_avgs)?;
    sheets.write_group_stats("TopPages", "page", &top_pages)?;
    sheets.write_group_stats("TopQueries", "query", &top_queries)?;
    for (label, records) in &top_folder_sheets {
        sheets.write_records(&format!("Folders_{}", sheet_suffix(label)), records)?;
    }
    sheets.write_records("MoM_Overall", &mom_overall)?;
    sheets.write_records("MoM_Branded", &mom_branded)?;
    sheets.write_records("MoM_NonBranded", &mom_non_branded)?;
    sheets.write_anomalies("Anomalies_Clicks", MetricKind::Clicks, &anomalies_clicks)?;
    sheets.write_anomalies(
        "Anomalies_Impressions",
        MetricKind::Impressions,
        &anomalies_impressions,
    )?;
    sheets.write_records("LowHanging", &opportunities)?;
    sheets.write_records("Folders_Multi", &folder_summary)?;
    sheets.write_records("Folder_URLs", &folder_urls)?;
    for (label, stats) in &devices {
        sheets.write_group_stats(&format!("Device_{}", sheet_suffix(label)), "device", stats)?;
    }
    info!(
        tables = sheets.written(),
        dir = %tables_dir.display(),
        "tables written"
    );

    let worst = monthly::largest_drop(&mom_overall);

    if let Some(path) = &markdown_path {
        let body = markdown::render(&site_url, &summaries[..3], worst, opportunities.len());
        write_text(path, &body)?;
        info!(path = %path.display(), "markdown report written");
    }

    if let Some(path) = &html_path {
        let anomaly_dates: Vec<NaiveDate> = anomalies_clicks.iter().map(|a| a.date).collect();
        let segment_shares = segment_click_shares(&summaries);
        let report = html::HtmlReport {
            site_url: &site_url,
            start_date: start_day,
            end_date: end_day,
            summaries: &summaries[..3],
            monthly: &mom_overall,
            largest_drop: worst,
            daily: &daily,
            anomaly_dates: &anomaly_dates,
            segment_shares: &segment_shares,
            devices: &devices,
            opportunities: &opportunities,
        };
        write_text(path, &html::render(&report))?;
        info!(path = %path.display(), "html report written");
    }

    let manifest = AuditRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        site_url: site_url.clone(),
        start_date,
        end_date,
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_audit_command(&args),
        paths: AuditPaths {
            out_dir: out_dir.display().to_string(),
            tables_dir: tables_dir.display().to_string(),
            markdown_path: markdown_path.as_ref().map(|p| p.display().to_string()),
            html_path: html_path.as_ref().map(|p| p.display().to_string()),
            manifest_path: manifest_path.display().to_string(),
        },
        counts: AuditCounts {
            fetched_rows: page_query.len(),
            date_query_rows: date_query.len(),
            branded_rows: segments.branded.len(),
            non_branded_rows: segments.non_branded.len(),
            unclassified_rows: segments.unclassified.len(),
            top_pages: top_pages.len(),
            top_queries: top_queries.len(),
            months_overall: mom_overall.len(),
            anomalous_days_clicks: anomalies_clicks.len(),
            anomalous_days_impressions: anomalies_impressions.len(),
            opportunity_rows: opportunities.len(),
            multi_level_folders: folder_summary.len(),
            tables_written: sheets.written(),
        },
        warnings,
        notes: vec!["Audit completed against the Search Console API.".to_string()],
    };
    write_json_pretty(&manifest_path, &manifest)?;
    info!(run_id = %run_id, path = %manifest_path.display(), "audit complete");

    Ok(())
}

fn resolve_site(
    client: &SearchConsoleClient,
    config: &AuditConfig,
    property: Option<&str>,
) -> Result<String> {
    if let Some(property) = property {
        return Ok(property.to_string());
    }
    if !config.interactive {
        bail!("no site property provided; pass --property or enable interactive selection");
    }

    let properties = client.list_properties()?;
    if properties.is_empty() {
        bail!("no verified properties available for this credential");
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Available GSC Properties:")?;
    for (index, property) in properties.iter().enumerate() {
        writeln!(output, "  {}. {property}", index + 1)?;
    }
    write!(output, "Select property number: ")?;
    output.flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read selection")?;
    let index = parse_selection(&line, properties.len())?;
    Ok(properties[index].clone())
}

fn parse_selection(input: &str, len: usize) -> Result<usize> {
    let choice: usize = input
        .trim()
        .parse()
        .with_context(|| format!("invalid selection: {:?}", input.trim()))?;
    if choice == 0 || choice > len {
        bail!("invalid selection: {choice} (expected 1..={len})");
    }
    Ok(choice - 1)
}

fn resolve_end_date(
    client: &SearchConsoleClient,
    site_url: &str,
    config: &AuditConfig,
) -> Result<String> {
    if let Some(end_date) = &config.dates.end_date {
        if !end_date.is_empty() {
            return Ok(end_date.clone());
        }
    }

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let dates = client.fetch_performance(
        site_url,
        &config.dates.start_date,
        &today,
        &[Dimension::Date],
        &[],
    )?;
    let detected = dates
        .rows
        .iter()
        .filter_map(|row| dates.value(row, Dimension::Date))
        .max()
        .map(str::to_string)
        .unwrap_or_else(|| config.dates.start_date.clone());
    info!(end_date = %detected, "detected end_date");
    Ok(detected)
}

fn country_filters(config: &AuditConfig) -> Vec<DimensionFilter> {
    match &config.filters.country {
        Some(country) if !country.is_empty() => {
            vec![DimensionFilter::equals(Dimension::Country, country.clone())]
        }
        _ => Vec::new(),
    }
}

fn segment_folder_rollups(
    page_query: &MetricTable,
    segments: &segment::Segments,
    warnings: &mut Vec<String>,
) -> Vec<(String, Vec<TopFolderRecord>)> {
    let tables = [
        ("Overall", page_query),
        ("Branded", &segments.branded),
        ("Non-Branded", &segments.non_branded),
    ];

    let mut sheets = Vec::new();
    for (label, table) in tables {
        let records = match folders::top_folders(table, FOLDER_LIMIT) {
            Ok(records) => records,
            Err(err) => {
                warn!(segment = label, error = %err, "folder analysis failed");
                warnings.push(format!("folder analysis failed for {label}: {err:#}"));
                Vec::new()
            }
        };
        sheets.push((label.to_string(), records));
    }
    sheets
}

fn fetch_device_breakdown(
    client: &SearchConsoleClient,
    site_url: &str,
    start_date: &str,
    end_date: &str,
    base_filters: &[DimensionFilter],
    branded_pattern: &str,
    warnings: &mut Vec<String>,
) -> Vec<(String, Vec<GroupStats>)> {
    let segment_filters = [
        ("Overall", None),
        (
            "Branded",
            Some(DimensionFilter::contains(Dimension::Query, branded_pattern)),
        ),
        (
            "Non-Branded",
            Some(DimensionFilter::not_contains(
                Dimension::Query,
                branded_pattern,
            )),
        ),
    ];

    let mut breakdown = Vec::new();
    for (label, extra) in segment_filters {
        let mut filters = base_filters.to_vec();
        if let Some(filter) = extra {
            filters.push(filter);
        }

        let fetched = client.fetch_performance(
            site_url,
            start_date,
            end_date,
            &[Dimension::Device],
            &filters,
        );
        let table = match fetched {
            Ok(table) => table,
            Err(err) => {
                warn!(segment = label, error = %err, "device fetch failed");
                warnings.push(format!("device fetch failed for {label}: {err:#}"));
                continue;
            }
        };
        if table.is_empty() {
            warn!(segment = label, "no device data");
            continue;
        }

        let stats = aggregate::top_by(&table, Dimension::Device, table.len());
        breakdown.push((label.to_string(), stats));
    }
    breakdown
}

fn segment_click_shares(summaries: &[SummaryRecord]) -> Vec<(String, u64)> {
    summaries
        .iter()
        .filter(|summary| summary.segment == "Branded" || summary.segment == "Non-Branded")
        .map(|summary| (summary.segment.clone(), summary.clicks))
        .collect()
}

fn sheet_suffix(label: &str) -> String {
    label.replace('-', "")
}

fn render_audit_command(args: &AuditArgs) -> String {
    let mut command = vec![
        "gsc-audit".to_string(),
        "audit".to_string(),
        "--config".to_string(),
        args.config.display().to_string(),
    ];

    if let Some(property) = &args.property {
        command.push("--property".to_string());
        command.push(property.clone());
    }
    if let Some(out_dir) = &args.out_dir {
        command.push("--out-dir".to_string());
        command.push(out_dir.display().to_string());
    }

    command.join(" ")
}
