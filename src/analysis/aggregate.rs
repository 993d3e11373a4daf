use std::collections::BTreeMap;

use anyhow::Result;

use crate::model::{DailyMetric, Dimension, GroupStats, MetricTable, SummaryRecord};
use crate::util::parse_iso_date;

pub fn summarize(table: &MetricTable, label: &str) -> SummaryRecord {
    let mut clicks = 0_u64;
    let mut impressions = 0_u64;
    let mut weighted_position = 0.0_f64;

    for row in &table.rows {
        clicks += row.clicks;
        impressions += row.impressions;
        weighted_position += row.position * row.impressions as f64;
    }

    weighted_record(label.to_string(), clicks, impressions, weighted_position)
}

pub fn aggregate_by(table: &MetricTable, dimension: Dimension) -> Vec<SummaryRecord> {
    let mut groups: BTreeMap<String, (u64, u64, f64)> = BTreeMap::new();

    for row in &table.rows {
        let key = table.value(row, dimension).unwrap_or("").to_string();
        let entry = groups.entry(key).or_insert((0, 0, 0.0));
        entry.0 += row.clicks;
        entry.1 += row.impressions;
        entry.2 += row.position * row.impressions as f64;
    }

    groups
        .into_iter()
        .map(|(key, (clicks, impressions, weighted_position))| {
            weighted_record(key, clicks, impressions, weighted_position)
        })
        .collect()
}

pub fn top_by(table: &MetricTable, dimension: Dimension, limit: usize) -> Vec<GroupStats> {
    let mut groups: BTreeMap<String, (u64, u64, f64, f64, usize)> = BTreeMap::new();

    for row in &table.rows {
        let key = table.value(row, dimension).unwrap_or("").to_string();
        let entry = groups.entry(key).or_insert((0, 0, 0.0, 0.0, 0));
        entry.0 += row.clicks;
        entry.1 += row.impressions;
        entry.2 += row.ctr;
        entry.3 += row.position;
        entry.4 += 1;
    }

    let mut stats: Vec<GroupStats> = groups
        .into_iter()
        .map(|(key, (clicks, impressions, ctr_sum, position_sum, count))| GroupStats {
            key,
            clicks,
            impressions,
            ctr: ctr_sum / count as f64,
            position: position_sum / count as f64,
        })
        .collect();

    stats.sort_by(|a, b| b.clicks.cmp(&a.clicks).then_with(|| a.key.cmp(&b.key)));
    stats.truncate(limit);
    stats
}

pub fn daily_series(table: &MetricTable) -> Result<Vec<DailyMetric>> {
    let mut days: BTreeMap<chrono::NaiveDate, (u64, u64, f64, f64, usize)> = BTreeMap::new();

    for row in &table.rows {
        let date = parse_iso_date(table.value(row, Dimension::Date).unwrap_or(""))?;
        let entry = days.entry(date).or_insert((0, 0, 0.0, 0.0, 0));
        entry.0 += row.clicks;
        entry.1 += row.impressions;
        entry.2 += row.ctr;
        entry.3 += row.position;
        entry.4 += 1;
    }

    Ok(days
        .into_iter()
        .map(
            |(date, (clicks, impressions, ctr_sum, position_sum, count))| DailyMetric {
                date,
                clicks,
                impressions,
                ctr: ctr_sum / count as f64,
                position: position_sum / count as f64,
            },
        )
        .collect())
}

fn weighted_record(
    segment: String,
    clicks: u64,
    impressions: u64,
    weighted_position: f64,
) -> SummaryRecord {
    let (ctr, avg_position) = if impressions > 0 {
        (
            clicks as f64 / impressions as f64,
            weighted_position / impressions as f64,
        )
    } else {
        (0.0, 0.0)
    };

    SummaryRecord {
        segment,
        clicks,
        impressions,
        ctr,
        avg_position,
    }
}
