use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{Datelike, NaiveDate};

use crate::model::{Dimension, MetricTable, MonthlyAverageRecord, MonthlyRecord};
use crate::util::parse_iso_date;

pub fn compute_mom(table: &MetricTable) -> Result<Vec<MonthlyRecord>> {
    let mut months: BTreeMap<NaiveDate, (u64, u64, f64)> = BTreeMap::new();

    for row in &table.rows {
        let date = parse_iso_date(table.value(row, Dimension::Date).unwrap_or(""))?;
        let month = date.with_day(1).unwrap_or(date);
        let entry = months.entry(month).or_insert((0, 0, 0.0));
        entry.0 += row.clicks;
        entry.1 += row.impressions;
        entry.2 += row.position * row.impressions as f64;
    }

    let mut records = Vec::with_capacity(months.len());
    let mut prev_clicks: Option<u64> = None;

    for (month, (clicks, impressions, weighted_position)) in months {
        let (ctr, avg_position) = if impressions > 0 {
            (
                clicks as f64 / impressions as f64,
                weighted_position / impressions as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let (delta_clicks, pct_clicks) = match prev_clicks {
            Some(prev) => {
                let delta = clicks as i64 - prev as i64;
                let pct = if prev > 0 {
                    Some(delta as f64 / prev as f64)
                } else {
                    None
                };
                (Some(delta), pct)
            }
            None => (None, None),
        };

        records.push(MonthlyRecord {
            month_label: month.format("%B %Y").to_string(),
            month,
            clicks,
            impressions,
            ctr,
            avg_position,
            delta_clicks,
            pct_clicks,
        });
        prev_clicks = Some(clicks);
    }

    Ok(records)
}

pub fn monthly_averages(label: &str, records: &[MonthlyRecord]) -> MonthlyAverageRecord {
    if records.is_empty() {
        return MonthlyAverageRecord {
            segment: label.to_string(),
            clicks: 0.0,
            impressions: 0.0,
            ctr: 0.0,
            avg_position: 0.0,
        };
    }

    let n = records.len() as f64;
    let clicks = records.iter().map(|r| r.clicks as f64).sum::<f64>() / n;
    let impressions = records.iter().map(|r| r.impressions as f64).sum::<f64>() / n;
    let ctr = records.iter().map(|r| r.ctr).sum::<f64>() / n;
    let avg_position = records.iter().map(|r| r.avg_position).sum::<f64>() / n;

    MonthlyAverageRecord {
        segment: label.to_string(),
        clicks,
        impressions,
        ctr: round_to(ctr, 4),
        avg_position: round_to(avg_position, 2),
    }
}

pub fn largest_drop(records: &[MonthlyRecord]) -> Option<&MonthlyRecord> {
    records
        .iter()
        .filter(|record| record.pct_clicks.is_some_and(|pct| pct < 0.0))
        .min_by(|a, b| {
            a.pct_clicks
                .unwrap_or(0.0)
                .total_cmp(&b.pct_clicks.unwrap_or(0.0))
        })
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricRow;

    fn date_row(date: &str, clicks: u64, impressions: u64, position: f64) -> MetricRow {
        let ctr = if impressions > 0 {
            clicks as f64 / impressions as f64
        } else {
            0.0
        };
        MetricRow {
            keys: vec![date.to_string(), "query".to_string()],
            clicks,
            impressions,
            ctr,
            position,
        }
    }

    fn date_table(rows: Vec<MetricRow>) -> MetricTable {
        let mut table = MetricTable::new(vec![Dimension::Date, Dimension::Query]);
        table.rows = rows;
        table
    }

    #[test]
    fn two_months_give_expected_delta_and_pct() {
        let table = date_table(vec![
            date_row("2024-01-10", 100, 1000, 3.0),
            date_row("2024-02-10", 150, 1200, 3.0),
        ]);

        let records = compute_mom(&table).expect("dates should parse");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].delta_clicks, None);
        assert_eq!(records[0].pct_clicks, None);
        assert_eq!(records[1].delta_clicks, Some(50));
        assert_eq!(records[1].pct_clicks, Some(0.5));
    }

    #[test]
    fn zero_click_previous_month_gives_null_pct() {
        let table = date_table(vec![
            date_row("2024-01-10", 0, 100, 3.0),
            date_row("2024-02-10", 50, 100, 3.0),
        ]);

        let records = compute_mom(&table).expect("dates should parse");
        assert_eq!(records[1].delta_clicks, Some(50));
        assert_eq!(records[1].pct_clicks, None);
    }

    #[test]
    fn days_collapse_into_first_of_month_with_label() {
        let table = date_table(vec![
            date_row("2024-01-05", 10, 100, 2.0),
            date_row("2024-01-28", 20, 300, 2.0),
        ]);

        let records = compute_mom(&table).expect("dates should parse");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].month.to_string(), "2024-01-01");
        assert_eq!(records[0].month_label, "January 2024");
        assert_eq!(records[0].clicks, 30);
        assert_eq!(records[0].impressions, 400);
    }

    #[test]
    fn monthly_ctr_is_weighted_not_mean_of_rows() {
        let table = date_table(vec![
            date_row("2024-03-01", 10, 100, 2.0),
            date_row("2024-03-02", 0, 900, 2.0),
        ]);

        let records = compute_mom(&table).expect("dates should parse");
        assert_eq!(records[0].ctr, 0.01);
    }

    #[test]
    fn months_come_out_chronological_regardless_of_input_order() {
        let table = date_table(vec![
            date_row("2024-03-10", 3, 30, 1.0),
            date_row("2024-01-10", 1, 10, 1.0),
            date_row("2024-02-10", 2, 20, 1.0),
        ]);

        let records = compute_mom(&table).expect("dates should parse");
        let labels: Vec<&str> = records.iter().map(|r| r.month_label.as_str()).collect();
        assert_eq!(labels, vec!["January 2024", "February 2024", "March 2024"]);
        assert_eq!(records[1].delta_clicks, Some(1));
        assert_eq!(records[2].delta_clicks, Some(1));
    }

    #[test]
    fn malformed_date_fails_the_stage() {
        let table = date_table(vec![date_row("January 10, 2024", 1, 10, 1.0)]);
        assert!(compute_mom(&table).is_err());
    }

    #[test]
    fn averages_round_display_fields_only() {
        let table = date_table(vec![
            date_row("2024-01-10", 123, 1000, 2.123),
            date_row("2024-02-10", 100, 1000, 3.0),
        ]);

        let records = compute_mom(&table).expect("dates should parse");
        let avg = monthly_averages("Overall", &records);
        assert_eq!(avg.segment, "Overall");
        assert_eq!(avg.clicks, 111.5);
        assert_eq!(avg.impressions, 1000.0);
        assert_eq!(avg.ctr, 0.1115);
        assert_eq!(avg.avg_position, 2.56);
    }

    #[test]
    fn averages_of_no_months_are_zero() {
        let avg = monthly_averages("Branded", &[]);
        assert_eq!(avg.clicks, 0.0);
        assert_eq!(avg.ctr, 0.0);
    }

    #[test]
    fn largest_drop_picks_the_steepest_decline() {
        let table = date_table(vec![
            date_row("2024-01-10", 100, 1000, 3.0),
            date_row("2024-02-10", 90, 1000, 3.0),
            date_row("2024-03-10", 45, 1000, 3.0),
            date_row("2024-04-10", 60, 1000, 3.0),
        ]);

        let records = compute_mom(&table).expect("dates should parse");
        let worst = largest_drop(&records).expect("two months declined");
        assert_eq!(worst.month_label, "March 2024");
        assert_eq!(worst.pct_clicks, Some(-0.5));
    }

    #[test]
    fn largest_drop_is_none_when_nothing_declined() {
        let table = date_table(vec![
            date_row("2024-01-10", 100, 1000, 3.0),
            date_row("2024-02-10", 150, 1000, 3.0),
        ]);

        let records = compute_mom(&table).expect("dates should parse");
        assert!(largest_drop(&records).is_none());
    }
}
