use chrono::NaiveDate;

use crate::model::{AnomalyRecord, DailyMetric};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Clicks,
    Impressions,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Clicks => "clicks",
            MetricKind::Impressions => "impressions",
        }
    }

    fn value(&self, point: &DailyMetric) -> f64 {
        match self {
            MetricKind::Clicks => point.clicks as f64,
            MetricKind::Impressions => point.impressions as f64,
        }
    }
}

pub fn detect(
    series: &[DailyMetric],
    metric: MetricKind,
    window: usize,
    z_threshold: f64,
) -> Vec<AnomalyRecord> {
    let mut points: Vec<(NaiveDate, f64)> = series
        .iter()
        .map(|point| (point.date, metric.value(point)))
        .collect();
    points.sort_by_key(|(date, _)| *date);

    let width = window.max(1);
    let reach_right = (width - 1) / 2;
    let reach_left = width - 1 - reach_right;

    let mut anomalies = Vec::new();
    for i in 0..points.len() {
        let lo = i.saturating_sub(reach_left);
        let hi = usize::min(points.len() - 1, i + reach_right);
        let (mean, std) = mean_std(&points[lo..=hi]);
        if std > 0.0 {
            let z = (points[i].1 - mean) / std;
            if z.abs() >= z_threshold {
                anomalies.push(AnomalyRecord {
                    date: points[i].0,
                    value: points[i].1,
                    roll_mean: mean,
                    roll_std: std,
                    z_score: z,
                });
            }
        }
    }

    anomalies
}

fn mean_std(window: &[(NaiveDate, f64)]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().map(|(_, v)| v).sum::<f64>() / n;
    if window.len() < 2 {
        return (mean, 0.0);
    }
    let variance = window.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}
