use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::analysis::anomaly::MetricKind;
use crate::model::{AnomalyRecord, GroupStats, MetricTable};
use crate::util::ensure_directory;

pub struct SheetWriter {
    dir: PathBuf,
    written: usize,
}

impl SheetWriter {
    pub fn create(dir: &Path) -> Result<Self> {
        ensure_directory(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn write_records<T: Serialize>(&mut self, name: &str, records: &[T]) -> Result<()> {
        let path = self.sheet_path(name);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create table: {}", path.display()))?;
        encode_records(&mut writer, records)
            .with_context(|| format!("failed to write table: {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    pub fn write_metric_table(&mut self, name: &str, table: &MetricTable) -> Result<()> {
        let path = self.sheet_path(name);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create table: {}", path.display()))?;
        encode_metric_table(&mut writer, table)
            .with_context(|| format!("failed to write table: {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    pub fn write_group_stats(
        &mut self,
        name: &str,
        key_header: &str,
        stats: &[GroupStats],
    ) -> Result<()> {
        let path = self.sheet_path(name);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create table: {}", path.display()))?;
        encode_group_stats(&mut writer, key_header, stats)
            .with_context(|| format!("failed to write table: {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    pub fn write_anomalies(
        &mut self,
        name: &str,
        metric: MetricKind,
        anomalies: &[AnomalyRecord],
    ) -> Result<()> {
        let path = self.sheet_path(name);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create table: {}", path.display()))?;
        encode_anomalies(&mut writer, metric, anomalies)
            .with_context(|| format!("failed to write table: {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn sheet_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }
}

fn encode_records<T: Serialize, W: io::Write>(
    writer: &mut csv::Writer<W>,
    records: &[T],
) -> Result<()> {
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn encode_metric_table<W: io::Write>(
    writer: &mut csv::Writer<W>,
    table: &MetricTable,
) -> Result<()> {
    let mut header: Vec<&str> = table.dimensions.iter().map(|d| d.as_str()).collect();
    header.extend(["clicks", "impressions", "ctr", "position"]);
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record: Vec<String> = row.keys.clone();
        record.push(row.clicks.to_string());
        record.push(row.impressions.to_string());
        record.push(row.ctr.to_string());
        record.push(row.position.to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn encode_group_stats<W: io::Write>(
    writer: &mut csv::Writer<W>,
    key_header: &str,
    stats: &[GroupStats],
) -> Result<()> {
    writer.write_record([key_header, "clicks", "impressions", "ctr", "position"])?;
    for entry in stats {
        writer.write_record([
            entry.key.as_str(),
            &entry.clicks.to_string(),
            &entry.impressions.to_string(),
            &entry.ctr.to_string(),
            &entry.position.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn encode_anomalies<W: io::Write>(
    writer: &mut csv::Writer<W>,
    metric: MetricKind,
    anomalies: &[AnomalyRecord],
) -> Result<()> {
    writer.write_record(["date", metric.as_str(), "roll_mean", "roll_std", "z_score"])?;
    for anomaly in anomalies {
        writer.write_record([
            anomaly.date.to_string().as_str(),
            &anomaly.value.to_string(),
            &anomaly.roll_mean.to_string(),
            &anomaly.roll_std.to_string(),
            &anomaly.z_score.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
