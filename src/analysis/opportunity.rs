use crate::model::{Dimension, MetricTable, OpportunityRecord};

pub fn find(table: &MetricTable, min_impressions: u64, max_ctr: f64) -> Vec<OpportunityRecord> {
    let mut opportunities = Vec::new();

    for row in &table.rows {
        if row.impressions == 0 || row.impressions < min_impressions {
            continue;
        }
        let ctr_calc = row.clicks as f64 / row.impressions as f64;
        if ctr_calc < max_ctr {
            opportunities.push(OpportunityRecord {
                page: table.value(row, Dimension::Page).unwrap_or("").to_string(),
                query: table.value(row, Dimension::Query).unwrap_or("").to_string(),
                clicks: row.clicks,
                impressions: row.impressions,
                ctr: row.ctr,
                position: row.position,
                ctr_calc,
            });
        }
    }

    opportunities
}
