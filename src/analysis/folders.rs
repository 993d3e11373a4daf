use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use url::Url;

use crate::model::{
    Dimension, FolderAssociation, FolderRecord, FolderUrlsRecord, MetricTable, TopFolderRecord,
};

pub fn expand(table: &MetricTable) -> Result<Vec<FolderAssociation>> {
    let mut pages: BTreeMap<String, (u64, u64, f64)> = BTreeMap::new();

    for row in &table.rows {
        let page = table.value(row, Dimension::Page).unwrap_or("").to_string();
        let entry = pages.entry(page).or_insert((0, 0, 0.0));
        entry.0 += row.clicks;
        entry.1 += row.impressions;
        entry.2 += row.position * row.impressions as f64;
    }

    let mut associations = Vec::new();
    for (page, (clicks, impressions, weighted_position)) in pages {
        let (ctr, avg_position) = if impressions > 0 {
            (
                clicks as f64 / impressions as f64,
                weighted_position / impressions as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let segments = path_segments(&page)?;
        for depth in 1..=segments.len() {
            associations.push(FolderAssociation {
                folder: format!("/{}", segments[..depth].join("/")),
                page: page.clone(),
                clicks,
                impressions,
                ctr,
                avg_position,
            });
        }
    }

    Ok(associations)
}

pub fn summarize_folders(associations: &[FolderAssociation]) -> Vec<FolderRecord> {
    let mut folders: BTreeMap<&str, (BTreeSet<&str>, u64, u64, f64, f64, usize)> = BTreeMap::new();

    for assoc in associations {
        let entry = folders
            .entry(assoc.folder.as_str())
            .or_insert_with(|| (BTreeSet::new(), 0, 0, 0.0, 0.0, 0));
        entry.0.insert(assoc.page.as_str());
        entry.1 += assoc.clicks;
        entry.2 += assoc.impressions;
        entry.3 += assoc.ctr;
        entry.4 += assoc.avg_position;
        entry.5 += 1;
    }

    let mut records: Vec<FolderRecord> = folders
        .into_iter()
        .map(
            |(folder, (pages, clicks, impressions, ctr_sum, position_sum, count))| FolderRecord {
                folder: folder.to_string(),
                url_count: pages.len(),
                clicks,
                impressions,
                avg_ctr: ctr_sum / count as f64,
                avg_position: position_sum / count as f64,
            },
        )
        .collect();

    records.sort_by(|a, b| b.clicks.cmp(&a.clicks).then_with(|| a.folder.cmp(&b.folder)));
    records
}

pub fn folder_url_listing(associations: &[FolderAssociation]) -> Vec<FolderUrlsRecord> {
    let mut folders: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for assoc in associations {
        folders
            .entry(assoc.folder.as_str())
            .or_default()
            .insert(assoc.page.as_str());
    }

    folders
        .into_iter()
        .map(|(folder, pages)| FolderUrlsRecord {
            folder: folder.to_string(),
            urls: pages.iter().copied().collect::<Vec<_>>().join("\n"),
            url_count: pages.len(),
        })
        .collect()
}

pub fn top_folders(table: &MetricTable, limit: usize) -> Result<Vec<TopFolderRecord>> {
    let mut folders: BTreeMap<String, (u64, u64)> = BTreeMap::new();

    for row in &table.rows {
        let page = table.value(row, Dimension::Page).unwrap_or("");
        let segments = path_segments(page)?;
        let folder = match segments.first() {
            Some(first) => format!("/{first}"),
            None => "/".to_string(),
        };
        let entry = folders.entry(folder).or_insert((0, 0));
        entry.0 += row.clicks;
        entry.1 += row.impressions;
    }

    let mut records: Vec<TopFolderRecord> = folders
        .into_iter()
        .map(|(folder, (clicks, impressions))| TopFolderRecord {
            folder,
            clicks,
            impressions,
        })
        .collect();

    records.sort_by(|a, b| b.clicks.cmp(&a.clicks).then_with(|| a.folder.cmp(&b.folder)));
    records.truncate(limit);
    Ok(records)
}

fn path_segments(page: &str) -> Result<Vec<String>> {
    let parsed = Url::parse(page).with_context(|| format!("invalid page url: {page:?}"))?;
    Ok(parsed
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect())
}
