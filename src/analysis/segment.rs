use regex::Regex;

use crate::model::{Dimension, MetricTable};

#[derive(Debug, Clone)]
pub struct Segments {
    pub branded: MetricTable,
    pub non_branded: MetricTable,
    pub unclassified: MetricTable,
}

pub fn segment(table: &MetricTable, pattern: &Regex) -> Segments {
    let mut branded = MetricTable::new(table.dimensions.clone());
    let mut non_branded = MetricTable::new(table.dimensions.clone());
    let mut unclassified = MetricTable::new(table.dimensions.clone());

    for row in &table.rows {
        let query = table.value(row, Dimension::Query).unwrap_or("");
        if pattern.is_match(query) {
            branded.rows.push(row.clone());
        } else if query.is_empty() {
            unclassified.rows.push(row.clone());
        } else {
            non_branded.rows.push(row.clone());
        }
    }

    Segments {
        branded,
        non_branded,
        unclassified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricRow;

    fn query_table(queries: &[&str]) -> MetricTable {
        let mut table = MetricTable::new(vec![Dimension::Page, Dimension::Query]);
        for (i, query) in queries.iter().enumerate() {
            table.rows.push(MetricRow {
                keys: vec![format!("https://example.com/p{i}"), (*query).to_string()],
                clicks: 10,
                impressions: 100,
                ctr: 0.1,
                position: 5.0,
            });
        }
        table
    }

    #[test]
    fn segment_sizes_always_cover_the_input() {
        let table = query_table(&["acme shoes", "running shoes", "", "buy acme", ""]);
        let pattern = Regex::new("acme").unwrap();

        let segments = segment(&table, &pattern);
        assert_eq!(segments.branded.len(), 2);
        assert_eq!(segments.non_branded.len(), 1);
        assert_eq!(segments.unclassified.len(), 2);
        assert_eq!(
            segments.branded.len() + segments.non_branded.len() + segments.unclassified.len(),
            table.len()
        );
    }

    #[test]
    fn empty_query_is_unclassified_unless_pattern_matches_empty() {
        let table = query_table(&[""]);

        let strict = Regex::new("acme").unwrap();
        let segments = segment(&table, &strict);
        assert_eq!(segments.branded.len(), 0);
        assert_eq!(segments.unclassified.len(), 1);

        let matches_empty = Regex::new("acme|^$").unwrap();
        let segments = segment(&table, &matches_empty);
        assert_eq!(segments.branded.len(), 1);
        assert_eq!(segments.unclassified.len(), 0);
    }

    #[test]
    fn missing_query_dimension_behaves_like_empty_query() {
        let mut table = MetricTable::new(vec![Dimension::Page]);
        table.rows.push(MetricRow {
            keys: vec!["https://example.com/a".to_string()],
            clicks: 1,
            impressions: 10,
            ctr: 0.1,
            position: 2.0,
        });

        let segments = segment(&table, &Regex::new("acme").unwrap());
        assert_eq!(segments.unclassified.len(), 1);
        assert_eq!(segments.branded.len(), 0);
        assert_eq!(segments.non_branded.len(), 0);
    }

    #[test]
    fn containment_not_full_match_decides_branding() {
        let table = query_table(&["best acme deals", "acmeshop", "shop"]);
        let segments = segment(&table, &Regex::new("acme").unwrap());
        assert_eq!(segments.branded.len(), 2);
        assert_eq!(segments.non_branded.len(), 1);
    }

    #[test]
    fn resegmenting_a_segment_is_stable() {
        let table = query_table(&["acme shoes", "running shoes", "acme boots", "sandals"]);
        let pattern = Regex::new("acme").unwrap();

        let first = segment(&table, &pattern);
        let second = segment(&first.branded, &pattern);
        assert_eq!(second.branded.rows, first.branded.rows);
        assert!(second.non_branded.is_empty());
        assert!(second.unclassified.is_empty());
    }
}
