use crate::model::{MonthlyRecord, SummaryRecord};

use super::percent;

pub fn render(
    site_url: &str,
    summaries: &[SummaryRecord],
    largest_drop: Option<&MonthlyRecord>,
    opportunity_count: usize,
) -> String {
    let mut md = format!("# GSC Audit Report for {site_url}\n\n");

    for summary in summaries {
        md.push_str(&format!(
            "- **{}**: Clicks={}, Impr={}, CTR={}, AvgPos={:.2}\n",
            summary.segment,
            summary.clicks,
            summary.impressions,
            percent(summary.ctr),
            summary.avg_position
        ));
    }

    md.push_str("\n## Actionable Insights\n");
    match largest_drop {
        Some(worst) => match worst.pct_clicks {
            Some(pct) => md.push_str(&format!(
                "- Largest MoM click drop: {} ({})\n",
                worst.month_label,
                percent(pct)
            )),
            None => md.push_str(&format!(
                "- Largest MoM click drop: {}\n",
                worst.month_label
            )),
        },
        None => md.push_str("- No negative MoM click changes detected.\n"),
    }
    md.push_str(&format!(
        "- {opportunity_count} low-hanging opportunities identified.\n"
    ));

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn summary(segment: &str, clicks: u64, impressions: u64, ctr: f64) -> SummaryRecord {
        SummaryRecord {
            segment: segment.to_string(),
            clicks,
            impressions,
            ctr,
            avg_position: 4.5,
        }
    }

    fn drop_month(label: &str, pct: f64) -> MonthlyRecord {
        MonthlyRecord {
            month_label: label.to_string(),
            month: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            clicks: 50,
            impressions: 500,
            ctr: 0.1,
            avg_position: 3.0,
            delta_clicks: Some(-50),
            pct_clicks: Some(pct),
        }
    }

    #[test]
    fn renders_one_line_per_segment_with_percent_ctr() {
        let summaries = vec![
            summary("Overall", 15, 1000, 0.015),
            summary("Branded", 10, 400, 0.025),
            summary("Non-Branded", 5, 600, 0.0083),
        ];

        let md = render("https://example.com/", &summaries, None, 0);

        assert!(md.starts_with("# GSC Audit Report for https://example.com/\n\n"));
        assert!(md.contains("- **Overall**: Clicks=15, Impr=1000, CTR=1.50%, AvgPos=4.50\n"));
        assert!(md.contains("- **Branded**: Clicks=10, Impr=400, CTR=2.50%, AvgPos=4.50\n"));
        assert!(md.contains("- **Non-Branded**: Clicks=5, Impr=600, CTR=0.83%, AvgPos=4.50\n"));
    }

    #[test]
    fn reports_the_largest_drop_when_present() {
        let worst = drop_month("March 2024", -0.5);
        let md = render("https://example.com/", &[], Some(&worst), 3);

        assert!(md.contains("## Actionable Insights\n"));
        assert!(md.contains("- Largest MoM click drop: March 2024 (-50.00%)\n"));
        assert!(md.contains("- 3 low-hanging opportunities identified.\n"));
    }

    #[test]
    fn reports_no_drop_when_every_month_grew() {
        let md = render("https://example.com/", &[], None, 12);

        assert!(md.contains("- No negative MoM click changes detected.\n"));
        assert!(md.contains("- 12 low-hanging opportunities identified.\n"));
    }
}
