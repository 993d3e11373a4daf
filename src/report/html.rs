use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::model::{DailyMetric, GroupStats, MonthlyRecord, OpportunityRecord, SummaryRecord};

use super::percent;

const CHART_WIDTH: f64 = 900.0;
const CHART_HEIGHT: f64 = 300.0;
const MARGIN_LEFT: f64 = 50.0;
const MARGIN_RIGHT: f64 = 10.0;
const MARGIN_TOP: f64 = 14.0;
const MARGIN_BOTTOM: f64 = 48.0;

const BAR_COLOR: &str = "#9aa5b1";
const ANOMALY_COLOR: &str = "#d9534f";

pub struct HtmlReport<'a> {
    pub site_url: &'a str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub summaries: &'a [SummaryRecord],
    pub monthly: &'a [MonthlyRecord],
    pub largest_drop: Option<&'a MonthlyRecord>,
    pub daily: &'a [DailyMetric],
    pub anomaly_dates: &'a [NaiveDate],
    pub segment_shares: &'a [(String, u64)],
    pub devices: &'a [(String, Vec<GroupStats>)],
    pub opportunities: &'a [OpportunityRecord],
}

pub fn render(report: &HtmlReport<'_>) -> String {
    let summary_rows = summary_rows(report.summaries);
    let insights = insights_list(report);
    let chart = daily_clicks_chart(report.daily, report.anomaly_dates);
    let monthly_rows = monthly_rows(report.monthly);
    let segment_share_rows = share_rows(report.segment_shares);
    let device_sections = device_sections(report.devices);
    let opportunity_rows = opportunity_rows(report.opportunities);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>GSC Audit Report</title>
    <style>
        * {{ box-sizing: border-box; }}
        body {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; }}
        .container {{ max-width: 1100px; margin: 0 auto; }}
        h1 {{ color: #333; margin-bottom: 10px; }}
        h2 {{ color: #333; margin: 30px 0 10px 0; }}
        h3 {{ color: #555; margin: 20px 0 8px 0; }}
        .meta {{ color: #666; margin-bottom: 20px; font-size: 14px; }}
        table {{ width: 100%; border-collapse: collapse; background: white; border-radius: 8px; overflow: hidden; box-shadow: 0 1px 3px rgba(0,0,0,0.1); margin-bottom: 20px; }}
        th, td {{ padding: 10px 14px; text-align: left; border-bottom: 1px solid #eee; }}
        th {{ background: #4a90a4; color: white; }}
        td.num {{ text-align: right; font-variant-numeric: tabular-nums; }}
        .drop {{ color: {anomaly_color}; }}
        .chart {{ background: white; border-radius: 8px; padding: 15px; box-shadow: 0 1px 3px rgba(0,0,0,0.1); margin-bottom: 20px; }}
        .insights {{ background: white; border-radius: 8px; padding: 15px 25px; box-shadow: 0 1px 3px rgba(0,0,0,0.1); margin-bottom: 20px; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>GSC Audit Report for {site}</h1>
        <div class="meta">Period: {start} to {end}</div>

        <h2>Performance Summary</h2>
        <table>
            <thead><tr><th>Segment</th><th>Clicks</th><th>Impressions</th><th>CTR</th><th>Avg Position</th></tr></thead>
            <tbody>
{summary_rows}            </tbody>
        </table>

        <h2>Actionable Insights</h2>
        <div class="insights">
            <ul>
{insights}            </ul>
        </div>

        <h2>Daily Clicks with Anomaly Flags</h2>
        <div class="chart">
{chart}        </div>

        <h2>Month over Month (Overall)</h2>
        <table>
            <thead><tr><th>Month</th><th>Clicks</th><th>Impressions</th><th>CTR</th><th>Avg Position</th><th>&Delta; Clicks</th><th>&Delta; %</th></tr></thead>
            <tbody>
{monthly_rows}            </tbody>
        </table>

        <h2>Clicks by Segment</h2>
        <table>
            <thead><tr><th>Segment</th><th>Clicks</th><th>Share</th></tr></thead>
            <tbody>
{segment_share_rows}            </tbody>
        </table>

        <h2>Device Breakdown</h2>
{device_sections}
        <h2>Low-Hanging Opportunities</h2>
        <table>
            <thead><tr><th>Page</th><th>Query</th><th>Clicks</th><th>Impressions</th><th>CTR</th><th>Position</th></tr></thead>
            <tbody>
{opportunity_rows}            </tbody>
        </table>
    </div>
</body>
</html>
"#,
        anomaly_color = ANOMALY_COLOR,
        site = escape_html(report.site_url),
        start = report.start_date,
        end = report.end_date,
        summary_rows = summary_rows,
        insights = insights,
        chart = chart,
        monthly_rows = monthly_rows,
        segment_share_rows = segment_share_rows,
        device_sections = device_sections,
        opportunity_rows = opportunity_rows,
    )
}

fn summary_rows(summaries: &[SummaryRecord]) -> String {
    let mut rows = String::new();
    for summary in summaries {
        rows.push_str(&format!(
            "                <tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{:.2}</td></tr>\n",
            escape_html(&summary.segment),
            summary.clicks,
            summary.impressions,
            percent(summary.ctr),
            summary.avg_position
        ));
    }
    rows
}

fn insights_list(report: &HtmlReport<'_>) -> String {
    let mut items = String::new();
    match report.largest_drop {
        Some(worst) => {
            let pct = worst
                .pct_clicks
                .map(percent)
                .unwrap_or_else(|| "n/a".to_string());
            items.push_str(&format!(
                "                <li class=\"drop\">Largest MoM click drop: {} ({})</li>\n",
                escape_html(&worst.month_label),
                pct
            ));
        }
        None => {
            items.push_str("                <li>No negative MoM click changes detected.</li>\n");
        }
    }
    items.push_str(&format!(
        "                <li>{} low-hanging opportunities identified.</li>\n",
        report.opportunities.len()
    ));
    items
}

fn monthly_rows(monthly: &[MonthlyRecord]) -> String {
    let mut rows = String::new();
    for month in monthly {
        let delta = month
            .delta_clicks
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        let pct = month
            .pct_clicks
            .map(percent)
            .unwrap_or_else(|| "-".to_string());
        let pct_class = if month.pct_clicks.is_some_and(|p| p < 0.0) {
            " class=\"num drop\""
        } else {
            " class=\"num\""
        };
        rows.push_str(&format!(
            "                <tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{:.2}</td><td class=\"num\">{}</td><td{}>{}</td></tr>\n",
            escape_html(&month.month_label),
            month.clicks,
            month.impressions,
            percent(month.ctr),
            month.avg_position,
            delta,
            pct_class,
            pct
        ));
    }
    rows
}

fn share_rows(shares: &[(String, u64)]) -> String {
    let total: u64 = shares.iter().map(|(_, clicks)| clicks).sum();
    let mut rows = String::new();
    for (label, clicks) in shares {
        let share = if total == 0 {
            0.0
        } else {
            *clicks as f64 / total as f64
        };
        rows.push_str(&format!(
            "                <tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
            escape_html(label),
            clicks,
            percent(share)
        ));
    }
    rows
}

fn device_sections(devices: &[(String, Vec<GroupStats>)]) -> String {
    if devices.is_empty() {
        return "        <p class=\"meta\">No device data available.</p>\n".to_string();
    }
    let mut sections = String::new();
    for (label, stats) in devices {
        let total: u64 = stats.iter().map(|s| s.clicks).sum();
        sections.push_str(&format!("        <h3>{}</h3>\n", escape_html(label)));
        sections.push_str("        <table>\n            <thead><tr><th>Device</th><th>Clicks</th><th>Share</th></tr></thead>\n            <tbody>\n");
        for entry in stats {
            let share = if total == 0 {
                0.0
            } else {
                entry.clicks as f64 / total as f64
            };
            sections.push_str(&format!(
                "                <tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
                escape_html(&entry.key),
                entry.clicks,
                percent(share)
            ));
        }
        sections.push_str("            </tbody>\n        </table>\n");
    }
    sections
}

fn opportunity_rows(opportunities: &[OpportunityRecord]) -> String {
    let mut rows = String::new();
    for opp in opportunities {
        rows.push_str(&format!(
            "                <tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{:.2}</td></tr>\n",
            escape_html(&opp.page),
            escape_html(&opp.query),
            opp.clicks,
            opp.impressions,
            percent(opp.ctr_calc),
            opp.position
        ));
    }
    rows
}

fn daily_clicks_chart(daily: &[DailyMetric], anomaly_dates: &[NaiveDate]) -> String {
    if daily.is_empty() {
        return "            <p class=\"meta\">No daily click data.</p>\n".to_string();
    }

    let flagged: HashSet<NaiveDate> = anomaly_dates.iter().copied().collect();
    let max_clicks = daily.iter().map(|d| d.clicks).max().unwrap_or(0).max(1);

    let plot_w = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let baseline = MARGIN_TOP + plot_h;
    let slot = plot_w / daily.len() as f64;
    let bar_w = slot * 0.8;

    let mut svg = format!(
        "            <svg viewBox=\"0 0 {CHART_WIDTH} {CHART_HEIGHT}\" width=\"100%\" role=\"img\" aria-label=\"Daily clicks with anomaly flags\">\n"
    );

    svg.push_str(&format!(
        "              <line x1=\"{MARGIN_LEFT}\" y1=\"{MARGIN_TOP}\" x2=\"{MARGIN_LEFT}\" y2=\"{baseline}\" stroke=\"#ccc\"/>\n"
    ));
    svg.push_str(&format!(
        "              <line x1=\"{MARGIN_LEFT}\" y1=\"{baseline}\" x2=\"{}\" y2=\"{baseline}\" stroke=\"#ccc\"/>\n",
        MARGIN_LEFT + plot_w
    ));
    svg.push_str(&format!(
        "              <text x=\"{}\" y=\"{baseline}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">0</text>\n",
        MARGIN_LEFT - 6.0
    ));
    svg.push_str(&format!(
        "              <text x=\"{}\" y=\"{}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{max_clicks}</text>\n",
        MARGIN_LEFT - 6.0,
        MARGIN_TOP + 4.0
    ));

    for (i, day) in daily.iter().enumerate() {
        let x = MARGIN_LEFT + i as f64 * slot + slot * 0.1;
        let h = day.clicks as f64 / max_clicks as f64 * plot_h;
        let y = baseline - h;
        let color = if flagged.contains(&day.date) {
            ANOMALY_COLOR
        } else {
            BAR_COLOR
        };
        svg.push_str(&format!(
            "              <rect x=\"{x:.1}\" y=\"{y:.1}\" width=\"{bar_w:.1}\" height=\"{h:.1}\" fill=\"{color}\"><title>{}: {} clicks</title></rect>\n",
            day.date, day.clicks
        ));

        if day.date.weekday() == Weekday::Mon {
            let tick_x = x + bar_w / 2.0;
            let tick_y = baseline + 12.0;
            svg.push_str(&format!(
                "              <text x=\"{tick_x:.1}\" y=\"{tick_y:.1}\" transform=\"rotate(45 {tick_x:.1} {tick_y:.1})\" font-size=\"10\" fill=\"#666\">{}</text>\n",
                day.date.format("%b %d")
            ));
        }
    }

    svg.push_str(&format!(
        "              <rect x=\"{}\" y=\"{MARGIN_TOP}\" width=\"10\" height=\"10\" fill=\"{BAR_COLOR}\"/>\n",
        MARGIN_LEFT + 10.0
    ));
    svg.push_str(&format!(
        "              <text x=\"{}\" y=\"{}\" font-size=\"11\" fill=\"#333\">Normal</text>\n",
        MARGIN_LEFT + 24.0,
        MARGIN_TOP + 9.0
    ));
    svg.push_str(&format!(
        "              <rect x=\"{}\" y=\"{MARGIN_TOP}\" width=\"10\" height=\"10\" fill=\"{ANOMALY_COLOR}\"/>\n",
        MARGIN_LEFT + 80.0
    ));
    svg.push_str(&format!(
        "              <text x=\"{}\" y=\"{}\" font-size=\"11\" fill=\"#333\">Anomaly</text>\n",
        MARGIN_LEFT + 94.0,
        MARGIN_TOP + 9.0
    ));

    svg.push_str("            </svg>\n");
    svg
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(date: &str, clicks: u64) -> DailyMetric {
        DailyMetric {
            date: date.parse().unwrap(),
            clicks,
            impressions: clicks * 10,
            ctr: 0.1,
            position: 3.0,
        }
    }

    fn base_report<'a>() -> HtmlReport<'a> {
        HtmlReport {
            site_url: "https://example.com/",
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            summaries: &[],
            monthly: &[],
            largest_drop: None,
            daily: &[],
            anomaly_dates: &[],
            segment_shares: &[],
            devices: &[],
            opportunities: &[],
        }
    }

    #[test]
    fn renders_title_and_period() {
        let html = render(&base_report());
        assert!(html.contains("<h1>GSC Audit Report for https://example.com/</h1>"));
        assert!(html.contains("Period: 2024-01-01 to 2024-03-31"));
    }

    #[test]
    fn empty_daily_series_gets_a_placeholder_instead_of_a_chart() {
        let html = render(&base_report());
        assert!(html.contains("No daily click data."));
        assert!(!html.contains("<svg"));
    }

    #[test]
    fn anomalous_days_are_drawn_red() {
        let daily = vec![day("2024-01-01", 10), day("2024-01-02", 100)];
        let anomaly_dates = vec![NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()];
        let mut report = base_report();
        report.daily = &daily;
        report.anomaly_dates = &anomaly_dates;

        let html = render(&report);
        assert!(html.contains("<svg"));
        assert!(html.contains(ANOMALY_COLOR));
        assert!(html.contains("2024-01-02: 100 clicks"));
    }

    #[test]
    fn mondays_get_a_date_tick() {
        // 2024-01-01 was a Monday.
        let daily = vec![day("2024-01-01", 10), day("2024-01-02", 20)];
        let mut report = base_report();
        report.daily = &daily;

        let html = render(&report);
        assert!(html.contains("Jan 01"));
        assert!(!html.contains("Jan 02"));
    }

    #[test]
    fn segment_shares_sum_to_the_reported_percentages() {
        let shares = vec![("Branded".to_string(), 30), ("Non-Branded".to_string(), 70)];
        let mut report = base_report();
        report.segment_shares = &shares;

        let html = render(&report);
        assert!(html.contains("30.00%"));
        assert!(html.contains("70.00%"));
    }

    #[test]
    fn zero_click_shares_do_not_divide_by_zero() {
        let shares = vec![("Branded".to_string(), 0), ("Non-Branded".to_string(), 0)];
        let mut report = base_report();
        report.segment_shares = &shares;

        let html = render(&report);
        assert!(html.contains("0.00%"));
    }

    #[test]
    fn query_text_is_html_escaped() {
        let opportunities = vec![OpportunityRecord {
            page: "https://example.com/a?x=1&y=2".to_string(),
            query: "<script>alert(1)</script>".to_string(),
            clicks: 1,
            impressions: 1000,
            ctr: 0.001,
            position: 8.0,
            ctr_calc: 0.001,
        }];
        let mut report = base_report();
        report.opportunities = &opportunities;

        let html = render(&report);
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("x=1&amp;y=2"));
        assert!(!html.contains("<script>alert"));
    }

    #[test]
    fn negative_monthly_changes_are_highlighted() {
        let monthly = vec![MonthlyRecord {
            month_label: "March 2024".to_string(),
            month: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            clicks: 50,
            impressions: 500,
            ctr: 0.1,
            avg_position: 3.0,
            delta_clicks: Some(-50),
            pct_clicks: Some(-0.5),
        }];
        let mut report = base_report();
        report.monthly = &monthly;

        let html = render(&report);
        assert!(html.contains("March 2024"));
        assert!(html.contains("-50.00%"));
        assert!(html.contains("num drop"));
    }

    #[test]
    fn device_tables_render_per_segment() {
        let devices = vec![(
            "Overall".to_string(),
            vec![
                GroupStats {
                    key: "MOBILE".to_string(),
                    clicks: 60,
                    impressions: 600,
                    ctr: 0.1,
                    position: 3.0,
                },
                GroupStats {
                    key: "DESKTOP".to_string(),
                    clicks: 40,
                    impressions: 400,
                    ctr: 0.1,
                    position: 3.0,
                },
            ],
        )];
        let mut report = base_report();
        report.devices = &devices;

        let html = render(&report);
        assert!(html.contains("<h3>Overall</h3>"));
        assert!(html.contains("MOBILE"));
        assert!(html.contains("60.00%"));
        assert!(html.contains("40.00%"));
    }

    #[test]
    fn missing_device_data_renders_a_note() {
        let html = render(&base_report());
        assert!(html.contains("No device data available."));
    }
}
