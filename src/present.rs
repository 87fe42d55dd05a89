//! Ranking and rendering of batch results.
//!
//! The terminal front end prints markdown, the form server embeds HTML. Both
//! show the same figures in the same order.

use std::cmp::Ordering;
use std::fmt::Write;

use crate::batch::{BatchReport, KeywordWarning};
use crate::scoring::ScoredResult;

pub const NO_KEYWORDS_NOTICE: &str = "Please enter at least one keyword.";
pub const NO_SIGNAL_NOTICE: &str =
    "No strong viral signals found. Try different keywords or fewer days.";

/// Highest viral score first. Ties keep no particular order.
pub fn rank(results: &mut [ScoredResult]) {
    results.sort_unstable_by(|a, b| {
        b.viral_score
            .partial_cmp(&a.viral_score)
            .unwrap_or(Ordering::Equal)
    });
}

/// Formats an integer with comma thousands separators (`1234567` → `1,234,567`).
pub fn with_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Rounded figures keep at least one decimal place, so a ratio of exactly
/// 250 reads `250.0` rather than looking like a raw count.
pub fn with_decimals(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

pub fn summary_line(count: usize) -> String {
    let noun = if count == 1 {
        "opportunity"
    } else {
        "opportunities"
    };
    format!("Found {count} viral {noun}")
}

pub fn warning_line(warning: &KeywordWarning) -> String {
    format!(
        "Error with keyword '{}': {}",
        warning.keyword, warning.message
    )
}

/// One markdown block per result. Lines end with two spaces so they render
/// as hard breaks.
pub fn render_result_markdown(result: &ScoredResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "**{}**  ", result.title);
    let _ = writeln!(out, "**Keyword:** {}  ", result.keyword);
    let _ = writeln!(out, "**Views:** {}  ", with_thousands(result.views));
    let _ = writeln!(
        out,
        "**Subscribers:** {}  ",
        with_thousands(result.subscribers)
    );
    let _ = writeln!(out, "**Days Old:** {}  ", result.days_old);
    let _ = writeln!(
        out,
        "**Views/Subs:** {}  ",
        with_decimals(result.views_to_subs)
    );
    let _ = writeln!(
        out,
        "**Views/Day:** {}  ",
        with_thousands(result.views_per_day)
    );
    let _ = writeln!(
        out,
        "**Viral Score:** {}  ",
        with_decimals(result.viral_score)
    );
    let _ = writeln!(out, "**URL:** [Watch Video]({})  ", result.url);
    out.push_str("---\n");
    out
}

/// Results section of a report: the summary plus every block, or the
/// single "no signal" notice when nothing survived filtering.
pub fn render_markdown(results: &[ScoredResult]) -> String {
    if results.is_empty() {
        return format!("{NO_SIGNAL_NOTICE}\n");
    }
    let mut out = format!("{}\n\n", summary_line(results.len()));
    for result in results {
        out.push_str(&render_result_markdown(result));
        out.push('\n');
    }
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn render_result_html(result: &ScoredResult) -> String {
    format!(
        concat!(
            "<article class=\"result\">\n",
            "  <h3>{title}</h3>\n",
            "  <dl>\n",
            "    <dt>Keyword</dt><dd>{keyword}</dd>\n",
            "    <dt>Views</dt><dd>{views}</dd>\n",
            "    <dt>Subscribers</dt><dd>{subscribers}</dd>\n",
            "    <dt>Days Old</dt><dd>{days_old}</dd>\n",
            "    <dt>Views/Subs</dt><dd>{ratio}</dd>\n",
            "    <dt>Views/Day</dt><dd>{per_day}</dd>\n",
            "    <dt>Viral Score</dt><dd>{score}</dd>\n",
            "  </dl>\n",
            "  <a href=\"{url}\" target=\"_blank\" rel=\"noopener\">Watch Video</a>\n",
            "</article>\n"
        ),
        // Titles were entity-decoded when fetched; escape exactly once here.
        title = escape_html(&result.title),
        keyword = escape_html(&result.keyword),
        views = with_thousands(result.views),
        subscribers = with_thousands(result.subscribers),
        days_old = result.days_old,
        ratio = with_decimals(result.views_to_subs),
        per_day = with_thousands(result.views_per_day),
        score = with_decimals(result.viral_score),
        url = escape_html(&result.url),
    )
}

/// HTML fragment for a finished batch: warnings first, then the results or
/// the empty-state notice.
pub fn render_html(report: &BatchReport) -> String {
    let mut out = String::new();
    for warning in &report.warnings {
        let _ = writeln!(
            out,
            "<p class=\"warning\">{}</p>",
            escape_html(&warning_line(warning))
        );
    }
    if report.results.is_empty() {
        let _ = writeln!(out, "<p class=\"warning\">{NO_SIGNAL_NOTICE}</p>");
        return out;
    }
    let _ = writeln!(
        out,
        "<p class=\"success\">{}</p>",
        summary_line(report.results.len())
    );
    for result in &report.results {
        out.push_str(&render_result_html(result));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str, score: f64) -> ScoredResult {
        ScoredResult {
            keyword: "dog rescue".into(),
            title: title.into(),
            url: format!("https://www.youtube.com/watch?v={title}"),
            views: 500_000,
            subscribers: 2_000,
            days_old: 3,
            views_to_subs: 250.0,
            views_per_day: 166_666,
            viral_score: score,
        }
    }

    #[test]
    fn rank_orders_by_descending_score() {
        let mut results = vec![result("a", 10.0), result("b", 3005.94), result("c", 42.5)];
        rank(&mut results);
        let titles: Vec<_> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c", "a"]);
        assert!(
            results
                .windows(2)
                .all(|pair| pair[0].viral_score >= pair[1].viral_score)
        );
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(with_thousands(0), "0");
        assert_eq!(with_thousands(999), "999");
        assert_eq!(with_thousands(1_000), "1,000");
        assert_eq!(with_thousands(166_666), "166,666");
        assert_eq!(with_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn markdown_block_lists_every_metric() {
        let block = render_result_markdown(&result("Puppy", 3005.94));
        assert!(block.starts_with("**Puppy**  \n"));
        assert!(block.contains("**Keyword:** dog rescue"));
        assert!(block.contains("**Views:** 500,000"));
        assert!(block.contains("**Subscribers:** 2,000"));
        assert!(block.contains("**Days Old:** 3"));
        assert!(block.contains("**Views/Subs:** 250.0  \n"));
        assert!(block.contains("**Views/Day:** 166,666"));
        assert!(block.contains("**Viral Score:** 3005.94"));
        assert!(block.contains("[Watch Video](https://www.youtube.com/watch?v=Puppy)"));
    }

    #[test]
    fn decimals_keep_one_place_for_whole_values() {
        assert_eq!(with_decimals(250.0), "250.0");
        assert_eq!(with_decimals(3006.0), "3006.0");
        assert_eq!(with_decimals(12.35), "12.35");
        assert_eq!(with_decimals(10.5), "10.5");
    }

    #[test]
    fn html_shows_decoded_title_once_escaped() {
        let report = BatchReport {
            keywords: vec!["dog rescue".into()],
            results: vec![result("Rescuer's dog", 250.0)],
            warnings: Vec::new(),
        };
        let html = render_html(&report);
        assert!(html.contains("<h3>Rescuer&#39;s dog</h3>"));
        assert!(!html.contains("&amp;#39;"));
        assert!(html.contains("<dd>250.0</dd>"));
    }

    #[test]
    fn empty_results_render_single_notice() {
        assert_eq!(render_markdown(&[]), format!("{NO_SIGNAL_NOTICE}\n"));
    }

    #[test]
    fn markdown_starts_with_summary() {
        let rendered = render_markdown(&[result("x", 1.0)]);
        assert!(rendered.starts_with("Found 1 viral opportunity\n"));
        let rendered = render_markdown(&[result("x", 1.0), result("y", 2.0)]);
        assert!(rendered.starts_with("Found 2 viral opportunities\n"));
    }

    #[test]
    fn html_escapes_api_text() {
        let report = BatchReport {
            keywords: vec!["dog rescue".into()],
            results: vec![result("<b>Rescue</b> & \"more\"", 5.0)],
            warnings: vec![KeywordWarning {
                keyword: "<script>".into(),
                message: "search request returned HTTP 500".into(),
            }],
        };
        let html = render_html(&report);
        assert!(html.contains("&lt;b&gt;Rescue&lt;/b&gt; &amp; &quot;more&quot;"));
        assert!(html.contains("Error with keyword &#39;&lt;script&gt;&#39;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("Found 1 viral opportunity"));
    }

    #[test]
    fn html_empty_report_shows_notice() {
        let report = BatchReport::default();
        assert!(render_html(&report).contains(NO_SIGNAL_NOTICE));
    }
}
