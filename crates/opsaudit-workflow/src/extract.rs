//! Extraction of "insufficient recording-retention days" facts from
//! free-text audit comments.
//!
//! Reviewers write comments like 「录像最早日期：2024-01-01，不足30天」.
//! The extractor pulls out the earliest recording date and the required
//! retention span. It is deliberately conservative: a missed reminder is
//! acceptable, a bogus one is not, so anything that does not parse cleanly
//! into a known (date, 30|90|180) pair is treated as no match.
//!
//! All matching is table-driven and ordered — most specific pattern first,
//! generic fallback last, first match wins.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// A parsed retention shortfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionIssue {
    /// Earliest date for which a recording exists.
    pub earliest_date: NaiveDate,
    /// Required retention span in days: 30, 90, or 180.
    pub required_days: i64,
}

/// Date patterns, most specific first; the bare date shape is the fallback.
static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"录像最早日期[：:]\s*(\d{4}[-/]\d{1,2}[-/]\d{1,2})",
        r"最早录像日期[：:]\s*(\d{4}[-/]\d{1,2}[-/]\d{1,2})",
        r"录像日期[：:]\s*(\d{4}[-/]\d{1,2}[-/]\d{1,2})",
        r"(\d{4}[-/]\d{1,2}[-/]\d{1,2})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("date pattern"))
    .collect()
});

/// Day-count patterns, first match wins.
static DAY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"不足\s*(\d+)\s*天",
        r"录像天数不足\s*(\d+)\s*天",
        r"缺少\s*(\d+)\s*天",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("day pattern"))
    .collect()
});

/// Literal fallbacks tried in order when no day pattern matched.
const DAY_FALLBACKS: &[(&[&str], i64)] = &[
    (&["不足30天", "30天"], 30),
    (&["不足90天", "90天"], 90),
    (&["不足180天", "180天"], 180),
];

/// Date formats tried in order; chrono accepts single-digit month/day, so
/// these also cover `2024-1-2` / `2024/1/2`.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Retention spans the system knows how to remind about.
const VALID_DAYS: &[i64] = &[30, 90, 180];

/// Extract the (earliest date, required days) pair from an audit comment.
///
/// Returns `None` unless BOTH a date and a day count are found, the date
/// parses, and the day count is one of 30/90/180. Pure and idempotent.
pub fn extract_video_retention(comment: &str) -> Option<RetentionIssue> {
    if comment.is_empty() {
        return None;
    }

    let date_str = DATE_PATTERNS
        .iter()
        .find_map(|re| re.captures(comment))
        .map(|caps| caps[1].to_string())?;

    let days = match DAY_PATTERNS
        .iter()
        .find_map(|re| re.captures(comment))
        .and_then(|caps| caps[1].parse::<i64>().ok())
    {
        Some(d) => d,
        None => DAY_FALLBACKS
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| comment.contains(n)))
            .map(|&(_, d)| d)?,
    };

    if !VALID_DAYS.contains(&days) {
        return None;
    }

    let earliest_date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&date_str, fmt).ok())?;

    Some(RetentionIssue {
        earliest_date,
        required_days: days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_canonical_comment() {
        let issue = extract_video_retention("录像最早日期：2024-01-01，不足30天").unwrap();
        assert_eq!(issue.earliest_date, date(2024, 1, 1));
        assert_eq!(issue.required_days, 30);
    }

    #[test]
    fn test_pattern_order_most_specific_wins() {
        // Two date-shaped strings; the labelled one must win over the
        // generic fallback even though the bare date appears first.
        let issue =
            extract_video_retention("检查于2024-05-05进行，最早录像日期：2024-02-03，缺少90天").unwrap();
        assert_eq!(issue.earliest_date, date(2024, 2, 3));
        assert_eq!(issue.required_days, 90);
    }

    #[test]
    fn test_generic_date_fallback() {
        let issue = extract_video_retention("2024/3/7 开始有录像，不足180天").unwrap();
        assert_eq!(issue.earliest_date, date(2024, 3, 7));
        assert_eq!(issue.required_days, 180);
    }

    #[test]
    fn test_day_literal_fallback() {
        // No "不足 N 天" shape with spacing the patterns catch — falls back
        // to the literal substring table.
        let issue = extract_video_retention("录像日期：2024-01-15，要求保存90天的录像").unwrap();
        assert_eq!(issue.required_days, 90);
    }

    #[test]
    fn test_single_digit_date_parts() {
        let issue = extract_video_retention("录像最早日期：2024-1-2，不足30天").unwrap();
        assert_eq!(issue.earliest_date, date(2024, 1, 2));
    }

    #[test]
    fn test_rejects_unknown_day_counts() {
        // 60 is parsed but not a valid retention span.
        assert!(extract_video_retention("录像最早日期：2024-01-01，不足60天").is_none());
        assert!(extract_video_retention("录像最早日期：2024-01-01，不足7天").is_none());
    }

    #[test]
    fn test_rejects_missing_pieces() {
        assert!(extract_video_retention("").is_none());
        // Date without any day count.
        assert!(extract_video_retention("录像最早日期：2024-01-01").is_none());
        // Day count without a date.
        assert!(extract_video_retention("录像不足30天").is_none());
        // Date that does not parse (month 13).
        assert!(extract_video_retention("录像最早日期：2024-13-01，不足30天").is_none());
    }

    #[test]
    fn test_idempotent() {
        let c = "录像最早日期：2024-01-01，不足30天";
        assert_eq!(extract_video_retention(c), extract_video_retention(c));
    }
}
