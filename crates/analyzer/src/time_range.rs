//! Time-range extraction — absolute dates and relative expressions,
//! normalized to a UTC range plus a granularity.
//!
//! All ranges are half-open: inclusive start, exclusive end. `now` is
//! passed in by the caller so tests (and replays) are deterministic.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

use promptforge_core::profile::{TimeGranularity, TimeRange};

/// Extract a time range from the question, if one is present.
pub fn extract_time_range(question: &str, now: DateTime<Utc>) -> Option<TimeRange> {
    let q = question.to_lowercase();
    let today = midnight(now);

    // Absolute dates first: "2025-01-01" or "2025-01-01 to 2025-02-01".
    let dates = absolute_dates(&q);
    match dates.as_slice() {
        [single] => {
            return Some(range(
                *single,
                *single + Duration::days(1),
                single.format("%Y-%m-%d").to_string(),
                TimeGranularity::Day,
            ));
        }
        [first, second] if first < second => {
            return Some(range(
                *first,
                *second + Duration::days(1),
                format!("{} to {}", first.format("%Y-%m-%d"), second.format("%Y-%m-%d")),
                TimeGranularity::Day,
            ));
        }
        _ => {}
    }

    // Relative expressions, most specific first.
    if q.contains("last hour") || q.contains("past hour") {
        let hour = now
            .date_naive()
            .and_hms_opt(now.hour(), 0, 0)
            .expect("whole hour is valid")
            .and_utc();
        return Some(dt_range(
            hour - Duration::hours(1),
            hour,
            "last hour".into(),
            TimeGranularity::Hour,
        ));
    }
    if let Some(days) = last_n_days(&q) {
        let start = today - Duration::days(days);
        return Some(dt_range(
            start,
            today,
            format!("last {days} days"),
            TimeGranularity::Day,
        ));
    }
    if q.contains("yesterday") {
        return Some(dt_range(
            today - Duration::days(1),
            today,
            "yesterday".into(),
            TimeGranularity::Day,
        ));
    }
    if q.contains("today") {
        return Some(dt_range(
            today,
            today + Duration::days(1),
            "today".into(),
            TimeGranularity::Day,
        ));
    }
    if q.contains("last week") {
        return Some(dt_range(
            today - Duration::days(7),
            today,
            "last week".into(),
            TimeGranularity::Week,
        ));
    }
    if q.contains("this month") {
        let start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()?;
        return Some(dt_range(
            start,
            today + Duration::days(1),
            "this month".into(),
            TimeGranularity::Month,
        ));
    }
    if q.contains("last month") {
        return Some(dt_range(
            today - Duration::days(30),
            today,
            "last month".into(),
            TimeGranularity::Month,
        ));
    }
    if q.contains("last quarter") || q.contains("this quarter") {
        return Some(dt_range(
            today - Duration::days(90),
            today,
            "last quarter".into(),
            TimeGranularity::Quarter,
        ));
    }
    if q.contains("last year") {
        return Some(dt_range(
            today - Duration::days(365),
            today,
            "last year".into(),
            TimeGranularity::Year,
        ));
    }

    None
}

fn midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is valid")
        .and_utc()
}

/// ISO dates (`YYYY-MM-DD`) found in the question, at most two.
fn absolute_dates(q: &str) -> Vec<NaiveDate> {
    q.split(|c: char| c.is_whitespace() || c == ',')
        .filter_map(|token| NaiveDate::parse_from_str(token, "%Y-%m-%d").ok())
        .take(2)
        .collect()
}

/// Parse "last N days".
fn last_n_days(q: &str) -> Option<i64> {
    let words: Vec<&str> = q.split_whitespace().collect();
    words.windows(3).find_map(|w| {
        if w[0] == "last" && (w[2] == "days" || w[2] == "day") {
            w[1].parse::<i64>().ok().filter(|n| *n > 0)
        } else {
            None
        }
    })
}

fn range(start: NaiveDate, end: NaiveDate, expression: String, granularity: TimeGranularity) -> TimeRange {
    dt_range(
        start.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc(),
        end.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc(),
        expression,
        granularity,
    )
}

fn dt_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    expression: String,
    granularity: TimeGranularity,
) -> TimeRange {
    TimeRange {
        start,
        end,
        expression,
        granularity,
    }
}
