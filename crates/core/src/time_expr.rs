use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// 解析相对或绝对时间表达式
///
/// 支持 `now`、`<N> <unit>[s] ago`（unit为second/minute/hour/day/week）、
/// RFC3339 以及常见的本地日期时间格式。无法解析时返回None，由调用方决定如何报错。
pub fn parse_time_expression(input: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("now") {
        return Some(now);
    }

    if let Some(ago) = parse_relative(input) {
        return now.checked_sub_signed(ago);
    }

    parse_absolute(input)
}

fn parse_relative(input: &str) -> Option<Duration> {
    let lowered = input.to_lowercase();
    let mut parts = lowered.split_whitespace();
    let amount: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;
    if parts.next()? != "ago" || parts.next().is_some() || amount < 0 {
        return None;
    }

    let unit = unit.strip_suffix('s').unwrap_or(unit);
    match unit {
        "second" => Duration::try_seconds(amount),
        "minute" => Duration::try_minutes(amount),
        "hour" => Duration::try_hours(amount),
        "day" => Duration::try_days(amount),
        "week" => Duration::try_weeks(amount),
        _ => None,
    }
}

fn parse_absolute(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_expressions() {
        let now = Utc::now();
        assert_eq!(
            parse_time_expression("2 hours ago", now),
            Some(now - Duration::hours(2))
        );
        assert_eq!(
            parse_time_expression("1 week ago", now),
            Some(now - Duration::weeks(1))
        );
        assert_eq!(
            parse_time_expression("  30 Minutes AGO ", now),
            Some(now - Duration::minutes(30))
        );
        assert_eq!(parse_time_expression("now", now), Some(now));
    }

    #[test]
    fn test_unparseable_yields_none() {
        let now = Utc::now();
        assert_eq!(parse_time_expression("bogus", now), None);
        assert_eq!(parse_time_expression("2 fortnights ago", now), None);
        assert_eq!(parse_time_expression("2 hours", now), None);
        assert_eq!(parse_time_expression("-1 day ago", now), None);
        assert_eq!(parse_time_expression("", now), None);
    }

    #[test]
    fn test_absolute_expressions() {
        let now = Utc::now();
        let rfc = parse_time_expression("2024-03-01T12:00:00Z", now).unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());

        let local = parse_time_expression("2024-03-01 12:00:00", now).unwrap();
        let expected = Local
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(local, expected);

        assert!(parse_time_expression("2024-03-01", now).is_some());
    }
}
