//! 时间工具函数 - 调度时区换算
//!
//! 所有计算都以调度时区 (`TIMEZONE`) 的本地时间为准。

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Weekday};
use chrono_tz::Tz;

/// HH:MM → NaiveTime
pub fn hhmm(hour: u32, min: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, min, 0).unwrap_or(NaiveTime::MIN)
}

/// 解析 "HH:MM"，失败返回 None
pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    match NaiveTime::parse_from_str(value.trim(), "%H:%M") {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!("Failed to parse time '{}': {}", value, e);
            None
        }
    }
}

/// 本地日期 + 时间 → 调度时区时刻
///
/// DST gap fallback: 本地时间不存在时顺延 1 小时。
fn resolve_local(date: NaiveDate, at: NaiveTime, tz: Tz) -> DateTime<Tz> {
    let naive = date.and_time(at);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

/// 下一次每日触发时刻（严格晚于 `now`）
pub fn next_daily(now: DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let candidate = resolve_local(today, at, tz);
    if candidate > now {
        candidate
    } else {
        resolve_local(today + Duration::days(1), at, tz)
    }
}

/// 下一次每周触发时刻（严格晚于 `now`）
pub fn next_weekly(now: DateTime<Tz>, day: Weekday, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let ahead = (7 + day.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        % 7;
    let candidate = resolve_local(today + Duration::days(ahead), at, tz);
    if candidate > now {
        candidate
    } else {
        resolve_local(today + Duration::days(ahead + 7), at, tz)
    }
}

/// 下一个整点（严格晚于 `now`）
pub fn next_hour(now: DateTime<Tz>) -> DateTime<Tz> {
    let truncated = now
        .with_nanosecond(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_minute(0))
        .unwrap_or(now);
    truncated + Duration::hours(1)
}

/// 距离 `target` 的等待时长，最少 1 秒
pub fn sleep_until(now: DateTime<Tz>, target: DateTime<Tz>) -> std::time::Duration {
    target
        .signed_duration_since(now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(1))
        .max(std::time::Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(tz: Tz, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        tz.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    #[test]
    fn test_next_daily_later_today() {
        let now = at(chrono_tz::UTC, 2026, 3, 10, 1, 30);
        let next = next_daily(now, hhmm(2, 0));
        assert_eq!(next, at(chrono_tz::UTC, 2026, 3, 10, 2, 0));
    }

    #[test]
    fn test_next_daily_rolls_to_tomorrow() {
        let now = at(chrono_tz::UTC, 2026, 3, 10, 2, 0);
        let next = next_daily(now, hhmm(2, 0));
        assert_eq!(next, at(chrono_tz::UTC, 2026, 3, 11, 2, 0));
    }

    #[test]
    fn test_next_weekly_sunday() {
        // 2026-03-10 is a Tuesday
        let now = at(chrono_tz::UTC, 2026, 3, 10, 12, 0);
        let next = next_weekly(now, Weekday::Sun, hhmm(3, 0));
        assert_eq!(next, at(chrono_tz::UTC, 2026, 3, 15, 3, 0));

        // Already past this Sunday's slot → next week
        let sunday_late = at(chrono_tz::UTC, 2026, 3, 15, 4, 0);
        let next = next_weekly(sunday_late, Weekday::Sun, hhmm(3, 0));
        assert_eq!(next, at(chrono_tz::UTC, 2026, 3, 22, 3, 0));
    }

    #[test]
    fn test_next_hour() {
        let now = at(chrono_tz::UTC, 2026, 3, 10, 23, 45);
        let next = next_hour(now);
        assert_eq!(next.hour(), 0);
        assert_eq!(next.minute(), 0);
        assert_eq!(next.day(), 11);
    }

    #[test]
    fn test_next_daily_dst_gap() {
        // Europe/Madrid skips 02:00-03:00 on 2026-03-29
        let tz = chrono_tz::Europe::Madrid;
        let now = at(tz, 2026, 3, 28, 12, 0);
        let next = next_daily(now, hhmm(2, 30));
        assert!(next > now);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 29).unwrap());
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("02:00"), Some(hhmm(2, 0)));
        assert_eq!(parse_hhmm(" 23:59 "), Some(hhmm(23, 59)));
        assert_eq!(parse_hhmm("25:00"), None);
    }

    #[test]
    fn test_sleep_until_floor() {
        let now = at(chrono_tz::UTC, 2026, 3, 10, 2, 0);
        assert_eq!(sleep_until(now, now), std::time::Duration::from_secs(1));
        assert_eq!(
            sleep_until(now, now + Duration::minutes(5)),
            std::time::Duration::from_secs(300)
        );
    }
}
