//! Free-text date parsing for the ad hoc formats the configured news sites
//! use: "21 fevral 2026 12:06", "15 Noy 2025 12:44", "21.02.2026 [19:22]".
//! Unparseable input is "no date", never an error.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use tracing::debug;

/// Recognized month spellings, Azerbaijani first, English accepted too.
/// Abbreviations ("noy", "fev") match by prefix.
const MONTHS: &[(&str, u32)] = &[
    ("yanvar", 1),
    ("fevral", 2),
    ("mart", 3),
    ("aprel", 4),
    ("may", 5),
    ("mayis", 5),
    ("iyun", 6),
    ("iyul", 7),
    ("avqust", 8),
    ("sentyabr", 9),
    ("oktyabr", 10),
    ("noyabr", 11),
    ("dekabr", 12),
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

/// Lowercase and fold the Azerbaijani dotted/dotless i variants so "İyul",
/// "i̇yul" and "iyul" all hit the same table entry.
fn normalize(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\u{307}')
        .map(|c| if c == 'ı' { 'i' } else { c })
        .collect()
}

fn month_number(token: &str) -> Option<u32> {
    let token = token.trim_matches(|c: char| !c.is_alphabetic());
    if token.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .find(|(name, _)| *name == token || name.starts_with(token))
        .map(|(_, num)| *num)
}

fn parse_time(token: &str) -> Option<(u32, u32)> {
    let (h, m) = token.split_once(':')?;
    Some((h.trim().parse().ok()?, m.trim().parse().ok()?))
}

/// Parse a site-supplied date string to a naive local timestamp.
pub fn parse_source_date(input: &str) -> Option<NaiveDateTime> {
    let cleaned = normalize(input);
    if cleaned.is_empty() {
        return None;
    }

    if let Some(parsed) = parse_month_name(&cleaned) {
        return Some(parsed);
    }
    if let Some(parsed) = parse_numeric(&cleaned) {
        return Some(parsed);
    }

    debug!("could not parse date: {:?}", input);
    None
}

/// "21 fevral 2026", "21 fevral 2026 12:06", "21 fevral 18:26", "21 fevral".
/// A missing year defaults to the current year at parse time.
fn parse_month_name(cleaned: &str) -> Option<NaiveDateTime> {
    let parts: Vec<&str> = cleaned.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }

    let day: u32 = parts[0].parse().ok()?;
    let month = month_number(parts[1])?;

    let (year, time) = match parts.get(2) {
        Some(third) if third.contains(':') => (Local::now().year(), parse_time(third)),
        Some(third) => {
            let year: i32 = third.parse().ok()?;
            (year, parts.get(3).and_then(|t| parse_time(t)))
        }
        None => (Local::now().year(), None),
    };

    let (hour, minute) = time.unwrap_or((0, 0));
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
}

/// "21.02.2026 [19:22]", "21.02.2026 19:22", "21.02.2026".
fn parse_numeric(cleaned: &str) -> Option<NaiveDateTime> {
    if !cleaned.contains('.') {
        return None;
    }
    let cleaned = cleaned.replace(['[', ']'], "");
    let mut parts = cleaned.split_whitespace();

    let date_part = parts.next()?;
    let mut fields = date_part.split('.');
    let day: u32 = fields.next()?.trim().parse().ok()?;
    let month: u32 = fields.next()?.trim().parse().ok()?;
    let year: i32 = fields.next()?.trim().parse().ok()?;

    let (hour, minute) = parts.next().and_then(parse_time).unwrap_or((0, 0));
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_full_month_name_with_time() {
        let dt = parse_source_date("21 fevral 2026 12:06").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2026, 2, 21).unwrap());
        assert_eq!((dt.hour(), dt.minute()), (12, 6));
    }

    #[test]
    fn parses_month_name_without_time() {
        let dt = parse_source_date("21 Fevral 2026").unwrap();
        assert_eq!(dt, NaiveDate::from_ymd_opt(2026, 2, 21).unwrap().and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn missing_year_defaults_to_current_year() {
        let dt = parse_source_date("21 fevral").unwrap();
        assert_eq!(dt.year(), Local::now().year());
        assert_eq!((dt.month(), dt.day()), (2, 21));

        let dt = parse_source_date("21 fevral 18:26").unwrap();
        assert_eq!(dt.year(), Local::now().year());
        assert_eq!((dt.hour(), dt.minute()), (18, 26));
    }

    #[test]
    fn parses_abbreviated_months() {
        let dt = parse_source_date("15 Noy 2025 12:44").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2025, 11, 15).unwrap());
        assert_eq!((dt.hour(), dt.minute()), (12, 44));
    }

    #[test]
    fn parses_dotted_i_variants() {
        let dt = parse_source_date("3 İyul 2025").unwrap();
        assert_eq!((dt.month(), dt.day()), (7, 3));
    }

    #[test]
    fn parses_numeric_with_bracketed_time() {
        let dt = parse_source_date("21.02.2026 [19:22]").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2026, 2, 21).unwrap());
        assert_eq!((dt.hour(), dt.minute()), (19, 22));

        let dt = parse_source_date("21.02.2026").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (0, 0));
    }

    #[test]
    fn garbage_is_no_date_not_an_error() {
        assert!(parse_source_date("").is_none());
        assert!(parse_source_date("dünən").is_none());
        assert!(parse_source_date("32 fevral 2026").is_none());
        assert!(parse_source_date("21 brumaire 2026").is_none());
    }
}
