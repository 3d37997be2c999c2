//! Timestamp fields as OpenVPN writes them.
//!
//! Epoch fields are plain `time_t`. Text fields come in two spellings:
//! ctime (`Thu Jun 18 08:12:15 2015`, single-digit days space-padded) and
//! `2015-06-18 08:12:15`. Text is in the server's local zone.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

const TEXT_FORMATS: [&str; 2] = ["%a %b %d %H:%M:%S %Y", "%Y-%m-%d %H:%M:%S"];

/// A `time_t` field. Zero, negative and non-numeric values are "unknown".
pub fn parse_epoch(raw: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = raw.trim().parse().ok()?;
    if secs <= 0 {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}

/// A human-readable timestamp in server-local time.
pub fn parse_text(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return None;
    }
    let naive = TEXT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Epoch first, text as fallback. Returns the instant and the raw epoch as
/// written, which is 0 when only the text field was usable.
pub fn parse_pair(epoch: Option<&str>, text: Option<&str>) -> Option<(DateTime<Utc>, i64)> {
    if let Some(at) = epoch.and_then(parse_epoch) {
        return Some((at, at.timestamp()));
    }
    text.and_then(parse_text).map(|at| (at, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        let naive = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap();
        Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn epoch_parses_and_rejects_zero() {
        assert_eq!(parse_epoch("1434615135").unwrap().timestamp(), 1_434_615_135);
        assert!(parse_epoch("0").is_none());
        assert!(parse_epoch("-5").is_none());
        assert!(parse_epoch("soon").is_none());
    }

    #[test]
    fn ctime_text_parses_in_local_zone() {
        assert_eq!(
            parse_text("Thu Jun 18 08:12:15 2015"),
            Some(local(2015, 6, 18, 8, 12, 15))
        );
    }

    #[test]
    fn ctime_with_padded_day() {
        assert_eq!(
            parse_text("Mon Jun  8 08:12:15 2015"),
            Some(local(2015, 6, 8, 8, 12, 15))
        );
    }

    #[test]
    fn iso_like_text_parses() {
        assert_eq!(
            parse_text("2015-06-18 08:12:15"),
            Some(local(2015, 6, 18, 8, 12, 15))
        );
    }

    #[test]
    fn garbage_text_is_none() {
        assert!(parse_text("").is_none());
        assert!(parse_text("yesterday-ish").is_none());
    }

    #[test]
    fn pair_prefers_epoch() {
        let (at, raw) = parse_pair(Some("1434615135"), Some("Thu Jan  1 00:00:00 1999")).unwrap();
        assert_eq!(raw, 1_434_615_135);
        assert_eq!(at.timestamp(), 1_434_615_135);
    }

    #[test]
    fn pair_falls_back_to_text() {
        let (at, raw) = parse_pair(Some(""), Some("2015-06-18 08:12:15")).unwrap();
        assert_eq!(at, local(2015, 6, 18, 8, 12, 15));
        assert_eq!(raw, 0);
    }
}
