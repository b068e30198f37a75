//! Lenient date parsing for request bodies.
//!
//! Clients send timestamps as RFC 3339, `YYYY-MM-DD HH:MM:SS` or a plain
//! `YYYY-MM-DD` (taken as midnight UTC). Publication years may be given as
//! `"1965"` or `1965`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer};

pub fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)));
    }

    Err(format!("invalid date/time '{}'", raw))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| parse_datetime(raw).map(|dt| dt.date_naive()))
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD", raw))
}

/// A bare year becomes January 1st of that year
pub fn parse_year(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    if raw.len() == 4 {
        if let Ok(year) = raw.parse::<i32>() {
            return NaiveDate::from_ymd_opt(year, 1, 1)
                .ok_or_else(|| format!("invalid published year '{}'", raw));
        }
    }
    parse_date(raw).map_err(|_| format!("invalid published year '{}'", raw))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YearInput {
    Number(i32),
    Text(String),
}

impl YearInput {
    fn into_date(self) -> Result<NaiveDate, String> {
        match self {
            YearInput::Number(year) => NaiveDate::from_ymd_opt(year, 1, 1)
                .ok_or_else(|| format!("invalid published year '{}'", year)),
            YearInput::Text(s) => parse_year(&s),
        }
    }
}

pub fn datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_datetime(&raw).map_err(de::Error::custom)
}

pub fn option_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_datetime(&raw).map_err(de::Error::custom))
        .transpose()
}

/// Distinguishes an absent field (`None`, via `#[serde(default)]`) from an
/// explicit `null` (`Some(None)`)
pub fn double_option_datetime<'de, D>(
    deserializer: D,
) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    option_datetime(deserializer).map(Some)
}

pub fn date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(de::Error::custom)
}

pub fn option_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_date(&raw).map_err(de::Error::custom))
        .transpose()
}

pub fn option_year<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<YearInput>::deserialize(deserializer)?
        .map(|input| input.into_date().map_err(de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_datetime_formats() {
        let rfc = parse_datetime("2024-03-01T10:30:00+02:00").unwrap();
        assert_eq!(rfc.hour(), 8);

        let spaced = parse_datetime("2024-03-01 10:30:00").unwrap();
        assert_eq!(spaced.hour(), 10);

        let plain = parse_datetime("2024-03-01").unwrap();
        assert_eq!((plain.day(), plain.hour()), (1, 0));

        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("1965").unwrap(), NaiveDate::from_ymd_opt(1965, 1, 1).unwrap());
        assert_eq!(
            parse_year("1965-08-01").unwrap(),
            NaiveDate::from_ymd_opt(1965, 8, 1).unwrap()
        );
        assert!(parse_year("65").is_err());
        assert!(parse_year("abcd").is_err());
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option_datetime")]
        return_date: Option<Option<DateTime<Utc>>>,
        #[serde(default, deserialize_with = "option_year")]
        year: Option<NaiveDate>,
    }

    #[test]
    fn test_double_option_distinguishes_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.return_date, None);

        let null: Patch = serde_json::from_str(r#"{"return_date": null}"#).unwrap();
        assert_eq!(null.return_date, Some(None));

        let set: Patch = serde_json::from_str(r#"{"return_date": "2024-01-02"}"#).unwrap();
        assert!(matches!(set.return_date, Some(Some(_))));
    }

    #[test]
    fn test_year_accepts_number_or_string() {
        let n: Patch = serde_json::from_str(r#"{"year": 1999}"#).unwrap();
        let s: Patch = serde_json::from_str(r#"{"year": "1999"}"#).unwrap();
        assert_eq!(n.year, s.year);
        assert!(serde_json::from_str::<Patch>(r#"{"year": "soon"}"#).is_err());
    }
}
