use super::TextFamily;
use crate::context::{ConversionContext, TemporalFormat};
use chrono::{
    DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc,
    format::{Item, StrftimeItems},
};
use model::core::{data_type::DataType, value::Value};
use std::fmt::Write;

const ISO_OFFSET_PATTERNS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
];

const ISO_LOCAL_PATTERNS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const ISO_DATE: &str = "%Y-%m-%d";
const ISO_TIMES: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Dates, times and timestamps. Textual input is tried against the
/// configured format first, then as a count of time units since the epoch.
#[derive(Debug, Clone, Copy)]
pub struct TemporalFamily;

impl TextFamily for TemporalFamily {
    fn parse(
        &self,
        ctx: &ConversionContext,
        data_type: &DataType,
        raw: &str,
    ) -> Result<Value, String> {
        match data_type {
            DataType::Timestamp => parse_timestamp(ctx, raw).map(Value::Timestamp),
            DataType::Date => parse_date(ctx, raw).map(Value::Date),
            DataType::Time => parse_time(ctx, raw).map(Value::Time),
            other => Err(format!("{other} is not temporal")),
        }
    }

    fn render(&self, ctx: &ConversionContext, value: &Value) -> Result<String, String> {
        match value {
            Value::Timestamp(ts) => {
                let local = ts.with_timezone(&ctx.time_zone);
                match &ctx.timestamp_format {
                    TemporalFormat::Iso => Ok(local.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
                    TemporalFormat::Pattern(p) => format_with(p, |p| local.format(p)),
                }
            }
            Value::Date(d) => match &ctx.date_format {
                TemporalFormat::Iso => Ok(d.format(ISO_DATE).to_string()),
                TemporalFormat::Pattern(p) => format_with(p, |p| d.format(p)),
            },
            Value::Time(t) => match &ctx.time_format {
                TemporalFormat::Iso => Ok(t.format("%H:%M:%S%.f").to_string()),
                TemporalFormat::Pattern(p) => format_with(p, |p| t.format(p)),
            },
            other => Err(format!("not a temporal value: {other}")),
        }
    }
}

/// Whether a user-supplied pattern is a usable chrono format string.
pub fn is_valid_pattern(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

pub(crate) fn parse_timestamp(ctx: &ConversionContext, raw: &str) -> Result<DateTime<Utc>, String> {
    let parsed = match &ctx.timestamp_format {
        TemporalFormat::Pattern(p) => DateTime::parse_from_str(raw, p)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, p)
                    .ok()
                    .and_then(|ndt| in_zone(ctx, ndt))
            }),
        TemporalFormat::Iso => parse_iso_timestamp(ctx, raw),
    };

    if let Some(ts) = parsed {
        return Ok(ts);
    }
    numeric(ctx, raw).ok_or_else(|| {
        format!(
            "expected {} or a number of {:?} since {}",
            describe(&ctx.timestamp_format),
            ctx.time_unit,
            ctx.epoch.to_rfc3339()
        )
    })
}

fn parse_iso_timestamp(ctx: &ConversionContext, raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for pattern in ISO_OFFSET_PATTERNS {
        if let Ok(dt) = DateTime::parse_from_str(raw, pattern) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for pattern in ISO_LOCAL_PATTERNS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return in_zone(ctx, ndt);
        }
    }
    NaiveDate::parse_from_str(raw, ISO_DATE)
        .ok()
        .and_then(|d| in_zone(ctx, d.and_time(NaiveTime::MIN)))
}

fn parse_date(ctx: &ConversionContext, raw: &str) -> Result<NaiveDate, String> {
    let pattern = match &ctx.date_format {
        TemporalFormat::Iso => ISO_DATE,
        TemporalFormat::Pattern(p) => p.as_str(),
    };
    if let Ok(d) = NaiveDate::parse_from_str(raw, pattern) {
        return Ok(d);
    }
    numeric(ctx, raw)
        .map(|ts| ts.with_timezone(&ctx.time_zone).date_naive())
        .ok_or_else(|| format!("expected a date formatted as {}", describe(&ctx.date_format)))
}

fn parse_time(ctx: &ConversionContext, raw: &str) -> Result<NaiveTime, String> {
    let parsed = match &ctx.time_format {
        TemporalFormat::Iso => ISO_TIMES
            .iter()
            .find_map(|p| NaiveTime::parse_from_str(raw, p).ok()),
        TemporalFormat::Pattern(p) => NaiveTime::parse_from_str(raw, p).ok(),
    };
    if let Some(t) = parsed {
        return Ok(t);
    }

    // Numeric times count units since midnight and must stay within a day.
    raw.parse::<i64>()
        .ok()
        .filter(|n| *n >= 0)
        .and_then(|n| ctx.time_unit.duration(n))
        .and_then(|offset| {
            let (time, wrapped) = NaiveTime::MIN.overflowing_add_signed(offset);
            (wrapped == 0).then_some(time)
        })
        .ok_or_else(|| format!("expected a time formatted as {}", describe(&ctx.time_format)))
}

fn numeric(ctx: &ConversionContext, raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<i64>()
        .ok()
        .and_then(|n| ctx.instant_from_units(n))
}

fn in_zone(ctx: &ConversionContext, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    ctx.time_zone
        .from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn describe(format: &TemporalFormat) -> String {
    match format {
        TemporalFormat::Iso => "ISO-8601".to_string(),
        TemporalFormat::Pattern(p) => format!("'{p}'"),
    }
}

/// Formats through `write!` so a bad pattern surfaces as an error rather
/// than a panic inside `to_string`.
fn format_with<'a, D, F>(pattern: &'a str, format: F) -> Result<String, String>
where
    F: FnOnce(&'a str) -> D,
    D: std::fmt::Display,
{
    let mut out = String::new();
    write!(out, "{}", format(pattern)).map_err(|_| format!("invalid pattern '{pattern}'"))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TimeUnit;
    use chrono_tz::Tz;

    #[test]
    fn iso_timestamps_with_and_without_offsets() {
        let ctx = ConversionContext::default();
        let with_offset = parse_timestamp(&ctx, "2017-11-30T14:46:56+01:00").unwrap();
        assert_eq!(with_offset.to_rfc3339(), "2017-11-30T13:46:56+00:00");

        let local = parse_timestamp(&ctx, "2017-11-30 14:46:56.123").unwrap();
        assert_eq!(local.timestamp_millis() % 1000, 123);

        let date_only = parse_timestamp(&ctx, "2017-11-30").unwrap();
        assert_eq!(date_only.to_rfc3339(), "2017-11-30T00:00:00+00:00");
    }

    #[test]
    fn local_timestamps_use_the_configured_zone() {
        let ctx = ConversionContext {
            time_zone: Tz::Europe__Paris,
            ..Default::default()
        };
        let ts = parse_timestamp(&ctx, "2017-11-30T14:46:56").unwrap();
        assert_eq!(ts.to_rfc3339(), "2017-11-30T13:46:56+00:00");

        let rendered = TemporalFamily.render(&ctx, &Value::Timestamp(ts)).unwrap();
        assert_eq!(rendered, "2017-11-30T14:46:56+01:00");
    }

    #[test]
    fn numeric_timestamps_count_units_from_the_epoch() {
        let ctx = ConversionContext::default();
        assert_eq!(
            parse_timestamp(&ctx, "123456").unwrap().timestamp_millis(),
            123_456
        );

        let ctx = ConversionContext {
            time_unit: TimeUnit::Seconds,
            ..Default::default()
        };
        assert_eq!(parse_timestamp(&ctx, "60").unwrap().timestamp(), 60);
    }

    #[test]
    fn custom_patterns() {
        let ctx = ConversionContext {
            timestamp_format: TemporalFormat::Pattern("%d/%m/%Y %H:%M".into()),
            date_format: TemporalFormat::Pattern("%d/%m/%Y".into()),
            ..Default::default()
        };
        let ts = parse_timestamp(&ctx, "30/11/2017 14:46").unwrap();
        assert_eq!(
            TemporalFamily.render(&ctx, &Value::Timestamp(ts)).unwrap(),
            "30/11/2017 14:46"
        );
        assert_eq!(
            parse_date(&ctx, "30/11/2017").unwrap(),
            NaiveDate::from_ymd_opt(2017, 11, 30).unwrap()
        );
        assert!(parse_date(&ctx, "2017-11-30").is_err());
    }

    #[test]
    fn times_parse_iso_and_units_since_midnight() {
        let ctx = ConversionContext::default();
        assert_eq!(
            parse_time(&ctx, "12:30:15.5").unwrap(),
            NaiveTime::from_hms_milli_opt(12, 30, 15, 500).unwrap()
        );
        assert_eq!(
            parse_time(&ctx, "1000").unwrap(),
            NaiveTime::from_hms_opt(0, 0, 1).unwrap()
        );
        assert!(parse_time(&ctx, "86400000").is_err());
        assert!(parse_time(&ctx, "-1").is_err());
    }

    #[test]
    fn pattern_validation() {
        assert!(is_valid_pattern("%Y-%m-%d"));
        assert!(!is_valid_pattern("%Y-%Q"));
    }
}
