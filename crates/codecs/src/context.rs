use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Options every codec consults while converting. Built once per operation
/// from the loader settings and shared by all codecs of a registry.
#[derive(Debug, Clone)]
pub struct ConversionContext {
    /// External strings that read as absent (matched verbatim or trimmed).
    pub null_strings: Vec<String>,
    /// Text emitted for an absent value on unload. `None` writes the
    /// format's native null.
    pub null_output: Option<String>,
    /// Accepted `(true, false)` word pairs, matched case-insensitively.
    pub boolean_words: Vec<(String, String)>,
    pub number_format: NumberFormat,
    pub timestamp_format: TemporalFormat,
    pub date_format: TemporalFormat,
    pub time_format: TemporalFormat,
    /// Zone applied to timestamps that carry no offset, and used on output.
    pub time_zone: Tz,
    /// Unit of purely numeric temporal input.
    pub time_unit: TimeUnit,
    /// Origin of purely numeric temporal input.
    pub epoch: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormat {
    pub grouping_separator: Option<char>,
    pub decimal_separator: char,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemporalFormat {
    /// ISO-8601, with the lenient variants the store itself accepts.
    Iso,
    /// A chrono `strftime` pattern.
    Pattern(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl Default for ConversionContext {
    fn default() -> Self {
        ConversionContext {
            null_strings: Vec::new(),
            null_output: None,
            boolean_words: vec![
                ("true".into(), "false".into()),
                ("yes".into(), "no".into()),
                ("y".into(), "n".into()),
                ("t".into(), "f".into()),
                ("1".into(), "0".into()),
            ],
            number_format: NumberFormat::default(),
            timestamp_format: TemporalFormat::Iso,
            date_format: TemporalFormat::Iso,
            time_format: TemporalFormat::Iso,
            time_zone: Tz::UTC,
            time_unit: TimeUnit::Milliseconds,
            epoch: Utc.timestamp_opt(0, 0).single().unwrap_or_default(),
        }
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat {
            grouping_separator: None,
            decimal_separator: '.',
        }
    }
}

impl ConversionContext {
    /// Whether `raw` is one of the configured null markers.
    pub fn is_null_marker(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        self.null_strings
            .iter()
            .any(|marker| marker == raw || marker == trimmed)
    }

    pub fn parse_boolean(&self, raw: &str) -> Option<bool> {
        let word = raw.trim();
        self.boolean_words.iter().find_map(|(yes, no)| {
            if word.eq_ignore_ascii_case(yes) {
                Some(true)
            } else if word.eq_ignore_ascii_case(no) {
                Some(false)
            } else {
                None
            }
        })
    }

    /// Strips grouping separators and normalizes the decimal separator so
    /// the result can be handed to a plain numeric parser.
    pub fn normalize_number(&self, raw: &str) -> String {
        let fmt = &self.number_format;
        raw.trim()
            .chars()
            .filter(|c| Some(*c) != fmt.grouping_separator)
            .map(|c| if c == fmt.decimal_separator { '.' } else { c })
            .collect()
    }

    /// `epoch + amount * time_unit`, or `None` on overflow.
    pub fn instant_from_units(&self, amount: i64) -> Option<DateTime<Utc>> {
        let offset = self.time_unit.duration(amount)?;
        self.epoch.checked_add_signed(offset)
    }
}

impl TimeUnit {
    pub fn duration(&self, amount: i64) -> Option<Duration> {
        match self {
            TimeUnit::Nanoseconds => Some(Duration::nanoseconds(amount)),
            TimeUnit::Microseconds => Some(Duration::microseconds(amount)),
            TimeUnit::Milliseconds => Duration::try_milliseconds(amount),
            TimeUnit::Seconds => Duration::try_seconds(amount),
            TimeUnit::Minutes => Duration::try_minutes(amount),
            TimeUnit::Hours => Duration::try_hours(amount),
            TimeUnit::Days => Duration::try_days(amount),
        }
    }
}
