use crate::metadata::{ImageMetadata, TagValue};
use crate::receipt::NormalizedRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// e.g. `30 Apr 2025 10:01 PM`
pub const DISPLAY_FORMAT: &str = "%d %b %Y %I:%M %p";

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %I:%M %p",
    "%a %b %d %Y %H:%M:%S",
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y, %I:%M %p",
    "%B %d, %Y %H:%M",
    "%B %d %Y %I:%M %p",
    "%d %B %Y %I:%M %p",
    "%d %B %Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%b-%Y",
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    ExifOriginal,
    ExifCreate,
    Receipt,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MasterTimestamp {
    pub value: Option<String>,
    pub source: TimestampSource,
}

/// Picks the authoritative timestamp for a receipt.
///
/// Sources are tried in order: EXIF original time, EXIF creation time, then
/// the `date` field read off the receipt. The first source that is *present*
/// wins even when its value cannot be formatted; in that case `value` is
/// `None` and the lower sources are not looked at.
pub fn resolve_master_timestamp(
    metadata: &ImageMetadata,
    receipt: &NormalizedRecord,
) -> Option<MasterTimestamp> {
    let resolved = if let Some(original) = &metadata.date_time_original {
        MasterTimestamp {
            value: format_epoch(original),
            source: TimestampSource::ExifOriginal,
        }
    } else if let Some(created) = &metadata.create_date {
        MasterTimestamp {
            value: format_epoch(created),
            source: TimestampSource::ExifCreate,
        }
    } else if let Some(date) = receipt.get("date") {
        MasterTimestamp {
            value: parse_human_date(date).map(|parsed| parsed.format(DISPLAY_FORMAT).to_string()),
            source: TimestampSource::Receipt,
        }
    } else {
        log::debug!("No timestamp source available");
        return None;
    };

    if resolved.value.is_none() {
        log::warn!("Timestamp source {:?} is present but unusable", resolved.source);
    }
    Some(resolved)
}

fn format_epoch(raw: &TagValue) -> Option<String> {
    let seconds = raw.as_epoch_seconds()?;
    // Sub-second parts are dropped toward the past, like a millisecond clock would.
    let stamp = DateTime::<Utc>::from_timestamp(seconds.floor() as i64, 0)?;
    Some(stamp.format(DISPLAY_FORMAT).to_string())
}

/// Lenient parse of a date as printed on a receipt. Times with an explicit
/// offset are moved to UTC; everything else is kept as written.
pub fn parse_human_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.naive_utc());
    }
    if let Ok(stamp) = DateTime::parse_from_rfc2822(text) {
        return Some(stamp.naive_utc());
    }

    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
