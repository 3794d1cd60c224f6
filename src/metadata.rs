// src/metadata.rs

use chrono::NaiveDate;
use exif::{Exif, In, Reader, Tag, Value};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// A time attribute as it reached us. Readers produce epoch seconds, but
/// callers handing in JSON may send anything, so text is kept as-is.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum TagValue {
    Number(serde_json::Number),
    Text(String),
}

impl TagValue {
    pub fn epoch(seconds: i64) -> Self {
        TagValue::Number(seconds.into())
    }

    /// The value as epoch seconds, if it is a finite number.
    pub fn as_epoch_seconds(&self) -> Option<f64> {
        match self {
            TagValue::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            TagValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ImageMetadata {
    #[serde(default)]
    pub date_time_original: Option<TagValue>,
    #[serde(default)]
    pub create_date: Option<TagValue>,
    #[serde(default)]
    pub modify_date: Option<TagValue>,
    #[serde(default)]
    pub software: Option<String>,
    #[serde(default)]
    pub image_width: Option<u32>,
    #[serde(default)]
    pub image_height: Option<u32>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl ImageMetadata {
    /// The record used whenever the image cannot be read.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Reads the embedded EXIF attributes from raw image bytes. Never fails: an
/// unreadable image gives the all-null record.
pub fn read_image_metadata(bytes: &[u8]) -> ImageMetadata {
    let mut cursor = Cursor::new(bytes);
    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => {
            log::trace!("EXIF data found");
            metadata_from_exif(&exif)
        }
        Err(e) => {
            log::warn!("Failed to parse EXIF data: {}", e);
            ImageMetadata::empty()
        }
    }
}

fn metadata_from_exif(exif: &Exif) -> ImageMetadata {
    let metadata = ImageMetadata {
        date_time_original: epoch_field(exif, Tag::DateTimeOriginal, Tag::OffsetTimeOriginal),
        create_date: epoch_field(exif, Tag::DateTimeDigitized, Tag::OffsetTimeDigitized),
        modify_date: epoch_field(exif, Tag::DateTime, Tag::OffsetTime),
        software: ascii_field(exif, Tag::Software),
        image_width: uint_field(exif, Tag::ImageWidth).or_else(|| uint_field(exif, Tag::PixelXDimension)),
        image_height: uint_field(exif, Tag::ImageLength).or_else(|| uint_field(exif, Tag::PixelYDimension)),
        make: ascii_field(exif, Tag::Make),
        model: ascii_field(exif, Tag::Model),
    };
    log::debug!("Extracted image metadata: {:?}", metadata);
    metadata
}

fn ascii_bytes(exif: &Exif, tag: Tag) -> Option<&[u8]> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match field.value {
        Value::Ascii(ref parts) => parts.first().map(Vec::as_slice),
        _ => None,
    }
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    let text = String::from_utf8_lossy(ascii_bytes(exif, tag)?)
        .trim_end_matches('\0')
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

fn uint_field(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)?.value.get_uint(0)
}

fn epoch_field(exif: &Exif, tag: Tag, offset_tag: Tag) -> Option<TagValue> {
    let raw = ascii_bytes(exif, tag)?;
    let mut stamp = match exif::DateTime::from_ascii(raw) {
        Ok(stamp) => stamp,
        Err(e) => {
            log::debug!("Unparsable {} value: {}", tag, e);
            return None;
        }
    };
    if let Some(offset) = ascii_bytes(exif, offset_tag) {
        if let Err(e) = stamp.parse_offset(offset) {
            log::debug!("Ignoring malformed {}: {}", offset_tag, e);
        }
    }

    exif_epoch_seconds(
        stamp.year.into(),
        stamp.month.into(),
        stamp.day.into(),
        stamp.hour.into(),
        stamp.minute.into(),
        stamp.second.into(),
        stamp.offset,
    )
    .map(TagValue::epoch)
}

/// Wall-clock EXIF time to epoch seconds. Without an offset the time is
/// taken as UTC.
fn exif_epoch_seconds(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    offset_minutes: Option<i16>,
) -> Option<i64> {
    let local = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let offset = i64::from(offset_minutes.unwrap_or(0)) * 60;
    Some(local.and_utc().timestamp() - offset)
}

/// Sniffs the MIME type from the leading bytes.
pub fn detect_mime_type(bytes: &[u8]) -> String {
    image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .and_then(|ext| mime_guess::from_ext(ext).first())
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}
