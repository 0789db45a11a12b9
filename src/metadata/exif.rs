use std::io::Cursor;

use chrono::NaiveDate;
use exif::{In, Tag, Value};

use crate::error::{ForensicsError, Result};

/// The EXIF fields the metadata signals are computed from. Timestamps are
/// seconds since the Unix epoch, read as naive UTC.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifSummary {
    pub software: Option<String>,
    pub create_date: Option<i64>,
    pub modify_date: Option<i64>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub reported_dimensions: Option<(u32, u32)>,
}

pub struct ExifExtractor;

impl ExifExtractor {
    /// `Ok(None)` when the container carries no EXIF block at all.
    pub fn extract(bytes: &[u8]) -> Result<Option<ExifSummary>> {
        let mut reader = Cursor::new(bytes);

        match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif) if exif.fields().next().is_none() => Ok(None),
            Ok(exif) => Ok(Some(Self::summarize(&exif))),
            Err(exif::Error::NotFound(_)) => Ok(None),
            Err(err) => Err(ForensicsError::MetadataError(err.to_string())),
        }
    }

    fn summarize(exif: &exif::Exif) -> ExifSummary {
        let create_date = Self::timestamp(exif, Tag::DateTimeDigitized)
            .or_else(|| Self::timestamp(exif, Tag::DateTimeOriginal));

        let reported_dimensions = match (
            Self::uint(exif, Tag::PixelXDimension),
            Self::uint(exif, Tag::PixelYDimension),
        ) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        };

        ExifSummary {
            software: Self::ascii(exif, Tag::Software),
            create_date,
            modify_date: Self::timestamp(exif, Tag::DateTime),
            make: Self::ascii(exif, Tag::Make),
            model: Self::ascii(exif, Tag::Model),
            reported_dimensions,
        }
    }

    fn ascii(exif: &exif::Exif, tag: Tag) -> Option<String> {
        let field = exif.get_field(tag, In::PRIMARY)?;
        let Value::Ascii(ref values) = field.value else {
            return None;
        };

        values
            .first()
            .map(|raw| {
                String::from_utf8_lossy(raw)
                    .trim_end_matches('\0')
                    .trim()
                    .to_string()
            })
            .filter(|s| !s.is_empty())
    }

    fn uint(exif: &exif::Exif, tag: Tag) -> Option<u32> {
        exif.get_field(tag, In::PRIMARY)?.value.get_uint(0)
    }

    fn timestamp(exif: &exif::Exif, tag: Tag) -> Option<i64> {
        let field = exif.get_field(tag, In::PRIMARY)?;
        let Value::Ascii(ref values) = field.value else {
            return None;
        };

        let dt = exif::DateTime::from_ascii(values.first()?).ok()?;
        let date = NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)?;
        let time = date.and_hms_opt(dt.hour as u32, dt.minute as u32, dt.second as u32)?;

        Some(time.and_utc().timestamp())
    }
}
