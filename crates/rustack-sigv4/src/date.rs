//! Conversion of HTTP-style dates into the SigV4 ISO 8601 basic format.
//!
//! Two input shapes are accepted, distinguished by length alone:
//!
//! ```text
//! RFC 3339  (20 bytes): 2018-01-18T09:18:06Z
//! RFC 5322  (29 bytes): Wed, 18 Jan 2018 09:18:06 GMT
//! ```
//!
//! Both produce the 16-byte form `YYYYMMDDThhmmssZ` used by `x-amz-date` and
//! the credential scope.
//!
//! Parsing is driven by a template where `%<len><field>` reads exactly `len`
//! characters into `field` (`Y`, `M`, `D`, `h`, `m`, `s`, or `*` to skip) and
//! every other character must match literally.

use tracing::debug;

use crate::error::{SigV4Error, SigV4Result};

/// Length of the ISO 8601 basic date-time string.
pub const ISO_STRING_LEN: usize = 16;

/// Length of an RFC 3339 input such as `2018-01-18T09:18:06Z`.
pub const EXPECTED_LEN_RFC_3339: usize = 20;

/// Length of an RFC 5322 input such as `Wed, 18 Jan 2018 09:18:06 GMT`.
pub const EXPECTED_LEN_RFC_5322: usize = 29;

/// Earliest year accepted.
const YEAR_MIN: u32 = 1900;

const FORMAT_RFC_3339: &[u8] = b"%4Y-%2M-%2DT%2h:%2m:%2sZ";
const FORMAT_RFC_5322: &[u8] = b"%3*, %2D %3M %4Y %2h:%2m:%2s GMT";

const MONTH_NAMES: [&[u8; 3]; 12] = [
    b"Jan", b"Feb", b"Mar", b"Apr", b"May", b"Jun", b"Jul", b"Aug", b"Sep", b"Oct", b"Nov", b"Dec",
];

const MONTH_DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// A decomposed calendar date and time of day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateTime {
    /// Year, 1900 or later.
    pub year: u32,
    /// Month, 1 through 12.
    pub month: u32,
    /// Day of the month, starting at 1.
    pub day: u32,
    /// Hour, 0 through 23.
    pub hour: u32,
    /// Minute, 0 through 59.
    pub minute: u32,
    /// Second, 0 through 60 to allow for a leap second.
    pub second: u32,
}

impl DateTime {
    /// Parse an RFC 3339 or RFC 5322 date and validate it.
    ///
    /// # Errors
    ///
    /// [`SigV4Error::InvalidParameter`] when `date` has neither accepted length,
    /// [`SigV4Error::IsoFormatting`] when it does not match its format or names
    /// an impossible date.
    pub fn parse(date: &str) -> SigV4Result<Self> {
        let format = match date.len() {
            EXPECTED_LEN_RFC_3339 => FORMAT_RFC_3339,
            EXPECTED_LEN_RFC_5322 => FORMAT_RFC_5322,
            len => {
                debug!(len, "Date length matches neither RFC 3339 nor RFC 5322");
                return Err(SigV4Error::InvalidParameter(
                    "date must be 20 (RFC 3339) or 29 (RFC 5322) bytes",
                ));
            }
        };

        let parsed = parse_with_format(date.as_bytes(), format)?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Check every field against its calendar range.
    ///
    /// # Errors
    ///
    /// [`SigV4Error::IsoFormatting`] naming no particular field; the reason is
    /// logged at debug level.
    pub fn validate(&self) -> SigV4Result<()> {
        if self.year < YEAR_MIN {
            debug!(year = self.year, min = YEAR_MIN, "Year out of range");
            return Err(SigV4Error::IsoFormatting);
        }
        if !(1..=12).contains(&self.month) {
            debug!(month = self.month, "Month out of range");
            return Err(SigV4Error::IsoFormatting);
        }
        let max_day = MONTH_DAYS[(self.month - 1) as usize];
        if (self.day < 1 || self.day > max_day) && !self.is_valid_leap_day() {
            debug!(day = self.day, month = self.month, "Day out of range");
            return Err(SigV4Error::IsoFormatting);
        }
        if self.hour > 23 {
            debug!(hour = self.hour, "Hour out of range");
            return Err(SigV4Error::IsoFormatting);
        }
        if self.minute > 59 {
            debug!(minute = self.minute, "Minute out of range");
            return Err(SigV4Error::IsoFormatting);
        }
        if self.second > 60 {
            debug!(second = self.second, "Second out of range");
            return Err(SigV4Error::IsoFormatting);
        }
        Ok(())
    }

    /// Write `YYYYMMDDThhmmssZ` into the first 16 bytes of `out`.
    ///
    /// # Errors
    ///
    /// [`SigV4Error::InsufficientMemory`] when `out` is shorter than
    /// [`ISO_STRING_LEN`].
    pub fn write_iso8601(&self, out: &mut [u8]) -> SigV4Result<()> {
        let remaining = out.len();
        let Some(out) = out.get_mut(..ISO_STRING_LEN) else {
            return Err(SigV4Error::InsufficientMemory {
                required: ISO_STRING_LEN,
                remaining,
            });
        };

        write_padded(&mut out[0..4], self.year);
        write_padded(&mut out[4..6], self.month);
        write_padded(&mut out[6..8], self.day);
        out[8] = b'T';
        write_padded(&mut out[9..11], self.hour);
        write_padded(&mut out[11..13], self.minute);
        write_padded(&mut out[13..15], self.second);
        out[15] = b'Z';
        Ok(())
    }

    fn is_valid_leap_day(&self) -> bool {
        self.month == 2 && self.day == 29 && is_leap_year(self.year)
    }
}

/// Convert an RFC 3339 or RFC 5322 date into `YYYYMMDDThhmmssZ`, written to
/// the first 16 bytes of `out`.
///
/// # Errors
///
/// [`SigV4Error::InvalidParameter`] when the input length is wrong or `out` is
/// shorter than 16 bytes (both checked before any parsing), and
/// [`SigV4Error::IsoFormatting`] for malformed or impossible dates.
///
/// # Examples
///
/// ```
/// use rustack_sigv4::date::{ISO_STRING_LEN, convert_date_to_iso8601};
///
/// let mut out = [0u8; ISO_STRING_LEN];
/// convert_date_to_iso8601("Wed, 18 Jan 2018 09:18:06 GMT", &mut out).unwrap();
/// assert_eq!(&out, b"20180118T091806Z");
/// ```
pub fn convert_date_to_iso8601(date: &str, out: &mut [u8]) -> SigV4Result<()> {
    if date.len() != EXPECTED_LEN_RFC_3339 && date.len() != EXPECTED_LEN_RFC_5322 {
        debug!(len = date.len(), "Rejecting date of unexpected length");
        return Err(SigV4Error::InvalidParameter(
            "date must be 20 (RFC 3339) or 29 (RFC 5322) bytes",
        ));
    }
    if out.len() < ISO_STRING_LEN {
        debug!(len = out.len(), "ISO 8601 output buffer too small");
        return Err(SigV4Error::InvalidParameter(
            "ISO 8601 output buffer must hold at least 16 bytes",
        ));
    }

    let parsed = DateTime::parse(date)?;
    parsed.write_iso8601(out)?;
    debug!(date, "Formatted ISO 8601 date");
    Ok(())
}

/// Leap years are divisible by 4, except centuries not divisible by 400.
#[must_use]
pub fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn parse_with_format(date: &[u8], format: &[u8]) -> SigV4Result<DateTime> {
    let mut parsed = DateTime::default();
    let mut read_loc = 0;
    let mut format_index = 0;

    while let Some(&expected) = format.get(format_index) {
        if expected == b'%' {
            let (len, field) = match format.get(format_index + 1..format_index + 3) {
                Some(&[len, field]) => (usize::from(len - b'0'), field),
                _ => return Err(SigV4Error::IsoFormatting),
            };
            let chunk = date
                .get(read_loc..read_loc + len)
                .ok_or(SigV4Error::IsoFormatting)?;
            scan_value(chunk, field, &mut parsed)?;
            read_loc += len;
            format_index += 3;
        } else {
            let actual = date.get(read_loc).copied();
            if actual != Some(expected) {
                debug!(
                    expected = %char::from(expected),
                    actual = ?actual.map(char::from),
                    "Date does not match expected format"
                );
                return Err(SigV4Error::IsoFormatting);
            }
            read_loc += 1;
            format_index += 1;
        }
    }

    Ok(parsed)
}

fn scan_value(chunk: &[u8], field: u8, parsed: &mut DateTime) -> SigV4Result<()> {
    if field == b'*' {
        return Ok(());
    }

    let value = if field == b'M' && chunk.first().is_some_and(u8::is_ascii_uppercase) {
        month_from_name(chunk)?
    } else {
        parse_digits(chunk)?
    };

    match field {
        b'Y' => parsed.year = value,
        b'M' => parsed.month = value,
        b'D' => parsed.day = value,
        b'h' => parsed.hour = value,
        b'm' => parsed.minute = value,
        b's' => parsed.second = value,
        _ => return Err(SigV4Error::IsoFormatting),
    }
    Ok(())
}

fn month_from_name(chunk: &[u8]) -> SigV4Result<u32> {
    MONTH_NAMES
        .iter()
        .zip(1u32..)
        .find_map(|(name, month)| (chunk == name.as_slice()).then_some(month))
        .ok_or_else(|| {
            debug!(month = ?chunk, "Unrecognized month name");
            SigV4Error::IsoFormatting
        })
}

fn parse_digits(chunk: &[u8]) -> SigV4Result<u32> {
    chunk.iter().try_fold(0u32, |acc, &b| {
        if b.is_ascii_digit() {
            Ok(acc * 10 + u32::from(b - b'0'))
        } else {
            debug!(found = %char::from(b), "Expected a digit in date");
            Err(SigV4Error::IsoFormatting)
        }
    })
}

fn write_padded(out: &mut [u8], mut value: u32) {
    for slot in out.iter_mut().rev() {
        *slot = b'0' + (value % 10) as u8;
        value /= 10;
    }
}
