use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Timestamp
/// (in milliseconds since the Unix epoch)
///
/// Matches the resolution of the store's native date type, so values survive
/// a cursor round trip without precision loss.
///

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[repr(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const EPOCH: Self = Self(0);

    #[must_use]
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Parse an ISO-8601 calendar date or datetime.
    ///
    /// Dates may be `YYYY`, `YYYY-MM`, `YYYY-MM-DD` or `YYYYMMDD`. A time
    /// follows a full date after `T` or a space, as `hh`, `hh:mm`,
    /// `hh:mm:ss[.fff]` or the basic `hhmm[ss]`, with `24:00` meaning the
    /// end of the day. Offsets are `Z`, `±hh`, `±hhmm` or `±hh:mm`; values
    /// without one are taken as UTC. Week and ordinal dates are not parsed.
    #[must_use]
    pub fn parse_iso8601(text: &str) -> Option<Self> {
        let mut scan = Scan(text.as_bytes());

        let year = scan.number(4)?;
        // `YYYYMM` is not an ISO-8601 form.
        if scan.0.len() == 2 && scan.0.iter().all(u8::is_ascii_digit) {
            return None;
        }

        let extended = scan.eat(b'-');
        let month = if extended || !scan.is_empty() {
            scan.number(2)?
        } else {
            1
        };
        let day = if scan.is_empty() || (extended && !scan.eat(b'-')) {
            None
        } else {
            Some(scan.number(2)?)
        };

        let date = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day.unwrap_or(1))?;
        if scan.is_empty() {
            return Some(Self::from_naive(date.and_time(NaiveTime::MIN)));
        }
        // Times only follow a full date.
        day?;

        if !(scan.eat(b'T') || scan.eat(b't') || scan.eat(b' ')) {
            return None;
        }
        let at = scan.time(date)?;
        let offset_secs = scan.offset()?;
        if !scan.is_empty() {
            return None;
        }

        Some(Self(at.and_utc().timestamp_millis() - i64::from(offset_secs) * 1_000))
    }

    fn from_naive(naive: NaiveDateTime) -> Self {
        Self(naive.and_utc().timestamp_millis())
    }

    /// Render as RFC 3339 with millisecond precision, or `None` when the
    /// value is outside chrono's representable range.
    #[must_use]
    pub fn to_rfc3339(self) -> Option<String> {
        DateTime::<Utc>::from_timestamp_millis(self.0)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Some(text) => f.write_str(&text),
            None => write!(f, "{}ms", self.0),
        }
    }
}

// Byte scanner over the unread tail of an ISO-8601 candidate.
struct Scan<'a>(&'a [u8]);

impl<'a> Scan<'a> {
    const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn eat(&mut self, byte: u8) -> bool {
        match self.0.split_first() {
            Some((first, rest)) if *first == byte => {
                self.0 = rest;
                true
            }
            _ => false,
        }
    }

    fn digits(&mut self) -> &'a [u8] {
        let len = self.0.iter().take_while(|b| b.is_ascii_digit()).count();
        let (head, rest) = self.0.split_at(len);
        self.0 = rest;
        head
    }

    fn number(&mut self, width: usize) -> Option<u32> {
        let (head, rest) = self.0.split_at_checked(width)?;
        if !head.iter().all(u8::is_ascii_digit) {
            return None;
        }
        self.0 = rest;

        Some(head.iter().fold(0, |acc, b| acc * 10 + u32::from(b - b'0')))
    }

    // Minutes and seconds share one separator: all colons or none.
    fn time(&mut self, date: NaiveDate) -> Option<NaiveDateTime> {
        let hour = self.number(2)?;
        let colon = self.eat(b':');
        let minute = match self.number(2) {
            Some(minute) => minute,
            None if colon => return None,
            None => 0,
        };

        let has_seconds = if colon {
            self.eat(b':')
        } else {
            self.0.first().is_some_and(u8::is_ascii_digit)
        };
        let second = if has_seconds { self.number(2)? } else { 0 };

        let milli = if self.eat(b'.') || self.eat(b',') {
            let fraction = self.digits();
            if fraction.is_empty() {
                return None;
            }
            (0..3).fold(0, |acc, i| {
                acc * 10 + fraction.get(i).map_or(0, |b| u32::from(b - b'0'))
            })
        } else {
            0
        };

        if hour == 24 {
            return (minute == 0 && second == 0 && milli == 0)
                .then(|| date.checked_add_days(Days::new(1)))
                .flatten()
                .map(|next| next.and_time(NaiveTime::MIN));
        }

        date.and_hms_milli_opt(hour, minute, second, milli)
    }

    // Offset east of UTC in seconds; zero when absent.
    fn offset(&mut self) -> Option<i32> {
        if self.eat(b'Z') || self.eat(b'z') {
            return Some(0);
        }

        let sign = if self.eat(b'+') {
            1
        } else if self.eat(b'-') {
            -1
        } else {
            return Some(0);
        };

        let hours = self.number(2)?;
        let minutes = if self.eat(b':') {
            self.number(2)?
        } else {
            self.number(2).unwrap_or(0)
        };
        if hours > 23 || minutes > 59 {
            return None;
        }

        let secs = i32::try_from(hours * 3_600 + minutes * 60).ok()?;
        Some(sign * secs)
    }
}

///
/// TESTS
///
