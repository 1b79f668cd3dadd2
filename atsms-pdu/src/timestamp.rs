//! Service-center timestamps (TS 23.040 §9.2.3.11)

use serde::{Deserialize, Serialize};
use std::fmt;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

/// Length of an encoded timestamp
pub const TIMESTAMP_LEN: usize = 7;

/// Seven semi-octet fields as sent by the service center
///
/// `year` is the full year (two-digit years are taken as 20yy) and
/// `offset_quarters` the signed time-zone offset in quarters of an hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SmscTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub offset_quarters: i8,
}

fn bcd_swapped(octet: u8) -> Option<u8> {
    let tens = octet & 0x0F;
    let units = octet >> 4;
    (tens < 10 && units < 10).then_some(tens * 10 + units)
}

fn to_bcd_swapped(value: u8) -> u8 {
    ((value % 10) << 4) | (value / 10 % 10)
}

impl SmscTimestamp {
    /// Decode the seven timestamp octets
    ///
    /// Returns None if any field is not valid BCD; phones occasionally store
    /// garbage here and the rest of the message is still usable.
    pub fn decode(octets: &[u8]) -> Option<Self> {
        let octets: &[u8; TIMESTAMP_LEN] = octets.try_into().ok()?;
        let tz = octets[6];
        let magnitude = bcd_swapped(tz & 0xF7)? as i8;
        Some(Self {
            year: 2000 + bcd_swapped(octets[0])? as u16,
            month: bcd_swapped(octets[1])?,
            day: bcd_swapped(octets[2])?,
            hour: bcd_swapped(octets[3])?,
            minute: bcd_swapped(octets[4])?,
            second: bcd_swapped(octets[5])?,
            offset_quarters: if tz & 0x08 != 0 { -magnitude } else { magnitude },
        })
    }

    pub fn encode(&self) -> [u8; TIMESTAMP_LEN] {
        let mut tz = to_bcd_swapped(self.offset_quarters.unsigned_abs());
        if self.offset_quarters < 0 {
            tz |= 0x08;
        }
        [
            to_bcd_swapped((self.year % 100) as u8),
            to_bcd_swapped(self.month),
            to_bcd_swapped(self.day),
            to_bcd_swapped(self.hour),
            to_bcd_swapped(self.minute),
            to_bcd_swapped(self.second),
            tz,
        ]
    }

    /// Offset from UTC in seconds
    pub fn offset_seconds(&self) -> i32 {
        self.offset_quarters as i32 * 15 * 60
    }

    /// Convert to a zoned date-time; None if the fields do not form a real date
    pub fn to_offset_datetime(&self) -> Option<OffsetDateTime> {
        let month = Month::try_from(self.month).ok()?;
        let date = Date::from_calendar_date(self.year as i32, month, self.day).ok()?;
        let time = Time::from_hms(self.hour, self.minute, self.second).ok()?;
        let offset = UtcOffset::from_whole_seconds(self.offset_seconds()).ok()?;
        Some(PrimitiveDateTime::new(date, time).assume_offset(offset))
    }
}

impl fmt::Display for SmscTimestamp {
    /// Same layout as the text-mode `<scts>` field: `yy/MM/dd,hh:mm:ss±zz`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}/{:02}/{:02},{:02}:{:02}:{:02}{}{:02}",
            self.year % 100,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            if self.offset_quarters < 0 { '-' } else { '+' },
            self.offset_quarters.unsigned_abs()
        )
    }
}
