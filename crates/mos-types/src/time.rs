//! Real-time clock values and the packed FAT timestamp format.

use std::fmt;

/// Year the packed FAT date counts from.
pub const FAT_EPOCH_YEAR: u16 = 1980;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A broken-down wall-clock time as kept by the RTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Default for RtcTime {
    fn default() -> Self {
        Self {
            year: FAT_EPOCH_YEAR,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl RtcTime {
    /// Break down seconds since the Unix epoch (UTC, no leap seconds).
    pub fn from_unix_secs(secs: u64) -> Self {
        let days = secs / 86400;
        let time_of_day = secs % 86400;
        let (year, month, day) = days_to_ymd(days);
        Self {
            year,
            month,
            day,
            hour: (time_of_day / 3600) as u8,
            minute: ((time_of_day % 3600) / 60) as u8,
            second: (time_of_day % 60) as u8,
        }
    }

    /// Seconds since the Unix epoch. Years before 1970 clamp to the epoch.
    pub fn to_unix_secs(&self) -> u64 {
        let mut days: u64 = (1970..self.year)
            .map(|y| if is_leap(y) { 366 } else { 365 })
            .sum();
        for m in 1..self.month.clamp(1, 12) {
            days += u64::from(days_in_month(self.year, m));
        }
        days += u64::from(self.day.saturating_sub(1));
        days * 86400
            + u64::from(self.hour) * 3600
            + u64::from(self.minute) * 60
            + u64::from(self.second)
    }

    /// Whether every field is within its calendar range.
    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
    }

    /// Day of week, 0 = Sunday.
    pub fn weekday(&self) -> usize {
        // Sakamoto's method.
        const T: [u16; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];
        let month = self.month.clamp(1, 12) as usize;
        let y = if month < 3 { self.year - 1 } else { self.year } as usize;
        (y + y / 4 - y / 100 + y / 400 + T[month - 1] as usize + self.day as usize) % 7
    }

    /// `Tue,24 Oct`
    pub fn format_date(&self) -> String {
        format!(
            "{},{:02} {}",
            DAY_NAMES[self.weekday()],
            self.day,
            MONTH_NAMES[(self.month.clamp(1, 12) - 1) as usize]
        )
    }

    /// `14:05:09`
    pub fn format_time(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }

    /// `Tue,24 Oct 2023.14:05:09`
    pub fn format_date_time(&self) -> String {
        format!(
            "{} {:04}.{}",
            self.format_date(),
            self.year,
            self.format_time()
        )
    }
}

impl fmt::Display for RtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_date_time())
    }
}

/// A FAT directory-entry timestamp: packed date and time words.
///
/// Date: bits 15-9 year since 1980, bits 8-5 month, bits 4-0 day.
/// Time: bits 15-11 hour, bits 10-5 minute, bits 4-0 seconds / 2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FatTimestamp {
    pub date: u16,
    pub time: u16,
}

impl FatTimestamp {
    pub fn from_rtc(t: &RtcTime) -> Self {
        let year = t.year.saturating_sub(FAT_EPOCH_YEAR).min(127);
        Self {
            date: (year << 9) | ((t.month as u16 & 0x0F) << 5) | (t.day as u16 & 0x1F),
            time: ((t.hour as u16 & 0x1F) << 11)
                | ((t.minute as u16 & 0x3F) << 5)
                | ((t.second as u16 / 2) & 0x1F),
        }
    }

    pub fn year(&self) -> u16 {
        ((self.date & 0xFE00) >> 9) + FAT_EPOCH_YEAR
    }

    pub fn month(&self) -> u8 {
        ((self.date & 0x01E0) >> 5) as u8
    }

    pub fn day(&self) -> u8 {
        (self.date & 0x001F) as u8
    }

    pub fn hour(&self) -> u8 {
        ((self.time & 0xF800) >> 11) as u8
    }

    pub fn minute(&self) -> u8 {
        ((self.time & 0x07E0) >> 5) as u8
    }

    pub fn second(&self) -> u8 {
        ((self.time & 0x001F) * 2) as u8
    }
}

/// Convert days since the Unix epoch to (year, month, day).
pub fn days_to_ymd(mut days: u64) -> (u16, u8, u8) {
    let mut year = 1970u16;
    loop {
        let year_days = if is_leap(year) { 366 } else { 365 };
        if days < year_days {
            break;
        }
        days -= year_days;
        year += 1;
    }
    let mut month = 1u8;
    while month < 12 {
        let md = days_in_month(year, month) as u64;
        if days < md {
            break;
        }
        days -= md;
        month += 1;
    }
    (year, month, (days + 1) as u8)
}

pub fn is_leap(y: u16) -> bool {
    (y.is_multiple_of(4) && !y.is_multiple_of(100)) || y.is_multiple_of(400)
}

pub fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if is_leap(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}
