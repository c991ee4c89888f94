// Copyright 2015-2021 Swim Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use std::fmt::{Display, Formatter};

/// A UTC timestamp with second precision. The wire form is
/// `D/YYYY/M/D:H:M:S` with unpadded components.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Ord, PartialOrd, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current time, truncated to whole seconds.
    pub fn now() -> Timestamp {
        let now = Utc::now();
        Timestamp(Utc.timestamp(now.timestamp(), 0))
    }

    /// Build a timestamp from calendar components. Returns `None` when the
    /// components do not name a real instant.
    pub fn from_parts(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Option<Timestamp> {
        Utc.ymd_opt(year, month, day)
            .single()?
            .and_hms_opt(hour, minute, second)
            .map(Timestamp)
    }

    /// Seconds since January 1, 1970 UTC.
    pub fn seconds(&self) -> i64 {
        self.0.timestamp()
    }

    pub(crate) fn parts(&self) -> (i32, u32, u32, u32, u32, u32) {
        (
            self.0.year(),
            self.0.month(),
            self.0.day(),
            self.0.hour(),
            self.0.minute(),
            self.0.second(),
        )
    }
}

impl Default for Timestamp {
    fn default() -> Timestamp {
        Timestamp(Utc.timestamp(0, 0))
    }
}

impl AsRef<DateTime<Utc>> for Timestamp {
    fn as_ref(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<TZ> From<DateTime<TZ>> for Timestamp
where
    TZ: TimeZone,
{
    fn from(dt: DateTime<TZ>) -> Self {
        let utc = dt.with_timezone(&Utc);
        Timestamp(Utc.timestamp(utc.timestamp(), 0))
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}
