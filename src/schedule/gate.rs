//! Voting-hour gate
//!
//! Decides whether the current instant falls inside the vote window at a
//! proxy's location. Pure: callers inject `now`.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

use crate::models::VoteWindow;

pub struct TimeWindowGate;

impl TimeWindowGate {
    /// Local civil hour (0-23) in `timezone` at `now`
    pub fn local_hour(timezone: Tz, now: DateTime<Utc>) -> u32 {
        now.with_timezone(&timezone).hour()
    }

    /// True when the local hour lies within the inclusive window
    pub fn is_eligible(timezone: Tz, window: &VoteWindow, now: DateTime<Utc>) -> bool {
        window.contains(Self::local_hour(timezone, now))
    }
}
