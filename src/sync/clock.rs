use crate::types::EpochMillis;

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> EpochMillis;
}

/// The system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> EpochMillis {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Difference between the server's clock and ours (`serverNow - localNow`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockOffset(pub i64);

impl ClockOffset {
    /// Recompute from a fresh `serverNow`; keeps the old value when absent.
    /// Returns whether the offset changed.
    pub fn observe(&mut self, server_now: Option<EpochMillis>, local_now: EpochMillis) -> bool {
        match server_now {
            Some(server_now) => {
                let next = ClockOffset(server_now.saturating_sub(local_now));
                let changed = next != *self;
                *self = next;
                changed
            }
            None => false,
        }
    }

    /// Local time expressed on the server's clock
    pub fn server_time(&self, local_now: EpochMillis) -> EpochMillis {
        local_now.saturating_add(self.0)
    }
}

/// Whole seconds until `expires_at`, rounded up and never negative
pub fn seconds_left(expires_at: EpochMillis, local_now: EpochMillis, offset: ClockOffset) -> u32 {
    let remaining = expires_at.saturating_sub(offset.server_time(local_now));
    if remaining <= 0 {
        0
    } else {
        let secs = remaining.saturating_add(999) / 1000;
        u32::try_from(secs).unwrap_or(u32::MAX)
    }
}
