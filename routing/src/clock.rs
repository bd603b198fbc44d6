use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock seconds, injected at table construction so that
/// refresh scheduling stays testable.
pub trait Clock: Send {
    fn now(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|x| x.as_secs())
            .unwrap_or(0)
    }
}
