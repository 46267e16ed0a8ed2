use std::time::{Duration, SystemTime};

use crate::history::Timestamp;

pub trait SystemTimeExt {
    /// Whole seconds since the Unix epoch, rounded towards the past.
    fn to_timestamp(&self) -> Timestamp;
}

impl SystemTimeExt for SystemTime {
    fn to_timestamp(&self) -> Timestamp {
        match self.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(elapsed) => Timestamp::from_secs(saturating_secs(elapsed)),
            Err(err) => {
                let before = err.duration();
                let whole = saturating_secs(before);
                let partial = i64::from(before.subsec_nanos() > 0);
                Timestamp::from_secs(-whole.saturating_add(partial))
            }
        }
    }
}

fn saturating_secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_sub_second_precision() {
        let time = SystemTime::UNIX_EPOCH + Duration::from_millis(1_296_758_094_900);
        assert_eq!(time.to_timestamp(), Timestamp::from_secs(1_296_758_094));
    }

    #[test]
    fn rounds_pre_epoch_times_down() {
        let time = SystemTime::UNIX_EPOCH - Duration::from_millis(1_500);
        assert_eq!(time.to_timestamp(), Timestamp::from_secs(-2));
    }
}
