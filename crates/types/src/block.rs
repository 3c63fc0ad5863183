use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Block height.
pub type Height = u64;

/// Header of the block currently being executed.
///
/// `time` is the only clock available to state transitions. Nothing in the
/// registry reads the wall clock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    pub height: Height,
    pub time: DateTime<Utc>,
}

impl BlockHeader {
    pub fn new(height: Height, time: DateTime<Utc>) -> Self {
        Self { height, time }
    }

    /// Header at `height` with a whole-second unix timestamp.
    pub fn at_unix(height: Height, secs: i64) -> Self {
        let time = Utc
            .timestamp_opt(secs, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self { height, time }
    }
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            height: 0,
            time: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Width of an encoded timestamp inside store keys.
pub const TIME_KEY_BYTES: usize = 12;

/// Order-preserving big-endian encoding of a timestamp: sign-flipped seconds
/// followed by the sub-second nanoseconds.
pub fn time_to_key(time: &DateTime<Utc>) -> [u8; TIME_KEY_BYTES] {
    let secs = (time.timestamp() as u64) ^ (1u64 << 63);
    let nanos = time.timestamp_subsec_nanos();
    let mut out = [0u8; TIME_KEY_BYTES];
    out[..8].copy_from_slice(&secs.to_be_bytes());
    out[8..].copy_from_slice(&nanos.to_be_bytes());
    out
}

/// Inverse of [`time_to_key`]. Returns `None` for malformed input.
pub fn time_from_key(bytes: &[u8]) -> Option<DateTime<Utc>> {
    if bytes.len() != TIME_KEY_BYTES {
        return None;
    }
    let mut secs = [0u8; 8];
    secs.copy_from_slice(&bytes[..8]);
    let mut nanos = [0u8; 4];
    nanos.copy_from_slice(&bytes[8..]);
    let secs = (u64::from_be_bytes(secs) ^ (1u64 << 63)) as i64;
    Utc.timestamp_opt(secs, u32::from_be_bytes(nanos)).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn time_keys_sort_like_times() {
        let base = BlockHeader::at_unix(1, 1_700_000_000).time;
        let times = [
            base - Duration::days(365 * 60),
            base - Duration::nanoseconds(1),
            base,
            base + Duration::nanoseconds(1),
            base + Duration::hours(1),
        ];
        for pair in times.windows(2) {
            assert!(time_to_key(&pair[0]) < time_to_key(&pair[1]));
        }
    }

    #[test]
    fn time_key_decodes() {
        let t = BlockHeader::at_unix(1, 1_234_567).time + Duration::nanoseconds(42);
        assert_eq!(time_from_key(&time_to_key(&t)), Some(t));
        assert_eq!(time_from_key(&[0u8; 3]), None);
    }
}
