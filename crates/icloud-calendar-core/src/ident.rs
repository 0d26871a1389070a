//! Identifier generation for event UIDs and resource names.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Produces tokens used as the VEVENT `UID` stem and as `.ics` file names.
///
/// Implementations only need to be collision-free in practice for a single
/// calendar; they are injected so tests can substitute fixed values.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh identifier.
    fn generate(&self) -> String;
}

/// Last microsecond timestamp handed out by [`TimestampIdGenerator`].
static LAST_MICROS: AtomicU64 = AtomicU64::new(0);

/// Time-based identifiers: 8 hex digits of Unix seconds followed by 5 hex
/// digits of microseconds (13 characters, e.g. `65a1f3c20b4e1`).
///
/// Values are strictly increasing within the process: when two calls land in
/// the same microsecond the second one is bumped to the next microsecond.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampIdGenerator;

impl TimestampIdGenerator {
    fn next_micros() -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();

        let previous = LAST_MICROS
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);

        now.max(previous + 1)
    }
}

impl IdGenerator for TimestampIdGenerator {
    fn generate(&self) -> String {
        let micros = Self::next_micros();
        format!("{:08x}{:05x}", micros / 1_000_000, micros % 1_000_000)
    }
}

/// Random v4 UUIDs, hyphenated and lowercase.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn timestamp_ids_have_uniqid_shape() {
        let id = TimestampIdGenerator.generate();
        assert_eq!(id.len(), 13);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn timestamp_ids_are_distinct_in_tight_loop() {
        let ids: HashSet<_> = (0..1000).map(|_| TimestampIdGenerator.generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn timestamp_ids_distinct_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..250)
                        .map(|_| TimestampIdGenerator.generate())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: HashSet<_> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn uuid_ids_are_hyphenated() {
        let id = UuidIdGenerator.generate();
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
        assert_ne!(id, UuidIdGenerator.generate());
    }
}
