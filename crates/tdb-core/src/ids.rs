use std::sync::Mutex;

use chrono::Utc;

use crate::{errors::Error, Result};

/// Source of globally unique, monotonically increasing ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Result<u64>;
}

/// 2024-01-01T00:00:00Z in unix milliseconds.
const EPOCH_MS: i64 = 1_704_067_200_000;
const MACHINE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
pub const MAX_MACHINE_ID: u16 = (1 << MACHINE_BITS) - 1;
const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Default)]
struct SnowflakeState {
    last_ms: i64,
    sequence: u16,
}

/// Snowflake layout: 41 bits of milliseconds since [`EPOCH_MS`], 10 bits of machine id,
/// 12 bits of per-millisecond sequence.
pub struct SnowflakeIdGenerator {
    machine_id: u16,
    clock: Box<dyn Fn() -> i64 + Send + Sync>,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeIdGenerator {
    pub fn new(machine_id: u16) -> Result<Self> {
        Self::with_clock(machine_id, || Utc::now().timestamp_millis())
    }

    pub fn with_clock(
        machine_id: u16,
        clock: impl Fn() -> i64 + Send + Sync + 'static,
    ) -> Result<Self> {
        if machine_id > MAX_MACHINE_ID {
            return Err(Error::Config(format!(
                "machine id {machine_id} exceeds {MAX_MACHINE_ID}"
            )));
        }
        Ok(Self {
            machine_id,
            clock: Box::new(clock),
            state: Mutex::new(SnowflakeState::default()),
        })
    }
}

impl IdGenerator for SnowflakeIdGenerator {
    fn next_id(&self) -> Result<u64> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::IdGeneration("generator state poisoned".to_string()))?;

        let mut now = (self.clock)();
        if now < EPOCH_MS {
            return Err(Error::IdGeneration(format!(
                "clock {now}ms is before the id epoch"
            )));
        }
        if now < state.last_ms {
            return Err(Error::IdGeneration(format!(
                "clock moved backwards by {}ms",
                state.last_ms - now
            )));
        }

        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond.
                while now <= state.last_ms {
                    std::hint::spin_loop();
                    now = (self.clock)();
                }
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = now;

        let elapsed = (now - EPOCH_MS) as u64;
        Ok((elapsed << (MACHINE_BITS + SEQUENCE_BITS))
            | (u64::from(self.machine_id) << SEQUENCE_BITS)
            | u64::from(state.sequence))
    }
}

/// Lowercase base-36 rendering, used to keep callback tokens short.
pub fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(13);
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    };

    use super::*;

    fn manual_clock(start: i64) -> (Arc<AtomicI64>, impl Fn() -> i64 + Send + Sync + 'static) {
        let now = Arc::new(AtomicI64::new(start));
        let handle = now.clone();
        (handle, move || now.load(Ordering::SeqCst))
    }

    #[test]
    fn ids_within_one_millisecond_are_distinct_and_increasing() {
        let (_now, clock) = manual_clock(EPOCH_MS + 1_000);
        let g = SnowflakeIdGenerator::with_clock(3, clock).unwrap();
        let a = g.next_id().unwrap();
        let b = g.next_id().unwrap();
        assert!(b > a);
        assert_eq!((a >> SEQUENCE_BITS) & u64::from(MAX_MACHINE_ID), 3);
    }

    #[test]
    fn backwards_clock_is_an_id_generation_error() {
        let (now, clock) = manual_clock(EPOCH_MS + 5_000);
        let g = SnowflakeIdGenerator::with_clock(1, clock).unwrap();
        g.next_id().unwrap();
        now.store(EPOCH_MS + 4_000, Ordering::SeqCst);
        assert!(matches!(g.next_id(), Err(Error::IdGeneration(_))));
    }

    #[test]
    fn rejects_out_of_range_machine_id() {
        assert!(SnowflakeIdGenerator::new(MAX_MACHINE_ID + 1).is_err());
    }

    #[test]
    fn base36_is_short_for_any_u64() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(u64::MAX).len(), 13);
    }
}
