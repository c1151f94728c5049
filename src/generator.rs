//! Camflake generator and related types.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use std::{io, thread};

use crate::error::{Error, Result};
use crate::id::{Id, MACHINE_ID_MAX, SEQUENCE_MAX, TIME_MAX};
use crate::machine_id::MachineId;

#[cfg(test)]
mod tests;

/// The default base time, 2017-06-01T00:00:00Z, in milliseconds since the Unix epoch.
pub const DEFAULT_BASE_TIME_MS: u64 = 1_496_275_200_000;

/// How long [`Camflake::next`] waits before its single retry when a millisecond runs out of
/// sequence numbers.
const RETRY_WAIT: Duration = Duration::from_millis(2);

/// Returns the default base time, 2017-06-01T00:00:00Z.
pub fn default_base_time() -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(DEFAULT_BASE_TIME_MS)
}

/// A trait that defines the clock interface for [`Camflake`].
///
/// Besides reading the clock, a time source performs the short wait that precedes a retry,
/// so that both can be substituted together in tests.
pub trait TimeSource {
    /// Returns the current Unix timestamp in milliseconds.
    fn unix_ts_ms(&self) -> u64;

    /// Blocks the calling thread for at least `dur`.
    ///
    /// Implementations that can be woken early report it with an error, conventionally of kind
    /// [`io::ErrorKind::Interrupted`]; [`Camflake::next`] then fails with
    /// [`Error::Interrupted`].
    fn sleep(&self, dur: Duration) -> io::Result<()> {
        thread::sleep(dur);
        Ok(())
    }
}

/// The default [`TimeSource`] that uses [`SystemTime`].
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct StdSystemTime;

impl TimeSource for StdSystemTime {
    fn unix_ts_ms(&self) -> u64 {
        // a clock set before 1970 reads as the epoch and is treated as a clock rollback
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }
}

/// The mutable part of a generator, always updated as a whole.
#[derive(Debug)]
struct State {
    /// Elapsed time of the latest allocation.
    elapsed: u64,
    /// Next sequence number to hand out for `elapsed`.
    counter: u64,
}

/// Represents a Camflake generator that issues 64-bit IDs ordered by creation time.
///
/// Each ID packs the milliseconds elapsed since a base time (41 bits), a sequence number
/// distinguishing the IDs issued within the same millisecond (6 bits) and the machine ID of
/// the generator (16 bits):
///
/// ```text
/// id = elapsed << 22 | sequence << 16 | machine_id
/// ```
///
/// A generator can be shared across threads. The bookkeeping of the latest millisecond and its
/// sequence counter sits behind a mutex owned by the generator, so independent generators never
/// contend with each other, and the IDs returned by one generator increase strictly in the
/// order the calls complete.
///
/// # Examples
///
/// ```rust
/// use camflake::{Camflake, StaticMachineId};
/// use std::{sync::Arc, thread};
///
/// let g = Arc::new(Camflake::new(StaticMachineId(1))?);
/// let handle = {
///     let g = Arc::clone(&g);
///     thread::spawn(move || g.next())
/// };
///
/// let a = g.next()?;
/// let b = handle.join().unwrap()?;
/// assert_ne!(a, b);
/// assert_eq!(a & 0xffff, 1);
/// # Ok::<(), camflake::Error>(())
/// ```
///
/// # Sequence exhaustion
///
/// At most 64 IDs can be issued per millisecond. When a call finds the current millisecond
/// exhausted, it waits for about two milliseconds and tries once more, failing with
/// [`Error::SequenceExhausted`] if that attempt is exhausted as well.
///
/// # Clock rollback
///
/// If the clock goes back, the generator keeps issuing IDs for the latest millisecond it has
/// seen, incrementing the sequence counter. The IDs stay unique and increasing, but their
/// timestamp runs ahead of the clock until it catches up, and the generator may run out of
/// sequence numbers in the meantime.
#[derive(Debug)]
pub struct Camflake<T = StdSystemTime> {
    /// Base time in milliseconds since the Unix epoch.
    base_time: u64,
    machine_id: u32,
    state: Mutex<State>,
    time_source: T,
}

impl Camflake {
    /// Creates a generator with the default base time, 2017-06-01T00:00:00Z.
    ///
    /// # Errors
    ///
    /// Fails if the machine ID cannot be obtained or is out of range, or with
    /// [`Error::TimeLimitExceeded`] once 2^41 milliseconds (about 69 years) have elapsed
    /// since the base time.
    pub fn new(machine_id: impl MachineId) -> Result<Self> {
        Self::with_base_time(machine_id, default_base_time())
    }

    /// Creates a generator that measures time from `base_time`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidBaseTime`] if `base_time` is before the Unix epoch or after
    /// the current time, and otherwise as [`Camflake::new`] does.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use camflake::{Camflake, Error, StaticMachineId};
    /// use std::time::{Duration, SystemTime};
    ///
    /// let future = SystemTime::now() + Duration::from_secs(3600);
    /// let result = Camflake::with_base_time(StaticMachineId(1), future);
    /// assert!(matches!(result, Err(Error::InvalidBaseTime)));
    /// ```
    pub fn with_base_time(machine_id: impl MachineId, base_time: SystemTime) -> Result<Self> {
        Self::with_time_source(machine_id, base_time, StdSystemTime)
    }
}

impl<T: TimeSource> Camflake<T> {
    /// Creates a generator that reads the clock through `time_source`.
    ///
    /// Validation happens in this order: base time, elapsed time limit, machine ID.
    pub fn with_time_source(
        machine_id: impl MachineId,
        base_time: SystemTime,
        time_source: T,
    ) -> Result<Self> {
        let base_time = base_time
            .duration_since(UNIX_EPOCH)
            .ok()
            .and_then(|d| u64::try_from(d.as_millis()).ok())
            .ok_or(Error::InvalidBaseTime)?;
        let now = time_source.unix_ts_ms();
        if base_time > now {
            return Err(Error::InvalidBaseTime);
        }

        let elapsed = now - base_time;
        if elapsed > TIME_MAX {
            return Err(Error::TimeLimitExceeded);
        }

        let machine_id = machine_id.id()?;
        if machine_id > MACHINE_ID_MAX {
            return Err(Error::MachineIdOutOfRange(machine_id));
        }
        if machine_id > 0xffff {
            log::warn!(
                "machine id {} overlaps the sequence field; ids may repeat within a millisecond",
                machine_id
            );
        }

        Ok(Self {
            base_time,
            machine_id,
            state: Mutex::new(State {
                elapsed,
                counter: 0,
            }),
            time_source,
        })
    }

    /// Returns the machine ID embedded in every ID this generator issues.
    pub fn machine_id(&self) -> u32 {
        self.machine_id
    }

    /// Returns the base time from which elapsed milliseconds are counted.
    pub fn base_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.base_time)
    }

    /// Issues a new ID.
    ///
    /// # Errors
    ///
    /// - [`Error::TimeLimitExceeded`] if the elapsed time no longer fits in 41 bits. The
    ///   generator is of no further use after that.
    /// - [`Error::SequenceExhausted`] if the sequence numbers ran out even after one retry.
    /// - [`Error::Interrupted`] if the wait before the retry was cut short.
    pub fn next(&self) -> Result<u64> {
        self.next_id().map(u64::from)
    }

    /// Issues a new ID as an [`Id`] object.
    ///
    /// This is [`Camflake::next`] with the result wrapped for field access.
    pub fn next_id(&self) -> Result<Id> {
        let (mut elapsed, mut sequence) = self.allocate(self.elapsed_time()?);
        log::debug!("sequence id: {}", sequence);

        // rescue once; 64 IDs within a millisecond is not expected in practice
        if sequence > SEQUENCE_MAX {
            log::warn!(
                "sequence ids exhausted at elapsed {} ms, retrying after {:?}",
                elapsed,
                RETRY_WAIT
            );
            self.time_source.sleep(RETRY_WAIT).map_err(|err| {
                log::debug!("wait before retry failed: {}", err);
                Error::Interrupted
            })?;

            (elapsed, sequence) = self.allocate(self.elapsed_time()?);
            if sequence > SEQUENCE_MAX {
                return Err(Error::SequenceExhausted);
            }
        }

        let id = Id::from_fields(elapsed, sequence, self.machine_id);
        log::debug!("guid: {}", id);
        Ok(id)
    }

    /// Returns an infinite iterator that calls [`Camflake::next`] for each item.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use camflake::{Camflake, StaticMachineId};
    ///
    /// let g = Camflake::new(StaticMachineId(7))?;
    /// let ids = g.iter().take(4).collect::<Result<Vec<_>, _>>()?;
    /// assert!(ids.windows(2).all(|w| w[0] < w[1]));
    /// # Ok::<(), camflake::Error>(())
    /// ```
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { generator: self }
    }

    /// Returns the milliseconds elapsed since the base time.
    fn elapsed_time(&self) -> Result<u64> {
        let now = self.time_source.unix_ts_ms();
        let elapsed = now.saturating_sub(self.base_time);
        log::trace!("actual time: {}, elapsed: {}", now, elapsed);
        if elapsed > TIME_MAX {
            return Err(Error::TimeLimitExceeded);
        }
        Ok(elapsed)
    }

    /// Allocates a sequence number for `elapsed`, returning the elapsed time to encode along
    /// with it.
    ///
    /// The returned sequence number may exceed [`SEQUENCE_MAX`]; the caller must check it. When
    /// `elapsed` is older than the latest allocation, the latest elapsed time is returned.
    fn allocate(&self, elapsed: u64) -> (u64, u64) {
        // the state is consistent between any two statements, so a poisoned lock is usable
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.elapsed < elapsed {
            state.elapsed = elapsed;
            state.counter = 0;
        }
        let sequence = state.counter;
        state.counter += 1;
        (state.elapsed, sequence)
    }
}

/// An infinite iterator of IDs created by [`Camflake::iter`].
#[derive(Debug)]
pub struct Iter<'a, T> {
    generator: &'a Camflake<T>,
}

impl<T: TimeSource> Iterator for Iter<'_, T> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.generator.next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl<T: TimeSource> std::iter::FusedIterator for Iter<'_, T> {}

impl<'a, T: TimeSource> IntoIterator for &'a Camflake<T> {
    type Item = Result<u64>;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
