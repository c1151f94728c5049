use super::*;
use crate::machine_id::StaticMachineId;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Barrier;

impl<T> Camflake<T> {
    /// Overwrites the sequence counter of the current millisecond.
    fn set_counter(&self, counter: u64) {
        self.state.lock().unwrap().counter = counter;
    }
}

/// A time source that replays a fixed list of readings, repeating the last one once the list
/// runs out, and records the waits requested from it.
struct ScriptedTime {
    readings: Mutex<VecDeque<u64>>,
    last: AtomicU64,
    waits: Mutex<Vec<Duration>>,
    interrupt: bool,
}

impl ScriptedTime {
    fn new(readings: &[u64]) -> Self {
        Self {
            readings: Mutex::new(readings.iter().copied().collect()),
            last: AtomicU64::new(readings[0]),
            waits: Default::default(),
            interrupt: false,
        }
    }

    fn interrupted(readings: &[u64]) -> Self {
        Self {
            interrupt: true,
            ..Self::new(readings)
        }
    }
}

impl TimeSource for ScriptedTime {
    fn unix_ts_ms(&self) -> u64 {
        match self.readings.lock().unwrap().pop_front() {
            Some(ts) => {
                self.last.store(ts, Ordering::SeqCst);
                ts
            }
            None => self.last.load(Ordering::SeqCst),
        }
    }

    fn sleep(&self, dur: Duration) -> io::Result<()> {
        self.waits.lock().unwrap().push(dur);
        if self.interrupt {
            Err(io::ErrorKind::Interrupted.into())
        } else {
            Ok(())
        }
    }
}

/// A time source that advances by one millisecond on every reading.
struct TickingTime(AtomicU64);

impl TimeSource for TickingTime {
    fn unix_ts_ms(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    fn sleep(&self, _: Duration) -> io::Result<()> {
        Ok(())
    }
}

/// A machine ID source that always fails.
struct UnavailableMachineId;

impl MachineId for UnavailableMachineId {
    fn id(&self) -> Result<u32> {
        Err(Error::machine_id_unavailable("no address"))
    }
}

fn scripted(machine_id: u32, readings: &[u64]) -> Camflake<ScriptedTime> {
    let time_source = ScriptedTime::new(readings);
    Camflake::with_time_source(StaticMachineId(machine_id), UNIX_EPOCH, time_source).unwrap()
}

mod construction {
    use super::*;

    /// Fails when base time is before epoch
    #[test]
    fn fails_when_base_time_is_before_epoch() {
        let base_time = UNIX_EPOCH - Duration::from_secs(1);
        let result = Camflake::with_base_time(StaticMachineId(1), base_time);
        assert!(matches!(result, Err(Error::InvalidBaseTime)));
    }

    /// Fails when base time is after now
    #[test]
    fn fails_when_base_time_is_after_now() {
        // 9999-12-31T23:59:59Z
        let base_time = UNIX_EPOCH + Duration::from_secs(253_402_300_799);
        let result = Camflake::with_base_time(StaticMachineId(1), base_time);
        assert!(matches!(result, Err(Error::InvalidBaseTime)));
    }

    /// Fails when time limit is exceeded
    #[test]
    fn fails_when_time_limit_is_exceeded() {
        let time_source = ScriptedTime::new(&[1 << 41]);
        let result = Camflake::with_time_source(StaticMachineId(1), UNIX_EPOCH, time_source);
        assert!(matches!(result, Err(Error::TimeLimitExceeded)));

        let g = Camflake::with_time_source(
            StaticMachineId(1),
            UNIX_EPOCH,
            ScriptedTime::new(&[TIME_MAX]),
        );
        assert!(g.is_ok());
    }

    /// Checks base time before machine ID
    #[test]
    fn checks_base_time_before_machine_id() {
        let future = SystemTime::now() + Duration::from_secs(3600);
        let result = Camflake::with_base_time(UnavailableMachineId, future);
        assert!(matches!(result, Err(Error::InvalidBaseTime)));
    }

    /// Propagates machine ID failure
    #[test]
    fn propagates_machine_id_failure() {
        let result = Camflake::new(UnavailableMachineId);
        assert!(matches!(result, Err(Error::MachineIdUnavailable { .. })));
    }

    /// Rejects machine ID exceeding 18 bits
    #[test]
    fn rejects_machine_id_exceeding_18_bits() {
        let result = Camflake::new(StaticMachineId(MACHINE_ID_MAX + 1));
        assert!(matches!(result, Err(Error::MachineIdOutOfRange(262_144))));

        let g = Camflake::new(StaticMachineId(MACHINE_ID_MAX)).unwrap();
        assert_eq!(g.machine_id(), MACHINE_ID_MAX);
    }

    /// Uses 2017-06-01 as default base time
    #[test]
    fn uses_2017_06_01_as_default_base_time() {
        let g = Camflake::new(StaticMachineId(1)).unwrap();
        assert_eq!(
            g.base_time().duration_since(UNIX_EPOCH).unwrap(),
            Duration::from_secs(1_496_275_200)
        );
        assert_eq!(g.base_time(), default_base_time());
    }

    /// Accepts base time equal to now
    #[test]
    fn accepts_base_time_equal_to_now() {
        let g = Camflake::with_time_source(
            StaticMachineId(1),
            UNIX_EPOCH + Duration::from_millis(5_000),
            ScriptedTime::new(&[5_000, 5_000]),
        )
        .unwrap();
        assert_eq!(g.next().unwrap(), 1);
    }
}

mod next {
    use super::*;

    /// Generates increasing IDs
    #[test]
    fn generates_increasing_ids() {
        let g = Camflake::new(StaticMachineId(1)).unwrap();
        let id1 = g.next().unwrap();
        let id2 = g.next().unwrap();
        let id3 = g.next().unwrap();

        assert!(id2 > id1);
        assert!(id3 > id2);
    }

    /// Generates increasing IDs beyond 64 per millisecond
    #[test]
    fn generates_increasing_ids_beyond_64_per_millisecond() {
        let g = Camflake::new(StaticMachineId(1)).unwrap();
        let mut prev = g.next().unwrap();
        for _ in 0..2_000 {
            let curr = g.next().unwrap();
            assert!(prev < curr);
            prev = curr;
        }
    }

    /// Returns expected value at mocked time
    #[test]
    fn returns_expected_value_at_mocked_time() {
        let exec_time = DEFAULT_BASE_TIME_MS + 1_000;
        let g = Camflake::with_time_source(
            StaticMachineId(1),
            default_base_time(),
            ScriptedTime::new(&[DEFAULT_BASE_TIME_MS, exec_time]),
        )
        .unwrap();

        assert_eq!(g.next().unwrap(), 4_194_304_001);
    }

    /// Fails when time limit is exceeded at call time
    #[test]
    fn fails_when_time_limit_is_exceeded_at_call_time() {
        let g = scripted(1, &[0, 1 << 41]);
        assert!(matches!(g.next(), Err(Error::TimeLimitExceeded)));
    }

    /// Retries once when sequence is exhausted
    #[test]
    fn retries_once_when_sequence_is_exhausted() {
        let g = scripted(1, &[1, 1, 3]);
        g.set_counter(SEQUENCE_MAX + 1);

        assert_eq!(g.next().unwrap(), 12_582_913);
        assert_eq!(*g.time_source.waits.lock().unwrap(), [Duration::from_millis(2)]);

        // counter has been reset for the new millisecond
        assert_eq!(g.next_id().unwrap().sequence(), 1);
    }

    /// Fails when sequence is still exhausted after retry
    #[test]
    fn fails_when_sequence_is_still_exhausted_after_retry() {
        let g = scripted(1, &[1]);
        g.set_counter(SEQUENCE_MAX + 1);

        assert!(matches!(g.next(), Err(Error::SequenceExhausted)));
        assert_eq!(g.time_source.waits.lock().unwrap().len(), 1);
    }

    /// Fails when wait is interrupted
    #[test]
    fn fails_when_wait_is_interrupted() {
        let g = Camflake::with_time_source(
            StaticMachineId(1),
            UNIX_EPOCH,
            ScriptedTime::interrupted(&[1, 1]),
        )
        .unwrap();
        g.set_counter(SEQUENCE_MAX + 1);

        assert!(matches!(g.next(), Err(Error::Interrupted)));
    }

    /// Issues 64 IDs per millisecond
    #[test]
    fn issues_64_ids_per_millisecond() {
        let g = scripted(9, &[7]);
        for i in 0..=SEQUENCE_MAX {
            assert_eq!(g.next_id().unwrap(), Id::from_fields(7, i, 9));
        }
        assert!(matches!(g.next(), Err(Error::SequenceExhausted)));
    }

    /// Recovers machine ID from low 16 bits
    #[test]
    fn recovers_machine_id_from_low_16_bits() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let machine_id = rng.gen_range(0..=0xffff);
            let g = Camflake::new(StaticMachineId(machine_id)).unwrap();
            let id = g.next().unwrap();
            assert_eq!((id & 0xffff) as u32, machine_id);
            assert_eq!(Id::from(id).machine_id(), machine_id);
        }
    }

    /// Encodes up-to-date timestamp
    #[test]
    fn encodes_up_to_date_timestamp() {
        let g = Camflake::new(StaticMachineId(1)).unwrap();
        for _ in 0..1_000 {
            let ts_now = StdSystemTime.unix_ts_ms() as i64;
            let id = g.next_id().unwrap();
            let ts = id.timestamp(g.base_time()).duration_since(UNIX_EPOCH).unwrap();
            assert!((ts_now - ts.as_millis() as i64).abs() < 16);
        }
    }

    /// Keeps issuing unique increasing IDs when clock goes backwards
    #[test]
    fn keeps_issuing_unique_increasing_ids_when_clock_goes_backwards() {
        let g = scripted(1, &[100, 100, 100, 90, 95, 100, 101]);
        let ids = (0..6).map(|_| g.next_id().unwrap()).collect::<Vec<_>>();

        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        let fields = ids
            .iter()
            .map(|e| (e.elapsed_ms(), e.sequence()))
            .collect::<Vec<_>>();
        assert_eq!(fields, [(100, 0), (100, 1), (100, 2), (100, 3), (100, 4), (101, 0)]);
    }

    /// Treats clock before base time as a rollback
    #[test]
    fn treats_clock_before_base_time_as_a_rollback() {
        let g = Camflake::with_time_source(
            StaticMachineId(1),
            UNIX_EPOCH + Duration::from_millis(1_000),
            ScriptedTime::new(&[1_010, 500]),
        )
        .unwrap();
        let id = g.next_id().unwrap();
        assert_eq!((id.elapsed_ms(), id.sequence()), (10, 0));
    }

    /// Iterates over new IDs
    #[test]
    fn iterates_over_new_ids() {
        let g = scripted(3, &[0, 1, 2, 3, 4]);
        let ids = g.iter().take(4).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(ids, [1 << 22 | 3, 2 << 22 | 3, 3 << 22 | 3, 4 << 22 | 3]);

        let mut n = 0;
        for e in &g {
            assert!(e.is_ok());
            n += 1;
            if n == 3 {
                break;
            }
        }
    }
}

mod concurrency {
    use super::*;

    /// Allocates contiguous distinct sequences to simultaneous callers
    #[test]
    fn allocates_contiguous_distinct_sequences_to_simultaneous_callers() {
        const N: usize = 64;
        let g = scripted(5, &[42]);
        let barrier = Barrier::new(N);

        let ids = thread::scope(|s| {
            let handles = (0..N)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        g.next_id().unwrap()
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });

        let distinct = ids.iter().collect::<HashSet<_>>();
        assert_eq!(distinct.len(), N);

        let sequences = ids.iter().map(|e| e.sequence()).collect::<HashSet<_>>();
        assert_eq!(sequences, (0..N as u64).collect::<HashSet<_>>());
        assert!(ids.iter().all(|e| e.elapsed_ms() == 42 && e.machine_id() == 5));
    }

    /// Generates no duplicate IDs under multithreading
    #[test]
    fn generates_no_duplicate_ids_under_multithreading() {
        let time_source = TickingTime(AtomicU64::new(0));
        let g = Camflake::with_time_source(StaticMachineId(1), UNIX_EPOCH, time_source).unwrap();

        let ids = thread::scope(|s| {
            let handles = (0..4)
                .map(|_| s.spawn(|| (0..10_000).map(|_| g.next().unwrap()).collect::<Vec<_>>()))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect::<HashSet<_>>()
        });

        assert_eq!(ids.len(), 4 * 10_000);
    }

    /// Keeps separate generators independent
    #[test]
    fn keeps_separate_generators_independent() {
        let a = scripted(1, &[10]);
        let b = scripted(2, &[10]);
        a.set_counter(SEQUENCE_MAX + 1);

        assert!(matches!(a.next(), Err(Error::SequenceExhausted)));
        assert_eq!(b.next_id().unwrap(), Id::from_fields(10, 0, 2));
    }

    /// Survives a poisoned lock
    #[test]
    fn survives_a_poisoned_lock() {
        let g = scripted(1, &[10]);
        let _ = thread::scope(|s| {
            s.spawn(|| {
                let _guard = g.state.lock().unwrap();
                panic!("poison");
            })
            .join()
        });

        assert!(g.state.is_poisoned());
        assert_eq!(g.next_id().unwrap(), Id::from_fields(10, 0, 1));
    }
}
