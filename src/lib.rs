//! A Rust implementation of Camflake, a generator of 64-bit unique IDs ordered by creation time
//!
//! ```rust
//! use camflake::{Camflake, StaticMachineId};
//!
//! let g = Camflake::new(StaticMachineId(1))?;
//! let id = g.next()?;
//! println!("{}", id); // e.g. "1073007634563073"
//! # Ok::<(), camflake::Error>(())
//! ```
//!
//! Camflake belongs to the Snowflake family: every ID embeds the time it was issued, so IDs
//! sort approximately by creation time across generators and exactly within one generator, and
//! generators holding distinct machine IDs never collide.
//!
//! # Field and bit layout
//!
//! This implementation produces identifiers with the following bit layout:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |0|                         elapsed                             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      elapsed      |  sequence |          machine_id           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Where:
//!
//! - The 41-bit `elapsed` field holds the milliseconds elapsed since the base time of the
//!   generator, 2017-06-01T00:00:00Z by default. It overflows about 69 years after the base
//!   time, at which point the generator fails with [`Error::TimeLimitExceeded`].
//! - The 6-bit `sequence` field is a counter that orders the IDs issued within the same
//!   millisecond. It is reset to zero whenever `elapsed` advances.
//! - The 16-bit `machine_id` field identifies the generator. Assigning distinct machine IDs to
//!   the generators running at the same time is up to the application.
//!
//! Up to 64 IDs can be issued per millisecond. A generator that runs out of sequence numbers
//! waits for about two milliseconds and retries once before giving up with
//! [`Error::SequenceExhausted`].
//!
//! # Machine IDs
//!
//! The machine ID is supplied through the [`MachineId`] trait. The crate provides
//! [`StaticMachineId`] for configured values, [`EnvMachineId`] for values taken from an
//! environment variable, and [`DefaultMachineId`], which derives the ID from the local IP
//! address of the host.
//!
//! # Crate features
//!
//! - `global_gen` (default): enables [`next_id()`], backed by a process-wide generator.
//! - `serde`: implements `Serialize` and `Deserialize` for [`Id`].

#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
pub use error::{Error, Result};

mod id;
pub use id::{Id, ParseError, MACHINE_ID_MAX, SEQUENCE_MAX, TIME_MAX};

pub mod generator;
#[doc(inline)]
pub use generator::{default_base_time, Camflake, StdSystemTime, TimeSource, DEFAULT_BASE_TIME_MS};

mod machine_id;
pub use machine_id::{DefaultMachineId, EnvMachineId, MachineId, StaticMachineId};

mod global_gen;
#[cfg(feature = "global_gen")]
pub use global_gen::next_id;
