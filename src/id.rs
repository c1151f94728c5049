use std::time::{Duration, SystemTime};
use std::{fmt, str};

/// The largest elapsed time, in milliseconds, the 41-bit timestamp field can hold.
pub const TIME_MAX: u64 = (1 << 41) - 1;

/// The largest sequence number that can be issued within one millisecond.
pub const SEQUENCE_MAX: u64 = (1 << 6) - 1;

/// The largest machine ID a generator accepts.
pub const MACHINE_ID_MAX: u32 = (1 << 18) - 1;

const TIMESTAMP_SHIFT: u32 = 22;
const SEQUENCE_SHIFT: u32 = 16;

/// Represents a 64-bit Camflake identifier.
///
/// An `Id` orders the same way as its underlying `u64`, i.e. by elapsed time first and by
/// sequence number within the same millisecond.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Id(u64);

impl Id {
    /// Creates an identifier from its field values.
    ///
    /// # Panics
    ///
    /// Panics if `elapsed_ms` exceeds [`TIME_MAX`], `sequence` exceeds [`SEQUENCE_MAX`], or
    /// `machine_id` exceeds [`MACHINE_ID_MAX`].
    pub const fn from_fields(elapsed_ms: u64, sequence: u64, machine_id: u32) -> Self {
        if elapsed_ms > TIME_MAX || sequence > SEQUENCE_MAX || machine_id > MACHINE_ID_MAX {
            panic!("invalid field value");
        }

        Self((elapsed_ms << TIMESTAMP_SHIFT) | (sequence << SEQUENCE_SHIFT) | machine_id as u64)
    }

    /// Returns the milliseconds elapsed since the generator's base time.
    pub const fn elapsed_ms(&self) -> u64 {
        self.0 >> TIMESTAMP_SHIFT
    }

    /// Returns the per-millisecond sequence number.
    pub const fn sequence(&self) -> u64 {
        (self.0 >> SEQUENCE_SHIFT) & SEQUENCE_MAX
    }

    /// Returns the low 16 bits of the machine ID.
    ///
    /// Machine IDs above `0xffff` share their high bits with the sequence field and cannot be
    /// recovered in full.
    pub const fn machine_id(&self) -> u32 {
        (self.0 & 0xffff) as u32
    }

    /// Returns the creation time of this identifier, given the base time of the generator that
    /// issued it.
    pub fn timestamp(&self, base_time: SystemTime) -> SystemTime {
        base_time + Duration::from_millis(self.elapsed_ms())
    }

    /// Returns the underlying integer.
    pub const fn to_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Id {
    /// Returns the decimal representation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl str::FromStr for Id {
    type Err = ParseError;

    /// Creates an object from the decimal representation.
    fn from_str(src: &str) -> Result<Self, Self::Err> {
        if src.is_empty() || !src.bytes().all(|c| c.is_ascii_digit()) {
            return Err(ParseError {});
        }
        src.parse().map(Self).map_err(|_| ParseError {})
    }
}

impl From<Id> for u64 {
    fn from(src: Id) -> Self {
        src.0
    }
}

impl From<u64> for Id {
    fn from(src: u64) -> Self {
        Self(src)
    }
}

impl From<Id> for String {
    fn from(src: Id) -> Self {
        src.to_string()
    }
}

impl TryFrom<String> for Id {
    type Error = ParseError;

    fn try_from(src: String) -> Result<Self, Self::Error> {
        src.parse()
    }
}

/// Error parsing an invalid string representation of an identifier.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid string representation")
    }
}

impl std::error::Error for ParseError {}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
mod serde_support {
    use super::{fmt, Id};
    use serde::{de, Deserializer, Serializer};

    impl serde::Serialize for Id {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            if serializer.is_human_readable() {
                serializer.collect_str(self)
            } else {
                serializer.serialize_u64(self.0)
            }
        }
    }

    impl<'de> serde::Deserialize<'de> for Id {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            if deserializer.is_human_readable() {
                deserializer.deserialize_str(VisitorImpl)
            } else {
                deserializer.deserialize_u64(VisitorImpl)
            }
        }
    }

    struct VisitorImpl;

    impl<'de> de::Visitor<'de> for VisitorImpl {
        type Value = Id;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(formatter, "a Camflake ID representation")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            value.parse::<Self::Value>().map_err(de::Error::custom)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(Self::Value::from(value))
        }
    }

}
