//! Error type returned by the generator and its collaborators.

/// Shorthand for results carrying a [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while constructing a [`Camflake`](crate::Camflake) or issuing an ID.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The base time is before 1970-01-01T00:00:00Z or after the current time.
    #[error("base time should be after 1970-01-01T00:00:00Z and before now")]
    InvalidBaseTime,

    /// The machine ID could not be determined.
    #[error("failed to obtain machine id: {reason}")]
    MachineIdUnavailable {
        /// Description of the underlying failure.
        reason: String,
    },

    /// The machine ID does not fit in the 18 bits reserved for it.
    #[error("machine id {0} exceeds the maximum of 262143")]
    MachineIdOutOfRange(u32),

    /// The time elapsed since the base time no longer fits in 41 bits.
    #[error("exceeded the time limit")]
    TimeLimitExceeded,

    /// More than 64 IDs were requested within one millisecond, even after retrying once.
    #[error("failed to issue sequence id")]
    SequenceExhausted,

    /// The wait before retrying the sequence allocation was interrupted.
    #[error("interruption occurred while waiting for the next millisecond")]
    Interrupted,
}

impl Error {
    /// Returns `true` if this error can only arise while constructing a generator, i.e. it
    /// indicates invalid configuration rather than a transient condition.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidBaseTime | Self::MachineIdUnavailable { .. } | Self::MachineIdOutOfRange(_)
        )
    }

    pub(crate) fn machine_id_unavailable(reason: impl ToString) -> Self {
        Self::MachineIdUnavailable {
            reason: reason.to_string(),
        }
    }
}
