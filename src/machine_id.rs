//! Machine ID sources.
//!
//! A machine ID distinguishes one [`Camflake`](crate::Camflake) instance from the others
//! running at the same time. Uniqueness across instances is the responsibility of whoever
//! assigns the IDs; this crate only consumes them.

use std::env;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use crate::error::{Error, Result};

/// A trait that supplies the machine ID of a generator.
///
/// The returned value is expected to fit in 16 bits (`0..=65535`). A generator accepts up to
/// 18 bits (`0..=262143`), but the two extra bits overlap the low bits of the sequence field,
/// so such a generator may issue the same ID twice within a millisecond. The value must stay
/// the same for the whole lifetime of the generator, which reads it only once on construction.
///
/// # Examples
///
/// ```rust
/// use camflake::{Camflake, MachineId};
///
/// struct FromConfig(u32);
///
/// impl MachineId for FromConfig {
///     fn id(&self) -> camflake::Result<u32> {
///         Ok(self.0)
///     }
/// }
///
/// let g = Camflake::new(FromConfig(42))?;
/// assert_eq!(g.machine_id(), 42);
/// # Ok::<(), camflake::Error>(())
/// ```
pub trait MachineId {
    /// Returns the machine ID, or [`Error::MachineIdUnavailable`] if it cannot be determined.
    fn id(&self) -> Result<u32>;
}

/// A machine ID derived from the low 16 bits of the local IP address of this host.
///
/// The local address is the one the OS would use to reach a public host. It is looked up with
/// an unconnected UDP socket, so no packet leaves the machine. Hosts on different subnets may
/// end up with the same ID; prefer an explicitly assigned one in production.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct DefaultMachineId;

impl DefaultMachineId {
    /// Computes the machine ID for a given address: the last two octets of an IPv4 address or
    /// the last two bytes of an IPv6 address, read as a big-endian `u16`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use camflake::DefaultMachineId;
    /// use std::net::{IpAddr, Ipv4Addr};
    ///
    /// let addr = IpAddr::V4(Ipv4Addr::new(192, 168, 3, 7));
    /// assert_eq!(DefaultMachineId::from_addr(addr), 0x0307);
    /// ```
    pub fn from_addr(addr: IpAddr) -> u32 {
        let (hi, lo) = match addr {
            IpAddr::V4(a) => {
                let o = a.octets();
                (o[2], o[3])
            }
            IpAddr::V6(a) => {
                let o = a.octets();
                (o[14], o[15])
            }
        };
        u32::from(hi) << 8 | u32::from(lo)
    }

    fn local_addr() -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        // TEST-NET-1; connecting a UDP socket only selects a route
        socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9))?;
        Ok(socket.local_addr()?.ip())
    }
}

impl MachineId for DefaultMachineId {
    fn id(&self) -> Result<u32> {
        let addr = Self::local_addr().map_err(|err| {
            log::error!("failed to resolve local address for machine id: {}", err);
            Error::machine_id_unavailable(err)
        })?;
        log::debug!("local address: {}", addr);

        let machine_id = Self::from_addr(addr);
        log::debug!("calculated machine id: {}", machine_id);
        Ok(machine_id)
    }
}

/// A fixed machine ID assigned by configuration.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct StaticMachineId(/** The assigned machine ID. */ pub u32);

impl MachineId for StaticMachineId {
    fn id(&self) -> Result<u32> {
        Ok(self.0)
    }
}

/// A machine ID read from an environment variable as a decimal integer.
///
/// # Examples
///
/// ```rust
/// use camflake::{EnvMachineId, MachineId};
///
/// std::env::set_var("MY_APP_MACHINE_ID", "1024");
/// assert_eq!(EnvMachineId::with_var("MY_APP_MACHINE_ID").id()?, 1024);
/// # Ok::<(), camflake::Error>(())
/// ```
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct EnvMachineId {
    var: String,
}

impl EnvMachineId {
    /// The variable read by [`EnvMachineId::new`].
    pub const DEFAULT_VAR: &'static str = "CAMFLAKE_MACHINE_ID";

    /// Creates a source that reads `CAMFLAKE_MACHINE_ID`.
    pub fn new() -> Self {
        Self::with_var(Self::DEFAULT_VAR)
    }

    /// Creates a source that reads the given variable.
    pub fn with_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// Returns the name of the variable this source reads.
    pub fn var(&self) -> &str {
        &self.var
    }
}

impl Default for EnvMachineId {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineId for EnvMachineId {
    fn id(&self) -> Result<u32> {
        let value = env::var(&self.var)
            .map_err(|err| Error::machine_id_unavailable(format!("{}: {}", self.var, err)))?;
        value.trim().parse().map_err(|err| {
            let reason = format!("{}: invalid value {:?}: {}", self.var, value, err);
            Error::machine_id_unavailable(reason)
        })
    }
}
