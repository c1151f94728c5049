//! Default generator and entry point functions.

#![cfg(feature = "global_gen")]
#![cfg_attr(docsrs, doc(cfg(feature = "global_gen")))]

use std::env;
use std::sync::OnceLock;

use crate::error::Result;
use crate::machine_id::{DefaultMachineId, EnvMachineId};
use crate::{Camflake, Id};

/// Returns the process-wide global generator, creating one if none exists.
///
/// A failed construction is not cached, so a later call may succeed once the machine ID
/// becomes available.
fn global_gen() -> Result<&'static Camflake> {
    static G: OnceLock<Camflake> = OnceLock::new();
    if let Some(g) = G.get() {
        return Ok(g);
    }

    let g = if env::var_os(EnvMachineId::DEFAULT_VAR).is_some() {
        Camflake::new(EnvMachineId::new())?
    } else {
        Camflake::new(DefaultMachineId)?
    };
    log::debug!("initialized global generator with machine id {}", g.machine_id());
    Ok(G.get_or_init(|| g))
}

/// Generates an ID with the process-wide global generator.
///
/// The global generator uses the default base time and takes its machine ID from the
/// `CAMFLAKE_MACHINE_ID` environment variable, or from the local IP address (see
/// [`DefaultMachineId`]) if the variable is not set.
///
/// # Errors
///
/// Fails if the global generator cannot be created, and otherwise as [`Camflake::next`] does.
///
/// # Examples
///
/// ```rust
/// # std::env::set_var("CAMFLAKE_MACHINE_ID", "1");
/// let id = camflake::next_id()?;
/// println!("{}", id); // e.g., "1073007634563073"
/// assert_eq!(id.machine_id(), 1);
/// # Ok::<(), camflake::Error>(())
/// ```
pub fn next_id() -> Result<Id> {
    global_gen()?.next_id()
}
