//! Simple command that prints one or '-n count' Camflake IDs
//!
//! The machine ID is taken from '-m machine-id', then from the `CAMFLAKE_MACHINE_ID`
//! environment variable, and finally from the local IP address. Set `RUST_LOG` to see the
//! generator's log output.

use std::{env, io, io::Write, process::ExitCode};

use camflake::{Camflake, DefaultMachineId, EnvMachineId, StaticMachineId};
use flexi_logger::Logger;

#[derive(Debug, Default, PartialEq)]
struct Options {
    count: Option<usize>,
    machine_id: Option<u32>,
}

fn main() -> io::Result<ExitCode> {
    let options = {
        let mut args = env::args();
        let program = args.next();
        match parse_args(args) {
            Ok(opt) => opt,
            Err(message) => {
                eprintln!("Error: {}", message);
                eprintln!(
                    "Usage: {} [-n count] [-m machine-id]",
                    program.as_deref().unwrap_or("camflake")
                );
                return Ok(ExitCode::FAILURE);
            }
        }
    };

    // the handle keeps the logger running until main returns
    let _logger = Logger::try_with_env_or_str("warn")
        .and_then(|logger| logger.start())
        .map_err(|err| eprintln!("Warning: failed to initialize logger: {}", err))
        .ok();

    let generator = if let Some(machine_id) = options.machine_id {
        Camflake::new(StaticMachineId(machine_id))
    } else if env::var_os(EnvMachineId::DEFAULT_VAR).is_some() {
        Camflake::new(EnvMachineId::new())
    } else {
        Camflake::new(DefaultMachineId)
    };
    let generator = match generator {
        Ok(g) => g,
        Err(err) => {
            eprintln!("Error: {}", err);
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut buf = io::BufWriter::new(io::stdout());
    for result in generator.iter().take(options.count.unwrap_or(1)) {
        match result {
            Ok(id) => writeln!(buf, "{}", id)?,
            Err(err) => {
                buf.flush()?;
                eprintln!("Error: {}", err);
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    buf.flush()?;

    Ok(ExitCode::SUCCESS)
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut options = Options::default();
    while let Some(arg) = args.next() {
        let name = match arg.as_str() {
            "-n" => 'n',
            "-m" => 'm',
            _ => return Err(format!("unrecognized argument '{}'", arg)),
        };
        let Some(value) = args.next() else {
            return Err(format!("argument to option '{}' missing", name));
        };
        let duplicate = match name {
            'n' => {
                let Ok(c) = value.parse() else {
                    return Err(format!("invalid argument to option 'n': '{}'", value));
                };
                options.count.replace(c).is_some()
            }
            _ => {
                let Ok(m) = value.parse() else {
                    return Err(format!("invalid argument to option 'm': '{}'", value));
                };
                options.machine_id.replace(m).is_some()
            }
        };
        if duplicate {
            return Err(format!("option '{}' given more than once", name));
        }
    }
    Ok(options)
}
