//! Move a ZWO EAF focuser and wait for it to stop.
//!
//! ```text
//! eaf-set [<position> | +<steps> | -<steps>]
//! ```
//!
//! Without an argument the current position is reported. The exit code is 0
//! once the target is reached and 2 on any failure.

use simple_logger::SimpleLogger;
use std::process;
use zwohid::{
	error::Error,
	focuser::{Focuser, Target},
	Outcome,
};

fn run(target: Option<Target>) -> Result<u16, Error> {
	let mut focuser = Focuser::open()?;
	let status = focuser.settle()?;
	println!("current pos = {} (max {})", status.position(), status.max());
	let Some(target) = target else {
		return Ok(status.position());
	};
	focuser.move_from_settled(&status, target, |status, target| {
		println!("current pos = {} (target {target})", status.position());
	})
}

fn main() {
	if let Err(e) = SimpleLogger::new()
		.with_level(log::LevelFilter::Warn)
		.env()
		.init()
	{
		eprintln!("cannot install logger: {e}");
	}

	let target = match std::env::args().nth(1).map(|arg| arg.parse::<Target>()).transpose() {
		Ok(target) => target,
		Err(e) => {
			eprintln!("{e}");
			process::exit(2);
		}
	};

	let outcome = Outcome::from(run(target));
	match &outcome {
		Outcome::Reached(_) => {}
		Outcome::Fault(e) => eprintln!("unrecoverable error, needs physical reset: {e}"),
		Outcome::Aborted(e) => eprintln!("{e}"),
	}
	process::exit(outcome.exit_code());
}
