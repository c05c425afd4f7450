//! Move a ZWO EFW filter wheel to a slot and wait for it to settle.
//!
//! ```text
//! efw-set [<slot>]
//! ```
//!
//! Slots are numbered 1 to 7. Without an argument the current slot is
//! reported and the wheel is not moved. The exit code is 0 once the wheel has
//! settled at the target and 2 on any failure.

use simple_logger::SimpleLogger;
use std::process;
use zwohid::{
	error::Error,
	wheel::{Wheel, WheelEvent, SLOT_COUNT},
	Outcome,
};

fn run(target: Option<u8>) -> Result<u8, Error> {
	let mut wheel = Wheel::open()?;
	if let Some(manufacturer) = wheel.manufacturer()? {
		println!("Manufacturer String: {manufacturer}");
	}
	if let Some(product) = wheel.product()? {
		println!("Product String: {product}");
	}
	let info = wheel.info()?;
	println!("Model: {}", info.model());

	let slot = match target {
		Some(target) => wheel.move_to_with_progress(target, |event| match event {
			WheelEvent::Step { to, .. } => println!("request slot {to}"),
			WheelEvent::Slot(slot) => println!("current slot = {slot}"),
		})?,
		None => wheel.settle()?.slot(),
	};
	println!("final slot = {slot}");
	Ok(slot)
}

fn main() {
	if let Err(e) = SimpleLogger::new()
		.with_level(log::LevelFilter::Warn)
		.env()
		.init()
	{
		eprintln!("cannot install logger: {e}");
	}

	let target = match std::env::args().nth(1) {
		None => None,
		Some(arg) => match arg.parse::<u8>() {
			Ok(slot) if (1..=SLOT_COUNT).contains(&slot) => Some(slot),
			_ => {
				eprintln!("invalid filter slot requested: {arg:?}");
				process::exit(2);
			}
		},
	};

	let outcome = Outcome::from(run(target));
	match &outcome {
		Outcome::Reached(_) => {}
		Outcome::Fault(e) => eprintln!("unrecoverable wheel error, needs physical reset: {e}"),
		Outcome::Aborted(e) => eprintln!("{e}"),
	}
	process::exit(outcome.exit_code());
}
