//! The terminal result of a convergence run.

use crate::error::Error;

/// How a convergence run ended.
///
/// Drivers return `Result<T, Error>` so that `?` composes; convert the result
/// into an `Outcome` to sort the failures into faults and aborts:
///
/// ```
/// use zwohid::{error::Error, Outcome};
///
/// let result: Result<u8, Error> = Ok(3);
/// let outcome = Outcome::from(result);
/// assert_eq!(outcome.exit_code(), 0);
/// ```
#[derive(Debug)]
pub enum Outcome<T> {
	/// The device settled at the target, which is the contained value.
	Reached(T),
	/// The device failed and needs a physical reset.
	Fault(Error),
	/// The run was abandoned before reaching the target, e.g., because the
	/// target was invalid or the device could not be opened.
	Aborted(Error),
}

impl<T> Outcome<T> {
	/// The process exit code for this outcome: `0` when the target was
	/// reached, `2` otherwise.
	pub fn exit_code(&self) -> i32 {
		match self {
			Outcome::Reached(_) => 0,
			Outcome::Fault(_) | Outcome::Aborted(_) => 2,
		}
	}

	/// Whether the target was reached.
	pub fn is_reached(&self) -> bool {
		matches!(self, Outcome::Reached(_))
	}

	/// Whether the device reported a fault.
	pub fn is_fault(&self) -> bool {
		matches!(self, Outcome::Fault(_))
	}

	/// Convert back into a `Result`.
	pub fn into_result(self) -> Result<T, Error> {
		match self {
			Outcome::Reached(value) => Ok(value),
			Outcome::Fault(e) | Outcome::Aborted(e) => Err(e),
		}
	}
}

impl<T> From<Result<T, Error>> for Outcome<T> {
	fn from(result: Result<T, Error>) -> Self {
		match result {
			Ok(value) => Outcome::Reached(value),
			Err(e) if e.requires_reset() => Outcome::Fault(e),
			Err(e) => Outcome::Aborted(e),
		}
	}
}
