//! Types for driving a ZWO EAF focuser motor.
//!
//! ## Communicating with a Focuser
//!
//! All communication starts with a [`Focuser`], which is usually opened
//! directly from the USB device (requires the `hid` feature):
//!
//! ```no_run
//! # #[cfg(feature = "hid")]
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! use zwohid::focuser::{Focuser, Target};
//!
//! let mut focuser = Focuser::open()?;
//! let status = focuser.settle()?;
//! println!("current pos = {} (max {})", status.position(), status.max());
//!
//! // Move 500 steps inwards and wait for the motor to stop.
//! let position = focuser.move_to(Target::Relative(-500))?;
//! # Ok(())
//! # }
//! ```
//!
//! The focuser accepts a single "set position" command and then moves on its
//! own. [`move_to`](Focuser::move_to) sends that command once and then only
//! observes the device until it reports the target position and has stopped
//! moving. There is no bound on how long that takes.
//!
//! ## Codec
//!
//! The report layouts are exposed as pure functions, which never perform I/O:
//! [`encode_set_position`], [`encode_query_position`] and
//! [`decode_position_report`].

mod codec;
mod driver;

pub use codec::*;
pub use driver::*;
