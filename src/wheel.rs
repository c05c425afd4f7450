//! Types for driving a ZWO EFW 7-slot filter wheel.
//!
//! ## Communicating with a Wheel
//!
//! All communication starts with a [`Wheel`], which is usually opened
//! directly from the USB device (requires the `hid` feature):
//!
//! ```no_run
//! # #[cfg(feature = "hid")]
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! use zwohid::wheel::Wheel;
//!
//! let mut wheel = Wheel::open()?;
//! let info = wheel.info()?;
//! println!("model: {}", info.model());
//!
//! let slot = wheel.move_to(5)?;
//! println!("final slot = {slot}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Single steps
//!
//! Commanding the wheel to jump several slots at once can hang its
//! controller until it is power cycled, and reverse motion does not behave
//! consistently. [`Wheel::move_to`] therefore only ever commands the slot
//! directly after the current one (see [`next_slot`]), waiting for the wheel
//! to settle there before commanding the next. Moving backwards means going
//! forwards around the wheel.
//!
//! A fault report (see [`WheelState::Fault`]) aborts immediately with a
//! [`DeviceFaultError`](crate::error::DeviceFaultError); the wheel then needs
//! a physical reset.

mod codec;
mod driver;

pub use crate::error::wheel_code;
pub use codec::*;
pub use driver::*;
