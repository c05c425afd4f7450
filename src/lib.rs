//! A small library for driving ZWO USB HID astronomy accessories.
//!
//! Both the [`EAF focuser`](focuser) and the 7-slot [`EFW filter wheel`](wheel)
//! are supported through their (undocumented) vendor feature-report protocols.
//!
//! Each device family is split into a pure codec, a status interpreter and a
//! driver that converges the device onto a requested target:
//!
//! ```no_run
//! # #[cfg(all(feature = "hid", feature = "wheel"))]
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! use zwohid::wheel::Wheel;
//!
//! let mut wheel = Wheel::open()?;
//! let slot = wheel.move_to(3)?;
//! assert_eq!(slot, 3);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(all(doc, feature = "doc_cfg"), feature(doc_cfg))]

pub mod backend;
pub mod clock;
pub mod error;
#[cfg(feature = "focuser")]
#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "focuser")))]
pub mod focuser;
pub mod outcome;
pub mod port;
pub mod report;
#[cfg(feature = "wheel")]
#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "wheel")))]
pub mod wheel;

pub use outcome::Outcome;

/// The USB vendor ID shared by all supported devices.
pub const ZWO_VENDOR_ID: u16 = 0x03c3;

#[cfg(not(any(feature = "focuser", feature = "wheel")))]
compile_error!("At least one of the `focuser` or `wheel` features must be specified");
