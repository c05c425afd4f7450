//! Error types.
//!
//! Each error is represented by a unique type that implements [`std::error::Error`].
//! However, most APIs return more than one kind of error and so will return one
//! of the higher level [enums](#enums), such as [`CodecError`] or [`Error`].
//! The error types are convertible to the higher level enums, allowing them to
//! be used with `?`:
//!
//! ```
//! use zwohid::error::{CodecError, Error};
//!
//! fn foo() -> Result<(), CodecError> {
//!     // ...
//! # Ok(())
//! }
//!
//! fn bar() -> Result<(), Error> {
//!     foo()?;
//!     // ...
//! # Ok(())
//! }
//! ```
//!
//! Unexpected values in bytes that are normally constant are not errors. They
//! are logged as a [`ProtocolMismatch`](crate::report::ProtocolMismatch)
//! warning and decoding continues.

use crate::report::Hex;

/// Implement Error and Display traits for the specified type.
///
/// After the type define the format string and any arguments it should
/// reference after `self =>` (to abide by macro hygiene rules).
macro_rules! impl_error_display {
	(
		$name:path,
		$self:ident =>
		$display:literal
		$(,
			$($arg:expr),+
		)?
	) => {
		impl std::error::Error for $name {}

		impl std::fmt::Display for $name {
			fn fmt(&$self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				write!(
					f,
					$display
					$(,
						$($arg),+
					)?
				)
			}
		}
	};
}

/// Define error enums that contain concrete error types (not other error enums).
///
/// `From` and `TryFrom` traits will be implemented for the enum and it's underlying
/// errors. The enum's Display implementation will defer to the underlying errors'
/// Display implementations.
///
/// Simple implementations of `From` and `TryFrom` with other error enums can be
/// added by appending a succinct impl block, which assumes that:
///   * it is being implemented for this error enum,
///   * each variant has a single tuple value, and can be converted to the value
///     in this enum with its own `From` implementation.
///
/// ```compile_fail
/// # // This fails to compile because the macro is not exported.
/// error_enum!{
///     // This defines the enum and From/TryFrom between ThisError and A and B.
///     #[non_exhaustive]
///     pub enum ThisError {
///         VariantA(A),
///         VariantB(B),
///         // ...
///     }
///
///     // This implements a simple From/TryFrom between ThisError and OtherType.
///     impl From<OtherType> {
///         FromVariantA => VariantA,
///         // ...
///     }
/// }
/// ```
macro_rules! error_enum {
	(
		$(#[$attr:meta])*
		pub enum $name:ident {
			$(
				$variant:ident($inner:path)
			),+
			$(,)?
		}
		// Additional information for From/TryFrom impl blocks.
		$(
			impl From<$from_t:ident>
			{
				$($from_variant:ident => $to_variant:ident),+
				$(,)?
			}
		)*
	) => {
		// Define the error enum itself
		$(
			#[$attr]
		)*
		#[allow(missing_docs)]
		pub enum $name {
			$(
				$variant($inner)
			),+
		}

		impl std::error::Error for $name {}

		// Defer the display to the inner error type
		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				match self {
					$(
						$name::$variant(e) => e.fmt(f)
					),+
				}
			}
		}

		// Allow the enum to be convertible from an infallible error
		impl From<std::convert::Infallible> for $name {
			fn from(_: std::convert::Infallible) -> Self {
				unreachable!();
			}
		}

		// Conversions with underlying errors
		$(
			impl From<$inner> for $name {
				fn from(other: $inner) -> Self {
					$name::$variant(other)
				}
			}

			impl TryFrom<$name> for $inner {
				type Error = $name;
				fn try_from(other: $name) -> Result<Self, Self::Error> {
					match other {
						$name::$variant(value) => Ok(value),
						#[allow(unreachable_patterns)]
						value => Err(value)
					}
				}
			}
		)+

		// Conversions from other enum errors
		$(
			impl From<$from_t> for $name {
				fn from(other: $from_t) -> Self {
					match other {
						$($from_t::$from_variant(e) => $name::$to_variant(From::from(e))),+
					}
				}
			}

			impl TryFrom<$name> for $from_t {
				type Error = $name;
				fn try_from(other: $name) -> Result<Self, Self::Error> {
					match other {
						$(
							$name::$to_variant(e) => Ok($from_t::$from_variant(From::from(e)))
						),+
						,
						#[allow(unreachable_patterns)]
						_ => Err(other)
					}
				}
			}
		)*
	};
}

/// Define the named status codes reported by the filter wheel.
///
/// Concatenates the words of each name before defining the constants.
macro_rules! define_wheel_codes {
	// Entry point.
	//
	// Serves to concatenate the parts of the name before defining the constants.
	(
		$(
			$num:literal: $($name_word:ident)+
		),+
		$(,)?
	) => {
		paste::paste! {
			define_wheel_codes!{@with_concatenated_name
				$(
					$num: $($name_word)+, [< $($name_word:camel)+ >]
				),+
			}
		}
	};
	(@with_concatenated_name
		$(
			$num:literal: $($name_word:ident)+, $name:ident
		),+
	) => {
		paste::paste! {
			#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "wheel")))]
			pub mod wheel_code {
				//! Filter wheel status codes.
				//!
				//! Their meaning was inferred from observing a single device. The
				//! known codes in numerical order are:
				#![doc =
				$( "* `" $num "`: [`" $name:snake:upper "`]\n\n" )+
				]

				$(
					#[doc = $(" " $name_word)+ " (code `" $num "`)." ]
					pub const [< $name:snake:upper >] : u8 = $num;
				)+

				/// Get the name of a status code.
				///
				/// If the code is not recognized, `None` is returned.
				pub const fn name(code: u8) -> Option<&'static str> {
					match code {
						$(
							$num => Some(stringify!($($name_word)+)),
						)+
						_ => None,
					}
				}
			}
		}
	};
}

#[cfg(feature = "wheel")]
define_wheel_codes! {
	1: Stable,
	4: Moving,
	6: Fault,
}

/// A convenience function for determining if an I/O error is due to a timeout.
macro_rules! impl_is_timeout {
	($name:ident) => {
		impl $name {
			/// A convenience function for determining if the error is due to the
			/// transport timing out.
			pub fn is_timeout(&self) -> bool {
				matches!(self, $name::Io(e) if e.kind() == std::io::ErrorKind::TimedOut)
			}
		}
	};
}

/// The specified device could not be opened.
///
/// It is either disconnected, already in use by another process, or the
/// current user lacks the permissions to access it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct DeviceUnavailableError {
	/// The USB vendor ID.
	vendor_id: u16,
	/// The USB product ID.
	product_id: u16,
	/// The reason reported by the HID library.
	reason: Box<str>,
}

impl DeviceUnavailableError {
	/// Create a new error.
	#[cfg_attr(not(feature = "hid"), allow(dead_code))]
	pub(crate) fn new(vendor_id: u16, product_id: u16, reason: String) -> Self {
		DeviceUnavailableError {
			vendor_id,
			product_id,
			reason: reason.into_boxed_str(),
		}
	}

	/// The USB vendor and product IDs that were requested.
	pub fn ids(&self) -> (u16, u16) {
		(self.vendor_id, self.product_id)
	}
}

impl_error_display! {
	DeviceUnavailableError,
	self => "unable to open device {:04x}:{:04x}: {}",
	self.vendor_id,
	self.product_id,
	self.reason
}

/// The direction of a feature-report transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
	/// Host to device.
	Send,
	/// Device to host.
	Receive,
}

/// A feature-report transfer moved an unexpected number of bytes.
///
/// Feature-report transactions are atomic, so this indicates a framing
/// problem rather than a transient error and is never retried.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ReportLengthError {
	/// The direction of the transfer.
	direction: Direction,
	/// The number of bytes expected.
	expected: usize,
	/// The number of bytes transferred.
	actual: usize,
}

impl ReportLengthError {
	/// Create a new error.
	pub(crate) const fn new(direction: Direction, expected: usize, actual: usize) -> Self {
		ReportLengthError {
			direction,
			expected,
			actual,
		}
	}

	/// The direction of the failed transfer.
	pub const fn direction(&self) -> Direction {
		self.direction
	}

	/// The number of bytes that were expected.
	pub const fn expected(&self) -> usize {
		self.expected
	}

	/// The number of bytes actually transferred.
	pub const fn actual(&self) -> usize {
		self.actual
	}
}

impl_error_display! {
	ReportLengthError,
	self => "{} transferred {} bytes instead of {}",
	match self.direction {
		Direction::Send => "sending feature report",
		Direction::Receive => "receiving feature report",
	},
	self.actual,
	self.expected
}

/// A filter wheel slot outside of the supported range was requested.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct InvalidSlotError {
	/// The requested slot.
	slot: u8,
	/// The highest valid slot.
	max: u8,
}

impl InvalidSlotError {
	/// Create a new error.
	#[cfg_attr(not(feature = "wheel"), allow(dead_code))]
	pub(crate) const fn new(slot: u8, max: u8) -> Self {
		InvalidSlotError { slot, max }
	}

	/// The requested slot.
	pub const fn slot(&self) -> u8 {
		self.slot
	}
}

impl_error_display! {
	InvalidSlotError,
	self => "invalid filter slot {} requested (valid slots are 1 to {})",
	self.slot,
	self.max
}

/// A focuser position outside of the device's range was requested.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct InvalidTargetError {
	/// The resolved target position.
	requested: i64,
	/// The maximum position reported by the device.
	max: u16,
}

impl InvalidTargetError {
	/// Create a new error.
	#[cfg_attr(not(feature = "focuser"), allow(dead_code))]
	pub(crate) const fn new(requested: i64, max: u16) -> Self {
		InvalidTargetError { requested, max }
	}

	/// The resolved target position.
	pub const fn requested(&self) -> i64 {
		self.requested
	}

	/// The maximum position reported by the device.
	pub const fn max(&self) -> u16 {
		self.max
	}
}

impl_error_display! {
	InvalidTargetError,
	self => "invalid target {} (valid positions are 0 to {})",
	self.requested,
	self.max
}

/// A target could not be parsed from a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseTargetError(Box<str>);

impl ParseTargetError {
	/// Create a new error.
	#[cfg_attr(not(feature = "focuser"), allow(dead_code))]
	pub(crate) fn new(input: &str) -> Self {
		ParseTargetError(input.into())
	}
}

impl_error_display! {
	ParseTargetError,
	self => "invalid position requested: {:?}", self.0
}

/// The device reported a state it cannot recover from without a physical reset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceFaultError {
	/// The raw status code.
	status: u8,
	/// The raw error code.
	code: u8,
	/// The full status frame.
	frame: Box<[u8]>,
}

impl DeviceFaultError {
	/// Create a new error.
	#[cfg_attr(not(feature = "wheel"), allow(dead_code))]
	pub(crate) fn new(status: u8, code: u8, frame: &[u8]) -> Self {
		DeviceFaultError {
			status,
			code,
			frame: frame.into(),
		}
	}

	/// The raw status code.
	pub const fn status(&self) -> u8 {
		self.status
	}

	/// The raw error code. Its meaning is unknown.
	pub const fn code(&self) -> u8 {
		self.code
	}

	/// The full status frame.
	pub fn frame(&self) -> &[u8] {
		&self.frame
	}
}

impl_error_display! {
	DeviceFaultError,
	self => "unrecoverable device error (status {}, error code {}), needs physical reset: {}",
	self.status,
	self.code,
	Hex(&self.frame)
}

/// The filter wheel did not reach its target within the configured number of steps.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StepLimitError {
	/// The step limit.
	limit: usize,
	/// The last settled slot.
	slot: u8,
	/// The target slot.
	target: u8,
}

impl StepLimitError {
	/// Create a new error.
	#[cfg_attr(not(feature = "wheel"), allow(dead_code))]
	pub(crate) const fn new(limit: usize, slot: u8, target: u8) -> Self {
		StepLimitError {
			limit,
			slot,
			target,
		}
	}

	/// The last slot the wheel settled at.
	pub const fn slot(&self) -> u8 {
		self.slot
	}
}

impl_error_display! {
	StepLimitError,
	self => "filter wheel still at slot {} after {} steps towards slot {}",
	self.slot,
	self.limit,
	self.target
}

error_enum! {
	/// Any error returned by the report codecs.
	#[derive(Debug, Copy, Clone, PartialEq, Eq)]
	pub enum CodecError {
		InvalidSlot(InvalidSlotError),
		ReportLength(ReportLengthError),
	}
}

error_enum! {
	/// Any error returned by this library.
	#[derive(Debug)]
	#[non_exhaustive]
	pub enum Error {
		DeviceUnavailable(DeviceUnavailableError),
		Io(std::io::Error),
		ReportLength(ReportLengthError),
		InvalidSlot(InvalidSlotError),
		InvalidTarget(InvalidTargetError),
		ParseTarget(ParseTargetError),
		DeviceFault(DeviceFaultError),
		StepLimit(StepLimitError),
	}

	impl From<CodecError> {
		InvalidSlot => InvalidSlot,
		ReportLength => ReportLength,
	}
}
impl_is_timeout! { Error }

impl Error {
	/// Whether the device is left in a state that needs a physical reset.
	///
	/// This is the case for fault reports and for any transport failure
	/// after the device was opened.
	pub fn requires_reset(&self) -> bool {
		matches!(
			self,
			Error::DeviceFault(_) | Error::ReportLength(_) | Error::Io(_)
		)
	}

	/// Whether the error was caused by invalid input, before any device I/O.
	pub fn is_invalid_input(&self) -> bool {
		matches!(
			self,
			Error::InvalidSlot(_) | Error::InvalidTarget(_) | Error::ParseTarget(_)
		)
	}
}
