//! Converging the filter wheel onto a target slot, one slot at a time.

#[cfg(feature = "hid")]
use crate::backend::Hid;
#[cfg(any(test, feature = "mock"))]
use crate::{backend::Mock, clock::VirtualClock};
use crate::{
	backend::Backend,
	clock::{Clock, ThreadClock},
	error::{DeviceFaultError, Error, InvalidSlotError, StepLimitError},
	port::{Port, DEFAULT_POLL_INTERVAL},
	report::REPORT_LEN,
	wheel::{
		decode_info_report, decode_slot_report, encode_get_info, encode_query_slot, encode_set_slot,
		next_slot, WheelInfo, WheelState, WheelStatus, SLOT_COUNT,
	},
	ZWO_VENDOR_ID,
};
use std::time::Duration;

/// The USB product ID of the EFW filter wheel.
pub const PRODUCT_ID: u16 = 0x1f01;

/// The default number of polls to wait for the wheel to settle after each step.
pub const DEFAULT_SETTLE_ATTEMPTS: usize = 100;

/// Options for configuring and opening a filter wheel.
///
/// ## Example
///
/// ```no_run
/// # #[cfg(feature = "hid")]
/// # fn wrapper() -> Result<(), zwohid::error::Error> {
/// use zwohid::wheel::OpenOptions;
///
/// let wheel = OpenOptions::new()
///     .settle_attempts(40)
///     .step_limit(Some(14))
///     .open()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpenOptions {
	/// The USB vendor ID
	#[cfg_attr(not(feature = "hid"), allow(dead_code))]
	vendor_id: u16,
	/// The USB product ID
	#[cfg_attr(not(feature = "hid"), allow(dead_code))]
	product_id: u16,
	/// The delay between status polls
	poll_interval: Duration,
	/// The number of polls to wait for each step to settle
	settle_attempts: usize,
	/// The maximum number of steps in one move, if any
	step_limit: Option<usize>,
}

impl OpenOptions {
	/// Create a blank set of options ready for configuration.
	///
	/// The following defaults are used:
	///  * poll interval: 500 milliseconds
	///  * settle attempts: 100
	///  * step limit: none
	///
	/// Equivalent to [`default`](OpenOptions::default).
	pub fn new() -> Self {
		OpenOptions {
			vendor_id: ZWO_VENDOR_ID,
			product_id: PRODUCT_ID,
			poll_interval: DEFAULT_POLL_INTERVAL,
			settle_attempts: DEFAULT_SETTLE_ATTEMPTS,
			step_limit: None,
		}
	}

	/// Set a custom USB vendor ID.
	pub fn vendor_id(&mut self, vendor_id: u16) -> &mut Self {
		self.vendor_id = vendor_id;
		self
	}

	/// Set a custom USB product ID.
	pub fn product_id(&mut self, product_id: u16) -> &mut Self {
		self.product_id = product_id;
		self
	}

	/// Set a custom delay between status polls.
	pub fn poll_interval(&mut self, interval: Duration) -> &mut Self {
		self.poll_interval = interval;
		self
	}

	/// Set how many polls to wait for the wheel to settle after each step.
	///
	/// Running out of attempts is not an error: the step is simply commanded
	/// again from wherever the wheel last settled. At least one attempt is
	/// always made, so `0` is treated as `1`.
	pub fn settle_attempts(&mut self, attempts: usize) -> &mut Self {
		self.settle_attempts = attempts.max(1);
		self
	}

	/// Limit the number of steps commanded in one move.
	///
	/// `None`, the default, means there is no limit.
	pub fn step_limit(&mut self, limit: Option<usize>) -> &mut Self {
		self.step_limit = limit;
		self
	}

	/// Open the first matching USB device with the custom options.
	#[cfg(feature = "hid")]
	#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "hid")))]
	pub fn open(&self) -> Result<Wheel<Hid>, Error> {
		Ok(self.open_backend(Hid::open(self.vendor_id, self.product_id)?))
	}

	/// Wrap an already open backend with the custom options.
	pub fn open_backend<B: Backend>(&self, backend: B) -> Wheel<B> {
		self.open_backend_with_clock(backend, ThreadClock)
	}

	/// Wrap an already open backend and a clock with the custom options.
	pub fn open_backend_with_clock<B: Backend, C: Clock>(&self, backend: B, clock: C) -> Wheel<B, C> {
		Wheel {
			port: Port::with_clock(backend, clock, self.poll_interval),
			settle_attempts: self.settle_attempts,
			step_limit: self.step_limit,
		}
	}
}

impl Default for OpenOptions {
	fn default() -> Self {
		OpenOptions::new()
	}
}

/// Progress reported while the wheel moves.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WheelEvent {
	/// A single step from one slot to the next is about to be commanded.
	Step {
		/// The slot the wheel last settled at.
		from: u8,
		/// The commanded slot.
		to: u8,
	},
	/// The wheel settled at a slot, or stopped being polled, after a step.
	Slot(u8),
}

/// A ZWO EFW filter wheel.
///
/// See the [`wheel`](crate::wheel) module documentation for details on how
/// to use a `Wheel`. The device is released when the value is dropped.
#[derive(Debug)]
pub struct Wheel<B, C = ThreadClock> {
	/// The session with the device
	port: Port<B, C>,
	/// The number of polls to wait for each step to settle
	settle_attempts: usize,
	/// The maximum number of steps in one move, if any
	step_limit: Option<usize>,
}

#[cfg(feature = "hid")]
#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "hid")))]
impl Wheel<Hid> {
	/// Open the first EFW filter wheel using the default options.
	///
	/// Alternatively, use [`OpenOptions`] to customize how the wheel is opened.
	pub fn open() -> Result<Wheel<Hid>, Error> {
		OpenOptions::new().open()
	}
}

#[cfg(any(test, feature = "mock"))]
impl Wheel<Mock, VirtualClock> {
	/// Open a mock filter wheel that waits in virtual time.
	pub fn open_mock() -> Wheel<Mock, VirtualClock> {
		OpenOptions::new().open_backend_with_clock(Mock::new(), VirtualClock::new())
	}
}

/// Query and decode one slot report, converting a fault into an error.
fn poll_slot<B: Backend, C: Clock>(port: &mut Port<B, C>) -> Result<WheelStatus, Error> {
	let buf = port.tx_rx(&encode_query_slot())?;
	let status = decode_slot_report(&buf)?;
	if status.state() == WheelState::Fault {
		let err = DeviceFaultError::new(status.status(), status.error_code(), &buf[..REPORT_LEN]);
		log::error!("{err}");
		return Err(err.into());
	}
	Ok(status)
}

impl<B: Backend, C: Clock> Wheel<B, C> {
	/// Read the wheel's identification.
	pub fn info(&mut self) -> Result<WheelInfo, Error> {
		let buf = self.port.tx_rx(&encode_get_info())?;
		Ok(decode_info_report(&buf)?)
	}

	/// The USB manufacturer string, if the device reports one.
	pub fn manufacturer(&self) -> Result<Option<String>, Error> {
		Ok(self.port.backend().manufacturer()?)
	}

	/// The USB product string, if the device reports one.
	pub fn product(&self) -> Result<Option<String>, Error> {
		Ok(self.port.backend().product()?)
	}

	/// Read the wheel's current status.
	///
	/// Unlike the other methods, a fault report is returned as a status rather
	/// than an error.
	pub fn status(&mut self) -> Result<WheelStatus, Error> {
		let buf = self.port.tx_rx(&encode_query_slot())?;
		Ok(decode_slot_report(&buf)?)
	}

	/// Poll the wheel until it reports that it has settled.
	///
	/// This handles a wheel that is still moving from an earlier command. It
	/// waits indefinitely.
	///
	/// ## Errors
	///
	/// A [`DeviceFault`](Error::DeviceFault) error is returned as soon as the
	/// wheel reports a fault.
	pub fn settle(&mut self) -> Result<WheelStatus, Error> {
		let status = self.port.poll_until(|port| {
			let status = poll_slot(port)?;
			Ok(matches!(status.state(), WheelState::Settled(_)).then_some(status))
		})?;
		if status.slot_count() != SLOT_COUNT {
			log::warn!(
				"wheel reports {} slots, only {SLOT_COUNT} slot wheels are supported",
				status.slot_count()
			);
		}
		Ok(status)
	}

	/// Command a single step forwards from `current` and wait for the wheel
	/// to settle at the next slot.
	///
	/// The last slot the wheel settled at is returned. That is `current` if it
	/// never settled within the configured number of attempts.
	pub fn step(&mut self, current: u8) -> Result<u8, Error> {
		let next = next_slot(current);
		log::info!("request slot {next}");
		self.port.tx(&encode_set_slot(next)?)?;

		// The wheel takes a moment to start moving, so being settled is only
		// enough once it has settled at the commanded slot.
		let mut slot = current;
		let reached = self.port.poll_attempts(self.settle_attempts, |port| {
			if let WheelState::Settled(settled) = poll_slot(port)?.state() {
				slot = settled;
			}
			Ok((slot == next).then_some(()))
		})?;
		if reached.is_none() {
			log::warn!(
				"wheel did not settle at slot {next} after {} polls",
				self.settle_attempts
			);
		}
		log::info!("current slot = {slot}");
		Ok(slot)
	}

	/// Move the wheel to `target` and wait until it has settled there.
	///
	/// On success the final slot is returned.
	///
	/// ## Errors
	///
	/// An [`InvalidSlot`](Error::InvalidSlot) error is returned, without
	/// communicating with the wheel, unless `1 <= target <= 7`. A
	/// [`DeviceFault`](Error::DeviceFault) error is returned as soon as the
	/// wheel reports a fault, and a [`StepLimit`](Error::StepLimit) error if
	/// a step limit was configured and exceeded.
	///
	/// Only 7 slot wheels are supported: the target is checked against
	/// [`SLOT_COUNT`] rather than the slot count the wheel reports, and a
	/// wheel reporting a different count is only logged as a warning.
	pub fn move_to(&mut self, target: u8) -> Result<u8, Error> {
		self.move_to_with_progress(target, |_| {})
	}

	/// Like [`move_to`](Wheel::move_to), but call `progress` before each step
	/// and with the slot reached after it.
	pub fn move_to_with_progress<F>(&mut self, target: u8, mut progress: F) -> Result<u8, Error>
	where
		F: FnMut(WheelEvent),
	{
		if !(1..=SLOT_COUNT).contains(&target) {
			return Err(InvalidSlotError::new(target, SLOT_COUNT).into());
		}
		let mut slot = self.settle()?.slot();
		let mut steps = 0;
		while slot != target {
			if let Some(limit) = self.step_limit {
				if steps >= limit {
					return Err(StepLimitError::new(limit, slot, target).into());
				}
			}
			progress(WheelEvent::Step {
				from: slot,
				to: next_slot(slot),
			});
			slot = self.step(slot)?;
			steps += 1;
			progress(WheelEvent::Slot(slot));
		}
		log::info!("final slot = {slot}");
		Ok(slot)
	}

	/// The delay between status polls.
	pub fn poll_interval(&self) -> Duration {
		self.port.poll_interval()
	}

	/// Get a shared reference to the underlying port.
	pub fn port(&self) -> &Port<B, C> {
		&self.port
	}

	/// Get an exclusive reference to the underlying port.
	pub fn port_mut(&mut self) -> &mut Port<B, C> {
		&mut self.port
	}
}
