//! Converging the focuser onto a target position.

#[cfg(feature = "hid")]
use crate::backend::Hid;
#[cfg(any(test, feature = "mock"))]
use crate::{backend::Mock, clock::VirtualClock};
use crate::{
	backend::Backend,
	clock::{Clock, ThreadClock},
	error::{Error, InvalidTargetError, ParseTargetError},
	focuser::{decode_position_report, encode_query_position, encode_set_position, FocuserState, FocuserStatus},
	port::{Port, DEFAULT_POLL_INTERVAL},
	ZWO_VENDOR_ID,
};
use std::{str::FromStr, time::Duration};

/// The USB product ID of the EAF focuser.
pub const PRODUCT_ID: u16 = 0x1f10;

/// A requested focuser position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Target {
	/// An absolute position.
	Absolute(u16),
	/// An offset from the position the focuser settles at before moving.
	Relative(i32),
}

impl Target {
	/// Resolve the target against the current position and the device's maximum.
	///
	/// ## Errors
	///
	/// An error is returned if the resulting position is outside `0..=max`.
	pub fn resolve(self, current: u16, max: u16) -> Result<u16, InvalidTargetError> {
		let requested = match self {
			Target::Absolute(pos) => i64::from(pos),
			Target::Relative(offset) => i64::from(current) + i64::from(offset),
		};
		match u16::try_from(requested) {
			Ok(pos) if pos <= max => Ok(pos),
			_ => Err(InvalidTargetError::new(requested, max)),
		}
	}
}

/// Parse `"N"` as an absolute position and `"+N"` or `"-N"` as a relative one.
///
/// The magnitude must fit in a `u16`.
impl FromStr for Target {
	type Err = ParseTargetError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (sign, digits) = match s.as_bytes().first() {
			Some(b'+') => (Some(1), &s[1..]),
			Some(b'-') => (Some(-1), &s[1..]),
			_ => (None, s),
		};
		if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
			return Err(ParseTargetError::new(s));
		}
		let magnitude: u16 = digits.parse().map_err(|_| ParseTargetError::new(s))?;
		Ok(match sign {
			Some(sign) => Target::Relative(sign * i32::from(magnitude)),
			None => Target::Absolute(magnitude),
		})
	}
}

/// Options for configuring and opening a focuser.
///
/// ## Example
///
/// ```no_run
/// # #[cfg(feature = "hid")]
/// # fn wrapper() -> Result<(), zwohid::error::Error> {
/// use std::time::Duration;
/// use zwohid::focuser::OpenOptions;
///
/// let focuser = OpenOptions::new()
///     .poll_interval(Duration::from_millis(250))
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
}

impl OpenOptions {
	/// Create a blank set of options ready for configuration.
	///
	/// The default poll interval is 500 milliseconds.
	///
	/// Equivalent to [`default`](OpenOptions::default).
	pub fn new() -> Self {
		OpenOptions {
			vendor_id: ZWO_VENDOR_ID,
			product_id: PRODUCT_ID,
			poll_interval: DEFAULT_POLL_INTERVAL,
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

	/// Open the first matching USB device with the custom options.
	#[cfg(feature = "hid")]
	#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "hid")))]
	pub fn open(&self) -> Result<Focuser<Hid>, Error> {
		Ok(self.open_backend(Hid::open(self.vendor_id, self.product_id)?))
	}

	/// Wrap an already open backend with the custom options.
	pub fn open_backend<B: Backend>(&self, backend: B) -> Focuser<B> {
		self.open_backend_with_clock(backend, ThreadClock)
	}

	/// Wrap an already open backend and a clock with the custom options.
	pub fn open_backend_with_clock<B: Backend, C: Clock>(&self, backend: B, clock: C) -> Focuser<B, C> {
		Focuser {
			port: Port::with_clock(backend, clock, self.poll_interval),
		}
	}
}

impl Default for OpenOptions {
	fn default() -> Self {
		OpenOptions::new()
	}
}

/// A ZWO EAF focuser.
///
/// See the [`focuser`](crate::focuser) module documentation for details on
/// how to use a `Focuser`. The device is released when the value is dropped.
#[derive(Debug)]
pub struct Focuser<B, C = ThreadClock> {
	/// The session with the device
	port: Port<B, C>,
}

#[cfg(feature = "hid")]
#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "hid")))]
impl Focuser<Hid> {
	/// Open the first EAF focuser using the default options.
	///
	/// Alternatively, use [`OpenOptions`] to customize how the focuser is opened.
	pub fn open() -> Result<Focuser<Hid>, Error> {
		OpenOptions::new().open()
	}
}

#[cfg(any(test, feature = "mock"))]
impl Focuser<Mock, VirtualClock> {
	/// Open a mock focuser that waits in virtual time.
	pub fn open_mock() -> Focuser<Mock, VirtualClock> {
		OpenOptions::new().open_backend_with_clock(Mock::new(), VirtualClock::new())
	}
}

/// Query and decode one position report.
fn query<B: Backend, C: Clock>(port: &mut Port<B, C>) -> Result<FocuserStatus, Error> {
	let buf = port.tx_rx(&encode_query_position())?;
	Ok(decode_position_report(&buf)?)
}

impl<B: Backend, C: Clock> Focuser<B, C> {
	/// Command the focuser to move to the absolute position `pos`.
	///
	/// The command is not acknowledged; poll [`status`](Focuser::status) to
	/// follow the motion.
	pub fn set_position(&mut self, pos: u16) -> Result<(), Error> {
		self.port.tx(&encode_set_position(pos))
	}

	/// Read the focuser's current status.
	pub fn status(&mut self) -> Result<FocuserStatus, Error> {
		query(&mut self.port)
	}

	/// Poll the focuser until it is not moving.
	///
	/// This handles a focuser that is still moving from an earlier command. It
	/// waits indefinitely.
	pub fn settle(&mut self) -> Result<FocuserStatus, Error> {
		self.port.poll_until(|port| {
			let status = query(port)?;
			Ok((!status.is_moving()).then_some(status))
		})
	}

	/// Move the focuser to `target` and wait until it has stopped there.
	///
	/// On success the final position is returned.
	///
	/// ## Errors
	///
	/// An [`InvalidTarget`](Error::InvalidTarget) error is returned, without
	/// moving the focuser, if the target is outside of the focuser's range.
	/// Any transport failure is returned immediately and leaves the focuser
	/// needing a physical reset.
	pub fn move_to(&mut self, target: Target) -> Result<u16, Error> {
		self.move_to_with_progress(target, |_, _| {})
	}

	/// Like [`move_to`](Focuser::move_to), but call `progress` with every
	/// status polled after the move was commanded, along with the target.
	pub fn move_to_with_progress<F>(&mut self, target: Target, progress: F) -> Result<u16, Error>
	where
		F: FnMut(&FocuserStatus, u16),
	{
		let current = self.settle()?;
		self.move_from_settled(&current, target, progress)
	}

	/// Like [`move_to_with_progress`](Focuser::move_to_with_progress), but
	/// start from `current`, a status already returned by
	/// [`settle`](Focuser::settle), instead of settling again.
	pub fn move_from_settled<F>(
		&mut self,
		current: &FocuserStatus,
		target: Target,
		mut progress: F,
	) -> Result<u16, Error>
	where
		F: FnMut(&FocuserStatus, u16),
	{
		log::info!(
			"current pos = {} (max {})",
			current.position(),
			current.max()
		);
		let target = target.resolve(current.position(), current.max())?;
		log::info!("requesting target {target}");
		self.set_position(target)?;

		// The focuser finishes the move on its own, so the command is never repeated.
		self.port.poll_until(|port| {
			let status = query(port)?;
			log::info!("current pos = {} (target {target})", status.position());
			progress(&status, target);
			Ok((status.state() == FocuserState::Settled(target)).then_some(target))
		})
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

#[cfg(test)]
mod test {
	use super::*;
	use crate::focuser::codec::test::frame;
	use std::io;

	/// Queue a position report that never has the undefined byte set.
	fn push(focuser: &mut Focuser<Mock, VirtualClock>, moving: bool, position: u16) {
		focuser.port_mut().backend_mut().push(frame(moving, position, 0x32));
	}

	fn sent(focuser: &Focuser<Mock, VirtualClock>) -> Vec<Vec<u8>> {
		focuser.port().backend().sent().to_vec()
	}

	fn query_bytes() -> Vec<u8> {
		encode_query_position().as_bytes().to_vec()
	}

	fn set_bytes(pos: u16) -> Vec<u8> {
		encode_set_position(pos).as_bytes().to_vec()
	}

	#[test]
	fn parse_targets() {
		assert_eq!("26000".parse::<Target>(), Ok(Target::Absolute(26000)));
		assert_eq!("+100".parse::<Target>(), Ok(Target::Relative(100)));
		assert_eq!("-500".parse::<Target>(), Ok(Target::Relative(-500)));
		assert_eq!("-65535".parse::<Target>(), Ok(Target::Relative(-65535)));
		assert_eq!("0".parse::<Target>(), Ok(Target::Absolute(0)));
		for bad in ["", "+", "-", "65536", "12a", "--5", " 5", "-1.5"] {
			assert!(bad.parse::<Target>().is_err(), "{bad:?} parsed");
		}
	}

	#[test]
	fn resolve_targets() {
		assert_eq!(Target::Absolute(26000).resolve(25000, 26000), Ok(26000));
		assert_eq!(Target::Relative(-500).resolve(25000, 60000), Ok(24500));
		assert_eq!(Target::Relative(0).resolve(0, 0), Ok(0));

		let err = Target::Absolute(26001).resolve(25000, 26000).unwrap_err();
		assert_eq!(err.requested(), 26001);
		assert_eq!(err.max(), 26000);
		let err = Target::Relative(-25001).resolve(25000, 60000).unwrap_err();
		assert_eq!(err.requested(), -1);
		let err = Target::Relative(65535).resolve(25000, 60000).unwrap_err();
		assert_eq!(err.requested(), 90535);
	}

	#[test]
	fn settle_waits_for_motion_to_stop() {
		let mut focuser = Focuser::open_mock();
		push(&mut focuser, true, 100);
		push(&mut focuser, true, 200);
		push(&mut focuser, false, 300);

		let status = focuser.settle().unwrap();
		assert_eq!(status.position(), 300);
		assert_eq!(focuser.port().clock().sleeps(), 2);
		assert_eq!(sent(&focuser), vec![query_bytes(); 3]);
	}

	#[test]
	fn move_absolute() {
		let mut focuser = Focuser::open_mock();
		push(&mut focuser, false, 25000);
		push(&mut focuser, true, 25046);
		push(&mut focuser, true, 25176);
		// Reaching the position is not enough, the motor must also stop.
		push(&mut focuser, true, 26000);
		push(&mut focuser, false, 26000);

		let mut seen = Vec::new();
		let reached = focuser
			.move_to_with_progress(Target::Absolute(26000), |status, target| {
				seen.push((status.position(), target));
			})
			.unwrap();
		assert_eq!(reached, 26000);
		assert_eq!(
			seen,
			vec![(25046, 26000), (25176, 26000), (26000, 26000), (26000, 26000)]
		);

		let sent = sent(&focuser);
		assert_eq!(sent.len(), 6);
		assert_eq!(sent[0], query_bytes());
		assert_eq!(sent[1], set_bytes(26000));
		assert!(sent[2..].iter().all(|report| *report == query_bytes()));
		assert_eq!(focuser.port().clock().sleeps(), 3);
		assert_eq!(focuser.port().backend().pending(), 0);
	}

	#[test]
	fn move_relative() {
		let mut focuser = Focuser::open_mock();
		push(&mut focuser, false, 25000);
		push(&mut focuser, true, 24800);
		push(&mut focuser, false, 24500);

		let reached = focuser.move_to("-500".parse::<Target>().unwrap()).unwrap();
		assert_eq!(reached, 24500);
		assert_eq!(sent(&focuser)[1], set_bytes(24500));
	}

	#[test]
	fn move_waits_for_earlier_motion_first() {
		let mut focuser = Focuser::open_mock();
		push(&mut focuser, true, 1000);
		push(&mut focuser, false, 1200);
		push(&mut focuser, false, 1300);

		// The relative move is resolved against the settled position.
		let reached = focuser.move_to(Target::Relative(100)).unwrap();
		assert_eq!(reached, 1300);
		assert_eq!(sent(&focuser)[2], set_bytes(1300));
	}

	#[test]
	fn move_from_settled_skips_the_initial_query() {
		let mut focuser = Focuser::open_mock();
		push(&mut focuser, false, 25000);
		push(&mut focuser, false, 24500);

		let current = focuser.settle().unwrap();
		let reached = focuser
			.move_from_settled(&current, Target::Relative(-500), |_, _| {})
			.unwrap();
		assert_eq!(reached, 24500);
		assert_eq!(
			sent(&focuser),
			vec![query_bytes(), set_bytes(24500), query_bytes()]
		);
	}

	#[test]
	fn invalid_target_sends_nothing() {
		let mut focuser = Focuser::open_mock();
		push(&mut focuser, false, 25000);

		let err = focuser.move_to(Target::Absolute(60001)).unwrap_err();
		assert!(matches!(err, Error::InvalidTarget(_)));
		assert!(err.is_invalid_input());
		assert_eq!(sent(&focuser), vec![query_bytes()]);
	}

	#[test]
	fn transport_failure_while_moving_is_a_fault() {
		let mut focuser = Focuser::open_mock();
		push(&mut focuser, false, 25000);
		push(&mut focuser, true, 25046);
		focuser.port_mut().backend_mut().push([0x01, 0x7e]);

		let err = focuser.move_to(Target::Absolute(26000)).unwrap_err();
		assert!(matches!(err, Error::ReportLength(_)));
		assert!(crate::Outcome::<u16>::from(Err(err)).is_fault());
	}

	#[test]
	fn io_failure_is_returned_and_device_released() {
		let mut focuser = Focuser::open_mock();
		let closed = focuser.port().backend().closed_flag();
		focuser
			.port_mut()
			.backend_mut()
			.send_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));

		let err = focuser.set_position(100).unwrap_err();
		assert!(matches!(err, Error::Io(_)));
		drop(focuser);
		assert!(closed.get());
	}
}
