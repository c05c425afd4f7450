//! A transport session for exchanging feature reports with one device.
//!
//! A [`Port`] exclusively owns its [`Backend`] for as long as it lives, so only
//! one command or poll can be in flight at a time. Dropping the port releases
//! the device handle, whichever way the caller exits.

#[cfg(any(test, feature = "mock"))]
use crate::{backend::Mock, clock::VirtualClock};
use crate::{
	backend::{Backend, UNKNOWN_BACKEND_NAME},
	clock::{Clock, ThreadClock},
	error::{Direction, Error, ReportLengthError},
	report::{Hex, Report, IN_BUFFER_LEN, IN_REPORT_ID, REPORT_LEN},
};
use std::time::Duration;

/// The default delay between status polls.
///
/// The devices are slow mechanical systems with multi-second settle times, so
/// the interval is fixed rather than backing off.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A session for transmitting and receiving feature reports.
#[derive(Debug)]
pub struct Port<B, C = ThreadClock> {
	/// The backend to transmit/receive reports with
	backend: B,
	/// The clock used to wait between polls
	clock: C,
	/// The delay between polls
	poll_interval: Duration,
}

impl<B: Backend> Port<B> {
	/// Get a `Port` from the given backend that waits using the real clock.
	pub fn from_backend(backend: B) -> Port<B> {
		Port::with_clock(backend, ThreadClock, DEFAULT_POLL_INTERVAL)
	}
}

#[cfg(any(test, feature = "mock"))]
impl Port<Mock, VirtualClock> {
	/// Open a mock port that waits in virtual time.
	pub fn open_mock() -> Port<Mock, VirtualClock> {
		Port::with_clock(Mock::new(), VirtualClock::new(), DEFAULT_POLL_INTERVAL)
	}
}

impl<B: Backend, C: Clock> Port<B, C> {
	/// Get a `Port` from the given backend and clock.
	pub fn with_clock(backend: B, clock: C, poll_interval: Duration) -> Port<B, C> {
		Port {
			backend,
			clock,
			poll_interval,
		}
	}

	/// The name of the underlying backend, for diagnostics.
	fn name(&self) -> String {
		self.backend
			.name()
			.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string())
	}

	/// Transmit a report.
	///
	/// ## Errors
	///
	/// An error is returned if the transport fails or transfers anything other
	/// than exactly [`REPORT_LEN`] bytes.
	pub fn tx(&mut self, report: &Report) -> Result<(), Error> {
		log::debug!("{} TX: {}", self.name(), report);
		let n = self.backend.send_feature_report(report.as_ref())?;
		if n != REPORT_LEN {
			return Err(ReportLengthError::new(Direction::Send, REPORT_LEN, n).into());
		}
		Ok(())
	}

	/// Receive a report.
	///
	/// The returned buffer starts with the inbound report ID and is only valid
	/// for the first [`REPORT_LEN`] bytes.
	///
	/// ## Errors
	///
	/// An error is returned if the transport fails or transfers anything other
	/// than exactly [`REPORT_LEN`] bytes.
	pub fn rx(&mut self) -> Result<[u8; IN_BUFFER_LEN], Error> {
		let mut buf = [0u8; IN_BUFFER_LEN];
		buf[0] = IN_REPORT_ID;
		let n = self.backend.get_feature_report(&mut buf)?;
		log::debug!("{} RX: {}", self.name(), Hex(&buf[..n.min(IN_BUFFER_LEN)]));
		if n != REPORT_LEN {
			return Err(ReportLengthError::new(Direction::Receive, REPORT_LEN, n).into());
		}
		Ok(buf)
	}

	/// Transmit a query and then receive the device's report.
	pub fn tx_rx(&mut self, report: &Report) -> Result<[u8; IN_BUFFER_LEN], Error> {
		self.tx(report)?;
		self.rx()
	}

	/// Block for one poll interval.
	pub fn pause(&mut self) {
		self.clock.sleep(self.poll_interval);
	}

	/// Call `poll` until it returns `Some` value, pausing for one poll interval
	/// after every attempt that does not.
	///
	/// There is no limit on the number of attempts. Any error is returned
	/// immediately.
	pub fn poll_until<T, F>(&mut self, mut poll: F) -> Result<T, Error>
	where
		F: FnMut(&mut Self) -> Result<Option<T>, Error>,
	{
		loop {
			if let Some(value) = poll(self)? {
				return Ok(value);
			}
			self.pause();
		}
	}

	/// Like [`poll_until`](Port::poll_until), but give up and return `None`
	/// after `attempts` attempts.
	pub fn poll_attempts<T, F>(&mut self, attempts: usize, mut poll: F) -> Result<Option<T>, Error>
	where
		F: FnMut(&mut Self) -> Result<Option<T>, Error>,
	{
		for _ in 0..attempts {
			if let Some(value) = poll(self)? {
				return Ok(Some(value));
			}
			self.pause();
		}
		Ok(None)
	}

	/// The delay between polls.
	pub fn poll_interval(&self) -> Duration {
		self.poll_interval
	}

	/// Get a shared reference to the backend.
	pub fn backend(&self) -> &B {
		&self.backend
	}

	/// Get an exclusive reference to the backend.
	pub fn backend_mut(&mut self) -> &mut B {
		&mut self.backend
	}

	/// Get a shared reference to the clock.
	pub fn clock(&self) -> &C {
		&self.clock
	}

	/// Consume the port and return the backend without closing it.
	pub fn into_backend(self) -> B {
		self.backend
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io;

	#[test]
	fn tx_sends_whole_report() {
		let mut port = Port::open_mock();
		let report = Report::new([0x02, 0x03]);
		port.tx(&report).unwrap();
		assert_eq!(port.backend.sent(), &[report.as_bytes().to_vec()]);
	}

	#[test]
	fn short_transfers_fail() {
		let mut port = Port::open_mock();
		port.backend.send_len(Some(15));
		let err = port.tx(&Report::new([0x02, 0x03])).unwrap_err();
		let Error::ReportLength(err) = err else {
			panic!("unexpected error {err:?}");
		};
		assert_eq!(err.direction(), Direction::Send);
		assert_eq!(err.actual(), 15);

		port.backend.push([0x01, 0x7e, 0x5a]);
		let err = port.rx().unwrap_err();
		assert!(matches!(err, Error::ReportLength(e) if e.actual() == 3));
	}

	#[test]
	fn rx_returns_frame() {
		let mut port = Port::open_mock();
		let mut frame = [0u8; REPORT_LEN];
		frame[0] = IN_REPORT_ID;
		frame[1] = 0x7e;
		port.backend.push(frame);
		let buf = port.rx().unwrap();
		assert_eq!(&buf[..REPORT_LEN], &frame);
		assert_eq!(buf[REPORT_LEN], 0);
	}

	#[test]
	fn io_errors_propagate() {
		let mut port = Port::open_mock();
		port.backend
			.get_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));
		assert!(matches!(port.rx().unwrap_err(), Error::Io(_)));
		assert!(port.rx().unwrap_err().is_timeout());
	}

	#[test]
	fn poll_until_pauses_between_attempts() {
		let mut port = Port::open_mock();
		let mut calls = 0;
		let value = port
			.poll_until(|_| {
				calls += 1;
				Ok((calls == 3).then_some(calls))
			})
			.unwrap();
		assert_eq!(value, 3);
		assert_eq!(port.clock().sleeps(), 2);
		assert_eq!(port.clock().elapsed(), Duration::from_secs(1));

		let value: Option<()> = port.poll_attempts(4, |_| Ok(None)).unwrap();
		assert_eq!(value, None);
		assert_eq!(port.clock().sleeps(), 6);
	}

	#[test]
	fn dropping_the_port_closes_the_backend() {
		let port = Port::open_mock();
		let closed = port.backend().closed_flag();
		drop(port);
		assert!(closed.get());
	}
}
