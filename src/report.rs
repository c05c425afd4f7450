//! Feature-report framing shared by every device.
//!
//! Outbound reports are [`REPORT_LEN`] bytes and start with the report ID
//! [`OUT_REPORT_ID`] followed by the [`MAGIC`] bytes. Inbound reports are read
//! into a [`IN_BUFFER_LEN`] byte buffer whose first byte is the report ID
//! [`IN_REPORT_ID`]; the device fills [`REPORT_LEN`] bytes of it.
//!
//! All multi-byte fields are big-endian.

use std::fmt;

/// The number of bytes transferred by every feature report.
pub const REPORT_LEN: usize = 16;
/// The size of the buffer handed to the transport when reading a report.
///
/// Requesting any other length makes the devices reply with garbage.
pub const IN_BUFFER_LEN: usize = REPORT_LEN + 1;
/// The report ID of every outbound (host to device) report.
pub const OUT_REPORT_ID: u8 = 0x03;
/// The report ID of every inbound (device to host) report.
pub const IN_REPORT_ID: u8 = 0x01;
/// The two bytes following the report ID in every valid frame (`"~Z"`).
pub const MAGIC: [u8; 2] = [0x7e, 0x5a];

/// An outbound feature report.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Report([u8; REPORT_LEN]);

impl Report {
	/// Create a report with the given two-byte command header.
	///
	/// The report ID and magic are filled in and every other byte is zero.
	pub const fn new(header: [u8; 2]) -> Self {
		let mut bytes = [0u8; REPORT_LEN];
		bytes[0] = OUT_REPORT_ID;
		bytes[1] = MAGIC[0];
		bytes[2] = MAGIC[1];
		bytes[3] = header[0];
		bytes[4] = header[1];
		Report(bytes)
	}

	/// Set the byte at `index` and return the report.
	///
	/// Panics if `index` is out of bounds.
	pub(crate) const fn with(mut self, index: usize, value: u8) -> Self {
		self.0[index] = value;
		self
	}

	/// Set the big-endian `u16` starting at `index` and return the report.
	pub(crate) const fn with_u16(self, index: usize, value: u16) -> Self {
		let [hi, lo] = value.to_be_bytes();
		self.with(index, hi).with(index + 1, lo)
	}

	/// The report ID.
	pub const fn report_id(&self) -> u8 {
		self.0[0]
	}

	/// The raw bytes, starting with the report ID.
	pub const fn as_bytes(&self) -> &[u8; REPORT_LEN] {
		&self.0
	}
}

impl AsRef<[u8]> for Report {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

impl fmt::Display for Report {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", Hex(&self.0))
	}
}

/// Formats bytes as space-separated hex pairs.
#[derive(Debug, Copy, Clone)]
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, byte) in self.0.iter().enumerate() {
			if i > 0 {
				write!(f, " ")?;
			}
			write!(f, "{byte:02x}")?;
		}
		Ok(())
	}
}

/// Read a big-endian `u16` starting at `index`.
pub(crate) fn be16(buf: &[u8], index: usize) -> u16 {
	u16::from_be_bytes([buf[index], buf[index + 1]])
}

/// The bytes of an inbound frame that are expected to be constant.
///
/// Each entry is an `(index, value)` pair into the inbound buffer.
#[derive(Debug, Copy, Clone)]
pub struct Layout {
	/// The kind of report, used in diagnostics.
	pub(crate) kind: &'static str,
	/// The expected constant bytes.
	pub(crate) fixed: &'static [(usize, u8)],
}

impl Layout {
	/// Compare `frame` against the layout.
	///
	/// `None` is returned if every fixed byte matches. Indices past the end of
	/// `frame` count as mismatches.
	pub fn check(&self, frame: &[u8]) -> Option<ProtocolMismatch> {
		let offsets: Vec<usize> = self
			.fixed
			.iter()
			.filter(|(index, value)| frame.get(*index) != Some(value))
			.map(|(index, _)| *index)
			.collect();
		if offsets.is_empty() {
			None
		} else {
			Some(ProtocolMismatch {
				kind: self.kind,
				offsets,
				frame: frame.to_vec(),
			})
		}
	}

	/// Check `frame` and log any mismatch as a warning.
	///
	/// Mismatches never stop decoding: several bytes are known to vary
	/// between devices and firmware versions.
	pub(crate) fn warn_on_mismatch(&self, frame: &[u8]) {
		if let Some(mismatch) = self.check(frame) {
			log::warn!("{mismatch}");
		}
	}
}

/// An inbound frame contained unexpected values in bytes that are normally constant.
///
/// This is a diagnostic, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMismatch {
	/// The kind of report.
	kind: &'static str,
	/// The offsets that did not match.
	offsets: Vec<usize>,
	/// The full frame.
	frame: Vec<u8>,
}

impl ProtocolMismatch {
	/// The offsets, into the inbound buffer, of the unexpected bytes.
	pub fn offsets(&self) -> &[usize] {
		&self.offsets
	}

	/// The full frame.
	pub fn frame(&self) -> &[u8] {
		&self.frame
	}
}

impl fmt::Display for ProtocolMismatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"unexpected values in {} report (offsets {:?}): {}",
			self.kind,
			self.offsets,
			Hex(&self.frame)
		)
	}
}

#[cfg(test)]
pub(crate) mod test {
	use super::*;
	use std::cell::RefCell;

	thread_local! {
		/// Records logged on this thread while capturing, if capturing.
		static RECORDS: RefCell<Option<Vec<(log::Level, String)>>> = const { RefCell::new(None) };
	}

	/// A logger that hands each record to the capture of the logging thread.
	struct Capture;

	impl log::Log for Capture {
		fn enabled(&self, _: &log::Metadata<'_>) -> bool {
			true
		}

		fn log(&self, record: &log::Record<'_>) {
			RECORDS.with(|records| {
				if let Some(records) = records.borrow_mut().as_mut() {
					records.push((record.level(), record.args().to_string()));
				}
			});
		}

		fn flush(&self) {}
	}

	static CAPTURE: Capture = Capture;

	/// Run `f` and return the warnings it logged on this thread.
	pub(crate) fn capture_warnings<F: FnOnce()>(f: F) -> Vec<String> {
		// Only the first call installs the logger; tests on other threads share it.
		if log::set_logger(&CAPTURE).is_ok() {
			log::set_max_level(log::LevelFilter::Trace);
		}
		RECORDS.with(|records| *records.borrow_mut() = Some(Vec::new()));
		f();
		RECORDS
			.with(|records| records.borrow_mut().take())
			.unwrap_or_default()
			.into_iter()
			.filter(|(level, _)| *level == log::Level::Warn)
			.map(|(_, message)| message)
			.collect()
	}

	#[test]
	fn new_report_is_framed() {
		let report = Report::new([0x02, 0x03]);
		assert_eq!(
			report.as_bytes(),
			&[0x03, 0x7e, 0x5a, 0x02, 0x03, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
		);
		assert_eq!(report.report_id(), OUT_REPORT_ID);
		assert_eq!(
			report.to_string(),
			"03 7e 5a 02 03 00 00 00 00 00 00 00 00 00 00 00"
		);
	}

	#[test]
	fn with_u16_is_big_endian() {
		let report = Report::new([0, 0]).with_u16(8, 0x6590);
		assert_eq!(report.as_bytes()[8], 0x65);
		assert_eq!(report.as_bytes()[9], 0x90);
		assert_eq!(be16(report.as_bytes(), 8), 0x6590);
	}

	#[test]
	fn layout_reports_mismatched_offsets() {
		const LAYOUT: Layout = Layout {
			kind: "test",
			fixed: &[(0, 0x01), (1, 0x7e), (2, 0x5a), (20, 0)],
		};
		const SHORT: Layout = Layout {
			kind: "test",
			fixed: &[(0, 0x01)],
		};

		let mismatch = LAYOUT.check(&[0x01, 0x7e, 0x00]).unwrap();
		assert_eq!(mismatch.offsets(), &[2, 20]);
		assert_eq!(mismatch.frame(), &[0x01, 0x7e, 0x00]);
		assert!(mismatch.to_string().contains("01 7e 00"));
		assert_eq!(SHORT.check(&[0x01, 0xff]), None);
	}

	#[test]
	fn mismatches_are_logged_as_warnings() {
		const LAYOUT: Layout = Layout {
			kind: "test",
			fixed: &[(0, 0x01), (1, 0x7e)],
		};

		let warnings = capture_warnings(|| LAYOUT.warn_on_mismatch(&[0x01, 0x7e]));
		assert!(warnings.is_empty());

		let warnings = capture_warnings(|| LAYOUT.warn_on_mismatch(&[0x01, 0x7f]));
		assert_eq!(
			warnings,
			vec!["unexpected values in test report (offsets [1]): 01 7f".to_string()]
		);
	}
}
