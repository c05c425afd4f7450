//! Report layouts for the EFW filter wheel.

use crate::{
	error::{wheel_code, CodecError, Direction, InvalidSlotError, ReportLengthError},
	report::{Layout, Report, REPORT_LEN},
};

/// The number of slots in the supported wheel.
pub const SLOT_COUNT: u8 = 7;

/// The header of the "get info" query.
const GET_INFO: [u8; 2] = [0x02, 0x04];
/// The header of the "set slot" command.
const SET_SLOT: [u8; 2] = [0x01, 0x02];
/// The header of the "query slot" command.
const QUERY_SLOT: [u8; 2] = [0x02, 0x01];

/// The info report of a known-good 7-slot wheel.
const EXPECTED_INFO: [u8; REPORT_LEN] = [
	0x01, 0x7e, 0x5a, 0x04, 0x03, 0x00, 0x09, 0x00, b'E', b'F', b'W', b'-', b'S', b'-', b'0', 0x00,
];

/// Where the model string lives in the info report.
const MODEL_RANGE: std::ops::Range<usize> = 8..REPORT_LEN;

/// Every byte of the info report is expected to match [`EXPECTED_INFO`].
const INFO_LAYOUT: Layout = Layout {
	kind: "info",
	fixed: &[
		(0, EXPECTED_INFO[0]),
		(1, EXPECTED_INFO[1]),
		(2, EXPECTED_INFO[2]),
		(3, EXPECTED_INFO[3]),
		(4, EXPECTED_INFO[4]),
		(5, EXPECTED_INFO[5]),
		(6, EXPECTED_INFO[6]),
		(7, EXPECTED_INFO[7]),
		(8, EXPECTED_INFO[8]),
		(9, EXPECTED_INFO[9]),
		(10, EXPECTED_INFO[10]),
		(11, EXPECTED_INFO[11]),
		(12, EXPECTED_INFO[12]),
		(13, EXPECTED_INFO[13]),
		(14, EXPECTED_INFO[14]),
		(15, EXPECTED_INFO[15]),
	],
};

/// The bytes of a slot report that have always been observed to be constant.
///
/// The tail of the report appears to be left over from whichever earlier
/// request last used that much of the device's buffer.
const SLOT_LAYOUT: Layout = Layout {
	kind: "position",
	fixed: &[
		(0, 0x01),
		(1, 0x7e),
		(2, 0x5a),
		(3, 0x01),
		(10, 0x00),
		(11, 0x00),
		(12, 0x00),
		(13, 0x00),
		(14, 0x30),
		(15, 0x00),
	],
};

/// Return an error if `buf` cannot hold a whole report.
fn check_len(buf: &[u8]) -> Result<(), CodecError> {
	if buf.len() < REPORT_LEN {
		return Err(ReportLengthError::new(Direction::Receive, REPORT_LEN, buf.len()).into());
	}
	Ok(())
}

/// Encode a query for the wheel's info report.
pub const fn encode_get_info() -> Report {
	Report::new(GET_INFO)
}

/// Decode an info report.
///
/// Any difference from the report of a known 7-slot wheel is logged as a
/// warning but is never an error.
pub fn decode_info_report(buf: &[u8]) -> Result<WheelInfo, CodecError> {
	check_len(buf)?;
	INFO_LAYOUT.warn_on_mismatch(&buf[..REPORT_LEN]);
	let model = &buf[MODEL_RANGE];
	let end = model.iter().position(|&b| b == 0).unwrap_or(model.len());
	let info = WheelInfo {
		model: String::from_utf8_lossy(&model[..end]).into_owned(),
	};
	log::info!("info report: model={:?}", info.model);
	Ok(info)
}

/// Encode a command that moves the wheel to `slot`.
///
/// The device does not reply to this command. Slots are numbered from 1.
///
/// ## Errors
///
/// An error is returned, and nothing is encoded, unless `1 <= slot <= 7`.
pub fn encode_set_slot(slot: u8) -> Result<Report, CodecError> {
	if !(1..=SLOT_COUNT).contains(&slot) {
		return Err(InvalidSlotError::new(slot, SLOT_COUNT).into());
	}
	Ok(Report::new(SET_SLOT).with(5, slot))
}

/// Encode a query for the wheel's slot report.
pub const fn encode_query_slot() -> Report {
	Report::new(QUERY_SLOT)
}

/// Decode a slot report.
///
/// `buf` is the inbound buffer, starting with the report ID. Unexpected values
/// in the bytes that are normally constant are logged as a warning, but the
/// report is decoded anyway.
///
/// ## Errors
///
/// An error is only returned if `buf` is too short to contain a report.
pub fn decode_slot_report(buf: &[u8]) -> Result<WheelStatus, CodecError> {
	check_len(buf)?;
	SLOT_LAYOUT.warn_on_mismatch(&buf[..REPORT_LEN]);
	let status = WheelStatus {
		status: buf[4],
		error_code: buf[5],
		samples: [buf[6], buf[7], buf[8]],
		slot_count: buf[9],
	};
	log::info!(
		"position report: status={}, [{}, {}, {}], max={}",
		status.status,
		status.samples[0],
		status.samples[1],
		status.samples[2],
		status.slot_count
	);
	Ok(status)
}

/// The slot the wheel should be commanded to after `current`.
///
/// This is always the next slot forwards, wrapping from the last slot to the
/// first.
pub const fn next_slot(current: u8) -> u8 {
	current % SLOT_COUNT + 1
}

/// The identification decoded from an info report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WheelInfo {
	/// The model string
	model: String,
}

impl WheelInfo {
	/// The model string embedded in the report, e.g., `"EFW-S-0"`.
	pub fn model(&self) -> &str {
		&self.model
	}
}

/// A decoded filter wheel slot report.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct WheelStatus {
	/// The raw status code (see [`wheel_code`]).
	status: u8,
	/// The raw error code.
	error_code: u8,
	/// Three redundant readings of the current slot.
	samples: [u8; 3],
	/// The number of slots reported by the device.
	slot_count: u8,
}

impl WheelStatus {
	/// The raw status code.
	///
	/// See [`wheel_code`] for the known values.
	pub const fn status(&self) -> u8 {
		self.status
	}

	/// The raw error code.
	///
	/// Any non-zero value means the wheel has faulted. The individual values
	/// have no known meaning.
	pub const fn error_code(&self) -> u8 {
		self.error_code
	}

	/// The three slot readings. They only agree once the wheel has settled.
	pub const fn samples(&self) -> [u8; 3] {
		self.samples
	}

	/// The first slot reading.
	///
	/// It is only meaningful when the report [settled](WheelState::Settled).
	pub const fn slot(&self) -> u8 {
		self.samples[0]
	}

	/// The number of slots reported by the device.
	pub const fn slot_count(&self) -> u8 {
		self.slot_count
	}

	/// Classify the report.
	///
	/// A fault takes precedence over everything else, so a report with a
	/// non-zero error code is never trusted as settled.
	pub const fn state(&self) -> WheelState {
		let [s0, s1, s2] = self.samples;
		if self.status == wheel_code::FAULT || self.error_code != 0 {
			WheelState::Fault
		} else if s0 == s1 && s1 == s2 && self.status == wheel_code::STABLE {
			WheelState::Settled(s0)
		} else {
			WheelState::StillMoving
		}
	}
}

/// The state of the wheel according to a single slot report.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WheelState {
	/// The wheel has stopped at the contained slot.
	Settled(u8),
	/// The wheel is moving or aligning; keep polling.
	StillMoving,
	/// The wheel cannot recover without a physical reset.
	Fault,
}

#[cfg(test)]
pub(crate) mod test {
	use super::*;
	use crate::report::test::capture_warnings;

	/// Build a slot report as the device sends it.
	pub(crate) fn frame(status: u8, error_code: u8, samples: [u8; 3]) -> [u8; REPORT_LEN] {
		let [s0, s1, s2] = samples;
		[
			0x01, 0x7e, 0x5a, 0x01, status, error_code, s0, s1, s2, 0x07, 0x00, 0x00, 0x00, 0x00,
			0x30, 0x00,
		]
	}

	/// A report of a wheel settled at `slot`.
	pub(crate) fn settled(slot: u8) -> [u8; REPORT_LEN] {
		frame(wheel_code::STABLE, 0, [slot; 3])
	}

	#[test]
	fn command_layouts() {
		assert_eq!(
			encode_get_info().to_string(),
			"03 7e 5a 02 04 00 00 00 00 00 00 00 00 00 00 00"
		);
		assert_eq!(
			encode_query_slot().to_string(),
			"03 7e 5a 02 01 00 00 00 00 00 00 00 00 00 00 00"
		);
		assert_eq!(
			encode_set_slot(3).unwrap().to_string(),
			"03 7e 5a 01 02 03 00 00 00 00 00 00 00 00 00 00"
		);
	}

	#[test]
	fn set_slot_range() {
		for slot in 0..=u8::MAX {
			match encode_set_slot(slot) {
				Ok(report) => {
					assert!((1..=7).contains(&slot));
					assert_eq!(report.as_bytes()[5], slot);
				}
				Err(e) => {
					assert!(slot == 0 || slot > 7);
					assert_eq!(e, CodecError::InvalidSlot(InvalidSlotError::new(slot, 7)));
				}
			}
		}
	}

	#[test]
	fn decode_info() {
		let info = decode_info_report(&EXPECTED_INFO).unwrap();
		assert_eq!(info.model(), "EFW-S-0");
		assert!(INFO_LAYOUT.check(&EXPECTED_INFO).is_none());

		let mut buf = EXPECTED_INFO;
		buf[14] = b'1';
		buf[15] = b'X';
		assert_eq!(INFO_LAYOUT.check(&buf).unwrap().offsets(), &[14, 15]);
		let mut info = None;
		let warnings = capture_warnings(|| info = Some(decode_info_report(&buf)));
		assert_eq!(info.unwrap().unwrap().model(), "EFW-S-1X");
		assert_eq!(warnings.len(), 1);
		assert!(warnings[0].starts_with("unexpected values in info report (offsets [14, 15])"));
	}

	#[test]
	fn decode_captured_reports() {
		let buf = [
			0x01, 0x7e, 0x5a, 0x01, 0x04, 0x00, 0x03, 0x02, 0x03, 0x07, 0x00, 0x00, 0x00, 0x00, 0x30,
			0x00, 0x00,
		];
		let status = decode_slot_report(&buf).unwrap();
		assert_eq!(status.status(), wheel_code::MOVING);
		assert_eq!(status.samples(), [3, 2, 3]);
		assert_eq!(status.slot_count(), 7);
		assert_eq!(status.state(), WheelState::StillMoving);

		let status = decode_slot_report(&settled(3)).unwrap();
		assert_eq!(status.state(), WheelState::Settled(3));

		let status = decode_slot_report(&frame(6, 0x0c, [7, 6, 7])).unwrap();
		assert_eq!(status.error_code(), 0x0c);
		assert_eq!(status.state(), WheelState::Fault);
	}

	#[test]
	fn classify() {
		for k in 1..=7 {
			let status = decode_slot_report(&settled(k)).unwrap();
			assert_eq!(status.state(), WheelState::Settled(k));
			assert_eq!(status.slot(), k);

			for samples in [[k; 3], [k, k + 1, k], [1, 2, 3]] {
				let fault = decode_slot_report(&frame(wheel_code::FAULT, 0, samples)).unwrap();
				assert_eq!(fault.state(), WheelState::Fault);
				let fault = decode_slot_report(&frame(wheel_code::STABLE, 1, samples)).unwrap();
				assert_eq!(fault.state(), WheelState::Fault);
			}

			let moving = decode_slot_report(&frame(wheel_code::MOVING, 0, [k; 3])).unwrap();
			assert_eq!(moving.state(), WheelState::StillMoving);
			let aligning = decode_slot_report(&frame(wheel_code::STABLE, 0, [k, k, 0])).unwrap();
			assert_eq!(aligning.state(), WheelState::StillMoving);
		}
	}

	#[test]
	fn mismatched_tail_still_decodes() {
		let mut buf = settled(2);
		buf[11] = 0x45;
		buf[14] = 0x00;
		assert_eq!(SLOT_LAYOUT.check(&buf).unwrap().offsets(), &[11, 14]);
		let mut status = None;
		let warnings = capture_warnings(|| status = Some(decode_slot_report(&buf)));
		assert_eq!(status.unwrap().unwrap().state(), WheelState::Settled(2));
		assert_eq!(warnings.len(), 1);
		assert!(warnings[0].starts_with("unexpected values in position report (offsets [11, 14])"));

		let warnings = capture_warnings(|| {
			decode_slot_report(&settled(2)).unwrap();
		});
		assert!(warnings.is_empty());
	}

	#[test]
	fn short_buffer_fails() {
		assert!(matches!(
			decode_slot_report(&[0x01; 15]),
			Err(CodecError::ReportLength(_))
		));
		assert!(decode_info_report(&[]).is_err());
	}

	#[test]
	fn next_slot_wraps_forward() {
		assert_eq!(next_slot(1), 2);
		assert_eq!(next_slot(6), 7);
		assert_eq!(next_slot(7), 1);
		for slot in 1..=SLOT_COUNT {
			assert_eq!(next_slot(slot), ((slot - 1 + 1) % 7) + 1);
		}
	}
}
