//! Report layouts for the EAF focuser.

use crate::{
	error::{CodecError, Direction, ReportLengthError},
	report::{be16, Layout, Report, REPORT_LEN},
};

/// The header of the "set position" command.
const SET_POSITION: [u8; 2] = [0x03, 0x01];
/// The header of the "query position" command.
const QUERY_POSITION: [u8; 2] = [0x02, 0x03];

/// The bytes of a position report that have always been observed to be constant.
const POSITION_LAYOUT: Layout = Layout {
	kind: "position",
	fixed: &[
		(0, 0x01),
		(1, 0x7e),
		(2, 0x5a),
		(3, 0x03),
		(5, 0x00),
		(6, 0x00),
		(7, 0x00),
		(10, 0x00),
		(14, 0xea),
		(15, 0x60),
	],
};

/// Encode a command that moves the focuser to the absolute position `pos`.
///
/// The device does not reply to this command.
pub const fn encode_set_position(pos: u16) -> Report {
	Report::new(SET_POSITION)
		.with_u16(8, pos)
		.with(13, 0x02)
		.with(14, 0xea)
		.with(15, 0x60)
}

/// Encode a query for the focuser's position report.
pub const fn encode_query_position() -> Report {
	Report::new(QUERY_POSITION)
}

/// Decode a position report.
///
/// `buf` is the inbound buffer, starting with the report ID. Unexpected values
/// in the bytes that are normally constant are logged as a warning, but the
/// report is decoded anyway.
///
/// ## Errors
///
/// An error is only returned if `buf` is too short to contain a report.
pub fn decode_position_report(buf: &[u8]) -> Result<FocuserStatus, CodecError> {
	if buf.len() < REPORT_LEN {
		return Err(ReportLengthError::new(Direction::Receive, REPORT_LEN, buf.len()).into());
	}
	POSITION_LAYOUT.warn_on_mismatch(&buf[..REPORT_LEN]);
	// buf[13] holds whatever the device last left in its buffer; never read it.
	let status = FocuserStatus {
		moving: buf[4] != 0,
		position: be16(buf, 8),
		max: be16(buf, 14),
		aux: [buf[11], buf[12]],
	};
	log::info!(
		"position report: status={}, status2=0x{:02x}, status3=0x{:02x}, position={}",
		u8::from(status.moving),
		status.aux[0],
		status.aux[1],
		status.position
	);
	if status.position > status.max {
		log::warn!(
			"reported position {} exceeds maximum {}",
			status.position,
			status.max
		);
	}
	Ok(status)
}

/// A decoded focuser position report.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FocuserStatus {
	/// Whether the motor is moving.
	moving: bool,
	/// The current position.
	position: u16,
	/// The maximum position.
	max: u16,
	/// Two status bytes of unknown meaning.
	aux: [u8; 2],
}

impl FocuserStatus {
	/// The current position.
	///
	/// It is only authoritative once the motor has stopped moving.
	pub const fn position(&self) -> u16 {
		self.position
	}

	/// The highest position the focuser can move to.
	pub const fn max(&self) -> u16 {
		self.max
	}

	/// Whether the motor is still moving.
	pub const fn is_moving(&self) -> bool {
		self.moving
	}

	/// Two status bytes of unknown meaning, preserved for diagnostics.
	pub const fn aux(&self) -> [u8; 2] {
		self.aux
	}

	/// Classify the report.
	pub const fn state(&self) -> FocuserState {
		if self.moving {
			FocuserState::Moving
		} else {
			FocuserState::Settled(self.position)
		}
	}
}

/// The state of the focuser according to a single position report.
///
/// The focuser has no fault report of its own; transport failures are
/// reported as errors instead.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FocuserState {
	/// The motor has stopped at the contained position.
	Settled(u16),
	/// The motor is still moving; keep polling.
	Moving,
}

#[cfg(test)]
pub(crate) mod test {
	use super::*;
	use crate::report::test::capture_warnings;

	/// Build a position report as the device sends it.
	pub(crate) fn frame(moving: bool, position: u16, garbage: u8) -> [u8; REPORT_LEN] {
		let [pos_hi, pos_lo] = position.to_be_bytes();
		[
			0x01,
			0x7e,
			0x5a,
			0x03,
			u8::from(moving),
			0x00,
			0x00,
			0x00,
			pos_hi,
			pos_lo,
			0x00,
			0x7f,
			0xd2,
			garbage,
			0xea,
			0x60,
		]
	}

	#[test]
	fn set_position_layout() {
		assert_eq!(
			encode_set_position(26000).as_bytes(),
			&[0x03, 0x7e, 0x5a, 0x03, 0x01, 0, 0, 0, 0x65, 0x90, 0, 0, 0, 0x02, 0xea, 0x60]
		);
		assert_eq!(
			encode_set_position(0xd6d8).to_string(),
			"03 7e 5a 03 01 00 00 00 d6 d8 00 00 00 02 ea 60"
		);
	}

	#[test]
	fn query_position_layout() {
		assert_eq!(
			encode_query_position().to_string(),
			"03 7e 5a 02 03 00 00 00 00 00 00 00 00 00 00 00"
		);
	}

	#[test]
	fn decode_captured_reports() {
		// Captured while moving from 25000 to 26000.
		let buf = [
			0x01, 0x7e, 0x5a, 0x03, 0x01, 0x00, 0x00, 0x00, 0x61, 0xd6, 0x00, 0x7f, 0xd2, 0x32, 0xea,
			0x60, 0x00,
		];
		let status = decode_position_report(&buf).unwrap();
		assert!(status.is_moving());
		assert_eq!(status.position(), 25046);
		assert_eq!(status.max(), 60000);
		assert_eq!(status.aux(), [0x7f, 0xd2]);
		assert_eq!(status.state(), FocuserState::Moving);

		let status = decode_position_report(&frame(false, 26000, 0x32)).unwrap();
		assert_eq!(status.state(), FocuserState::Settled(26000));
	}

	#[test]
	fn position_ignores_undefined_byte() {
		for pos in [0u16, 1, 255, 256, 25000, 26000, 59999, 60000] {
			for garbage in [0x00, 0x32, 0x7e, 0xff] {
				let status = decode_position_report(&frame(false, pos, garbage)).unwrap();
				assert_eq!(status.position(), pos);
				assert_eq!(status.aux(), [0x7f, 0xd2]);
			}
		}
	}

	#[test]
	fn mismatched_constants_still_decode() {
		let mut buf = frame(true, 1234, 0);
		buf[3] = 0x04;
		buf[10] = 0x99;
		let mismatch = POSITION_LAYOUT.check(&buf).unwrap();
		assert_eq!(mismatch.offsets(), &[3, 10]);

		let mut decoded = None;
		let warnings = capture_warnings(|| decoded = Some(decode_position_report(&buf)));
		let status = decoded.unwrap().unwrap();
		assert_eq!(status.position(), 1234);
		assert!(status.is_moving());
		assert_eq!(warnings.len(), 1);
		assert!(warnings[0].starts_with("unexpected values in position report (offsets [3, 10])"));

		let warnings = capture_warnings(|| {
			decode_position_report(&frame(true, 1234, 0)).unwrap();
		});
		assert!(warnings.is_empty());
	}

	#[test]
	fn short_buffer_fails() {
		let err = decode_position_report(&[0x01, 0x7e, 0x5a]).unwrap_err();
		assert!(matches!(err, CodecError::ReportLength(e) if e.actual() == 3));
	}
}
