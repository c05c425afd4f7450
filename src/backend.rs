//! Types that can exchange feature reports with a connected device.
//!
//! The [`Backend`] trait represents all such types.

use std::io;

#[cfg(any(test, feature = "mock"))]
use std::{cell::Cell, collections::VecDeque, rc::Rc};

#[cfg(feature = "hid")]
use crate::error::DeviceUnavailableError;

/// The placeholder name for a backend that doesn't have a name.
pub(crate) const UNKNOWN_BACKEND_NAME: &str = "<unknown backend>";

/// Types that allow sending and receiving HID feature reports.
///
/// Dropping a backend releases the underlying device handle.
pub trait Backend: private::Sealed {
	/// Send a feature report.
	///
	/// The first byte of `data` is the report ID. On success the number of
	/// bytes transferred is returned.
	fn send_feature_report(&mut self, data: &[u8]) -> Result<usize, io::Error>;

	/// Receive a feature report into `buf`.
	///
	/// The caller must place the requested report ID in `buf[0]`. On success
	/// the number of bytes transferred is returned.
	fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, io::Error>;

	/// Get the "name" of the backend.
	///
	/// This can be in any format, but should uniquely identify the backend
	/// instance.
	fn name(&self) -> Option<String>;

	/// Get the USB manufacturer string, if the device reports one.
	fn manufacturer(&self) -> Result<Option<String>, io::Error> {
		Ok(None)
	}

	/// Get the USB product string, if the device reports one.
	fn product(&self) -> Result<Option<String>, io::Error> {
		Ok(None)
	}
}

impl<C: Backend + ?Sized> Backend for Box<C> {
	fn send_feature_report(&mut self, data: &[u8]) -> Result<usize, io::Error> {
		(**self).send_feature_report(data)
	}
	fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
		(**self).get_feature_report(buf)
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
	fn manufacturer(&self) -> Result<Option<String>, io::Error> {
		(**self).manufacturer()
	}
	fn product(&self) -> Result<Option<String>, io::Error> {
		(**self).product()
	}
}

impl<C: Backend + ?Sized> Backend for &mut C {
	fn send_feature_report(&mut self, data: &[u8]) -> Result<usize, io::Error> {
		(**self).send_feature_report(data)
	}
	fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
		(**self).get_feature_report(buf)
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
	fn manufacturer(&self) -> Result<Option<String>, io::Error> {
		(**self).manufacturer()
	}
	fn product(&self) -> Result<Option<String>, io::Error> {
		(**self).product()
	}
}

/// A USB HID device opened through `hidapi`.
///
/// The device is closed when the value is dropped.
#[cfg(feature = "hid")]
#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "hid")))]
pub struct Hid {
	/// The open device.
	device: hidapi::HidDevice,
	/// The library context. It must outlive `device`.
	_api: hidapi::HidApi,
	/// The vendor and product IDs the device was opened with.
	ids: (u16, u16),
}

#[cfg(feature = "hid")]
impl Hid {
	/// Open the first device matching the vendor and product IDs.
	pub fn open(vendor_id: u16, product_id: u16) -> Result<Hid, DeviceUnavailableError> {
		let api = hidapi::HidApi::new().map_err(|e| {
			DeviceUnavailableError::new(vendor_id, product_id, format!("hid init failed: {e}"))
		})?;
		let device = api
			.open(vendor_id, product_id)
			.map_err(|e| DeviceUnavailableError::new(vendor_id, product_id, e.to_string()))?;
		log::debug!("opened HID device {vendor_id:04x}:{product_id:04x}");
		Ok(Hid {
			device,
			_api: api,
			ids: (vendor_id, product_id),
		})
	}
}

#[cfg(feature = "hid")]
fn hid_to_io(err: hidapi::HidError) -> io::Error {
	io::Error::other(err.to_string())
}

#[cfg(feature = "hid")]
impl std::fmt::Debug for Hid {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Hid")
			.field("vendor_id", &format_args!("{:#06x}", self.ids.0))
			.field("product_id", &format_args!("{:#06x}", self.ids.1))
			.finish_non_exhaustive()
	}
}

#[cfg(feature = "hid")]
impl Backend for Hid {
	fn send_feature_report(&mut self, data: &[u8]) -> Result<usize, io::Error> {
		// hidapi only reports failure, so a successful transfer moved the whole buffer.
		self.device.send_feature_report(data).map_err(hid_to_io)?;
		Ok(data.len())
	}
	fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
		self.device.get_feature_report(buf).map_err(hid_to_io)
	}
	fn name(&self) -> Option<String> {
		Some(format!("hid {:04x}:{:04x}", self.ids.0, self.ids.1))
	}
	fn manufacturer(&self) -> Result<Option<String>, io::Error> {
		self.device.get_manufacturer_string().map_err(hid_to_io)
	}
	fn product(&self) -> Result<Option<String>, io::Error> {
		self.device.get_product_string().map_err(hid_to_io)
	}
}

#[cfg(feature = "hid")]
impl Drop for Hid {
	fn drop(&mut self) {
		log::debug!("closing HID device {:04x}:{:04x}", self.ids.0, self.ids.1);
	}
}

/// A mock backend for use in testing.
///
/// It has the following features:
///   * It records every report sent to it.
///   * It can be filled with frames that are returned, in order, by
///     `get_feature_report`.
///   * Specific errors or transfer lengths can be inserted for the next call
///     to `send_feature_report` or `get_feature_report`.
///   * It flags when it has been dropped, so tests can check that the device
///     handle was released.
#[cfg(any(test, feature = "mock"))]
#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "mock")))]
#[derive(Debug)]
pub struct Mock {
	/// Frames returned by `get_feature_report`, oldest first.
	frames: VecDeque<Vec<u8>>,
	/// Every report passed to `send_feature_report`.
	sent: Vec<Vec<u8>>,
	/// The error to surface on the next send, if any. It is only surfaced once.
	send_error: Option<io::Error>,
	/// The error to surface on the next get, if any. It is only surfaced once.
	get_error: Option<io::Error>,
	/// The length to report on the next send, if any. It is only used once.
	send_len: Option<usize>,
	/// The length to report on the next get, if any. It is only used once.
	get_len: Option<usize>,
	/// The USB manufacturer string.
	manufacturer: Option<String>,
	/// The USB product string.
	product: Option<String>,
	/// Set when the mock is dropped.
	closed: Rc<Cell<bool>>,
}

#[cfg(any(test, feature = "mock"))]
impl Mock {
	/// Create a new Mock backend.
	pub fn new() -> Self {
		Mock {
			frames: VecDeque::new(),
			sent: Vec::new(),
			send_error: None,
			get_error: None,
			send_len: None,
			get_len: None,
			manufacturer: Some("ZWO".to_string()),
			product: None,
			closed: Rc::new(Cell::new(false)),
		}
	}
	/// Queue a frame to be returned by `get_feature_report`.
	///
	/// The frame includes the leading report ID and is not validated in any way.
	pub fn push<T: AsRef<[u8]>>(&mut self, frame: T) {
		self.frames.push_back(frame.as_ref().to_vec());
	}
	/// Drop all queued frames.
	pub fn clear(&mut self) {
		self.frames.clear();
	}
	/// The number of queued frames that have not been read.
	pub fn pending(&self) -> usize {
		self.frames.len()
	}
	/// Every report sent so far, oldest first.
	pub fn sent(&self) -> &[Vec<u8>] {
		&self.sent
	}
	/// Forget all sent reports.
	pub fn clear_sent(&mut self) {
		self.sent.clear();
	}
	/// Set the error for the next `send_feature_report`, if any.
	pub fn send_error(&mut self, err: Option<io::Error>) {
		self.send_error = err;
	}
	/// Set the error for the next `get_feature_report`, if any.
	pub fn get_error(&mut self, err: Option<io::Error>) {
		self.get_error = err;
	}
	/// Set the length reported by the next `send_feature_report`, if any.
	pub fn send_len(&mut self, len: Option<usize>) {
		self.send_len = len;
	}
	/// Set the length reported by the next `get_feature_report`, if any.
	pub fn get_len(&mut self, len: Option<usize>) {
		self.get_len = len;
	}
	/// Set the USB product string.
	pub fn set_product(&mut self, product: Option<&str>) {
		self.product = product.map(ToString::to_string);
	}
	/// A flag that becomes `true` once the mock is dropped.
	pub fn closed_flag(&self) -> Rc<Cell<bool>> {
		Rc::clone(&self.closed)
	}
}

#[cfg(any(test, feature = "mock"))]
impl Default for Mock {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(any(test, feature = "mock"))]
impl Backend for Mock {
	fn send_feature_report(&mut self, data: &[u8]) -> Result<usize, io::Error> {
		if let Some(err) = self.send_error.take() {
			return Err(err);
		}
		self.sent.push(data.to_vec());
		Ok(self.send_len.take().unwrap_or(data.len()))
	}

	fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
		if let Some(err) = self.get_error.take() {
			return Err(err);
		}
		let Some(frame) = self.frames.pop_front() else {
			// A real device would block until the transfer times out, but as
			// our frames are in memory simulate that immediately.
			return Err(io::Error::new(
				io::ErrorKind::TimedOut,
				"Simulated timeout error",
			));
		};
		let n = frame.len().min(buf.len());
		buf[..n].copy_from_slice(&frame[..n]);
		Ok(self.get_len.take().unwrap_or(n))
	}

	fn name(&self) -> Option<String> {
		Some(format!("<mock {:p}>", std::ptr::from_ref(self)))
	}

	fn manufacturer(&self) -> Result<Option<String>, io::Error> {
		Ok(self.manufacturer.clone())
	}

	fn product(&self) -> Result<Option<String>, io::Error> {
		Ok(self.product.clone())
	}
}

#[cfg(any(test, feature = "mock"))]
impl Drop for Mock {
	fn drop(&mut self) {
		self.closed.set(true);
	}
}

mod private {
	pub trait Sealed {}

	#[cfg(feature = "hid")]
	impl Sealed for super::Hid {}
	#[cfg(any(test, feature = "mock"))]
	impl Sealed for super::Mock {}
	impl<C: super::Backend + ?Sized> Sealed for Box<C> {}
	impl<C: super::Backend + ?Sized> Sealed for &mut C {}
}
