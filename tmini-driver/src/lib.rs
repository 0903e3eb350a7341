mod constants;
mod driver_threads;
mod error;
mod numeric;
mod packet;
mod scan;
mod scan_buffer;
mod serial;
#[cfg(test)]
mod testing;
mod time;

use crate::constants::{DEFAULT_BAUD_RATE, SCAN_BUFFER_CAPACITY};
use crate::driver_threads::AcquisitionHandle;
use crate::scan_buffer::ScanBuffer;
use crate::serial::{flush, open_port};
use log::{debug, warn};
use serialport::SerialPort;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use crate::driver_threads::ScanCallback;
pub use crate::error::TMiniError;
pub use crate::scan::IntensityBit;
pub use tmini_data::{LaserPoint, LaserScan};

/// Configuration of a driver instance.
#[derive(Clone, Debug)]
pub struct DriverConfig {
    /// Device path of the serial port, such as `/dev/ttyUSB0`.
    pub port: String,
    /// Baud rate of the serial connection.
    pub baud_rate: u32,
    /// Whether the sensor streams intensity samples (3 bytes per point
    /// instead of 2).
    pub has_intensity: bool,
    /// Resolution of the intensity samples.
    pub intensity_bit: IntensityBit,
}

impl DriverConfig {
    pub fn new(port: &str) -> DriverConfig {
        DriverConfig {
            port: port.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            has_intensity: true,
            intensity_bit: IntensityBit::Bits8,
        }
    }
}

/// Driver for the YDLiDAR T-mini Pro.
///
/// The driver moves through `Disconnected -> Connected -> Scanning` and
/// back. While scanning, a dedicated acquisition thread owns the serial
/// port and continuously assembles rotations; consumers retrieve them
/// with [`get_scan`](TMiniDriver::get_scan) or receive them through a
/// registered callback. The data-plane methods take `&self` and may be
/// called from any number of threads.
pub struct TMiniDriver {
    config: DriverConfig,
    // The idle port sits behind a mutex only to keep the facade Sync;
    // every access goes through control-plane methods taking &mut self.
    port: Mutex<Option<Box<dyn SerialPort>>>,
    acquisition: Option<AcquisitionHandle>,
    buffer: Arc<ScanBuffer>,
    connection_lost: Arc<AtomicBool>,
}

impl TMiniDriver {
    pub fn new(config: DriverConfig) -> TMiniDriver {
        TMiniDriver {
            config,
            port: Mutex::new(None),
            acquisition: None,
            buffer: Arc::new(ScanBuffer::with_capacity(SCAN_BUFFER_CAPACITY)),
            connection_lost: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Opens the serial port and discards stale input. A no-op when
    /// already connected.
    pub fn connect(&mut self) -> Result<(), TMiniError> {
        self.reclaim_if_connection_lost()?;
        if self.port_slot().is_some() {
            warn!("Already connected.");
            return Ok(());
        }
        let mut port = open_port(&self.config.port, self.config.baud_rate)?;
        flush(&mut port)?;
        *self.port_slot() = Some(port);
        Ok(())
    }

    /// Stops scanning if needed and releases the serial port.
    pub fn disconnect(&mut self) -> Result<(), TMiniError> {
        self.reclaim_if_connection_lost()?;
        self.stop_scanning()?;
        *self.port_slot() = None;
        Ok(())
    }

    /// Spawns the acquisition thread. Calling this while already
    /// scanning is a no-op.
    pub fn start_scanning(&mut self) -> Result<(), TMiniError> {
        self.spawn_acquisition(None)
    }

    /// Like [`start_scanning`](TMiniDriver::start_scanning), but also
    /// invokes `callback` on the acquisition thread for every completed
    /// scan, before the scan is queued for
    /// [`get_scan`](TMiniDriver::get_scan). A panicking callback is
    /// caught and logged; it never stops acquisition.
    pub fn start_scanning_with(&mut self, callback: ScanCallback) -> Result<(), TMiniError> {
        self.spawn_acquisition(Some(callback))
    }

    /// Signals the acquisition thread to exit and joins it within a
    /// bounded wait. A no-op when not scanning.
    pub fn stop_scanning(&mut self) -> Result<(), TMiniError> {
        self.reclaim_if_connection_lost()?;
        let handle = match self.acquisition.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };
        let port = handle.stop()?;
        *self.port_slot() = Some(port);
        Ok(())
    }

    /// Waits up to `timeout` for the next completed scan. `None` means
    /// no scan arrived in time, which is a normal outcome.
    pub fn get_scan(&self, timeout: Duration) -> Option<LaserScan> {
        self.buffer.pop(timeout)
    }

    /// Whether a completed scan is ready right now.
    pub fn has_scan(&self) -> bool {
        self.buffer.has_scan()
    }

    /// Total number of completed scans since the driver was created,
    /// including scans that were evicted before being retrieved.
    pub fn get_scan_count(&self) -> usize {
        self.buffer.n_produced()
    }

    pub fn is_scanning(&self) -> bool {
        self.acquisition.is_some() && !self.connection_lost.load(Ordering::SeqCst)
    }

    fn spawn_acquisition(&mut self, callback: Option<ScanCallback>) -> Result<(), TMiniError> {
        self.reclaim_if_connection_lost()?;
        if self.acquisition.is_some() {
            warn!("Already scanning.");
            return Ok(());
        }
        let port = match self.port_slot().take() {
            Some(port) => port,
            None => return Err(TMiniError::NotConnected),
        };
        self.acquisition = Some(AcquisitionHandle::spawn(
            port,
            self.config.has_intensity,
            self.config.intensity_bit,
            Arc::clone(&self.buffer),
            callback,
            Arc::clone(&self.connection_lost),
        ));
        Ok(())
    }

    /// A lost connection ends the acquisition thread on its own; the
    /// next control-plane call observes the flag, cleans up and reports
    /// it once. The driver is Disconnected afterwards.
    fn reclaim_if_connection_lost(&mut self) -> Result<(), TMiniError> {
        if !self.connection_lost.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(handle) = self.acquisition.take() {
            let _ = handle.stop();
        }
        *self.port_slot() = None;
        Err(TMiniError::ConnectionLost)
    }

    fn port_slot(&mut self) -> &mut Option<Box<dyn SerialPort>> {
        match self.port.get_mut() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for TMiniDriver {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            debug!("Disconnect on drop failed: {e}");
        }
    }
}
