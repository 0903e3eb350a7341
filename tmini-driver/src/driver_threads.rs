use crate::constants::{IDLE_POLL_SLEEP_MS, SHUTDOWN_TIMEOUT_MS};
use crate::error::TMiniError;
use crate::packet::{next_frame, FrameStep};
use crate::scan::{decode_samples, IntensityBit, ScanAssembler};
use crate::scan_buffer::ScanBuffer;
use crate::serial::{get_n_read, read};
use crate::time::sleep_ms;
use crossbeam_channel::{Receiver, Sender};
use log::error;
use serialport::SerialPort;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tmini_data::LaserScan;

/// Handler invoked on the acquisition thread for every completed scan.
///
/// Handlers must not block and must not call back into
/// [`stop_scanning`](crate::TMiniDriver::stop_scanning), which would
/// deadlock the join.
pub type ScanCallback = Box<dyn Fn(&LaserScan) + Send>;

/// Handle of a running acquisition thread.
pub(crate) struct AcquisitionHandle {
    terminator_tx: Sender<bool>,
    port_rx: Receiver<Box<dyn SerialPort>>,
    thread: Option<JoinHandle<()>>,
}

impl AcquisitionHandle {
    pub(crate) fn spawn(
        port: Box<dyn SerialPort>,
        has_intensity: bool,
        intensity_bit: IntensityBit,
        buffer: Arc<ScanBuffer>,
        callback: Option<ScanCallback>,
        connection_lost: Arc<AtomicBool>,
    ) -> AcquisitionHandle {
        let (terminator_tx, terminator_rx) = crossbeam_channel::bounded(10);
        let (port_tx, port_rx) = crossbeam_channel::bounded(1);
        let thread = std::thread::spawn(move || {
            acquisition_loop(
                port,
                has_intensity,
                intensity_bit,
                buffer,
                callback,
                terminator_rx,
                connection_lost,
                port_tx,
            );
        });
        AcquisitionHandle {
            terminator_tx,
            port_rx,
            thread: Some(thread),
        }
    }

    /// Signals the loop to exit and waits for it to hand the port back.
    /// The hand-back doubles as the bounded join; a thread that misses
    /// the bound is reported, not silently waited on.
    pub(crate) fn stop(mut self) -> Result<Box<dyn SerialPort>, TMiniError> {
        let _ = self.terminator_tx.send(true);
        let port = self
            .port_rx
            .recv_timeout(Duration::from_millis(SHUTDOWN_TIMEOUT_MS))
            .map_err(|_| TMiniError::ShutdownTimeout)?;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        Ok(port)
    }
}

fn do_terminate(terminator_rx: &Receiver<bool>) -> bool {
    terminator_rx.try_recv().unwrap_or(false)
}

/// Body of the acquisition thread: reads available bytes, drains every
/// extractable packet through the frame synchronizer, the sample decoder
/// and the assembler, and delivers completed scans. All parsing state is
/// private to this thread.
#[allow(clippy::too_many_arguments)]
pub(crate) fn acquisition_loop(
    mut port: Box<dyn SerialPort>,
    has_intensity: bool,
    intensity_bit: IntensityBit,
    buffer: Arc<ScanBuffer>,
    callback: Option<ScanCallback>,
    terminator_rx: Receiver<bool>,
    connection_lost: Arc<AtomicBool>,
    port_tx: Sender<Box<dyn SerialPort>>,
) {
    let mut bytes = VecDeque::<u8>::new();
    let mut assembler = ScanAssembler::new();
    while !do_terminate(&terminator_rx) {
        let n_read = match get_n_read(&mut port) {
            Ok(n) => n,
            Err(e) => {
                error!("Serial connection lost: {e}");
                connection_lost.store(true, Ordering::SeqCst);
                break;
            }
        };
        if n_read == 0 {
            sleep_ms(IDLE_POLL_SLEEP_MS);
            continue;
        }
        match read(&mut port, n_read) {
            Ok(data) => bytes.extend(data),
            Err(e) => {
                error!("Serial connection lost: {e}");
                connection_lost.store(true, Ordering::SeqCst);
                break;
            }
        }
        drain_packets(
            &mut bytes,
            has_intensity,
            intensity_bit,
            &mut assembler,
            &buffer,
            callback.as_ref(),
        );
    }
    // the port goes back on every exit path so the driver can reuse or
    // release it
    let _ = port_tx.send(port);
}

fn drain_packets(
    bytes: &mut VecDeque<u8>,
    has_intensity: bool,
    intensity_bit: IntensityBit,
    assembler: &mut ScanAssembler,
    buffer: &ScanBuffer,
    callback: Option<&ScanCallback>,
) {
    loop {
        match next_frame(bytes, has_intensity) {
            FrameStep::NeedMoreData => return,
            FrameStep::Resync => continue,
            FrameStep::Packet(header, payload) => {
                let samples = decode_samples(
                    &payload,
                    header.n_samples as usize,
                    has_intensity,
                    intensity_bit,
                );
                if let Some(scan) = assembler.feed(&header, &samples) {
                    deliver_scan(scan, buffer, callback);
                }
            }
        }
    }
}

fn deliver_scan(scan: LaserScan, buffer: &ScanBuffer, callback: Option<&ScanCallback>) {
    if let Some(callback) = callback {
        // a panicking handler must not kill acquisition
        if catch_unwind(AssertUnwindSafe(|| callback(&scan))).is_err() {
            error!("Scan callback panicked");
        }
    }
    buffer.push(scan);
}
