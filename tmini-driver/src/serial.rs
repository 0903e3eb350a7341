use crate::constants::SERIAL_READ_TIMEOUT_MS;
use crate::error::TMiniError;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::Read;
use std::time::Duration;

/// Opens the device with the sensor's framing: 8 data bits, no parity,
/// one stop bit, no flow control. The read timeout is kept short so the
/// acquisition loop stays responsive to stop requests.
pub(crate) fn open_port(path: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>, TMiniError> {
    let port = serialport::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(SERIAL_READ_TIMEOUT_MS))
        .open()?;
    Ok(port)
}

pub(crate) fn get_n_read(port: &mut Box<dyn SerialPort>) -> Result<usize, TMiniError> {
    let n_u32: u32 = port.bytes_to_read()?;
    Ok(n_u32.try_into().unwrap_or(0))
}

pub(crate) fn read(
    port: &mut Box<dyn SerialPort>,
    data_size: usize,
) -> Result<Vec<u8>, TMiniError> {
    debug_assert!(data_size > 0);
    let mut data: Vec<u8> = vec![0; data_size];
    port.read_exact(data.as_mut_slice())?;
    Ok(data)
}

/// Discards whatever the device streamed before we were listening.
pub(crate) fn flush(port: &mut Box<dyn SerialPort>) -> Result<(), TMiniError> {
    let n_read: usize = get_n_read(port).unwrap_or(0);
    if n_read == 0 {
        return Ok(());
    }
    let mut stale: Vec<u8> = vec![0; n_read];
    port.read_exact(stale.as_mut_slice())?;
    Ok(())
}
