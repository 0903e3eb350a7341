use std::error::Error;
use std::fmt::Display;
use std::{fmt, io};

#[derive(Debug)]
pub enum TMiniError {
    NotConnected,
    ConnectionLost,
    ShutdownTimeout,
    ChecksumMismatch(u16, u16),
    InvalidSampleCount(u8),
    SerialError(serialport::Error),
    IoError(io::Error),
}

impl fmt::Display for TMiniError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TMiniError::NotConnected => write!(f, "Serial port is not connected."),
            TMiniError::ConnectionLost => write!(f, "Connection to the device was lost."),
            TMiniError::ShutdownTimeout => {
                write!(f, "Acquisition thread did not stop within the shutdown bound.")
            }
            TMiniError::ChecksumMismatch(expected, calculated) => write!(
                f,
                "Checksum mismatched. Calculated = {:04X}, expected = {:04X}.",
                calculated, expected
            ),
            TMiniError::InvalidSampleCount(lsn) => {
                write!(f, "Sample count must be in [1, 80]. Observed = {}.", lsn)
            }
            TMiniError::SerialError(err) => Display::fmt(&err, f),
            TMiniError::IoError(err) => Display::fmt(&err, f),
        }
    }
}

impl Error for TMiniError {}

impl From<io::Error> for TMiniError {
    fn from(err: io::Error) -> Self {
        TMiniError::IoError(err)
    }
}

impl From<serialport::Error> for TMiniError {
    fn from(err: serialport::Error) -> Self {
        TMiniError::SerialError(err)
    }
}
