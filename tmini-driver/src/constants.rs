pub(crate) const PACKET_HEADER_SIZE: usize = 10;
pub(crate) const PACKET_SYNC_BYTE0: u8 = 0xAA;
pub(crate) const PACKET_SYNC_BYTE1: u8 = 0x55;
pub(crate) const CT_ZERO_POSITION_FLAG: u8 = 0x01;
pub(crate) const MAX_SCAN_SAMPLES: u8 = 80;
// FSA/LSA carry degrees scaled by 64.
pub(crate) const ANGLE_SCALE: f64 = 64.;
// Raw distance is in units of 1/4 mm.
pub(crate) const DISTANCE_SCALE: f64 = 4000.;
pub(crate) const DEFAULT_BAUD_RATE: u32 = 230400;
pub(crate) const SERIAL_READ_TIMEOUT_MS: u64 = 10;
pub(crate) const SCAN_BUFFER_CAPACITY: usize = 8;
pub(crate) const IDLE_POLL_SLEEP_MS: u64 = 1;
pub(crate) const SHUTDOWN_TIMEOUT_MS: u64 = 2000;
