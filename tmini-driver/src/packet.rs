use crate::constants::{
    CT_ZERO_POSITION_FLAG, MAX_SCAN_SAMPLES, PACKET_HEADER_SIZE, PACKET_SYNC_BYTE0,
    PACKET_SYNC_BYTE1,
};
use crate::error::TMiniError;
use crate::numeric::to_u16;
use log::debug;
use std::collections::VecDeque;

/// Header of one measurement packet. Lives only for the decode of that
/// packet.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PacketHeader {
    pub(crate) ct: u8,
    pub(crate) n_samples: u8,
    pub(crate) start_angle_raw: u16,
    pub(crate) end_angle_raw: u16,
    pub(crate) checksum: u16,
}

impl PacketHeader {
    /// Parses the ten header bytes. The caller has already aligned the
    /// buffer on the sync marker.
    pub(crate) fn parse(header: &[u8]) -> Result<PacketHeader, TMiniError> {
        debug_assert!(header.len() >= PACKET_HEADER_SIZE);
        debug_assert!(is_sync_marker(header[0], header[1]));
        let n_samples = header[3];
        if n_samples < 1 || n_samples > MAX_SCAN_SAMPLES {
            return Err(TMiniError::InvalidSampleCount(n_samples));
        }
        Ok(PacketHeader {
            ct: header[2],
            n_samples,
            start_angle_raw: to_u16(header[4], header[5]),
            end_angle_raw: to_u16(header[6], header[7]),
            checksum: to_u16(header[8], header[9]),
        })
    }

    /// A zero position packet begins a new rotation.
    pub(crate) fn is_zero_position(&self) -> bool {
        self.ct & CT_ZERO_POSITION_FLAG == CT_ZERO_POSITION_FLAG
    }

    /// Rotation frequency in Hz, carried in the upper seven bits of CT
    /// in units of 0.1 Hz.
    pub(crate) fn scan_frequency(&self) -> f64 {
        ((self.ct >> 1) as f64) / 10.
    }

    pub(crate) fn packet_size(&self, bytes_per_sample: usize) -> usize {
        PACKET_HEADER_SIZE + (self.n_samples as usize) * bytes_per_sample
    }
}

fn bytes_per_sample(has_intensity: bool) -> usize {
    if has_intensity {
        3
    } else {
        2
    }
}

fn is_sync_marker(element0: u8, element1: u8) -> bool {
    element0 == PACKET_SYNC_BYTE0 && element1 == PACKET_SYNC_BYTE1
}

fn find_sync_index(buffer: &VecDeque<u8>) -> Option<usize> {
    if buffer.is_empty() {
        return None;
    }
    for i in 0..(buffer.len() - 1) {
        let e0 = match buffer.get(i) {
            Some(e) => e,
            None => continue,
        };
        let e1 = match buffer.get(i + 1) {
            Some(e) => e,
            None => continue,
        };
        if is_sync_marker(*e0, *e1) {
            return Some(i);
        }
    }
    None
}

/// XOR checksum over the packet minus its CS field: the PH word, FSA,
/// every sample (intensity byte widened to a word, then the distance
/// word), the CT|LSN word and LSA, all as little-endian 16 bit words.
pub(crate) fn calc_checksum(packet: &[u8], has_intensity: bool) -> u16 {
    let n_samples = packet[3] as usize;

    let mut checksum = to_u16(packet[0], packet[1]);
    checksum ^= to_u16(packet[4], packet[5]);
    if has_intensity {
        for i in 0..n_samples {
            let base = PACKET_HEADER_SIZE + 3 * i;
            // a corrupted sample count may claim more than is buffered
            if base + 2 >= packet.len() {
                break;
            }
            checksum ^= to_u16(packet[base], 0x00);
            checksum ^= to_u16(packet[base + 1], packet[base + 2]);
        }
    } else {
        for i in 0..n_samples {
            let base = PACKET_HEADER_SIZE + 2 * i;
            if base + 1 >= packet.len() {
                break;
            }
            checksum ^= to_u16(packet[base], packet[base + 1]);
        }
    }
    checksum ^= to_u16(packet[2], packet[3]);
    checksum ^= to_u16(packet[6], packet[7]);
    checksum
}

pub(crate) fn err_if_checksum_mismatched(
    packet: &[u8],
    expected: u16,
    has_intensity: bool,
) -> Result<(), TMiniError> {
    let calculated = calc_checksum(packet, has_intensity);
    match calculated != expected {
        true => Err(TMiniError::ChecksumMismatch(expected, calculated)),
        false => Ok(()),
    }
}

/// Outcome of one synchronization attempt on the byte buffer.
pub(crate) enum FrameStep {
    /// The buffer does not hold a complete packet yet. Nothing beyond
    /// leading garbage was consumed; read more bytes and retry.
    NeedMoreData,
    /// A rejected header was skipped; retry immediately on the remaining
    /// buffer.
    Resync,
    /// A validated header and its payload bytes.
    Packet(PacketHeader, Vec<u8>),
}

/// Advances the buffer to the next validated packet.
///
/// A rejected header (bad sample count or checksum mismatch) consumes
/// only the two sync bytes, so a valid frame following a corrupted one
/// survives. The stream self-heals this way after line noise or a
/// marker split across reads.
pub(crate) fn next_frame(buffer: &mut VecDeque<u8>, has_intensity: bool) -> FrameStep {
    let start_index = match find_sync_index(buffer) {
        Some(i) => i,
        None => {
            // The last byte may be the first half of a marker split
            // across reads.
            if buffer.len() > 1 {
                buffer.drain(..buffer.len() - 1);
            }
            return FrameStep::NeedMoreData;
        }
    };
    buffer.drain(..start_index); // remove leading bytes

    if buffer.len() < PACKET_HEADER_SIZE {
        return FrameStep::NeedMoreData;
    }
    let header_bytes = buffer
        .iter()
        .take(PACKET_HEADER_SIZE)
        .copied()
        .collect::<Vec<_>>();
    let header = match PacketHeader::parse(&header_bytes) {
        Ok(header) => header,
        Err(e) => {
            debug!("Rejected packet header: {e}");
            buffer.drain(..2);
            return FrameStep::Resync;
        }
    };

    let n_packet_bytes = header.packet_size(bytes_per_sample(has_intensity));
    if buffer.len() < n_packet_bytes {
        // insufficient buffer size to extract the packet
        return FrameStep::NeedMoreData;
    }
    let packet = buffer
        .iter()
        .take(n_packet_bytes)
        .copied()
        .collect::<Vec<_>>();
    if let Err(e) = err_if_checksum_mismatched(&packet, header.checksum, has_intensity) {
        debug!("Rejected packet: {e}");
        buffer.drain(..2);
        return FrameStep::Resync;
    }

    buffer.drain(..n_packet_bytes);
    FrameStep::Packet(header, packet[PACKET_HEADER_SIZE..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{encode_packet, TestSample};

    #[test]
    fn test_find_sync_index() {
        let buffer = VecDeque::from(vec![0x01, 0x02, 0xAA, 0x55, 0x03]);
        assert_eq!(find_sync_index(&buffer), Some(2));

        let buffer = VecDeque::from(vec![0xAA, 0x55]);
        assert_eq!(find_sync_index(&buffer), Some(0));

        // split marker: nothing to find yet
        let buffer = VecDeque::from(vec![0x01, 0xAA]);
        assert_eq!(find_sync_index(&buffer), None);

        let buffer = VecDeque::new();
        assert_eq!(find_sync_index(&buffer), None);
    }

    #[test]
    fn test_parse_header() {
        let header = [0xAA, 0x55, 0x7B, 0x28, 0x00, 0x00, 0x40, 0x00, 0x12, 0x34];
        let parsed = PacketHeader::parse(&header).unwrap();
        assert_eq!(parsed.ct, 0x7B);
        assert_eq!(parsed.n_samples, 40);
        assert_eq!(parsed.start_angle_raw, 0);
        assert_eq!(parsed.end_angle_raw, 0x0040);
        assert_eq!(parsed.checksum, 0x3412);
        assert!(parsed.is_zero_position());
        assert!((parsed.scan_frequency() - 6.1).abs() < 1e-12);

        let header = [0xAA, 0x55, 0x7A, 0x28, 0x00, 0x00, 0x40, 0x00, 0x12, 0x34];
        assert!(!PacketHeader::parse(&header).unwrap().is_zero_position());
    }

    #[test]
    fn test_parse_header_rejects_sample_count() {
        let header = [0xAA, 0x55, 0x02, 0x00, 0x00, 0x00, 0x40, 0x00, 0x12, 0x34];
        assert!(matches!(
            PacketHeader::parse(&header),
            Err(TMiniError::InvalidSampleCount(0))
        ));

        let header = [0xAA, 0x55, 0x02, 0x51, 0x00, 0x00, 0x40, 0x00, 0x12, 0x34];
        assert!(matches!(
            PacketHeader::parse(&header),
            Err(TMiniError::InvalidSampleCount(0x51))
        ));
    }

    #[test]
    fn test_calc_checksum_known_vector() {
        // CT = 0x01, LSN = 1, FSA = 0, LSA = 64, one sample
        // (intensity 0x10, distance word 0x0100):
        // 0x55AA ^ 0x0000 ^ 0x0010 ^ 0x0100 ^ 0x0101 ^ 0x0040 = 0x55FB
        let packet = [
            0xAA, 0x55, 0x01, 0x01, 0x00, 0x00, 0x40, 0x00, 0xFB, 0x55, 0x10, 0x00, 0x01,
        ];
        assert_eq!(calc_checksum(&packet, true), 0x55FB);
        assert!(err_if_checksum_mismatched(&packet, 0x55FB, true).is_ok());
    }

    #[test]
    fn test_checksum_rejects_any_single_byte_mutation() {
        let samples = [
            TestSample::new(0x0208, 17),
            TestSample::new(0x1040, 250),
            TestSample::new(0x0000, 0),
        ];
        for has_intensity in [true, false] {
            let packet = encode_packet(0x7A, 30 * 64, 33 * 64, &samples, has_intensity);
            let expected = to_u16(packet[8], packet[9]);
            assert!(err_if_checksum_mismatched(&packet, expected, has_intensity).is_ok());

            for i in 0..packet.len() {
                let mut mutated = packet.clone();
                mutated[i] ^= 0x5A;
                let expected = to_u16(mutated[8], mutated[9]);
                assert!(
                    err_if_checksum_mismatched(&mutated, expected, has_intensity).is_err(),
                    "mutation at byte {} must be rejected",
                    i
                );
            }
        }
    }

    #[test]
    fn test_next_frame_needs_more_data() {
        // header only announces 3 samples, payload missing
        let packet = encode_packet(0x7A, 0, 3 * 64, &[TestSample::new(0x0208, 17); 3], true);
        let mut buffer = VecDeque::from(packet[..12].to_vec());
        assert!(matches!(
            next_frame(&mut buffer, true),
            FrameStep::NeedMoreData
        ));
        // the partial packet is retained for the next read
        assert_eq!(buffer.len(), 12);

        buffer.extend(&packet[12..]);
        assert!(matches!(
            next_frame(&mut buffer, true),
            FrameStep::Packet(_, _)
        ));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_next_frame_skips_leading_garbage() {
        let packet = encode_packet(0x7A, 0, 64, &[TestSample::new(0x0208, 17)], true);
        let mut buffer = VecDeque::from(vec![0x00, 0x13, 0x9F]);
        buffer.extend(&packet);
        match next_frame(&mut buffer, true) {
            FrameStep::Packet(header, payload) => {
                assert_eq!(header.n_samples, 1);
                assert_eq!(payload.len(), 3);
            }
            _ => panic!("expected a packet"),
        }
    }

    #[test]
    fn test_next_frame_drops_garbage_without_marker() {
        let mut buffer = VecDeque::from(vec![0x01, 0x02, 0x03, 0xAA]);
        assert!(matches!(
            next_frame(&mut buffer, true),
            FrameStep::NeedMoreData
        ));
        // all but the possible marker half are gone
        assert_eq!(buffer, VecDeque::from(vec![0xAA]));
    }

    #[test]
    fn test_next_frame_resyncs_after_corruption() {
        let first = encode_packet(0x7B, 0, 64, &[TestSample::new(0x0208, 17)], true);
        let second = encode_packet(0x7A, 64, 2 * 64, &[TestSample::new(0x1040, 3)], true);

        let mut corrupted = first.clone();
        corrupted[10] ^= 0x04; // flip a payload bit right after the header

        let mut buffer = VecDeque::new();
        buffer.extend(&corrupted);
        buffer.extend(&second);

        assert!(matches!(next_frame(&mut buffer, true), FrameStep::Resync));
        match next_frame(&mut buffer, true) {
            FrameStep::Packet(header, _) => assert_eq!(header.start_angle_raw, 64),
            _ => panic!("the packet after the corrupted one must survive"),
        }
    }
}
