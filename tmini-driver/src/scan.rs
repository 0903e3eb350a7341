use crate::numeric::{
    intensity_10bit, intensity_8bit, raw_distance_to_meters, raw_distance_with_intensity,
    raw_to_degrees, to_u16,
};
use crate::packet::PacketHeader;
use crate::time::now_seconds;
use log::debug;
use tmini_data::{LaserPoint, LaserScan};

/// Intensity resolution of the sample stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntensityBit {
    Bits8,
    Bits10,
}

/// Decodes the payload of a validated packet into
/// `(raw_distance, intensity)` pairs, one per sample.
pub(crate) fn decode_samples(
    payload: &[u8],
    n_samples: usize,
    has_intensity: bool,
    intensity_bit: IntensityBit,
) -> Vec<(u16, u16)> {
    let mut samples = Vec::with_capacity(n_samples);
    if has_intensity {
        for i in 0..n_samples {
            let s0 = payload[3 * i];
            let s1 = payload[3 * i + 1];
            let s2 = payload[3 * i + 2];
            let raw_distance = raw_distance_with_intensity(s1, s2);
            let intensity = match intensity_bit {
                IntensityBit::Bits8 => intensity_8bit(s0),
                IntensityBit::Bits10 => intensity_10bit(s0, s1),
            };
            samples.push((raw_distance, intensity));
        }
    } else {
        for i in 0..n_samples {
            samples.push((to_u16(payload[2 * i], payload[2 * i + 1]), 0));
        }
    }
    samples
}

/// Accumulates decoded packets into full rotations.
///
/// State is private to the acquisition thread; nothing here is shared.
pub(crate) struct ScanAssembler {
    points: Vec<LaserPoint>,
    zero_position_seen: bool,
}

impl ScanAssembler {
    pub(crate) fn new() -> ScanAssembler {
        ScanAssembler {
            points: Vec::new(),
            zero_position_seen: false,
        }
    }

    /// Feeds one decoded packet in arrival order. Returns the completed
    /// rotation when this packet carries the zero position flag and
    /// points were accumulated since the previous one.
    pub(crate) fn feed(
        &mut self,
        header: &PacketHeader,
        samples: &[(u16, u16)],
    ) -> Option<LaserScan> {
        let mut completed = None;
        if header.is_zero_position() {
            if !self.points.is_empty() {
                completed = Some(LaserScan {
                    points: std::mem::take(&mut self.points),
                    scan_frequency: header.scan_frequency(),
                    timestamp: now_seconds(),
                });
            }
            self.zero_position_seen = true;
        } else if !self.zero_position_seen {
            // No scan boundary established yet; emitting these points
            // would produce a partial first rotation.
            debug!("Discarding {} samples before the first zero position packet", samples.len());
            return None;
        }
        self.append_points(header, samples);
        completed
    }

    fn append_points(&mut self, header: &PacketHeader, samples: &[(u16, u16)]) {
        let n = samples.len();
        let start_angle = raw_to_degrees(header.start_angle_raw);
        let end_angle = raw_to_degrees(header.end_angle_raw);
        let angle_shift = if end_angle < start_angle { 360. } else { 0. };
        let angle_rate = (end_angle - start_angle + angle_shift) / (n as f64);
        for (i, &(raw_distance, intensity)) in samples.iter().enumerate() {
            let angle = (start_angle + (i as f64) * angle_rate) % 360.;
            self.points.push(LaserPoint {
                angle,
                distance: raw_distance_to_meters(raw_distance),
                intensity,
            });
        }
    }
}
