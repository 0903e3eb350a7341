pub mod scan;

pub use scan::{LaserPoint, LaserScan};
