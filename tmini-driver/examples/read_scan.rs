use clap::{Arg, Command};
use std::time::Duration;
use tmini_driver::{DriverConfig, TMiniDriver};

fn get_port_name() -> String {
    let matches = Command::new("LiDAR scan reader.")
        .about("Reads scans from a YDLiDAR T-mini Pro.")
        .disable_version_flag(true)
        .arg(
            Arg::new("port")
                .help("The device path to a serial port")
                .required(true),
        )
        .get_matches();

    let port_name: &String = matches.get_one("port").unwrap();
    port_name.to_string()
}

fn main() {
    env_logger::init();
    let port_name = get_port_name();

    let mut driver = TMiniDriver::new(DriverConfig::new(&port_name));
    driver.connect().unwrap();
    driver.start_scanning().unwrap();

    loop {
        match driver.get_scan(Duration::from_secs(2)) {
            Some(scan) => {
                println!(
                    "scan #{}: {} points ({} valid), {:.1} Hz",
                    driver.get_scan_count(),
                    scan.len(),
                    scan.valid_points().count(),
                    scan.scan_frequency,
                );
            }
            None => println!("No scan received within two seconds."),
        }
    }
}
