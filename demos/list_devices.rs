//! Print the cameras GStreamer can see and the one the scanner would open.

use anyhow::Result;
use codecam_camera::{resolve_constraints, GstMediaDevices, MediaDevices};
use serde_json::json;

fn main() -> Result<()> {
    env_logger::init();

    let devices = GstMediaDevices::new()?;
    let found = devices.enumerate_devices()?;
    if found.is_empty() {
        eprintln!("No cameras found");
    }

    let report = json!({
        "devices": found,
        "constraints": resolve_constraints(&found),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
