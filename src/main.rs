//! Wiimote report inspector
//!
//! Replays hex-encoded input reports from stdin (one report per line)
//! through the decoder and the mapping engine, and prints the resulting
//! gamepad frames. Real HID transports plug into `DeviceManager` through a
//! `TransportOpener`; this binary needs no hardware.
//!
//! ```text
//! echo "31 00 08 80 80 B3" | wiimote-pad configs/default.toml
//! ```

use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::io::{self, BufRead};
use wiimote_pad::backend::MockGamepadSink;
use wiimote_pad::mapping::config::Config;
use wiimote_pad::mapping::store::{JsonProfileStore, ProfileStore};
use wiimote_pad::wiimote::constants::EXTENSION_ID_ADDR;
use wiimote_pad::wiimote::report;
use wiimote_pad::wiimote::types::{AccelCalibration, DeviceState, ExtensionKind};
use wiimote_pad::{InputReport, MappingEngine};

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path))?,
        None => Config::load_default().unwrap_or_else(|e| {
            warn!("No usable configs/default.toml ({}), using built-in defaults", e);
            Config::default()
        }),
    };

    let store = JsonProfileStore::new(&config.settings.profile_dir)
        .with_context(|| format!("opening profile store {}", config.settings.profile_dir.display()))?;
    store.ensure_defaults().context("seeding built-in profiles")?;

    let name = &config.settings.default_profile;
    let mut profile = store.load(name).with_context(|| format!("loading profile '{}'", name))?;
    profile.record_usage();
    let profile = store.save(&profile)?;
    let engine = MappingEngine::new(profile);

    println!("=== Wiimote Report Inspector ===");
    println!("Profile: {} ({:?})", engine.profile().name, engine.strategy());
    println!("Paste one hex report per line, Ctrl+D to finish");
    println!();

    let calibration = AccelCalibration::default();
    let mut state = DeviceState::new("stdin");
    state.connected = true;
    let mut sink = MockGamepadSink::new("inspector");

    for (index, line) in io::stdin().lock().lines().enumerate() {
        let line = line.context("reading stdin")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = index + 1;

        let bytes = match parse_hex(line) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("line {}: {}", line_no, e);
                continue;
            }
        };

        let Some(decoded) = report::decode(&bytes) else {
            println!("{:>4}: ignored (unknown or truncated report)", line_no);
            continue;
        };
        decoded.apply(&mut state, &calibration);

        if let InputReport::ReadData(read) = &decoded {
            if read.error == 0 && read.address == (EXTENSION_ID_ADDR & 0xFFFF) as u16 {
                let kind = ExtensionKind::from_identifier(read.bytes());
                info!("Extension identified as {:?}", kind);
                state.set_extension(kind);
            }
        }

        let frame = engine.submit(&state, &mut sink)?;
        let pressed: Vec<_> = state.buttons.pressed().collect();
        println!(
            "{:>4}: {:?} accel=({:.2}, {:.2}, {:.2}) -> pad {:04X} L=({}, {}) R=({}, {}) LT={} RT={}",
            line_no,
            pressed,
            state.accelerometer.x,
            state.accelerometer.y,
            state.accelerometer.z,
            frame.buttons,
            frame.left_x,
            frame.left_y,
            frame.right_x,
            frame.right_y,
            frame.left_trigger,
            frame.right_trigger
        );
    }

    println!();
    println!("✓ {} frames submitted", sink.submit_count());
    Ok(())
}

/// "31 00 08", "0x31 0x00 0x08" and "310008" all parse to the same bytes
fn parse_hex(line: &str) -> Result<Vec<u8>> {
    let digits: String = line
        .split_whitespace()
        .map(|token| token.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();

    if !digits.is_ascii() {
        bail!("non-hex characters in '{}'", line);
    }
    if digits.len() % 2 != 0 {
        bail!("odd number of hex digits in '{}'", line);
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte '{}'", &digits[i..i + 2]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        let expected = vec![0x31, 0x00, 0x08];
        assert_eq!(parse_hex("31 00 08").unwrap(), expected);
        assert_eq!(parse_hex("0x31 0x00 0x08").unwrap(), expected);
        assert_eq!(parse_hex("310008").unwrap(), expected);
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(parse_hex("3").is_err());
        assert!(parse_hex("zz").is_err());
    }
}
