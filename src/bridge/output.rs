//! Interpreting the bridge tool's human-readable output.
//!
//! The tool reports most outcomes only as text on stdout, so every operation
//! carries a pair of phrase groups. Success phrases are always checked first
//! and output that matches neither group is reported, never guessed.

use crate::error::{Cause, MirrorError, Result};
use crate::Device;

const DEVICES_HEADER: &str = "List of devices attached";

/// Case-insensitive phrase groups for one bridge operation.
#[derive(Debug, Clone, Copy)]
pub struct Phrases {
    pub success: &'static [&'static str],
    pub failure: &'static [&'static str],
}

pub const PAIR: Phrases = Phrases {
    success: &["successfully paired to", "already paired"],
    failure: &["failed", "error"],
};

pub const CONNECT: Phrases = Phrases {
    success: &["connected to", "already connected"],
    failure: &["failed", "unable", "cannot"],
};

pub const TCPIP: Phrases = Phrases {
    success: &["restarting in tcp mode", "already in tcp"],
    failure: &[],
};

pub const DISCONNECT: Phrases = Phrases {
    success: &["disconnected", "no such device"],
    failure: &[],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure,
    Unrecognized,
}

pub fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|needle| lower.contains(&needle.to_lowercase()))
}

pub fn classify(stdout: &str, phrases: &Phrases) -> Verdict {
    if contains_any(stdout, phrases.success) {
        Verdict::Success
    } else if contains_any(stdout, phrases.failure) {
        Verdict::Failure
    } else {
        Verdict::Unrecognized
    }
}

/// Turn a verdict into the operation's result.
pub fn interpret(command: &str, stdout: &str, stderr: &str, phrases: &Phrases) -> Result<()> {
    match classify(stdout, phrases) {
        Verdict::Success => Ok(()),
        Verdict::Failure => Err(MirrorError::command_failed(
            command,
            stdout,
            stderr,
            None,
            Cause::Output(format!("{} reported failure", command)),
        )),
        Verdict::Unrecognized => Err(MirrorError::parse(
            command,
            stdout,
            stderr,
            Cause::Output("output matched no known phrase".into()),
        )),
    }
}

/// Parse the output of `devices`.
///
/// One malformed line fails the whole listing.
pub fn parse_devices(command: &str, stdout: &str, stderr: &str) -> Result<Vec<Device>> {
    let mut devices = Vec::new();

    for line in stdout.lines().map(str::trim) {
        // `* daemon not running; starting now ...` and friends
        if line.is_empty() || line.starts_with(DEVICES_HEADER) || line.starts_with('*') {
            continue;
        }

        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(id), Some(state)) => devices.push(Device {
                id: id.to_string(),
                state: state.to_string(),
            }),
            _ => {
                return Err(MirrorError::parse(
                    command,
                    stdout,
                    stderr,
                    Cause::Output(format!("unexpected device line: {:?}", line)),
                ));
            }
        }
    }

    Ok(devices)
}
