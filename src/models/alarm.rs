//! Alarm state and arm command types

use crate::constants::PASSCODE_PLACEHOLDER;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reduced state of the first partition
///
/// Recomputed on every query, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    Unknown,
    Disarmed,
    Armed,
    PartArmed,
    Triggered,
}

impl AlarmState {
    pub fn as_str(self) -> &'static str {
        match self {
            AlarmState::Unknown => "unknown",
            AlarmState::Disarmed => "disarmed",
            AlarmState::Armed => "armed",
            AlarmState::PartArmed => "part_armed",
            AlarmState::Triggered => "triggered",
        }
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command changing the arm state of the first partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmCommand {
    Arm,
    Disarm,
    PartArm,
}

impl ArmCommand {
    /// Code embedded in the `type` field of the arm/disarm request
    pub fn wire_code(self) -> &'static str {
        match self {
            ArmCommand::Arm => "armed",
            ArmCommand::Disarm => "disarmed",
            ArmCommand::PartArm => "ELArm4",
        }
    }

    /// Value for the `passcode` field: empty when arming, placeholder otherwise
    pub fn passcode(self) -> &'static str {
        match self {
            ArmCommand::Arm => "",
            ArmCommand::Disarm | ArmCommand::PartArm => PASSCODE_PLACEHOLDER,
        }
    }
}

impl fmt::Display for ArmCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArmCommand::Arm => "arm",
            ArmCommand::Disarm => "disarm",
            ArmCommand::PartArm => "partarm",
        };
        f.write_str(name)
    }
}
