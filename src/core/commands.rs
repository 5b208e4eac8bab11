//! Arm / disarm / part-arm commands
//!
//! Commands go through the same ensure-session middleware as reads. A
//! command the panel refuses is never retried and never degraded: the caller
//! gets a [`RiscoError::Command`] carrying the panel's reply.

use super::manager::CloudSessionManager;
use super::session::{error_flag, RemoteResponse, TransportFactory};
use crate::constants::{Endpoint, COMMAND_PARTITION_INDEX, NO_BYPASS_ZONE};
use crate::models::{ArmCommand, WireForm};
use crate::utils::RiscoError;
use serde_json::Value;
use tracing::{error, info};

impl<F: TransportFactory> CloudSessionManager<F> {
    /// Arm, disarm or part-arm the first partition
    ///
    /// Returns the decoded panel reply on success.
    pub async fn set_arm_status(&self, command: ArmCommand) -> Result<Value, RiscoError> {
        info!(%command, "Sending arm command");
        let reply = self
            .call(Endpoint::ArmDisarm, arm_payload(command), check_command_response)
            .await?;
        info!(%command, "Arm command accepted");
        Ok(reply)
    }
}

/// Form body for the arm/disarm endpoint
pub fn arm_payload(command: ArmCommand) -> WireForm {
    WireForm::new()
        .with(
            "type",
            format!("{}:{}", COMMAND_PARTITION_INDEX, command.wire_code()),
        )
        .with("bypassZoneId", NO_BYPASS_ZONE.to_string())
        .with("passcode", command.passcode())
}

/// The error flag wins over the HTTP status; a body that is not JSON is a
/// hard failure.
fn check_command_response(resp: RemoteResponse) -> Result<Value, RiscoError> {
    let decoded = resp.json(Endpoint::ArmDisarm);

    if let Ok(body) = &decoded {
        let code = error_flag(body);
        if code != 0 {
            error!(code, "Arm command rejected by panel");
            return Err(RiscoError::Command {
                code,
                payload: body.clone(),
            });
        }
    }

    if !resp.is_success() {
        return Err(RiscoError::HttpStatus {
            endpoint: Endpoint::ArmDisarm.name().to_string(),
            status: resp.status,
        });
    }

    decoded
}
