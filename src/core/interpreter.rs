//! Alarm state interpretation
//!
//! The overview endpoint reports the first partition as three string flags
//! (`armedStr`, `disarmedStr`, `partarmedStr`); the control panel state
//! endpoint reports whether an alarm is ongoing. [`reduce_alarm_state`] folds
//! both into one [`AlarmState`].
//!
//! # Precedence
//!
//! triggered > armed > disarmed > part-armed > unknown
//!
//! Missing keys and malformed bodies are logged and degrade towards
//! `Unknown`; only transport-level failures surface as errors.

use super::manager::CloudSessionManager;
use super::session::{RemoteResponse, TransportFactory};
use crate::constants::Endpoint;
use crate::models::{AlarmState, WireForm};
use crate::utils::RiscoError;
use serde_json::Value;
use tracing::{debug, error, warn};

const INDICATOR_KEYS: [&str; 3] = ["armedStr", "disarmedStr", "partarmedStr"];

/// Flag values the cloud uses for "set"
///
/// Compared as strings, case-insensitively, after trimming.
const AFFIRMATIVE_FLAGS: [&str; 3] = ["yes", "1", "true"];

impl<F: TransportFactory> CloudSessionManager<F> {
    /// Current state of the first partition
    pub async fn get_arm_status(&self) -> Result<AlarmState, RiscoError> {
        let overview = self.fetch_payload(Endpoint::Overview).await?;
        // Triggered status is only reported by the panel state endpoint.
        let cp_state = self.fetch_payload(Endpoint::CpState).await?;

        let state = reduce_alarm_state(&overview, &cp_state);
        debug!(%state, "Alarm state");
        Ok(state)
    }

    /// Authenticated, retried read returning the decoded body
    ///
    /// A body that is not JSON becomes `Value::Null` so the reducer can
    /// degrade instead of failing the read.
    async fn fetch_payload(&self, endpoint: Endpoint) -> Result<Value, RiscoError> {
        self.call(endpoint, WireForm::new(), move |resp| decode_read(endpoint, resp))
            .await
    }
}

fn decode_read(endpoint: Endpoint, resp: RemoteResponse) -> Result<Value, RiscoError> {
    if !resp.is_success() {
        return Err(RiscoError::HttpStatus {
            endpoint: endpoint.name().to_string(),
            status: resp.status,
        });
    }
    Ok(resp.json(endpoint).unwrap_or_else(|err| {
        warn!(error = %err, "Continuing with an empty payload");
        Value::Null
    }))
}

/// Fold an overview payload and a panel state payload into one state
pub fn reduce_alarm_state(overview: &Value, cp_state: &Value) -> AlarmState {
    let part_info = overview
        .get("overview")
        .and_then(|o| o.get("partInfo"))
        .unwrap_or(&Value::Null);

    if !INDICATOR_KEYS.iter().all(|key| part_info.get(key).is_some()) {
        error!(overview = %overview, "Missing status keys in overview");
    }

    if is_affirmative(cp_state.get("OngoingAlarm")) {
        return AlarmState::Triggered;
    }

    // Multi-partition panels are reduced to their first partition.
    let indicators = [
        ("armedStr", AlarmState::Armed),
        ("disarmedStr", AlarmState::Disarmed),
        ("partarmedStr", AlarmState::PartArmed),
    ];
    indicators
        .iter()
        .find(|(key, _)| is_affirmative(part_info.get(key)))
        .map(|(_, state)| *state)
        .unwrap_or(AlarmState::Unknown)
}

/// Whether a flag field reads as "set"
///
/// Strings are matched against the vendor's literal flag values; JSON booleans
/// are taken as-is. Numbers and anything else never count.
pub fn is_affirmative(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(s)) => {
            let flag = s.trim();
            AFFIRMATIVE_FLAGS
                .iter()
                .any(|yes| flag.eq_ignore_ascii_case(yes))
        }
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}
