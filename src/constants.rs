//! # Application-Wide Constants
//!
//! Endpoints, cookie names and timing defaults for the Risco cloud client.
//!
//! ## Usage
//!
//! ```rust
//! use risco_cloud::constants::*;
//!
//! let url = format!("{}{}", DEFAULT_BASE_URL, Endpoint::Overview.path());
//! assert!(url.ends_with("Overview/Get"));
//! ```

// ============================================================================
// Remote Service
// ============================================================================

/// Base URL of the vendor cloud web UI
///
/// All endpoint paths are appended to this value, so it keeps its trailing slash.
pub const DEFAULT_BASE_URL: &str = "https://homelink.g4s.dk/ELAS/WebUI/";

/// Name of the cookie carrying the session token
///
/// Its `expires` attribute drives the local expiry check.
pub const SESSION_COOKIE_NAME: &str = "RUCCookie";

/// Language tag sent with credentials when none is configured
pub const DEFAULT_LANG: &str = "en-gb";

/// Remote endpoints used by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Credential login (POST to the base URL itself)
    Auth,
    /// Pin-based site selection after login
    SiteLogin,
    /// Partition overview
    Overview,
    /// Control panel state; doubles as the liveness probe
    CpState,
    /// Arm / disarm / part-arm
    ArmDisarm,
}

impl Endpoint {
    /// Path relative to the base URL, including any fixed query string
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Auth => "",
            Endpoint::SiteLogin => "SiteLogin",
            Endpoint::Overview => "Overview/Get",
            Endpoint::CpState => "Security/GetCPState?userIsAlive=true",
            Endpoint::ArmDisarm => "Security/ArmDisarm",
        }
    }

    /// Short name for logs and error messages
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Auth => "Auth",
            Endpoint::SiteLogin => "SiteLogin",
            Endpoint::Overview => "Overview/Get",
            Endpoint::CpState => "Security/GetCPState",
            Endpoint::ArmDisarm => "Security/ArmDisarm",
        }
    }
}

// ============================================================================
// Timing
// ============================================================================

/// Lower bound (and first value) of the retry backoff, in seconds
pub const BACKOFF_INITIAL_SECS: u64 = 4;

/// Upper bound of the retry backoff, in seconds
pub const BACKOFF_MAX_SECS: u64 = 10;

/// Per-request HTTP timeout, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default interval between polls for `watch`, in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

// ============================================================================
// Command Payload
// ============================================================================

/// Partition addressed by arm/disarm commands (only the first is supported)
pub const COMMAND_PARTITION_INDEX: u32 = 0;

/// `bypassZoneId` sentinel meaning "bypass no zone"
pub const NO_BYPASS_ZONE: i32 = -1;

/// Passcode placeholder sent with disarm / part-arm
///
/// The pin was already supplied during authentication; the endpoint still
/// expects the slot to be filled.
pub const PASSCODE_PLACEHOLDER: &str = "------";
