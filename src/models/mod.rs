//! # Domain Models
//!
//! Value types shared by the session manager and its callers.
//!
//! ## Security Design
//!
//! Passwords, panel codes and pins live in [`SecureString`], which zeroes its
//! buffer on drop and never reveals its content through `Debug`. They leave it
//! only when a credential is turned into a request body via `to_wire_format`.
//!
//! ## Alarm Model
//!
//! [`AlarmState`] is the reduced view of the first partition. [`ArmCommand`]
//! maps each state change to the code the arm/disarm endpoint expects.

pub mod alarm;
pub mod credentials;

pub use alarm::{AlarmState, ArmCommand};
pub use credentials::{PinCredential, SecureString, UserCredential, Username, WireForm};
