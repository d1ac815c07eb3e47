//! Screen-time budget enforcement for family devices.
//!
//! A reporter loop charges usage against a remote budget service, warns
//! once when time is nearly gone and locks the session when it runs out.

pub mod budget;
pub mod config;
pub mod enforcement;
pub mod identity;
pub mod platform;
pub mod state;
