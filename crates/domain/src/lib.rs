//! # Domain Models
//!
//! Pure configuration types shared by the `PixHost` crates, with `serde` as the
//! only dependency. Keep it lean: no I/O, networking, or heavy logic, just data
//! and the defaults the service ships with.

pub mod config;
pub mod constants;
