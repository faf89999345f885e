//! Channel names used in node wiring and logs.

pub const ODOMETRY: &str = "/downlink/odometry";
pub const HEALTH: &str = "/downlink/health";
pub const FRAMES: &str = "/downlink/frames";
