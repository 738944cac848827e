//! API constants

/// Prefix of every versioned endpoint.
pub const API_PREFIX: &str = "/api/v0";

/// Headroom over the largest upload ceiling for multipart framing and text fields.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
