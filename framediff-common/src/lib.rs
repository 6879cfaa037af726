pub mod bin_common;

/// For stand-alone functionality that fit comfortably within one file.
pub mod utils;
