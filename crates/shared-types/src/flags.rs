//! Boolean switches read from environment variables.

use std::env;

/// Read a boolean flag; `None` when unset.
pub fn env_flag(name: &str) -> Option<bool> {
    env::var(name).ok().map(|v| parse_flag(&v))
}

/// Any non-empty value other than `0`/`false`/`no`/`off` enables a flag.
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    !(value.is_empty() || value == "0" || value == "false" || value == "no" || value == "off")
}
