//! Engine configuration for zinc-field-core.

use serde::{Deserialize, Serialize};

/// Tunables shared by every field created through one module.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Times closer than this address the same time sequence sample.
    pub time_tolerance: f64,

    /// Xi values may exceed the element's `[0, 1]` range by this much when
    /// searching for an element.
    pub xi_tolerance: f64,

    /// When the sine of the half-angle between two quaternions is below this,
    /// SLERP falls back to a normalized linear blend.
    pub slerp_epsilon: f64,

    /// Initial capacity hint for per-pass memo tables.
    pub memo_capacity: usize,

    /// Prefix of names generated for fields created without one.
    pub temporary_name_prefix: String,

    /// Name of the xi field image samples use when no domain is given.
    pub image_domain_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_tolerance: 1e-9,
            xi_tolerance: 1e-6,
            slerp_epsilon: 1e-9,
            memo_capacity: 16,
            temporary_name_prefix: "temp".to_string(),
            image_domain_name: "xi".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{ "memo_capacity": 4 }"#).expect("config");
        assert_eq!(config.memo_capacity, 4);
        assert_eq!(config.temporary_name_prefix, "temp");
    }
}
