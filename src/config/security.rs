//! Security configuration types.

use super::defaults::{default_cors_origins, default_require_metrics_auth};
use serde::{Deserialize, Deserializer, Serialize};

/// Security configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Allowed CORS origins (comma-separated, or "*" for any)
    #[serde(
        default = "default_cors_origins",
        deserialize_with = "deserialize_origin_list"
    )]
    pub cors_origins: String,
    /// Require a bearer token on the metrics endpoints
    #[serde(default = "default_require_metrics_auth")]
    pub require_metrics_auth: bool,
    /// Bearer token for the metrics endpoints (if required)
    #[serde(default)]
    pub metrics_auth_token: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
            require_metrics_auth: default_require_metrics_auth(),
            metrics_auth_token: None,
        }
    }
}

/// Accept either `"a,b"` or `["a", "b"]`; environment overrides containing a
/// comma arrive as arrays.
fn deserialize_origin_list<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Origins {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Origins::deserialize(deserializer)? {
        Origins::One(origins) => origins,
        Origins::Many(origins) => origins.join(","),
    })
}
