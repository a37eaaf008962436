//! Configuration validation functions.

use super::Config;

/// Reject settings the relay cannot run with.
///
/// `load()` only reports these on stderr; the binary calls this again and
/// refuses to start on error.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    if config.relay.outbound_queue_capacity == 0 {
        anyhow::bail!("relay.outbound_queue_capacity must be greater than zero");
    }

    if config.relay.client_timeout_secs > 0 && config.relay.cleanup_interval_secs == 0 {
        anyhow::bail!(
            "relay.cleanup_interval_secs must be greater than zero while relay.client_timeout_secs \
             is enabled (configured timeout: {}s)",
            config.relay.client_timeout_secs
        );
    }

    if config.security.require_metrics_auth {
        let token_present = config
            .security
            .metrics_auth_token
            .as_ref()
            .is_some_and(|token| !token.is_empty());

        if !token_present {
            anyhow::bail!(
                "\nMetrics authentication is enabled but no token is configured.\n\
                 Configure a shared bearer token:\n\
                 export SIGNAL_RELAY__SECURITY__METRICS_AUTH_TOKEN=\"$(openssl rand -hex 32)\"\n\
                 or disable it:\n\
                 export SIGNAL_RELAY__SECURITY__REQUIRE_METRICS_AUTH=false\n"
            );
        }

        if let Some(token) = &config.security.metrics_auth_token {
            if token.len() < 16 {
                eprintln!(
                    "WARNING: Metrics auth token is very short ({} chars). \
                     Generate a strong token: openssl rand -hex 32",
                    token.len()
                );
            }
        }
    }

    if config.security.cors_origins.trim().is_empty() {
        anyhow::bail!("security.cors_origins must not be empty (use \"*\" to allow any origin)");
    }

    config.websocket.validate()?;

    Ok(())
}
