//! Configuration validation.
//!
//! Serde handles the syntactic side; this module checks value ranges,
//! addresses and route conflicts. All problems are collected, not just the
//! first one.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RelayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", listener.bind_address),
        ));
    }

    let routes = [
        ("listener.send_route", &listener.send_route),
        ("listener.ack_route", &listener.ack_route),
        ("listener.status_route", &listener.status_route),
    ];
    for (field, route) in routes {
        if !route.starts_with('/') {
            errors.push(ValidationError::new(field, format!("'{}' must start with '/'", route)));
        }
    }
    for (i, (field, route)) in routes.iter().enumerate() {
        if routes[..i].iter().any(|(_, other)| other == route) {
            errors.push(ValidationError::new(
                field,
                format!("'{}' is already used by another route", route),
            ));
        }
    }

    if listener.max_message_size == 0 {
        errors.push(ValidationError::new("listener.max_message_size", "must be greater than 0"));
    }

    if let Some(tls) = &listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    if config.delivery.retry_interval_ms == 0 {
        errors.push(ValidationError::new("delivery.retry_interval_ms", "must be greater than 0"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    let source = &config.source;
    if source.enabled {
        if url::Url::parse(&source.rpc_url).is_err() {
            errors.push(ValidationError::new(
                "source.rpc_url",
                format!("'{}' is not a valid URL", source.rpc_url),
            ));
        }
        if source.rpc_timeout_secs == 0 {
            errors.push(ValidationError::new("source.rpc_timeout_secs", "must be greater than 0"));
        }
        if source.poll_interval_ms == 0 {
            errors.push(ValidationError::new("source.poll_interval_ms", "must be greater than 0"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = RelayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.listener.ack_route = "acknowledge".into();
        config.delivery.retry_interval_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["listener.bind_address", "listener.ack_route", "delivery.retry_interval_ms"]
        );
    }

    #[test]
    fn rejects_shared_routes() {
        let mut config = RelayConfig::default();
        config.listener.ack_route = config.listener.send_route.clone();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "listener.ack_route");
    }

    #[test]
    fn source_checked_only_when_enabled() {
        let mut config = RelayConfig::default();
        config.source.rpc_url = "::nope::".into();
        assert!(validate_config(&config).is_ok());

        config.source.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "source.rpc_url");
    }

    #[test]
    fn empty_tls_paths_rejected() {
        let mut config = RelayConfig::default();
        config.listener.tls = Some(TlsConfig {
            cert_path: String::new(),
            key_path: "key.pem".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "listener.tls.cert_path: must not be empty");
    }
}
