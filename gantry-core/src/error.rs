use std::num::ParseIntError;
use thiserror::Error;

/// Why a discovered container could not be turned into a [`ServiceSpec`].
///
/// Every variant is scoped to a single container: the container is skipped
/// for the current cycle and the scan continues with the next one.
///
/// [`ServiceSpec`]: crate::spec::ServiceSpec
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("container has no gateway path configured")]
    GatewayPathUnset,

    #[error("container has empty gateway path configured")]
    GatewayPathEmpty,

    #[error("container has invalid port configured: {value:?}")]
    InvalidPort {
        value: String,
        /// `None` when the value was refused before parsing, e.g. a signed number.
        #[source]
        source: Option<ParseIntError>,
    },

    #[error("container has invalid authentication directive configured: {value:?}")]
    InvalidAuthDirective { value: String },
}

/// Configuration that loaded but cannot be used.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_port_keeps_parse_error_as_source() {
        let source = "abc".parse::<u16>().unwrap_err();
        let err = SpecError::InvalidPort {
            value: "abc".into(),
            source: Some(source),
        };
        assert_eq!(err.to_string(), r#"container has invalid port configured: "abc""#);
        assert!(std::error::Error::source(&err).is_some());

        let signed = SpecError::InvalidPort {
            value: "+8081".into(),
            source: None,
        };
        assert!(std::error::Error::source(&signed).is_none());
    }

    #[test]
    fn config_error_messages_name_the_field() {
        assert_eq!(
            ConfigError::Missing("auth.client_id").to_string(),
            "missing required setting: auth.client_id"
        );
        let err = ConfigError::Invalid {
            field: "scan.interval_secs",
            reason: "must be greater than zero".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid setting scan.interval_secs: must be greater than zero"
        );
    }
}
