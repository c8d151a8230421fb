//! Adapters from the `model-service` clients to the pipeline capability traits.

pub mod service;

pub use service::{ModelEmbedder, ModelReranker};

use model_service::ModelServiceError;
use model_service::error_handler::ConfigError;

use crate::errors::ProviderError;

/// Maps a service failure onto the capability error used for retry decisions.
///
/// 429 keeps its `Retry-After` hint, 401/403 become [`ProviderError::Auth`],
/// 400/413/422 become [`ProviderError::InvalidInput`] and any other status is
/// kept as [`ProviderError::Http`].
pub fn map_service_error(err: ModelServiceError) -> ProviderError {
    if let Some(status) = err.http_status() {
        let code = status.as_u16();
        return match code {
            429 => ProviderError::RateLimited {
                retry_after: err.retry_after(),
            },
            401 | 403 => ProviderError::Auth(err.to_string()),
            400 | 413 | 422 => ProviderError::InvalidInput(err.to_string()),
            _ => ProviderError::Http {
                status: code,
                snippet: err.to_string(),
            },
        };
    }
    if err.is_timeout() {
        return match err {
            ModelServiceError::Timeout(d) => ProviderError::Timeout(d),
            other => ProviderError::Connection(other.to_string()),
        };
    }
    if err.is_connect() {
        return ProviderError::Connection(err.to_string());
    }
    if err.is_decode() {
        return ProviderError::Decode(err.to_string());
    }
    match err {
        ModelServiceError::Config(ConfigError::InvalidFormat { .. }) => {
            ProviderError::Auth(err.to_string())
        }
        ModelServiceError::Config(_) => ProviderError::Unavailable(err.to_string()),
        other => ProviderError::Connection(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{FailureClass, default_classify};
    use model_service::error_handler::{HttpError, ProviderError as ServiceProviderError};
    use reqwest::StatusCode;
    use std::time::Duration;

    fn status(code: u16, retry_after: Option<Duration>) -> ModelServiceError {
        ModelServiceError::Provider(ServiceProviderError::HttpStatus(HttpError {
            status: StatusCode::from_u16(code).unwrap(),
            url: "http://localhost/api/embed".into(),
            snippet: "body".into(),
            retry_after,
        }))
    }

    #[test]
    fn rate_limit_keeps_hint() {
        let e = map_service_error(status(429, Some(Duration::from_secs(3))));
        assert_eq!(e.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(default_classify(&e), FailureClass::Transient);
    }

    #[test]
    fn status_classes() {
        assert!(matches!(map_service_error(status(401, None)), ProviderError::Auth(_)));
        assert!(matches!(
            map_service_error(status(413, None)),
            ProviderError::InvalidInput(_)
        ));
        let e = map_service_error(status(503, None));
        assert!(matches!(e, ProviderError::Http { status: 503, .. }));
        assert_eq!(default_classify(&e), FailureClass::Transient);
    }

    #[test]
    fn timeouts_decode_and_config() {
        let e = map_service_error(ModelServiceError::Timeout(Duration::from_secs(2)));
        assert!(matches!(e, ProviderError::Timeout(_)));

        let e = map_service_error(ModelServiceError::Provider(
            ServiceProviderError::CountMismatch { expected: 2, got: 1 },
        ));
        assert!(matches!(e, ProviderError::Decode(_)));
        assert_eq!(default_classify(&e), FailureClass::Permanent);

        let e = map_service_error(ModelServiceError::Config(ConfigError::EmptyModel));
        assert!(matches!(e, ProviderError::Unavailable(_)));
    }
}
