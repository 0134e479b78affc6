//! Conversions from external infrastructure errors into domain errors.

use std::io::Error as IoError;

use novaio_domain::NovaError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub NovaError);

impl From<InfraError> for NovaError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<NovaError> for InfraError {
    fn from(value: NovaError) -> Self {
        InfraError(value)
    }
}

trait IntoNovaError {
    fn into_nova(self) -> NovaError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → NovaError */
/* -------------------------------------------------------------------------- */

impl IntoNovaError for HttpError {
    fn into_nova(self) -> NovaError {
        if self.is_timeout() {
            return NovaError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return NovaError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => NovaError::Auth(message),
                400..=499 => NovaError::InvalidInput(message),
                _ => NovaError::Network(message),
            };
        }

        if self.is_builder() {
            return NovaError::InvalidInput(format!("invalid HTTP request: {self}"));
        }

        if self.is_decode() {
            return NovaError::Serialization(format!("HTTP body decode failed: {self}"));
        }

        NovaError::Network(format!("HTTP error: {self}"))
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_nova())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → NovaError */
/* -------------------------------------------------------------------------- */

impl IntoNovaError for IoError {
    fn into_nova(self) -> NovaError {
        use std::io::ErrorKind;

        match self.kind() {
            ErrorKind::PermissionDenied => {
                NovaError::Storage(format!("permission denied: {self}"))
            }
            ErrorKind::InvalidData => NovaError::Serialization(format!("invalid data: {self}")),
            _ => NovaError::Storage(format!("I/O error: {self}")),
        }
    }
}

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        InfraError(value.into_nova())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use reqwest::Client;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn connection_refused_maps_to_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = Client::new().get(format!("http://{addr}")).send().await.unwrap_err();
        let mapped: NovaError = InfraError::from(err).into();
        assert!(matches!(mapped, NovaError::Network(_)), "got {mapped:?}");
    }

    #[tokio::test]
    async fn error_for_status_401_maps_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(401)).mount(&server).await;

        let response = Client::new().get(server.uri()).send().await.unwrap();
        let err = response.error_for_status().unwrap_err();
        let mapped: NovaError = InfraError::from(err).into();
        match mapped {
            NovaError::Auth(msg) => assert!(msg.contains("401")),
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn io_errors_map_to_storage() {
        let err = IoError::new(std::io::ErrorKind::NotFound, "gone");
        let mapped: NovaError = InfraError::from(err).into();
        assert!(matches!(mapped, NovaError::Storage(_)));
    }
}
