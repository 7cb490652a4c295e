use std::{sync::Arc, time::Duration};

use tracing::{debug, instrument, warn};

use super::{FanMode, HelperRequest, HelperResponse, HelperTransport};
use crate::error::{Error, Result};

/// Upper bound on one helper round trip
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Typed, time-bounded access to the privileged helper
#[derive(Debug, Clone)]
pub struct HelperClient {
    transport: Arc<dyn HelperTransport>,
    timeout: Duration,
}

impl HelperClient {
    pub fn new(transport: Arc<dyn HelperTransport>) -> Self {
        Self { transport, timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn set_fan_mode(&self, fan: u8, mode: FanMode) -> Result<()> {
        self.send(HelperRequest::SetFanMode { fan, mode }).await
    }

    pub async fn set_fan_speed(&self, fan: u8, rpm: u32) -> Result<()> {
        if rpm == 0 {
            return Err(Error::invalid_config("fan speed must be positive; use automatic mode to stop forcing"));
        }
        self.send(HelperRequest::SetFanSpeed { fan, rpm }).await
    }

    pub async fn reset_fans(&self) -> Result<()> {
        self.send(HelperRequest::ResetFans).await
    }

    #[instrument(skip(self))]
    pub async fn send(&self, request: HelperRequest) -> Result<()> {
        let response = tokio::time::timeout(self.timeout, self.transport.call(&request))
            .await
            .map_err(|_| Error::timeout(format!("helper did not answer within {:?}", self.timeout)))??;

        match response {
            HelperResponse::Ok => {
                debug!("Helper request succeeded");
                Ok(())
            },
            HelperResponse::Error { code, message } => {
                warn!(%code, %message, "Helper rejected request");
                Err(match code.as_str() {
                    "unauthorized" | "not_authorized" => Error::permission_denied(message),
                    "unsupported" | "no_such_fan" => Error::unavailable(message),
                    "timeout" => Error::timeout(message),
                    _ => Error::system(format!("helper error {}: {}", code, message)),
                })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{error::SourceErrorKind, helper::MockHelperTransport};

    fn rejecting(code: &'static str) -> HelperClient {
        let mut transport = MockHelperTransport::new();
        transport
            .expect_call()
            .returning(move |_| Ok(HelperResponse::Error { code: code.into(), message: "nope".into() }));
        HelperClient::new(Arc::new(transport))
    }

    #[tokio::test]
    async fn test_success() {
        let mut transport = MockHelperTransport::new();
        transport
            .expect_call()
            .withf(|request| matches!(request, HelperRequest::SetFanMode { fan: 0, mode: FanMode::Forced }))
            .times(1)
            .returning(|_| Ok(HelperResponse::Ok));
        let client = HelperClient::new(Arc::new(transport));
        client.set_fan_mode(0, FanMode::Forced).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_codes_map_onto_taxonomy() {
        let err = rejecting("unauthorized").reset_fans().await.unwrap_err();
        assert_eq!(err.kind(), SourceErrorKind::PermissionDenied);

        let err = rejecting("no_such_fan").set_fan_speed(7, 2000).await.unwrap_err();
        assert_eq!(err.kind(), SourceErrorKind::Unavailable);

        let err = rejecting("smc_write_failed").reset_fans().await.unwrap_err();
        assert!(matches!(err, Error::System(_)));
    }

    #[tokio::test]
    async fn test_zero_rpm_is_rejected_locally() {
        let client = HelperClient::new(Arc::new(MockHelperTransport::new()));
        assert!(matches!(client.set_fan_speed(0, 0).await, Err(Error::InvalidConfig(_))));
    }

    #[derive(Debug)]
    struct Hanging;

    #[async_trait]
    impl HelperTransport for Hanging {
        async fn call(&self, _request: &HelperRequest) -> Result<HelperResponse> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(HelperResponse::Ok)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let client = HelperClient::new(Arc::new(Hanging)).with_timeout(Duration::from_millis(250));
        let err = client.reset_fans().await.unwrap_err();
        assert_eq!(err.kind(), SourceErrorKind::Timeout);
    }
}
