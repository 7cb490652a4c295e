use std::fmt::Debug;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Who controls a fan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanMode {
    /// The SMC's own fan curve
    Automatic,
    /// A fixed target speed
    Forced,
}

/// One request to the helper, sent as a single JSON line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HelperRequest {
    SetFanMode { fan: u8, mode: FanMode },
    SetFanSpeed { fan: u8, rpm: u32 },
    ResetFans,
}

/// The helper's answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HelperResponse {
    Ok,
    Error { code: String, message: String },
}

/// Channel to the helper process
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HelperTransport: Send + Sync + Debug {
    async fn call(&self, request: &HelperRequest) -> Result<HelperResponse>;
}
