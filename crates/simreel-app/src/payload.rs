use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid job result: {0}")]
    Json(#[from] serde_json::Error),
    #[error("job failed: {0}")]
    JobFailed(String),
    #[error("job result carries no animation: {0}")]
    MissingAnimation(String),
    #[error("failed to write payload: {0}")]
    Io(#[from] std::io::Error),
}

/// The encoded animation exactly as received.
///
/// Bytes are reference-counted so the player, the background decoder and a
/// download can share one buffer without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAnimation {
    bytes: Arc<[u8]>,
}

impl EncodedAnimation {
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Decode a base64 payload. Accepts an optional `data:...;base64,` prefix
    /// and ignores embedded whitespace (line-wrapped payloads).
    pub fn from_base64(encoded: &str) -> Result<Self, PayloadError> {
        let trimmed = encoded.trim();
        let body = match trimmed.strip_prefix("data:") {
            Some(uri) => uri.split_once(',').map_or(uri, |(_, data)| data),
            None => trimmed,
        };
        let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = STANDARD.decode(compact)?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Logical screen size from the GIF header, if the header is present.
    pub fn screen_size(&self) -> Option<(u16, u16)> {
        let b = &self.bytes;
        if b.len() < 10 || !b.starts_with(b"GIF8") {
            return None;
        }
        Some((
            u16::from_le_bytes([b[6], b[7]]),
            u16::from_le_bytes([b[8], b[9]]),
        ))
    }
}

/// Write a payload verbatim, creating parent directories as needed.
pub fn save_download(bytes: &[u8], path: &Path) -> Result<(), PayloadError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    log::info!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Response envelope of a simulation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,
    #[serde(default)]
    pub data: Option<JobData>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobData {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    /// Static result images (base64 PNG); not played back.
    #[serde(default)]
    pub graphs: Vec<String>,
    /// Animated GIF as base64.
    #[serde(default)]
    pub animation: Option<String>,
}

impl JobResult {
    pub fn from_json(json: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(json)?)
    }

    fn message(&self) -> String {
        self.data
            .as_ref()
            .and_then(|d| d.message.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Extract the animation payload.
    pub fn animation(&self) -> Result<EncodedAnimation, PayloadError> {
        if !self.success {
            let mut msg = self.message();
            if let Some(details) = &self.details {
                msg = format!("{msg} ({details})");
            }
            return Err(PayloadError::JobFailed(msg));
        }
        match self.data.as_ref().and_then(|d| d.animation.as_deref()) {
            Some(encoded) => EncodedAnimation::from_base64(encoded),
            None => Err(PayloadError::MissingAnimation(self.message())),
        }
    }
}
