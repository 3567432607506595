//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use std::sync::Arc;

use super::error::TranscodeError;
use super::types::{TranscodeOutput, TranscodeRequest};

/// An external tool that re-encodes one file into the target encoding.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Writes `request.input_path` re-encoded to `request.output_path`.
    ///
    /// Implementations must never modify the input.
    async fn transcode(&self, request: &TranscodeRequest)
        -> Result<TranscodeOutput, TranscodeError>;

    /// Validates that the transcoder is properly configured and ready.
    async fn validate(&self) -> Result<(), TranscodeError>;
}

#[async_trait]
impl<T: Transcoder + ?Sized> Transcoder for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn transcode(
        &self,
        request: &TranscodeRequest,
    ) -> Result<TranscodeOutput, TranscodeError> {
        (**self).transcode(request).await
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        (**self).validate().await
    }
}
