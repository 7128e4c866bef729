//! Intake orchestration: choose the extraction strategy, apply corrections
//! as patches, and hand back validated orders.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use smeta_core::order::{Order, OrderError};

use crate::extract::{ExtractError, OrderExtractor};

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error(transparent)]
    Invalid(#[from] OrderError),
    #[error("no extractor available for corrections")]
    CorrectionUnavailable,
}

impl IntakeError {
    /// True when the failure came from the order content rather than the
    /// extraction machinery; transports word the user message accordingly.
    pub fn is_user_input_error(&self) -> bool {
        matches!(
            self,
            Self::Invalid(_)
                | Self::Extraction(ExtractError::InvalidOrder(_))
                | Self::Extraction(ExtractError::MalformedCompletion(_))
        )
    }
}

/// Primary/fallback extraction selected by availability. The fallback only
/// ever sees fresh orders; a failed correction surfaces to the user instead
/// of guessing.
pub struct OrderIntake {
    primary: Option<Arc<dyn OrderExtractor>>,
    fallback: Arc<dyn OrderExtractor>,
}

impl OrderIntake {
    pub fn new(primary: Option<Arc<dyn OrderExtractor>>, fallback: Arc<dyn OrderExtractor>) -> Self {
        Self { primary, fallback }
    }

    pub async fn fresh_order(&self, text: &str) -> Result<Order, IntakeError> {
        if let Some(primary) = self.primary.as_ref().filter(|primary| primary.available()) {
            match primary.extract_order(text).await {
                Ok(order) => {
                    info!(extractor = primary.name(), "fresh order extracted");
                    return Ok(order);
                }
                // Content problems are the user's to fix; only machinery
                // failures fall through to the rules.
                Err(error @ ExtractError::InvalidOrder(_)) => return Err(error.into()),
                Err(error) => {
                    warn!(
                        extractor = primary.name(),
                        error = %error,
                        "primary extraction failed; falling back to rule-based parsing"
                    );
                }
            }
        }

        let order = self.fallback.extract_order(text).await?;
        info!(extractor = self.fallback.name(), "fresh order extracted");
        Ok(order)
    }

    /// Corrections mutate the current order: scalar fields overwritten,
    /// custom items appended. No fallback path exists here.
    pub async fn correction(&self, text: &str, current: &Order) -> Result<Order, IntakeError> {
        let primary = self
            .primary
            .as_ref()
            .filter(|primary| primary.available() && primary.handles_corrections())
            .ok_or(IntakeError::CorrectionUnavailable)?;

        let patch = primary.extract_correction(text, current).await?;

        let mut updated = current.clone();
        updated.apply(patch);
        updated.validate()?;
        Ok(updated)
    }
}
