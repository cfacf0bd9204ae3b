//! Generate Batch Use Case

use crate::application::config::ActivationConfig;
use crate::domain::codec::CodeCodec;
use crate::domain::entities::{Batch, CodeRecord};
use crate::domain::repository::CodeRepository;
use crate::error::{ActivationError, ActivationResult};
use std::collections::HashSet;
use std::sync::Arc;

/// Highest batch id whose low byte is unique in the code text
pub const MAX_BATCH_ID: u32 = 255;

/// Rounds of regenerating codes that collide with already stored ones
const MAX_COLLISION_ROUNDS: usize = 5;

#[derive(Debug, Clone)]
pub struct GenerateBatchInput {
    pub batch_id: u32,
    pub duration_days: u32,
    pub count: u32,
}

#[derive(Debug, Clone)]
pub struct GenerateBatchOutput {
    pub batch: Batch,
    pub codes: Vec<String>,
}

/// Generate Batch Use Case
pub struct GenerateBatchUseCase<C>
where
    C: CodeRepository,
{
    code_repo: Arc<C>,
    codec: CodeCodec,
    config: Arc<ActivationConfig>,
}

impl<C> GenerateBatchUseCase<C>
where
    C: CodeRepository,
{
    pub fn new(code_repo: Arc<C>, config: Arc<ActivationConfig>) -> Self {
        Self {
            code_repo,
            codec: CodeCodec::new(config.code_secret.clone()),
            config,
        }
    }

    pub async fn execute(&self, input: GenerateBatchInput) -> ActivationResult<GenerateBatchOutput> {
        self.validate(&input)?;

        if self.code_repo.find_batch(input.batch_id).await?.is_some() {
            return Err(ActivationError::BatchExists(input.batch_id));
        }

        let mut codes: HashSet<String> = HashSet::with_capacity(input.count as usize);
        for _ in 0..MAX_COLLISION_ROUNDS {
            self.fill(&mut codes, &input)?;

            let candidates: Vec<String> = codes.iter().cloned().collect();
            let existing = self.code_repo.find_existing_codes(&candidates).await?;
            if existing.is_empty() {
                break;
            }

            tracing::debug!(collisions = existing.len(), "Regenerating colliding codes");
            for code in &existing {
                codes.remove(code);
            }
        }

        if codes.len() != input.count as usize {
            return Err(ActivationError::Internal(
                "could not generate enough unique codes".into(),
            ));
        }

        let mut codes: Vec<String> = codes.into_iter().collect();
        codes.sort();

        let batch = Batch::new(input.batch_id, input.duration_days, input.count);
        let records: Vec<CodeRecord> = codes
            .iter()
            .map(|code| CodeRecord::available(code.clone(), input.duration_days, input.batch_id))
            .collect();

        self.code_repo.create_batch(&batch, &records).await?;

        tracing::info!(
            batch_id = input.batch_id,
            duration_days = input.duration_days,
            count = input.count,
            "Batch generated"
        );

        Ok(GenerateBatchOutput { batch, codes })
    }

    fn validate(&self, input: &GenerateBatchInput) -> ActivationResult<()> {
        if input.count == 0 || input.count > self.config.max_batch_size {
            return Err(ActivationError::InvalidBatch(format!(
                "count must be between 1 and {}",
                self.config.max_batch_size
            )));
        }
        if !self.config.allowed_durations.contains(&input.duration_days) {
            return Err(ActivationError::InvalidBatch(format!(
                "duration must be one of {:?} days",
                self.config.allowed_durations
            )));
        }
        if input.batch_id > MAX_BATCH_ID {
            return Err(ActivationError::InvalidBatch(format!(
                "batch id must be between 0 and {}",
                MAX_BATCH_ID
            )));
        }
        Ok(())
    }

    /// Encode until `codes` holds `count` distinct codes
    fn fill(&self, codes: &mut HashSet<String>, input: &GenerateBatchInput) -> ActivationResult<()> {
        while codes.len() < input.count as usize {
            let code = self.codec.encode(input.duration_days, input.batch_id)?;
            codes.insert(code.to_string());
        }
        Ok(())
    }
}
