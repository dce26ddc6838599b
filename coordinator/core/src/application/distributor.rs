// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::distribution::{
    DeliveryFailure, DeliveryReport, DistributionError, ModelPush,
};
use crate::domain::model::GlobalModel;
use crate::domain::round::Recipient;

/// Fans the global model out to every recipient, one push per participant.
///
/// Pushes run concurrently and fail independently. There are no retries; the
/// returned [`DeliveryReport`] is the operator's signal to follow up.
#[derive(Clone)]
pub struct Distributor {
    push: Arc<dyn ModelPush>,
}

impl Distributor {
    pub fn new(push: Arc<dyn ModelPush>) -> Self {
        Self { push }
    }

    pub async fn distribute(
        &self,
        model: &GlobalModel,
        recipients: &[Recipient],
    ) -> Result<DeliveryReport, DistributionError> {
        if recipients.is_empty() {
            return Err(DistributionError::NoRecipients);
        }

        let attempts = recipients.iter().map(|recipient| async move {
            let outcome = self.push.push(&recipient.callback_address, model).await;
            (recipient, outcome)
        });

        let mut delivered = Vec::new();
        let mut failed = Vec::new();
        for (recipient, outcome) in join_all(attempts).await {
            match outcome {
                Ok(()) => {
                    debug!(participant = %recipient.participant_id, "Global model delivered");
                    metrics::counter!("fedaurora_deliveries_total", "outcome" => "delivered")
                        .increment(1);
                    delivered.push(recipient.participant_id.clone());
                }
                Err(e) => {
                    warn!(
                        participant = %recipient.participant_id,
                        address = %recipient.callback_address,
                        "Failed to deliver global model: {}",
                        e
                    );
                    metrics::counter!("fedaurora_deliveries_total", "outcome" => "failed")
                        .increment(1);
                    failed.push(DeliveryFailure {
                        participant_id: recipient.participant_id.clone(),
                        address: recipient.callback_address.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(DeliveryReport {
            round_id: model.round_id,
            attempted: recipients.len(),
            delivered,
            failed,
        })
    }
}
