// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::types::{
    ApiError, DeliveryReport, GlobalModel, ParameterTree, Participants, RoundEvent, RoundStatus,
    RoundUpdate, StartedRound, SubmissionAck,
};

/// Client for the FedAurora coordinator HTTP API.
#[derive(Clone)]
pub struct CoordinatorClient {
    base_url: String,
    client: Client,
}

impl CoordinatorClient {
    /// Create a new client for the coordinator at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open a round that waits for `expected_count` participants.
    pub async fn start_round(&self, expected_count: i64) -> Result<StartedRound> {
        let req = self
            .client
            .post(self.url("/round/start"))
            .json(&json!({ "expected_count": expected_count }));
        self.send_json(req).await
    }

    /// Submit this participant's update for the current round.
    pub async fn submit(
        &self,
        participant_id: &str,
        callback_address: &str,
        parameters: &ParameterTree,
    ) -> Result<SubmissionAck> {
        let req = self.client.post(self.url("/round/submit")).json(&json!({
            "participant_id": participant_id,
            "callback_address": callback_address,
            "parameters": parameters,
        }));
        self.send_json(req).await
    }

    pub async fn reset(&self) -> Result<RoundStatus> {
        self.send_json(self.client.post(self.url("/round/reset"))).await
    }

    pub async fn status(&self) -> Result<RoundStatus> {
        self.send_json(self.client.get(self.url("/round/status"))).await
    }

    pub async fn participants(&self) -> Result<Participants> {
        self.send_json(self.client.get(self.url("/round/participants")))
            .await
    }

    /// Latest aggregated model, `None` before the first round completes.
    pub async fn global_model(&self) -> Result<Option<GlobalModel>> {
        self.send_optional(self.client.get(self.url("/model/global")))
            .await
    }

    /// Delivery outcome of the last completed round.
    pub async fn delivery_report(&self) -> Result<Option<DeliveryReport>> {
        self.send_optional(self.client.get(self.url("/round/report")))
            .await
    }

    /// Follow the coordinator's status channel.
    ///
    /// The first item is a [`RoundUpdate::Status`] snapshot; every later item
    /// is a published [`RoundEvent`]. Events dropped while the subscriber
    /// lagged are not replayed.
    pub async fn watch_events(&self) -> Result<impl Stream<Item = Result<RoundUpdate>> + Send + Unpin> {
        let response = self
            .client
            .get(self.url("/round/events"))
            .header("accept", "text/event-stream")
            .send()
            .await
            .context("Failed to connect to coordinator event stream")?;
        let response = check_status(response).await?;

        let bytes = Box::pin(response.bytes_stream());
        let updates = stream::unfold(
            (bytes, Vec::new()),
            |(mut bytes, mut buffer)| async move {
                loop {
                    match take_frame(&mut buffer) {
                        Some(Ok(frame)) => match parse_frame(&frame) {
                            Some(update) => return Some((update, (bytes, buffer))),
                            None => continue,
                        },
                        Some(Err(e)) => return Some((Err(e), (bytes, buffer))),
                        None => {}
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                        Some(Err(e)) => {
                            let err = anyhow::Error::new(e).context("Event stream interrupted");
                            return Some((Err(err), (bytes, buffer)));
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(Box::pin(updates))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let response = req.send().await.context("Failed to reach coordinator")?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn send_optional<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Option<T>> {
        let response = req.send().await.context("Failed to reach coordinator")?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        Ok(Some(response.json().await?))
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: serde_json::Value = response.json().await.unwrap_or_default();
    Err(ApiError {
        status: status.as_u16(),
        code: body["code"].as_str().unwrap_or("unknown").to_string(),
        message: body["error"]
            .as_str()
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
            .to_string(),
    }
    .into())
}

/// Remove and decode the next complete SSE frame from `buffer`.
///
/// Frames are split on raw bytes so a character spanning two network chunks
/// is only decoded once both halves have arrived.
fn take_frame(buffer: &mut Vec<u8>) -> Option<Result<String>> {
    normalize_newlines(buffer);
    let end = buffer.windows(2).position(|pair| pair == b"\n\n")?;
    let frame = buffer[..end].to_vec();
    buffer.drain(..end + 2);
    Some(String::from_utf8(frame).context("Event stream is not valid UTF-8"))
}

fn normalize_newlines(buffer: &mut Vec<u8>) {
    if !buffer.windows(2).any(|pair| pair == b"\r\n") {
        return;
    }
    let mut normalized = Vec::with_capacity(buffer.len());
    for (i, &byte) in buffer.iter().enumerate() {
        if byte == b'\r' && buffer.get(i + 1) == Some(&b'\n') {
            continue;
        }
        normalized.push(byte);
    }
    *buffer = normalized;
}

/// `None` for frames without data, such as keep-alive comments.
fn parse_frame(frame: &str) -> Option<Result<RoundUpdate>> {
    let mut event = None;
    let mut data = Vec::new();
    for line in frame.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim());
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    if data.is_empty() {
        return None;
    }
    let data = data.join("\n");

    let update = match event {
        Some("status") => serde_json::from_str::<RoundStatus>(&data).map(RoundUpdate::Status),
        Some(_) | None => serde_json::from_str::<RoundEvent>(&data).map(RoundUpdate::Event),
    };
    Some(update.context("Malformed event from coordinator"))
}
