use std::collections::VecDeque;
use std::time::Duration;

use futures_util::stream::{BoxStream, StreamExt};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ChatError, Result};
use crate::export::{filename_from_disposition, Export, FALLBACK_EXPORT_NAME};
use crate::frame::{FrameDecoder, StreamFrame};
use crate::session::{TurnEvent, TurnEventKind, TurnRequest};
use crate::state::ChatRole;

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

/// One turn of server-side history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl HistoryEntry {
    /// The server names the assistant `model`; anything not `user` is the assistant.
    pub fn chat_role(&self) -> ChatRole {
        if self.role.eq_ignore_ascii_case("user") {
            ChatRole::User
        } else {
            ChatRole::Assistant
        }
    }
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ChatClient {
    /// The client keeps cookies: the server ties the conversation to its
    /// session cookie.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /api/chat`; the body is returned as a frame stream.
    pub async fn send(&self, message: &str) -> Result<FrameStream> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(FrameStream::from_response(response))
    }

    /// Run one turn end to end, reporting everything through `sink` in order.
    pub async fn stream_turn(&self, request: &TurnRequest, mut sink: impl FnMut(TurnEvent)) {
        info!(turn = request.turn.0, kind = ?request.kind, "sending chat message");
        match self.send(&request.message).await {
            Ok(mut stream) => pump(&mut stream, request, &mut sink).await,
            Err(e) => sink(TurnEvent::new(
                request.turn,
                TurnEventKind::RequestFailed(e.to_string()),
            )),
        }
    }

    /// `POST /api/clear-chat`
    pub async fn clear(&self) -> Result<()> {
        let url = format!("{}/api/clear-chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        check_status(response).await?;
        info!("server chat cleared");
        Ok(())
    }

    /// `GET /api/export-chat`; a 404 means there is nothing to export.
    pub async fn export(&self) -> Result<Export> {
        let url = format!("{}/api/export-chat", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        let response = check_status(response).await?;

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| FALLBACK_EXPORT_NAME.to_string());
        let contents = response.bytes().await?.to_vec();
        debug!(%filename, bytes = contents.len(), "export downloaded");

        Ok(Export { filename, contents })
    }

    /// `GET /api/chat-history`
    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        let url = format!("{}/api/chat-history", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: HistoryResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;
        Ok(body.history)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::Status { status, body })
}

/// Forward every frame of `stream`, then `Closed`. Stops after a terminal
/// frame or a read failure.
pub async fn pump(stream: &mut FrameStream, request: &TurnRequest, sink: &mut impl FnMut(TurnEvent)) {
    while let Some(next) = stream.next_frame().await {
        match next {
            Ok(frame) => {
                let terminal = matches!(frame, StreamFrame::End { .. } | StreamFrame::Error { .. });
                sink(TurnEvent::new(request.turn, TurnEventKind::Frame(frame)));
                if terminal {
                    return;
                }
            }
            Err(e) => {
                warn!(turn = request.turn.0, error = %e, "stream read failed");
                sink(TurnEvent::new(request.turn, TurnEventKind::ReadFailed(e.to_string())));
                return;
            }
        }
    }
    sink(TurnEvent::new(request.turn, TurnEventKind::Closed));
}

/// Frames decoded from a streaming body, in arrival order.
pub struct FrameStream {
    body: BoxStream<'static, std::result::Result<Vec<u8>, String>>,
    decoder: FrameDecoder,
    pending: VecDeque<StreamFrame>,
    finished: bool,
}

impl FrameStream {
    pub fn from_response(response: reqwest::Response) -> Self {
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(|e| e.to_string()))
            .boxed();
        Self::new(body)
    }

    /// Build from raw chunks, as if each were one network read.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<Vec<u8>, String>>,
        I::IntoIter: Send + 'static,
    {
        Self::new(futures_util::stream::iter(chunks).boxed())
    }

    fn new(body: BoxStream<'static, std::result::Result<Vec<u8>, String>>) -> Self {
        Self {
            body,
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    pub async fn next_frame(&mut self) -> Option<Result<StreamFrame>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(Ok(frame));
            }
            if self.finished {
                return None;
            }
            match self.body.next().await {
                Some(Ok(chunk)) => {
                    let frames = self.decoder.push(&chunk);
                    self.pending.extend(frames);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(ChatError::Stream(e)));
                }
                None => {
                    self.finished = true;
                    let frames = self.decoder.finish();
                    self.pending.extend(frames);
                }
            }
        }
    }
}
