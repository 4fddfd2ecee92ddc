//! The shipped background task: log a random quote once per interval.

use crate::config::QuoteConfig;
use crate::sink::TASK_EVENT_ID;
use crate::task::{BackgroundTask, TaskContext};
use anyhow::Context;
use reqwest::blocking::{Client, Response};
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use std::io::Read;
use std::time::Duration;

const MAX_QUOTE_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Quote {
  pub content: String,
  pub author: String,
}

#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
  #[error("quote request failed")]
  Http(#[from] reqwest::Error),

  #[error("unexpected HTTP status {0}")]
  Status(u16),

  #[error("read quote response body")]
  Read(#[from] std::io::Error),

  #[error("quote response exceeds {0} bytes")]
  TooLarge(usize),

  #[error("decode quote response")]
  Decode(#[from] serde_json::Error),

  #[error("quote response contained no quotes")]
  Empty,
}

/// Decodes the endpoint's JSON array and returns its first quote. An empty
/// array is an error, not an empty quote.
pub fn parse_quotes(body: &[u8]) -> Result<Quote, QuoteError> {
  let quotes: Vec<Quote> = serde_json::from_slice(body)?;
  quotes.into_iter().next().ok_or(QuoteError::Empty)
}

pub fn format_quote(quote: &Quote) -> String {
  format!("\"{}\" - {}", quote.content, quote.author)
}

pub struct QuoteTask {
  cfg: QuoteConfig,
}

impl QuoteTask {
  pub fn new(cfg: QuoteConfig) -> Self {
    Self { cfg }
  }

  fn client(&self) -> anyhow::Result<Client> {
    Client::builder()
      .timeout(Duration::from_secs(self.cfg.timeout_seconds))
      .build()
      .context("build HTTP client")
  }

  pub fn fetch(&self, client: &Client) -> Result<Quote, QuoteError> {
    let response = client
      .get(&self.cfg.endpoint)
      .header(USER_AGENT, format!("svc-rnd-qt/{}", env!("CARGO_PKG_VERSION")))
      .send()?;

    let status = response.status().as_u16();
    if status != 200 {
      return Err(QuoteError::Status(status));
    }

    let body = read_response_with_limit(response, MAX_QUOTE_BODY_BYTES)?;
    parse_quotes(&body)
  }
}

impl BackgroundTask for QuoteTask {
  fn name(&self) -> &str {
    "quote"
  }

  fn run(self: Box<Self>, ctx: TaskContext) -> anyhow::Result<()> {
    let client = self.client()?;
    let interval = Duration::from_secs(self.cfg.interval_minutes.saturating_mul(60));
    tracing::info!(
      endpoint = %self.cfg.endpoint,
      interval_minutes = self.cfg.interval_minutes,
      "quote task started"
    );

    while !ctx.shutdown.wait(interval) {
      match self.fetch(&client) {
        Ok(quote) => ctx.sink.info(TASK_EVENT_ID, &format_quote(&quote)),
        Err(e) => ctx.sink.error(TASK_EVENT_ID, &format!("{:#}", anyhow::Error::from(e))),
      }
    }

    tracing::info!("quote task stopped");
    Ok(())
  }
}

fn read_response_with_limit(response: Response, max_bytes: usize) -> Result<Vec<u8>, QuoteError> {
  let mut out = Vec::new();
  let mut limited = response.take((max_bytes.saturating_add(1)) as u64);
  limited.read_to_end(&mut out)?;

  if out.len() > max_bytes {
    return Err(QuoteError::TooLarge(max_bytes));
  }

  Ok(out)
}
