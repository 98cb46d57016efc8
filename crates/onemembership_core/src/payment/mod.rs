//! Payment gateway integration.
//!
//! # Responsibility
//! - Build, encrypt and sign gateway requests.
//! - Hide the HTTP call behind [`PaymentTransport`] so it can be replaced.
//!
//! # Invariants
//! - Nothing here touches storage; persisting transactions is the
//!   transaction service's job.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub mod telebirr;

pub use telebirr::{TelebirrClient, WebPayOrder, WebPayRequest};

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Merchant account is incomplete.
    Config(String),
    /// Gateway public key could not be parsed.
    Key(String),
    /// Request payload could not be serialized.
    Encode(String),
    Encrypt(String),
    Transport(String),
    /// Gateway response was not the expected JSON.
    Decode(String),
    /// Gateway answered with a non-zero code.
    Rejected { code: String, message: String },
    /// No unused nonce could be minted.
    UniqueIdExhausted,
}

impl Display for PaymentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(message) => write!(f, "payment config error: {message}"),
            Self::Key(message) => write!(f, "invalid gateway public key: {message}"),
            Self::Encode(message) => write!(f, "encode payment request: {message}"),
            Self::Encrypt(message) => write!(f, "encrypt payment request: {message}"),
            Self::Transport(message) => write!(f, "payment transport error: {message}"),
            Self::Decode(message) => write!(f, "decode gateway response: {message}"),
            Self::Rejected { code, message } => {
                write!(f, "gateway rejected request: code={code} msg={message}")
            }
            Self::UniqueIdExhausted => write!(f, "unable to mint a unique transaction nonce"),
        }
    }
}

impl Error for PaymentError {}

/// Sends a JSON body to a gateway endpoint and returns the raw response body.
pub trait PaymentTransport {
    fn post_json(&self, url: &str, body: &str) -> PaymentResult<String>;
}

/// Blocking HTTP transport backed by a `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl PaymentTransport for UreqTransport {
    fn post_json(&self, url: &str, body: &str) -> PaymentResult<String> {
        let response = self
            .agent
            .post(url)
            .set("Content-Type", "application/json")
            .send_string(body)
            .map_err(|err| PaymentError::Transport(err.to_string()))?;
        response
            .into_string()
            .map_err(|err| PaymentError::Transport(err.to_string()))
    }
}
