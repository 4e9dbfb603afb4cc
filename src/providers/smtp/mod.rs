//! SMTP/Draft Transmitter (spec §4.5): MIME composition and the send/draft
//! paths built on `lettre`, generalized from the teacher's hardcoded Gmail
//! relay usage into a provider-driven transport.

use std::time::{SystemTime, UNIX_EPOCH};

use lettre::address::Envelope;
use lettre::message::{Attachment as LettreAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{
    Address as LettreAddress, AsyncSmtpTransport, AsyncTransport, Message as LettreMessage,
    Tokio1Executor,
};
use uuid::Uuid;

use crate::domain::{Account, Address, Attachment};
use crate::error::{MssqeError, Result};
use crate::providers::Provider;

/// A fully assembled outgoing message, ready to be rendered to RFC 5322
/// bytes or handed to `lettre` for transmission.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub from: Address,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    pub attachments: Vec<OutgoingAttachment>,
    pub message_id: String,
}

/// An attachment payload ready for MIME encoding.
#[derive(Debug, Clone)]
pub struct OutgoingAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl From<(Attachment, Vec<u8>)> for OutgoingAttachment {
    fn from((meta, data): (Attachment, Vec<u8>)) -> Self {
        Self {
            filename: meta.filename,
            content_type: meta.content_type,
            data,
        }
    }
}

/// Generates an RFC 5322 `Message-ID` value: `<timestamp.random@domain>`.
/// Grounded in the common `lettre`/MTA convention of embedding a monotonic
/// component plus entropy so retries never collide.
pub fn generate_message_id(domain: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let entropy = Uuid::new_v4().simple().to_string();
    format!("<{millis}.{entropy}@{domain}>")
}

fn to_mailbox(address: &Address) -> Result<Mailbox> {
    let mailbox = match &address.name {
        Some(name) => format!("{name} <{}>", address.email)
            .parse()
            .map_err(|e| MssqeError::AddressParse(format!("{}: {e}", address.email)))?,
        None => address
            .email
            .parse()
            .map_err(|e| MssqeError::AddressParse(format!("{}: {e}", address.email)))?,
    };
    Ok(mailbox)
}

/// Renders `outgoing` into an RFC 5322 byte stream (headers + MIME body),
/// suitable both for SMTP transmission and for IMAP `APPEND` into Drafts or
/// Sent.
pub fn render(outgoing: &OutgoingMessage) -> Result<Vec<u8>> {
    let mut builder = LettreMessage::builder()
        .from(to_mailbox(&outgoing.from)?)
        .subject(&outgoing.subject)
        .message_id(Some(outgoing.message_id.clone()));

    for to in &outgoing.to {
        builder = builder.to(to_mailbox(to)?);
    }
    for cc in &outgoing.cc {
        builder = builder.cc(to_mailbox(cc)?);
    }
    for bcc in &outgoing.bcc {
        builder = builder.bcc(to_mailbox(bcc)?);
    }

    let body = build_body(outgoing)?;

    let message = builder.multipart(body).map_err(MssqeError::Lettre)?;

    Ok(message.formatted())
}

fn build_body(outgoing: &OutgoingMessage) -> Result<MultiPart> {
    let alternative = match &outgoing.body_html {
        Some(html) => MultiPart::alternative()
            .singlepart(SinglePart::plain(outgoing.body_text.clone()))
            .singlepart(SinglePart::html(html.clone())),
        None => {
            // Plain-only messages still get an alternative wrapper so the
            // attachment path below can uniformly nest under mixed.
            MultiPart::alternative().singlepart(SinglePart::plain(outgoing.body_text.clone()))
        }
    };

    if outgoing.attachments.is_empty() {
        return Ok(alternative);
    }

    let mut mixed = MultiPart::mixed().multipart(alternative);
    for att in &outgoing.attachments {
        let content_type = att
            .content_type
            .parse()
            .map_err(|_| MssqeError::ProtocolError(format!("bad content-type: {}", att.content_type)))?;
        mixed = mixed.singlepart(
            LettreAttachment::new(att.filename.clone()).body(att.data.clone(), content_type),
        );
    }
    Ok(mixed)
}

/// Transmits `raw_message` (as produced by [`render`]) over SMTP: connects
/// (STARTTLS or implicit TLS per `provider.smtp_implicit_tls`),
/// authenticates with AUTH PLAIN using the account's app password, and sends
/// the already-rendered bytes against an envelope built from `outgoing`'s
/// To/Cc/Bcc. Sending the envelope and the DATA block separately (rather
/// than re-parsing `raw_message` back into a `lettre::Message`) is what
/// keeps Bcc in the envelope `RCPT TO` while it stays absent from the
/// transmitted headers, matching RFC 5322 Bcc-stripping.
///
/// # Errors
/// [`MssqeError::ConnectError`] on transport-level failure,
/// [`MssqeError::AuthError`] on a rejected AUTH PLAIN.
pub async fn send(
    account: &Account,
    provider: &Provider,
    outgoing: &OutgoingMessage,
    raw_message: &[u8],
) -> Result<()> {
    let credentials = Credentials::new(account.email.clone(), account.app_password.clone());
    let transport = build_transport(provider, credentials)?;
    let envelope = build_envelope(outgoing)?;

    transport
        .send_raw(&envelope, raw_message)
        .await
        .map_err(MssqeError::Smtp)?;

    Ok(())
}

fn build_envelope(outgoing: &OutgoingMessage) -> Result<Envelope> {
    let from = to_lettre_address(&outgoing.from)?;
    let mut to = Vec::new();
    for addr in outgoing.to.iter().chain(&outgoing.cc).chain(&outgoing.bcc) {
        to.push(to_lettre_address(addr)?);
    }
    Envelope::new(Some(from), to)
        .map_err(|e| MssqeError::AddressParse(format!("envelope construction failed: {e}")))
}

fn to_lettre_address(address: &Address) -> Result<LettreAddress> {
    address
        .email
        .parse()
        .map_err(|e| MssqeError::AddressParse(format!("{}: {e}", address.email)))
}

fn build_transport(
    provider: &Provider,
    credentials: Credentials,
) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let builder = if provider.smtp_implicit_tls {
        AsyncSmtpTransport::<Tokio1Executor>::relay(provider.smtp_host)
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(provider.smtp_host)
    }
    .map_err(|e| MssqeError::ConnectError(format!("SMTP transport setup failed: {e}")))?;

    Ok(builder
        .port(provider.smtp_port)
        .credentials(credentials)
        .build())
}
