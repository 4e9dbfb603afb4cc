//! MIME message assembly (spec §4.5 "Compose operation"): turns a logical
//! compose request (recipients, subject, body, attachments, signature
//! choice) into the [`OutgoingMessage`] the SMTP/Draft Transmitter renders.

use crate::domain::{Account, Address, Attachment};
use crate::providers::smtp::{generate_message_id, OutgoingAttachment, OutgoingMessage};

/// Which signature, if any, is appended to the composed body.
#[derive(Debug, Clone)]
pub enum Signature {
    /// The account's configured default signature.
    Default,
    /// A one-off signature overriding the account default for this message.
    Custom(String),
    /// No signature appended.
    None,
}

/// A logical outgoing message before MIME assembly.
#[derive(Debug, Clone)]
pub struct ComposeRequest {
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    pub attachments: Vec<(Attachment, Vec<u8>)>,
    pub signature: Signature,
}

/// Assembles `request` into an [`OutgoingMessage`], appending `request`'s
/// chosen signature to both the plain and (if present) HTML body, and
/// generating a fresh RFC 5322 `Message-ID` scoped to the sending account's
/// domain. The `Date` header is left to `lettre`'s renderer (§4.5), which
/// stamps the current time in RFC 5322 form when one isn't set explicitly.
pub fn compose(request: ComposeRequest, account: &Account, default_signature: Option<&str>) -> OutgoingMessage {
    let signature_text = match &request.signature {
        Signature::Default => default_signature.map(str::to_string),
        Signature::Custom(text) => Some(text.clone()),
        Signature::None => None,
    };

    let body_text = match &signature_text {
        Some(sig) => format!("{}\n\n--\n{}", request.body_text, sig),
        None => request.body_text,
    };

    let body_html = request.body_html.map(|html| match &signature_text {
        Some(sig) => format!("{html}<br><br>--<br>{}", html_escape(sig)),
        None => html,
    });

    let from = Address {
        email: account.effective_from_address().to_string(),
        name: account.display_name.clone(),
    };

    let domain = account.domain().unwrap_or("localhost");

    OutgoingMessage {
        from,
        to: request.to,
        cc: request.cc,
        bcc: request.bcc,
        subject: request.subject,
        body_text,
        body_html,
        attachments: request
            .attachments
            .into_iter()
            .map(OutgoingAttachment::from)
            .collect(),
        message_id: generate_message_id(domain),
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
