//! Draft file frontmatter parsing and bulk dispatch (spec §4.5 "Bulk draft
//! dispatch", §6 draft file format).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Account, Attachment};
use crate::error::{MssqeError, Result};
use crate::providers::smtp::{render, send, OutgoingMessage};
use crate::providers::Provider;

use super::compose::{compose, ComposeRequest, Signature};

/// Send priority recorded in a draft's frontmatter. Informational only —
/// the engine does not reorder dispatch by priority, matching spec.md's
/// silence on priority-driven scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
    Low,
}

/// The YAML frontmatter block of a draft file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftFrontmatter {
    pub to: String,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub subject: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default, rename = "send-after")]
    pub send_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
}

/// A draft file split into its parsed frontmatter and Markdown body.
#[derive(Debug, Clone)]
pub struct ParsedDraft {
    pub frontmatter: DraftFrontmatter,
    pub body_markdown: String,
}

/// Parses a draft file's contents (spec §6): a `---`-delimited YAML
/// frontmatter block followed by a Markdown body. Tolerates CR or LF line
/// endings and trailing whitespace.
pub fn parse_draft_file(raw: &str) -> Result<ParsedDraft> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed = normalized.trim_end();

    let mut lines = trimmed.lines();
    let first = lines
        .next()
        .ok_or_else(|| draft_error("empty file"))?;
    if first.trim() != "---" {
        return Err(draft_error("missing opening frontmatter delimiter"));
    }

    let mut yaml_lines = Vec::new();
    let mut body_lines: Option<Vec<&str>> = None;
    for line in lines {
        if body_lines.is_none() && line.trim() == "---" {
            body_lines = Some(Vec::new());
            continue;
        }
        match &mut body_lines {
            Some(body) => body.push(line),
            None => yaml_lines.push(line),
        }
    }

    let body_lines = body_lines.ok_or_else(|| draft_error("missing closing frontmatter delimiter"))?;
    let yaml = yaml_lines.join("\n");
    let frontmatter: DraftFrontmatter =
        serde_yaml::from_str(&yaml).map_err(|e| draft_error(&format!("malformed frontmatter: {e}")))?;

    Ok(ParsedDraft {
        frontmatter,
        body_markdown: body_lines.join("\n").trim().to_string(),
    })
}

fn draft_error(reason: &str) -> MssqeError {
    MssqeError::InvalidDraft {
        path: String::new(),
        reason: reason.to_string(),
    }
}

fn with_path(err: MssqeError, path: &Path) -> MssqeError {
    match err {
        MssqeError::InvalidDraft { reason, .. } => MssqeError::InvalidDraft {
            path: path.display().to_string(),
            reason,
        },
        other => other,
    }
}

/// Parses and validates every recipient address in `frontmatter`, returning
/// an [`MssqeError::InvalidDraft`] naming the first unparseable address.
fn validate_recipients(frontmatter: &DraftFrontmatter) -> Result<()> {
    for addr in std::iter::once(frontmatter.to.as_str())
        .chain(frontmatter.cc.iter().map(String::as_str))
        .chain(frontmatter.bcc.iter().map(String::as_str))
    {
        if mailparse::addrparse(addr).is_err() || addr.trim().is_empty() {
            return Err(draft_error(&format!("unparseable recipient address: {addr}")));
        }
    }
    Ok(())
}

fn split_addresses(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Guesses a MIME content type from a filename's extension. No attachment
/// metadata crate is in the dependency tree, so this covers the common
/// cases a draft's own attachments are likely to carry and falls back to
/// the generic octet-stream type.
fn guess_content_type(path: &Path) -> String {
    match path.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase).as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("zip") => "application/zip",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Reads a draft's attachment off disk and builds its metadata (spec §6
/// draft file format `attachments: [...]`, §4.5 compose operation). Missing
/// or unreadable files surface as [`MssqeError::InvalidDraft`] so the whole
/// draft routes to `failed/` rather than sending silently without it.
fn load_attachment(path: &Path) -> Result<(Attachment, Vec<u8>)> {
    let data = fs::read(path)
        .map_err(|e| draft_error(&format!("unreadable attachment {}: {e}", path.display())))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment")
        .to_string();
    let attachment = Attachment {
        filename,
        content_type: guess_content_type(path),
        size_bytes: data.len() as u64,
        payload_path: None,
        inline_data: None,
    };
    Ok((attachment, data))
}

/// Summary of a bulk dispatch run (spec §4.5 scenario 4: `{sent, failed}`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Enumerates every `*.md` draft file directly under `drafts_dir` and
/// attempts to send each (spec §4.5 "Bulk draft dispatch"). A draft whose
/// `send_after` is in the future is left untouched. A parse failure or send
/// failure moves the file to `drafts_dir/failed/` with an error note and
/// the batch continues — no single bad draft aborts the run.
pub async fn dispatch_drafts(
    drafts_dir: &Path,
    account: &Account,
    provider: &Provider,
    default_signature: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DispatchSummary> {
    let failed_dir = drafts_dir.join("failed");
    let sent_log = drafts_dir.join("sent.log");

    let mut summary = DispatchSummary::default();
    if !drafts_dir.is_dir() {
        return Ok(summary);
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(drafts_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "md").unwrap_or(false))
        .collect();
    entries.sort();

    for path in entries {
        match dispatch_one(&path, account, provider, default_signature, now).await {
            Ok(true) => {
                append_sent_log(&sent_log, &path)?;
                fs::remove_file(&path)?;
                summary.sent += 1;
            }
            Ok(false) => {
                // send-after still in the future; left untouched.
            }
            Err(err) => {
                move_to_failed(&failed_dir, &path, &err)?;
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

/// Returns `Ok(true)` if the draft was sent, `Ok(false)` if it was skipped
/// (future `send_after`), or `Err` if parsing/validation/sending failed.
async fn dispatch_one(
    path: &Path,
    account: &Account,
    provider: &Provider,
    default_signature: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let raw = fs::read_to_string(path)?;
    let parsed = parse_draft_file(&raw).map_err(|e| with_path(e, path))?;

    if let Some(send_after) = parsed.frontmatter.send_after {
        if send_after > now {
            return Ok(false);
        }
    }

    validate_recipients(&parsed.frontmatter).map_err(|e| with_path(e, path))?;

    let attachments = parsed
        .frontmatter
        .attachments
        .iter()
        .map(|attachment_path| load_attachment(Path::new(attachment_path)).map_err(|e| with_path(e, path)))
        .collect::<Result<Vec<_>>>()?;

    let request = ComposeRequest {
        to: split_addresses(&parsed.frontmatter.to)
            .into_iter()
            .map(crate::domain::Address::new)
            .collect(),
        cc: parsed
            .frontmatter
            .cc
            .iter()
            .map(crate::domain::Address::new)
            .collect(),
        bcc: parsed
            .frontmatter
            .bcc
            .iter()
            .map(crate::domain::Address::new)
            .collect(),
        subject: parsed.frontmatter.subject.clone(),
        body_text: parsed.body_markdown.clone(),
        body_html: None,
        attachments,
        signature: Signature::Default,
    };

    let outgoing: OutgoingMessage = compose(request, account, default_signature);
    let raw_message = render(&outgoing)?;
    send(account, provider, &outgoing, &raw_message).await?;
    Ok(true)
}

fn move_to_failed(failed_dir: &Path, path: &Path, err: &MssqeError) -> Result<()> {
    fs::create_dir_all(failed_dir)?;
    let filename = path
        .file_name()
        .ok_or_else(|| draft_error("draft path has no filename"))?;
    let dest = failed_dir.join(filename);
    fs::rename(path, &dest)?;

    let note_path = dest.with_extension("error.txt");
    fs::write(note_path, format!("{err}\n"))?;
    Ok(())
}

fn append_sent_log(sent_log: &Path, path: &Path) -> Result<()> {
    use std::io::Write;
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown");
    let mut file = fs::OpenOptions::new().create(true).append(true).open(sent_log)?;
    writeln!(file, "{} sent {}", Utc::now().to_rfc3339(), filename)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "---\nto: alice@example.com\ncc: [bob@example.com]\nsubject: Weekly report\nattachments: []\npriority: normal\n---\nBody in Markdown here.\n";

    #[test]
    fn parse_draft_file_extracts_frontmatter_and_body() {
        let parsed = parse_draft_file(SAMPLE).unwrap();
        assert_eq!(parsed.frontmatter.to, "alice@example.com");
        assert_eq!(parsed.frontmatter.cc, vec!["bob@example.com".to_string()]);
        assert_eq!(parsed.frontmatter.subject, "Weekly report");
        assert_eq!(parsed.body_markdown, "Body in Markdown here.");
    }

    #[test]
    fn parse_draft_file_tolerates_crlf_line_endings() {
        let crlf = SAMPLE.replace('\n', "\r\n");
        let parsed = parse_draft_file(&crlf).unwrap();
        assert_eq!(parsed.frontmatter.to, "alice@example.com");
    }

    #[test]
    fn parse_draft_file_missing_delimiter_is_invalid() {
        let err = parse_draft_file("to: alice@example.com\n---\nbody").unwrap_err();
        assert!(matches!(err, MssqeError::InvalidDraft { .. }));
    }

    #[test]
    fn parse_draft_file_parses_send_after() {
        let with_send_after = SAMPLE.replace(
            "priority: normal",
            "priority: normal\nsend-after: 2025-01-15T09:00:00Z",
        );
        let parsed = parse_draft_file(&with_send_after).unwrap();
        assert_eq!(
            parsed.frontmatter.send_after.unwrap().to_rfc3339(),
            "2025-01-15T09:00:00+00:00"
        );
    }

    #[test]
    fn validate_recipients_rejects_empty_address() {
        let fm = DraftFrontmatter {
            to: "".to_string(),
            cc: vec![],
            bcc: vec![],
            subject: "x".to_string(),
            attachments: vec![],
            send_after: None,
            priority: Priority::Normal,
        };
        assert!(validate_recipients(&fm).is_err());
    }

    #[test]
    fn validate_recipients_accepts_well_formed_address() {
        let fm = DraftFrontmatter {
            to: "alice@example.com".to_string(),
            cc: vec![],
            bcc: vec![],
            subject: "x".to_string(),
            attachments: vec![],
            send_after: None,
            priority: Priority::Normal,
        };
        assert!(validate_recipients(&fm).is_ok());
    }

    #[test]
    fn split_addresses_splits_and_trims() {
        assert_eq!(
            split_addresses("a@b.com, c@d.com"),
            vec!["a@b.com".to_string(), "c@d.com".to_string()]
        );
    }

    #[test]
    fn load_attachment_reads_bytes_and_guesses_content_type() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.pdf");
        fs::write(&path, b"%PDF-1.4 fake contents").unwrap();

        let (attachment, data) = load_attachment(&path).unwrap();
        assert_eq!(attachment.filename, "report.pdf");
        assert_eq!(attachment.content_type, "application/pdf");
        assert_eq!(attachment.size_bytes, data.len() as u64);
        assert_eq!(data, b"%PDF-1.4 fake contents");
    }

    #[test]
    fn load_attachment_missing_file_is_invalid_draft() {
        let err = load_attachment(Path::new("/no/such/attachment.pdf")).unwrap_err();
        assert!(matches!(err, MssqeError::InvalidDraft { .. }));
    }

    #[test]
    fn guess_content_type_falls_back_to_octet_stream() {
        assert_eq!(guess_content_type(Path::new("data.bin")), "application/octet-stream");
        assert_eq!(guess_content_type(Path::new("photo.JPG")), "image/jpeg");
    }
}
