//! Field names and structured (non-text) predicates for the query language
//! (spec §4.6).

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone, Utc};

use crate::domain::Message;

/// A field a query term can be scoped to with a `field:value` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName {
    From,
    To,
    Cc,
    Subject,
    Body,
    Folder,
    /// `has:attachment`
    Has,
}

impl FieldName {
    /// Parses a lowercase field prefix token (without the trailing colon).
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "from" => Some(Self::From),
            "to" => Some(Self::To),
            "cc" => Some(Self::Cc),
            "subject" => Some(Self::Subject),
            "body" => Some(Self::Body),
            "folder" => Some(Self::Folder),
            "has" => Some(Self::Has),
            _ => None,
        }
    }
}

/// Structured, exact-semantics predicates that do not participate in the
/// free-text boolean grammar: date ranges and flag state. These always
/// narrow the IMAP-delegated SEARCH when present, never requiring a local
/// fuzzy pass on their own.
#[derive(Debug, Clone, Default)]
pub struct DateRange {
    pub since: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn matches(&self, date: DateTime<Utc>) -> bool {
        self.since.map(|s| date >= s).unwrap_or(true) && self.before.map(|b| date < b).unwrap_or(true)
    }
}

/// Extracts the plain-text value a given field resolves to on `message`,
/// for comparison against a query term.
pub fn field_value(field: FieldName, message: &Message) -> Option<String> {
    match field {
        FieldName::From => Some(message.from.email.clone()),
        FieldName::To => Some(
            message
                .to
                .iter()
                .map(|a| a.email.clone())
                .collect::<Vec<_>>()
                .join(" "),
        ),
        FieldName::Cc => Some(
            message
                .cc
                .iter()
                .map(|a| a.email.clone())
                .collect::<Vec<_>>()
                .join(" "),
        ),
        FieldName::Subject => message.subject.clone(),
        FieldName::Body => message.body_text.clone().or_else(|| message.body_html.clone()),
        FieldName::Folder => Some(message.folder.0.clone()),
        FieldName::Has => None,
    }
}

/// Evaluates a `has:attachment` predicate.
pub fn has_attachment(message: &Message) -> bool {
    !message.attachments.is_empty()
}

/// Converts a local calendar midnight into its UTC instant.
fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    Local
        .from_local_datetime(&date.and_hms_opt(0, 0, 0).expect("valid midnight"))
        .single()
        .unwrap_or_else(|| Local::now().with_timezone(&Local))
        .with_timezone(&Utc)
}

/// Resolves a date-range expression (spec §4.6): an ISO-8601 single date, a
/// `YYYY-MM-DD to YYYY-MM-DD` span, or a named range (`today`, `yesterday`,
/// `last week`, `this month`, `last N days`). Named ranges resolve against
/// the local timezone; `today` is `[00:00 local, now]`.
pub fn parse_date_expr(input: &str) -> Option<DateRange> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if lower == "today" {
        let today = Local::now().date_naive();
        return Some(DateRange {
            since: Some(local_midnight(today)),
            before: None,
        });
    }
    if lower == "yesterday" {
        let today = Local::now().date_naive();
        let yesterday = today - Duration::days(1);
        return Some(DateRange {
            since: Some(local_midnight(yesterday)),
            before: Some(local_midnight(today)),
        });
    }
    if lower == "last week" {
        let today = Local::now().date_naive();
        let start_of_this_week = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        let start_of_last_week = start_of_this_week - Duration::days(7);
        return Some(DateRange {
            since: Some(local_midnight(start_of_last_week)),
            before: Some(local_midnight(start_of_this_week)),
        });
    }
    if lower == "this month" {
        let today = Local::now().date_naive();
        let start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?;
        return Some(DateRange {
            since: Some(local_midnight(start)),
            before: None,
        });
    }
    if let Some(rest) = lower.strip_prefix("last ").and_then(|s| s.strip_suffix(" days")) {
        let n: i64 = rest.trim().parse().ok()?;
        let since = Utc::now() - Duration::days(n);
        return Some(DateRange {
            since: Some(since),
            before: None,
        });
    }

    if let Some((start, end)) = trimmed.split_once(" to ") {
        let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d").ok()?;
        let end = NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d").ok()?;
        return Some(DateRange {
            since: Some(local_midnight(start)),
            before: Some(local_midnight(end + Duration::days(1))),
        });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(DateRange {
            since: Some(dt.with_timezone(&Utc)),
            before: None,
        });
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(DateRange {
            since: Some(local_midnight(date)),
            before: Some(local_midnight(date + Duration::days(1))),
        });
    }

    None
}
