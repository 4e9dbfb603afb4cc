//! Local query evaluation (spec §4.6 step 2): matching the free-text AST and
//! structured predicates against in-memory [`Message`]s, plus the
//! deterministic ranking and aggregation rules of spec §5/§4.6.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::domain::{Flag, FolderName, Message};

use super::fuzzy;
use super::lang::{QueryNode, TermValue};
use super::predicate::{self, DateRange, FieldName};

/// Matching behavior for the free-text AST (spec §4.6): fuzzy vs. exact, and
/// case sensitivity.
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    pub case_sensitive: bool,
    pub fuzzy: bool,
    pub fuzzy_threshold: f64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            fuzzy: true,
            fuzzy_threshold: fuzzy::DEFAULT_THRESHOLD,
        }
    }
}

/// Fields a bare (unprefixed) term is matched against.
const BARE_FIELDS: [FieldName; 4] = [
    FieldName::Subject,
    FieldName::Body,
    FieldName::From,
    FieldName::To,
];

/// Evaluates `node` against `message` under `opts`.
pub fn evaluate(node: &QueryNode, message: &Message, opts: &MatchOptions) -> bool {
    match node {
        QueryNode::And(l, r) => evaluate(l, message, opts) && evaluate(r, message, opts),
        QueryNode::Or(l, r) => evaluate(l, message, opts) || evaluate(r, message, opts),
        QueryNode::Not(inner) => !evaluate(inner, message, opts),
        QueryNode::Field { field, value } => match field {
            FieldName::Has => matches_has(value, message),
            _ => predicate::field_value(*field, message)
                .map(|hay| term_matches(value, &hay, opts))
                .unwrap_or(false),
        },
        QueryNode::Bare(value) => BARE_FIELDS.iter().any(|field| {
            predicate::field_value(*field, message)
                .map(|hay| term_matches(value, &hay, opts))
                .unwrap_or(false)
        }),
    }
}

fn matches_has(value: &TermValue, message: &Message) -> bool {
    value.text().eq_ignore_ascii_case("attachment") && predicate::has_attachment(message)
}

/// Whether `term` matches `haystack`: phrases always require an exact
/// substring match (bypassing fuzzy); words are matched per-token with
/// fuzzy similarity when `opts.fuzzy` is enabled, or exact substring
/// otherwise.
fn term_matches(term: &TermValue, haystack: &str, opts: &MatchOptions) -> bool {
    match term {
        TermValue::Phrase(phrase) => contains(haystack, phrase, opts.case_sensitive),
        TermValue::Word(word) => {
            if !opts.fuzzy {
                return contains(haystack, word, opts.case_sensitive);
            }
            tokenize(haystack)
                .iter()
                .any(|token| fuzzy::fuzzy_matches(word, token, opts.fuzzy_threshold))
        }
    }
}

fn contains(haystack: &str, needle: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        haystack.contains(needle)
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}

fn tokenize(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Structured (non-free-text) predicates (spec §4.6): sender, recipient,
/// subject substring, date range, size bounds, attachment presence, unread
/// state, and folder scope.
#[derive(Debug, Clone, Default)]
pub struct StructuredFilter {
    pub folder: Option<FolderName>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject_contains: Option<String>,
    pub date_range: DateRange,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub has_attachments: Option<bool>,
    pub unread_only: bool,
}

impl StructuredFilter {
    pub fn matches(&self, message: &Message) -> bool {
        if let Some(folder) = &self.folder {
            if &message.folder != folder {
                return false;
            }
        }
        if let Some(from) = &self.from {
            if !message.from.email.to_lowercase().contains(&from.to_lowercase()) {
                return false;
            }
        }
        if let Some(to) = &self.to {
            let needle = to.to_lowercase();
            if !message.to.iter().any(|a| a.email.to_lowercase().contains(&needle)) {
                return false;
            }
        }
        if let Some(subject) = &self.subject_contains {
            let hay = message.subject.as_deref().unwrap_or("").to_lowercase();
            if !hay.contains(&subject.to_lowercase()) {
                return false;
            }
        }
        if !self.date_range.matches(message.date) {
            return false;
        }
        if let Some(min) = self.min_size {
            if message.size < min {
                return false;
            }
        }
        if let Some(max) = self.max_size {
            if message.size > max {
                return false;
            }
        }
        if let Some(want) = self.has_attachments {
            if predicate::has_attachment(message) != want {
                return false;
            }
        }
        if self.unread_only && message.flags.contains(Flag::Seen) {
            return false;
        }
        true
    }
}

/// Sorts `messages` per the deterministic ranking rule (spec §5): newest
/// first by default, tie-break by UID descending; equal-date messages that
/// cross folders additionally break ties by folder name ascending.
pub fn sort_results(messages: &mut [Message]) {
    messages.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.folder.0.cmp(&b.folder.0))
            .then_with(|| Reverse(a.uid.0).cmp(&Reverse(b.uid.0)))
    });
}

/// Post-filtering aggregation over an already-ranked result set (spec
/// §4.6 "applied after filtering").
#[derive(Debug, Clone)]
pub enum Aggregation {
    GroupBySender,
    GroupByDomain,
    GroupByDate,
    TopN(usize),
    CountOnly,
}

/// The result of applying an [`Aggregation`] to a result set.
#[derive(Debug, Clone)]
pub enum AggregationResult {
    Groups(Vec<(String, Vec<Message>)>),
    Top(Vec<Message>),
    Count(usize),
}

pub fn apply_aggregation(messages: Vec<Message>, aggregation: &Aggregation) -> AggregationResult {
    match aggregation {
        Aggregation::CountOnly => AggregationResult::Count(messages.len()),
        Aggregation::TopN(n) => AggregationResult::Top(messages.into_iter().take(*n).collect()),
        Aggregation::GroupBySender => AggregationResult::Groups(group_by(messages, |m| m.from.email.clone())),
        Aggregation::GroupByDomain => {
            AggregationResult::Groups(group_by(messages, |m| m.from.domain().unwrap_or("").to_string()))
        }
        Aggregation::GroupByDate => {
            AggregationResult::Groups(group_by(messages, |m| m.date.format("%Y-%m-%d").to_string()))
        }
    }
}

fn group_by(messages: Vec<Message>, key_fn: impl Fn(&Message) -> String) -> Vec<(String, Vec<Message>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Message>> = HashMap::new();
    for message in messages {
        let key = key_fn(&message);
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(message);
    }
    order
        .into_iter()
        .map(|key| {
            let msgs = groups.remove(&key).unwrap_or_default();
            (key, msgs)
        })
        .collect()
}

/// Whether the caller's criteria can be expressed entirely as a server-side
/// IMAP SEARCH (spec §4.6 step 1): structured predicates (header/date/flag/
/// size) all translate directly to `SearchCriteria`; a free-text query
/// cannot, since fuzzy matching has no IMAP equivalent.
pub fn is_imap_expressible(free_text: Option<&str>) -> bool {
    free_text.is_none()
}
