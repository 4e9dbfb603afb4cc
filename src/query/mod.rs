//! Query Engine (spec §4.6): structured predicates, the free-text boolean
//! grammar, fuzzy matching, and local evaluation/ranking.

pub mod eval;
pub mod fuzzy;
pub mod lang;
pub mod predicate;
pub mod size;

pub use eval::{
    apply_aggregation, evaluate, is_imap_expressible, sort_results, Aggregation,
    AggregationResult, MatchOptions, StructuredFilter,
};
pub use lang::{parse, QueryNode, QueryParseError, TermValue};
pub use predicate::{field_value, has_attachment, parse_date_expr, DateRange, FieldName};
pub use size::parse_size;
