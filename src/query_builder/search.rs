//! Full-text search predicate description.
//!
//! A [`SearchQuery`] captures everything the compiler needs to synthesize a
//! `tsvector @@ tsquery` predicate: the searched text, the columns feeding
//! the vector (optionally weighted), the language configuration, and an
//! optional rank request that surfaces as a computed select column.

use crate::error::{QuarryError, Result};

/// Ranking function applied when a rank column is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankFunction {
    /// Standard frequency-based ranking.
    Rank,
    /// Cover-density ranking, sensitive to term proximity.
    RankCoverDensity,
}

impl RankFunction {
    pub fn to_sql(self) -> &'static str {
        match self {
            RankFunction::Rank => "ts_rank",
            RankFunction::RankCoverDensity => "ts_rank_cd",
        }
    }
}

/// A validated full-text search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub columns: Vec<String>,
    /// Per-column `setweight` labels (`'A'`..`'D'`); when non-empty these
    /// replace `columns` as the vector source.
    pub weighted_columns: Vec<(String, char)>,
    pub language: String,
    pub rank_function: Option<RankFunction>,
    pub rank_normalization: Option<i32>,
    /// `plainto_tsquery` instead of `to_tsquery`.
    pub use_plain_parser: bool,
}

impl SearchQuery {
    /// Build a search over `columns` for `text`. Both must be non-empty.
    pub fn new(text: impl Into<String>, columns: Vec<String>) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(QuarryError::usage("search text must not be empty"));
        }
        if columns.is_empty() {
            return Err(QuarryError::usage("search requires at least one column"));
        }
        Ok(Self {
            text,
            columns,
            weighted_columns: Vec::new(),
            language: "english".to_string(),
            rank_function: None,
            rank_normalization: None,
            use_plain_parser: false,
        })
    }

    pub fn weighted(mut self, column: impl Into<String>, weight: char) -> Self {
        self.weighted_columns.push((column.into(), weight));
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn ranked(mut self, function: RankFunction) -> Self {
        self.rank_function = Some(function);
        self
    }

    pub fn rank_normalization(mut self, normalization: i32) -> Self {
        self.rank_normalization = Some(normalization);
        self
    }

    pub fn plain(mut self, use_plain_parser: bool) -> Self {
        self.use_plain_parser = use_plain_parser;
        self
    }

    /// Whether the compiler should append a computed rank column.
    pub fn wants_rank(&self) -> bool {
        self.rank_function.is_some() || self.rank_normalization.is_some()
    }

    /// The ranking function to use, defaulting to [`RankFunction::Rank`]
    /// when only a normalization was requested.
    pub fn effective_rank_function(&self) -> RankFunction {
        self.rank_function.unwrap_or(RankFunction::Rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_text() {
        let err = SearchQuery::new("", vec!["title".to_string()]).unwrap_err();
        assert!(matches!(err, QuarryError::Usage(_)));
    }

    #[test]
    fn rejects_empty_columns() {
        let err = SearchQuery::new("rust", vec![]).unwrap_err();
        assert!(matches!(err, QuarryError::Usage(_)));
    }

    #[test]
    fn rank_request_via_normalization_only() {
        let search = SearchQuery::new("rust", vec!["title".to_string()])
            .unwrap()
            .rank_normalization(32);
        assert!(search.wants_rank());
        assert_eq!(search.effective_rank_function(), RankFunction::Rank);
    }

    #[test]
    fn defaults() {
        let search = SearchQuery::new("rust", vec!["title".to_string()]).unwrap();
        assert_eq!(search.language, "english");
        assert!(!search.use_plain_parser);
        assert!(!search.wants_rank());
    }
}
