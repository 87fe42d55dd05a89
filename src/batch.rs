//! One complete finder run: keywords in, ranked results and warnings out.
//!
//! A batch holds no state beyond its own call. Each keyword is fetched and
//! scored in order; a keyword that fails is reported and skipped so the rest
//! of the batch still completes.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{FinderSettings, MAX_DAY_WINDOW, MIN_DAY_WINDOW};
use crate::keywords::{normalize_keywords, normalize_terms};
use crate::present::{NO_KEYWORDS_NOTICE, rank};
use crate::scoring::{ScoredResult, score_outcome};
use crate::youtube::{FetchError, KeywordOutcome, MetadataSource, SearchQuery, fetch_keyword};

/// Problems that stop a batch before any request is made.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("{}", NO_KEYWORDS_NOTICE)]
    NoKeywords,
    #[error("day window must be between 1 and 30 days, got {0}")]
    DayWindowOutOfRange(u32),
}

/// Input collected by a front end for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub keywords: Vec<String>,
    pub day_window: u32,
}

impl BatchRequest {
    /// Builds a request from the multi-line keyword box.
    pub fn from_text(raw: &str, day_window: u32) -> Result<Self, BatchError> {
        Self::new(normalize_keywords(raw), day_window)
    }

    /// Builds a request from already-split terms; they are normalized the
    /// same way as text input.
    pub fn from_terms<I, S>(terms: I, day_window: u32) -> Result<Self, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(normalize_terms(terms), day_window)
    }

    fn new(keywords: Vec<String>, day_window: u32) -> Result<Self, BatchError> {
        let request = Self {
            keywords,
            day_window,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.keywords.is_empty() {
            return Err(BatchError::NoKeywords);
        }
        if !(MIN_DAY_WINDOW..=MAX_DAY_WINDOW).contains(&self.day_window) {
            return Err(BatchError::DayWindowOutOfRange(self.day_window));
        }
        Ok(())
    }
}

/// A keyword whose fetch failed, with the reason shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordWarning {
    pub keyword: String,
    pub message: String,
}

/// Outcome of a batch. `results` is already ranked.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub keywords: Vec<String>,
    pub results: Vec<ScoredResult>,
    pub warnings: Vec<KeywordWarning>,
}

pub fn run_batch<S>(
    source: &S,
    settings: &FinderSettings,
    request: &BatchRequest,
    now: DateTime<Utc>,
) -> Result<BatchReport, BatchError>
where
    S: MetadataSource + ?Sized,
{
    run_batch_with_progress(source, settings, request, now, |_, _, _| {})
}

/// Like [`run_batch`], calling `on_keyword(position, total, keyword)` before
/// each keyword is fetched. Positions start at 1.
pub fn run_batch_with_progress<S, F>(
    source: &S,
    settings: &FinderSettings,
    request: &BatchRequest,
    now: DateTime<Utc>,
    mut on_keyword: F,
) -> Result<BatchReport, BatchError>
where
    S: MetadataSource + ?Sized,
    F: FnMut(usize, usize, &str),
{
    request.validate()?;

    let published_after = now - Duration::days(i64::from(request.day_window));
    let thresholds = settings.thresholds.with_day_window(request.day_window);
    let total = request.keywords.len();

    let outcomes: Vec<(&str, Result<KeywordOutcome, FetchError>)> = request
        .keywords
        .iter()
        .enumerate()
        .map(|(index, keyword)| {
            on_keyword(index + 1, total, keyword);
            info!(keyword = %keyword, position = index + 1, total, "searching keyword");
            let query = SearchQuery {
                keyword: keyword.clone(),
                published_after,
            };
            (
                keyword.as_str(),
                fetch_keyword(source, &query, settings.max_results),
            )
        })
        .collect();

    let mut report = BatchReport {
        keywords: request.keywords.clone(),
        ..BatchReport::default()
    };
    for (keyword, outcome) in outcomes {
        match outcome {
            Ok(outcome) => {
                report
                    .results
                    .extend(score_outcome(&outcome, &thresholds, now));
            }
            Err(err) => {
                warn!(keyword = %keyword, error = %err, "keyword fetch failed");
                report.warnings.push(KeywordWarning {
                    keyword: keyword.to_owned(),
                    message: err.to_string(),
                });
            }
        }
    }

    rank(&mut report.results);
    info!(
        keywords = total,
        results = report.results.len(),
        warnings = report.warnings.len(),
        "batch finished"
    );
    Ok(report)
}
