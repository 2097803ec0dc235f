//! Retrieval usage statistics.
//!
//! [`UsageTracker`] accumulates counters over the searches a service performs:
//! how many queries ran, how many chunks they returned, the average relevance
//! score, which similarity methods were used and which sources were retrieved.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{SOURCE, SearchResult};
use crate::inmemory::StoreStats;
use crate::similarity::SimilarityMethod;

/// Number of recent queries kept and reported.
pub const RECENT_QUERY_LIMIT: usize = 10;
/// Number of sources reported in [`UsageReport::top_sources`].
pub const TOP_SOURCE_LIMIT: usize = 5;

/// One logged query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRecord {
    /// When the query ran.
    pub timestamp: DateTime<Utc>,
    /// How many results it returned.
    pub num_results: usize,
}

/// How often one source has been retrieved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceCount {
    /// Source file name.
    pub source: String,
    /// Number of retrieved chunks from that source.
    pub count: u64,
}

/// A point-in-time view of retrieval usage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageReport {
    /// Current store statistics.
    pub vector_store: StoreStats,
    /// Searches that returned at least one result.
    pub total_queries: u64,
    /// Results returned across all recorded searches.
    pub total_documents_retrieved: u64,
    /// `total_documents_retrieved / total_queries`, or 0 with no queries.
    pub avg_documents_per_query: f64,
    /// Mean score of every returned result, rounded to three decimals.
    pub avg_relevance_score: f64,
    /// Searches per similarity method.
    pub similarity_method_usage: BTreeMap<String, u64>,
    /// Most frequently retrieved sources, most frequent first.
    pub top_sources: Vec<SourceCount>,
    /// The most recent queries, oldest first.
    pub recent_queries: Vec<QueryRecord>,
}

#[derive(Debug, Default)]
struct Counters {
    total_queries: u64,
    total_documents_retrieved: u64,
    score_sum: f64,
    score_count: u64,
    method_usage: HashMap<SimilarityMethod, u64>,
    source_usage: HashMap<String, u64>,
    recent: VecDeque<QueryRecord>,
}

/// Thread-safe accumulator of retrieval usage.
#[derive(Debug, Default)]
pub struct UsageTracker {
    counters: Mutex<Counters>,
}

impl UsageTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one search. Searches with no results are ignored.
    pub fn record(&self, results: &[SearchResult], method: SimilarityMethod) {
        if results.is_empty() {
            return;
        }
        let mut counters = self.counters.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        counters.total_queries += 1;
        counters.total_documents_retrieved += results.len() as u64;
        *counters.method_usage.entry(method).or_default() += 1;

        counters.recent.push_back(QueryRecord { timestamp: Utc::now(), num_results: results.len() });
        while counters.recent.len() > RECENT_QUERY_LIMIT {
            counters.recent.pop_front();
        }

        for result in results {
            counters.score_sum += f64::from(result.score);
            counters.score_count += 1;
            if let Some(source) = result.metadata.get(SOURCE).and_then(|v| v.as_str()) {
                if let Some(name) = source_name(source) {
                    *counters.source_usage.entry(name).or_default() += 1;
                }
            }
        }
    }

    /// Build a report alongside the given store statistics.
    pub fn snapshot(&self, vector_store: StoreStats) -> UsageReport {
        let counters = self.counters.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let avg_documents_per_query = if counters.total_queries > 0 {
            counters.total_documents_retrieved as f64 / counters.total_queries as f64
        } else {
            0.0
        };
        let avg_relevance_score = if counters.score_count > 0 {
            round3(counters.score_sum / counters.score_count as f64)
        } else {
            0.0
        };

        let similarity_method_usage = SimilarityMethod::ALL
            .iter()
            .map(|m| (m.as_str().to_string(), counters.method_usage.get(m).copied().unwrap_or(0)))
            .collect();

        let mut top_sources: Vec<SourceCount> = counters
            .source_usage
            .iter()
            .map(|(source, count)| SourceCount { source: source.clone(), count: *count })
            .collect();
        top_sources.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.source.cmp(&b.source)));
        top_sources.truncate(TOP_SOURCE_LIMIT);

        UsageReport {
            vector_store,
            total_queries: counters.total_queries,
            total_documents_retrieved: counters.total_documents_retrieved,
            avg_documents_per_query,
            avg_relevance_score,
            similarity_method_usage,
            top_sources,
            recent_queries: counters.recent.iter().cloned().collect(),
        }
    }
}

/// The file name of a path-like source, or the source itself. `unknown` and
/// empty sources are not counted.
fn source_name(source: &str) -> Option<String> {
    if source.is_empty() || source == "unknown" {
        return None;
    }
    if source.contains('/') || source.contains('\\') {
        let normalized = source.replace('\\', "/");
        return Path::new(&normalized)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .or(Some(normalized));
    }
    Some(source.to_string())
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
