//! Prompt assembly for answering questions over retrieved chunks.
//!
//! [`build_rag_prompt`] turns a query and its search results into a
//! [`RagPrompt`]: a system message carrying the numbered `[Source N]` context
//! block, and the untouched user message. The helpers at the bottom of the
//! module read citations back out of a model's answer.
//!
//! Calling a language model is left to the caller.

use std::collections::BTreeSet;
use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::{CHUNK_INDEX, FILENAME, SearchResult};
use crate::error::{RagError, Result};

static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[Source (\d+)\]").expect("unreachable error: invalid citation pattern")
});

const SEPARATOR: &str = "----------------------------------------";
const CONTEXT_INTRO: &str = "Relevant information from the reference materials:\n";

const DEFAULT_PROMPT: &str = "You are a knowledgeable assistant who answers questions from a curated set of reference materials.

Your role:
- Provide accurate, practical answers
- Base answers on the reference materials when they are available
- Point out risks and limits where they matter
- Be encouraging and direct

Guidelines:
- Use clear, simple language
- ALWAYS cite sources when using the materials, in this format: [Source X]
- If you're unsure, say so
- When multiple sources say similar things, cite all relevant sources";

const BEGINNER_PROMPT: &str = "You are a patient assistant who explains topics to newcomers using a curated set of reference materials.

Your role:
- Explain concepts in simple, non-technical terms
- Focus on fundamentals
- Encourage questions and learning

Guidelines:
- Break complex topics into small steps
- Use analogies and examples
- Cite your sources using [Source X] when using the materials
- Suggest where to learn more when a question goes beyond the materials";

const ADVANCED_PROMPT: &str = "You are an expert advisor for experienced practitioners, answering from a curated set of reference materials.

Your role:
- Provide detailed technical guidance
- Discuss advanced techniques and trade-offs
- Support people refining an existing skill

Guidelines:
- Use technical terminology appropriately
- Focus on precision and refinement
- Always provide specific source citations using [Source X] format
- Reference the exact passage when available";

/// The persona used for the system message.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PromptTemplate {
    /// General-audience answers.
    #[default]
    Default,
    /// Simple explanations for newcomers.
    Beginner,
    /// Technical depth for experienced readers.
    Advanced,
}

impl PromptTemplate {
    /// All templates.
    pub const ALL: [PromptTemplate; 3] = [Self::Default, Self::Beginner, Self::Advanced];

    /// The lowercase name used in request payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Beginner => "beginner",
            Self::Advanced => "advanced",
        }
    }

    /// The base system prompt for this template.
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::Default => DEFAULT_PROMPT,
            Self::Beginner => BEGINNER_PROMPT,
            Self::Advanced => ADVANCED_PROMPT,
        }
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptTemplate {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "beginner" => Ok(Self::Beginner),
            "advanced" => Ok(Self::Advanced),
            other => Err(RagError::ConfigError(format!(
                "unknown prompt template '{other}' (expected 'default', 'beginner' or 'advanced')"
            ))),
        }
    }
}

/// Knobs for [`format_context`] and [`build_rag_prompt`].
#[derive(Debug, Clone, PartialEq)]
pub struct PromptOptions {
    /// At most this many results become sources.
    pub max_sources: usize,
    /// Results scoring below this are skipped and do not take a source number.
    pub min_score: f32,
    /// Include file, relevance and chunk lines for each source.
    pub structured_citations: bool,
    /// Append a line requiring the model to cite what it uses.
    pub enforce_citations: bool,
    /// Free text appended to the system message.
    pub custom_instructions: Option<String>,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            max_sources: 3,
            min_score: 0.3,
            structured_citations: true,
            enforce_citations: true,
            custom_instructions: None,
        }
    }
}

/// A system/user message pair ready for a chat model.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RagPrompt {
    /// The template, the context block and any extra instructions.
    pub system_message: String,
    /// The question, unchanged.
    pub user_message: String,
    /// The results that made it into the context, in `[Source N]` order.
    pub sources: Vec<SearchResult>,
}

/// Results that pass `options`, in the order they are numbered.
fn select_sources<'a>(results: &'a [SearchResult], options: &PromptOptions) -> Vec<&'a SearchResult> {
    results
        .iter()
        .filter(|r| r.score >= options.min_score)
        .take(options.max_sources)
        .collect()
}

fn source_label(result: &SearchResult, fallback: &str) -> String {
    result
        .metadata
        .get(FILENAME)
        .or_else(|| result.metadata.get("title"))
        .map(ToString::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

fn chunk_label(result: &SearchResult) -> String {
    result.metadata.get(CHUNK_INDEX).map_or_else(|| "N/A".to_string(), ToString::to_string)
}

/// Render `results` as a numbered context block.
///
/// Returns an empty string when no result reaches `options.min_score`.
pub fn format_context(results: &[SearchResult], options: &PromptOptions) -> String {
    let sources = select_sources(results, options);
    render_context(&sources, options)
}

fn render_context(sources: &[&SearchResult], options: &PromptOptions) -> String {
    if sources.is_empty() {
        return String::new();
    }

    let mut parts = vec![CONTEXT_INTRO.to_string()];
    for (i, result) in sources.iter().enumerate() {
        let n = i + 1;
        let label = source_label(result, "Unknown source");
        if options.structured_citations {
            parts.push(format!("\n{SEPARATOR}"));
            parts.push(format!("[Source {n}]"));
            parts.push(format!("Document: {label}"));
            parts.push(format!("Relevance: {:.2}%", result.score * 100.0));
            parts.push(format!("Chunk: {}", chunk_label(result)));
            parts.push(SEPARATOR.to_string());
        } else {
            parts.push(format!("\n[Source {n}: {label}]"));
        }
        parts.push(format!("{}\n", result.text));
    }

    let rule = "=".repeat(50);
    parts.push(format!("\n{rule}"));
    parts.push("IMPORTANT: When using information from the sources above,".to_string());
    parts.push("cite them in your response as [Source 1], [Source 2], etc.".to_string());
    parts.push(rule);
    parts.join("\n")
}

/// Combine a template, a context block and optional extra instructions.
///
/// An empty `context` produces a note telling the model it has no reference
/// material and should say its answer is general guidance.
pub fn build_system_message(
    template: PromptTemplate,
    context: &str,
    custom_instructions: Option<&str>,
    enforce_citations: bool,
) -> String {
    let mut message = template.system_prompt().to_string();

    if context.is_empty() {
        message.push_str("\n\nNote: No matching reference material was found. Provide general guidance.");
        message.push_str(
            "\nClearly state that you're providing general guidance without specific references.",
        );
    } else {
        message.push_str("\n\n");
        message.push_str(context);
        if enforce_citations {
            message.push_str(
                "\n\nCITATION REQUIREMENT: You MUST cite sources when using information from the materials above.",
            );
        }
    }

    if let Some(extra) = custom_instructions.filter(|s| !s.trim().is_empty()) {
        message.push_str("\n\nAdditional Instructions:\n");
        message.push_str(extra);
    }
    message
}

/// Build the prompt for answering `query` from `results`.
pub fn build_rag_prompt(
    query: &str,
    results: &[SearchResult],
    template: PromptTemplate,
    options: &PromptOptions,
) -> RagPrompt {
    let sources = select_sources(results, options);
    let context = render_context(&sources, options);
    let system_message = build_system_message(
        template,
        &context,
        options.custom_instructions.as_deref(),
        options.enforce_citations,
    );

    RagPrompt {
        system_message,
        user_message: query.to_string(),
        sources: sources.into_iter().cloned().collect(),
    }
}

/// Source numbers cited as `[Source N]` in `response`, sorted and deduplicated.
pub fn extract_citations(response: &str) -> Vec<usize> {
    CITATION
        .captures_iter(response)
        .filter_map(|c| c[1].parse::<usize>().ok())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// A `References:` list for `sources`, numbered from 1.
///
/// With `cited` set, only those numbers are listed. Returns an empty string
/// when nothing would be listed.
pub fn build_citation_reference(sources: &[SearchResult], cited: Option<&[usize]>) -> String {
    let mut out = String::from("References:");
    let mut listed = 0;
    for (i, result) in sources.iter().enumerate() {
        let n = i + 1;
        if cited.is_some_and(|c| !c.contains(&n)) {
            continue;
        }
        listed += 1;
        let _ = write!(
            out,
            "\n[{n}] {} (Chunk {}, Relevance: {:.0}%)",
            source_label(result, "Unknown"),
            chunk_label(result),
            result.score * 100.0
        );
    }
    if listed == 0 { String::new() } else { out }
}

/// How an answer's citations line up with the sources it was given.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CitationReport {
    /// Distinct cited numbers, ascending.
    pub cited_sources: Vec<usize>,
    /// How many sources the answer was given.
    pub total_available: usize,
    /// Every cited number is in `1..=total_available`.
    pub all_valid: bool,
    /// Length of `cited_sources`.
    pub citation_count: usize,
    /// `citation_count / total_available`, or `0.0` with no sources.
    pub citation_rate: f64,
}

/// Check the `[Source N]` citations in `response` against `sources`.
pub fn verify_citations(response: &str, sources: &[SearchResult]) -> CitationReport {
    let cited = extract_citations(response);
    let total = sources.len();
    let count = cited.len();

    CitationReport {
        all_valid: cited.iter().all(|&c| (1..=total).contains(&c)),
        citation_rate: if total == 0 { 0.0 } else { count as f64 / total as f64 },
        cited_sources: cited,
        total_available: total,
        citation_count: count,
    }
}
