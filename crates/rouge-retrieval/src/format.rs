//! Citation list, structured truncation and context rendering.

use std::collections::HashSet;
use std::fmt::Write;

use crate::types::{Chunk, RetrievalResult, TruncationInfo};

/// Build a result from packed chunks.
///
/// Request-level fields (`candidates_fetched`, `intent`, `top_k`, `diagnostic`) are left
/// for the caller to fill in.
#[must_use]
pub fn format_result(
    included: Vec<Chunk>,
    truncated: bool,
    chunks_considered: usize,
    available_tokens: usize,
) -> RetrievalResult {
    let citations = citations(&included);
    let estimated_tokens = included.iter().map(|c| c.estimated_tokens).sum();
    let context = render_context(&included);
    let chunks_included = included.len();
    let truncation = truncated.then_some(TruncationInfo {
        chunks_included,
        chunks_considered,
        available_tokens,
    });

    RetrievalResult {
        chunks: included,
        chunks_considered,
        chunks_included,
        truncated,
        truncation,
        citations,
        estimated_tokens,
        context,
        ..RetrievalResult::default()
    }
}

/// Distinct `source_id`s in order of first appearance.
#[must_use]
pub fn citations(chunks: &[Chunk]) -> Vec<String> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|c| seen.insert(c.source_id.as_str()))
        .map(|c| c.source_id.clone())
        .collect()
}

/// Render included chunks as an XML block for a model prompt.
#[must_use]
pub fn render_context(chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return String::new();
    }

    let mut out = String::from("<retrieved_context>\n");

    for (i, chunk) in chunks.iter().enumerate() {
        let _ = write!(
            out,
            "  <chunk index=\"{}\" source=\"{}\"",
            i + 1,
            escape_attr(&chunk.source_id)
        );
        if let Some(title) = &chunk.title {
            let _ = write!(out, " title=\"{}\"", escape_attr(title));
        }
        if let Some(url) = &chunk.url {
            let _ = write!(out, " url=\"{}\"", escape_attr(url));
        }
        let _ = writeln!(out, " score=\"{:.3}\">", chunk.similarity_score);
        out.push_str(&chunk.text);
        out.push_str("\n  </chunk>\n");
    }

    out.push_str("</retrieved_context>");
    out
}

/// One numbered line per cited source, with title and URL when known.
#[must_use]
pub fn render_sources(result: &RetrievalResult) -> String {
    let mut out = String::new();
    for (i, source) in result.citations.iter().enumerate() {
        let first = result.chunks.iter().find(|c| &c.source_id == source);
        let _ = write!(out, "{}. {source}", i + 1);
        if let Some(c) = first {
            if let Some(title) = &c.title {
                let _ = write!(out, " ({title})");
            }
            if let Some(url) = &c.url
                && url != source
            {
                let _ = write!(out, " <{url}>");
            }
        }
        out.push('\n');
    }
    out
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
