//! Plain-text presentation for the CLI.

use std::fmt::Write;

use rouge_memory::{ScopeStats, StatsSnapshot};
use rouge_retrieval::{RetrievalResult, TruncationInfo, render_sources};

pub(crate) fn truncation_notice(info: &TruncationInfo) -> String {
    format!(
        "[context truncated: {} of {} chunks fit in {} tokens]",
        info.chunks_included, info.chunks_considered, info.available_tokens
    )
}

pub(crate) fn retrieval_report(result: &RetrievalResult) -> String {
    let mut out = String::new();
    if let Some(diagnostic) = &result.diagnostic {
        let _ = writeln!(out, "no context: {diagnostic}");
        return out;
    }

    out.push_str(&result.context);
    if !result.context.ends_with('\n') {
        out.push('\n');
    }
    if let Some(info) = &result.truncation {
        let _ = writeln!(out, "{}", truncation_notice(info));
    }
    if !result.citations.is_empty() {
        out.push_str("\nSources:\n");
        out.push_str(&render_sources(result));
    }

    let _ = write!(
        out,
        "\n{} of {} chunks, ~{} tokens",
        result.chunks_included, result.chunks_considered, result.estimated_tokens
    );
    if let Some(decision) = &result.top_k {
        let _ = write!(out, " (top_k {}: {})", decision.target_k, decision.rationale);
    }
    out.push('\n');
    out
}

pub(crate) fn stats_report(stats: &ScopeStats) -> String {
    let ranges = stats.recommended_ranges();
    let scope = stats
        .scope
        .as_ref()
        .map_or_else(|| "(collection)".to_owned(), ToString::to_string);

    let mut out = String::new();
    let _ = writeln!(out, "scope:                {scope}");
    let _ = writeln!(out, "chunks:               {}", stats.total_chunk_count);
    let _ = writeln!(out, "characters:           {}", stats.total_chars);
    let _ = writeln!(out, "estimated tokens:     {}", stats.total_tokens);
    let _ = writeln!(out, "avg chunk chars:      {:.1}", stats.avg_chunk_chars);
    let _ = writeln!(out, "avg tokens per chunk: {:.1}", stats.avg_tokens_per_chunk);
    let _ = writeln!(out, "estimated pages:      {}", stats.estimated_pages);
    out.push_str("recommended top_k:\n");
    let _ = writeln!(out, "  simple query:       {}", ranges.simple_query);
    let _ = writeln!(out, "  medium section:     {}", ranges.medium_section);
    let _ = writeln!(out, "  large section:      {}", ranges.large_section);
    let _ = writeln!(out, "  full document:      {}", ranges.full_document);
    out
}

pub(crate) fn stats_json(stats: &ScopeStats) -> serde_json::Value {
    serde_json::json!({
        "stats": stats,
        "recommended_ranges": stats.recommended_ranges(),
    })
}

pub(crate) fn scopes_report(snapshot: &StatsSnapshot) -> String {
    let mut out = String::new();
    for scope in snapshot.scopes() {
        let count = snapshot.get(&scope).map_or(0, |s| s.total_chunk_count);
        let _ = writeln!(out, "{scope}\t{count}");
    }
    out
}

#[cfg(test)]
mod tests {
    use rouge_memory::ScopeKey;
    use rouge_retrieval::{Chunk, Diagnostic};

    use super::*;

    fn stats(scope: Option<ScopeKey>, chunks: usize) -> ScopeStats {
        ScopeStats {
            scope,
            total_chunk_count: chunks,
            total_chars: chunks * 800,
            total_tokens: chunks * 200,
            avg_chunk_chars: 800.0,
            avg_tokens_per_chunk: 200.0,
            estimated_pages: chunks * 800 / 2000,
            computed_at: 1,
        }
    }

    fn chunk(id: &str, source: &str) -> Chunk {
        Chunk {
            id: id.into(),
            text: format!("body {id}"),
            estimated_tokens: 10,
            source_id: source.into(),
            scope_key: None,
            title: None,
            url: None,
            chunk_index: None,
            similarity_score: 0.9,
            original_rank: 0,
        }
    }

    #[test]
    fn truncation_notice_names_counts() {
        let notice = truncation_notice(&TruncationInfo {
            chunks_included: 4,
            chunks_considered: 20,
            available_tokens: 1000,
        });
        assert_eq!(
            notice,
            "[context truncated: 4 of 20 chunks fit in 1000 tokens]"
        );
    }

    #[test]
    fn diagnostic_replaces_context() {
        let result = RetrievalResult::empty(Diagnostic::NoCandidates);
        let report = retrieval_report(&result);
        assert_eq!(report, "no context: no candidate chunks matched the query\n");
    }

    #[test]
    fn report_lists_sources_and_truncation() {
        let result = RetrievalResult {
            chunks: vec![chunk("a", "guide.pdf"), chunk("b", "faq.pdf")],
            chunks_considered: 5,
            chunks_included: 2,
            truncated: true,
            truncation: Some(TruncationInfo {
                chunks_included: 2,
                chunks_considered: 5,
                available_tokens: 25,
            }),
            citations: vec!["guide.pdf".into(), "faq.pdf".into()],
            estimated_tokens: 20,
            context: "<retrieved_context>\n</retrieved_context>\n".into(),
            ..RetrievalResult::default()
        };

        let report = retrieval_report(&result);
        assert!(report.starts_with("<retrieved_context>"));
        assert!(report.contains("[context truncated: 2 of 5 chunks fit in 25 tokens]"));
        assert!(report.contains("Sources:\n1. guide.pdf\n2. faq.pdf\n"));
        assert!(report.ends_with("2 of 5 chunks, ~20 tokens\n"));
    }

    #[test]
    fn untruncated_report_has_no_notice() {
        let result = RetrievalResult {
            chunks: vec![chunk("a", "guide.pdf")],
            chunks_considered: 1,
            chunks_included: 1,
            citations: vec!["guide.pdf".into()],
            estimated_tokens: 10,
            context: "ctx".into(),
            ..RetrievalResult::default()
        };
        assert!(!retrieval_report(&result).contains("truncated"));
    }

    #[test]
    fn stats_report_includes_ranges() {
        let report = stats_report(&stats(Some(ScopeKey::File("manual.pdf".into())), 500));
        assert!(report.contains("scope:                manual.pdf"));
        assert!(report.contains("chunks:               500"));
        assert!(report.contains("  simple query:       50"));
        assert!(report.contains("  full document:      200"));
    }

    #[test]
    fn scopes_report_lists_files_then_domains() {
        let mut snapshot = StatsSnapshot::default();
        snapshot.files.insert(
            "b.pdf".into(),
            stats(Some(ScopeKey::File("b.pdf".into())), 3),
        );
        snapshot.domains.insert(
            "example.org".into(),
            stats(Some(ScopeKey::Domain("example.org".into())), 7),
        );
        let report = scopes_report(&snapshot);
        assert!(report.contains("b.pdf\t3\n"));
        assert!(report.contains("domain:example.org\t7\n"));
    }

    #[test]
    fn stats_json_nests_ranges() {
        let value = stats_json(&stats(None, 30));
        assert_eq!(value["stats"]["total_chunk_count"], 30);
        assert_eq!(value["recommended_ranges"]["simple_query"], 10);
        assert_eq!(value["recommended_ranges"]["full_document"], 30);
    }
}
