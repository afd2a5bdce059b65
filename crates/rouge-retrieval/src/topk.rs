//! Adaptive choice of how many chunks to retrieve.
//!
//! Order of clamping: the base (scope fraction, fallback, or manual override) is reduced to
//! the token-safe ceiling and then to the absolute cap. A caller's request is honoured
//! unless it would overflow the budget or the cap.

use std::num::NonZeroUsize;

use rouge_memory::ScopeStats;
use serde::Serialize;

use crate::error::{Result, RetrievalError};
use crate::intent::QueryIntent;
use crate::types::TokenBudget;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopKPolicy {
    pub simple_fraction: f64,
    pub completeness_fraction: f64,
    pub simple_fallback_k: usize,
    pub completeness_fallback_k: usize,
    pub absolute_cap: usize,
}

impl Default for TopKPolicy {
    fn default() -> Self {
        Self {
            simple_fraction: 0.10,
            completeness_fraction: 0.40,
            simple_fallback_k: 20,
            completeness_fallback_k: 50,
            absolute_cap: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopKDecision {
    pub target_k: usize,
    /// Value before clamping: manual override, scope fraction or fallback.
    pub requested_k: usize,
    /// Token-safe ceiling, when scope stats were available.
    pub ceiling: Option<usize>,
    pub ceiling_applied: bool,
    pub rationale: String,
}

impl TopKPolicy {
    /// # Errors
    ///
    /// Returns [`RetrievalError::ZeroTargetK`] when clamping leaves nothing to retrieve.
    pub fn select_k(
        &self,
        stats: Option<&ScopeStats>,
        intent: QueryIntent,
        manual: Option<NonZeroUsize>,
        budget: &TokenBudget,
    ) -> Result<TopKDecision> {
        let (requested_k, source) = match (manual, stats) {
            (Some(k), _) => (k.get(), "manual override".to_owned()),
            (None, None) => {
                let k = match intent {
                    QueryIntent::Simple => self.simple_fallback_k,
                    QueryIntent::Completeness => self.completeness_fallback_k,
                };
                (k, format!("{} fallback", intent_label(intent)))
            }
            (None, Some(s)) => {
                let fraction = match intent {
                    QueryIntent::Simple => self.simple_fraction,
                    QueryIntent::Completeness => self.completeness_fraction,
                };
                (
                    fraction_of(s.total_chunk_count, fraction),
                    format!(
                        "{} fraction {:.0}% of {} chunks",
                        intent_label(intent),
                        fraction * 100.0,
                        s.total_chunk_count
                    ),
                )
            }
        };

        let ceiling = stats.map(|s| token_ceiling(budget.available(), s.avg_tokens_per_chunk));

        let mut target_k = requested_k;
        let mut clamps = Vec::new();
        if let Some(c) = ceiling
            && c < target_k
        {
            target_k = c;
            clamps.push(format!("token ceiling {c}"));
        }
        if self.absolute_cap < target_k {
            target_k = self.absolute_cap;
            clamps.push(format!("absolute cap {}", self.absolute_cap));
        }

        let ceiling_applied = target_k < requested_k;
        let rationale = if ceiling_applied {
            format!(
                "{source}: requested {requested_k}, clamped to {target_k} by {}",
                clamps.join(" then ")
            )
        } else {
            format!("{source}: {target_k}")
        };

        if target_k == 0 {
            return Err(RetrievalError::ZeroTargetK { rationale });
        }
        if ceiling_applied {
            tracing::warn!(requested_k, target_k, ?ceiling, "top_k clamped");
        }

        Ok(TopKDecision {
            target_k,
            requested_k,
            ceiling,
            ceiling_applied,
            rationale,
        })
    }
}

fn intent_label(intent: QueryIntent) -> &'static str {
    match intent {
        QueryIntent::Simple => "simple",
        QueryIntent::Completeness => "completeness",
    }
}

/// `round(total * fraction)`, at least 1.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn fraction_of(total: usize, fraction: f64) -> usize {
    ((total as f64 * fraction).round() as usize).max(1)
}

/// Chunks of average size that fit in `available` tokens.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn token_ceiling(available: usize, avg_tokens_per_chunk: f64) -> usize {
    let avg = if avg_tokens_per_chunk.is_finite() {
        avg_tokens_per_chunk.max(1.0)
    } else {
        1.0
    };
    (available as f64 / avg).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(total: usize, avg_tokens: f64) -> ScopeStats {
        ScopeStats {
            scope: None,
            total_chunk_count: total,
            total_chars: 0,
            total_tokens: 0,
            avg_chunk_chars: avg_tokens * 4.0,
            avg_tokens_per_chunk: avg_tokens,
            estimated_pages: 0,
            computed_at: 1,
        }
    }

    fn select(
        stats_: Option<&ScopeStats>,
        intent: QueryIntent,
        manual: Option<usize>,
    ) -> Result<TopKDecision> {
        TopKPolicy::default().select_k(
            stats_,
            intent,
            manual.and_then(NonZeroUsize::new),
            &TokenBudget::default(),
        )
    }

    #[test]
    fn simple_fraction_under_ceiling() {
        let d = select(Some(&stats(1245, 244.0)), QueryIntent::Simple, None).unwrap();
        assert_eq!(d.target_k, 125);
        assert_eq!(d.ceiling, Some(614));
        assert!(!d.ceiling_applied);
    }

    #[test]
    fn completeness_clamped_by_cap() {
        let d = select(Some(&stats(1245, 244.0)), QueryIntent::Completeness, None).unwrap();
        assert_eq!(d.requested_k, 498);
        assert_eq!(d.target_k, 200);
        assert!(d.ceiling_applied);
        assert!(d.rationale.contains("absolute cap 200"));
    }

    #[test]
    fn manual_override_clamped() {
        let d = select(Some(&stats(1245, 244.0)), QueryIntent::Simple, Some(2000)).unwrap();
        assert_eq!(d.target_k, 200);
        assert_eq!(d.requested_k, 2000);
        assert!(d.ceiling_applied);
        assert!(d.rationale.contains("requested 2000"));
        assert!(d.rationale.contains("token ceiling 614 then absolute cap 200"));
    }

    #[test]
    fn manual_override_within_limits_is_kept() {
        let d = select(Some(&stats(1245, 244.0)), QueryIntent::Completeness, Some(30)).unwrap();
        assert_eq!(d.target_k, 30);
        assert!(!d.ceiling_applied);
    }

    #[test]
    fn fallbacks_without_stats() {
        assert_eq!(select(None, QueryIntent::Simple, None).unwrap().target_k, 20);
        let d = select(None, QueryIntent::Completeness, None).unwrap();
        assert_eq!(d.target_k, 50);
        assert_eq!(d.ceiling, None);
    }

    #[test]
    fn manual_without_stats_still_capped() {
        let d = select(None, QueryIntent::Simple, Some(500)).unwrap();
        assert_eq!(d.target_k, 200);
        assert!(d.ceiling_applied);
    }

    #[test]
    fn token_ceiling_clamps_large_chunks() {
        let d = select(Some(&stats(1000, 10_000.0)), QueryIntent::Simple, None).unwrap();
        assert_eq!(d.target_k, 15);
        assert!(d.ceiling_applied);
    }

    #[test]
    fn tiny_scope_gets_at_least_one() {
        let d = select(Some(&stats(3, 100.0)), QueryIntent::Simple, None).unwrap();
        assert_eq!(d.target_k, 1);
    }

    #[test]
    fn zero_ceiling_fails_fast() {
        let budget = TokenBudget::new(1_000, 900).unwrap();
        let err = TopKPolicy::default()
            .select_k(Some(&stats(50, 500.0)), QueryIntent::Simple, None, &budget)
            .unwrap_err();
        assert!(matches!(err, RetrievalError::ZeroTargetK { .. }));
    }

    #[test]
    fn zero_average_does_not_divide_by_zero() {
        assert_eq!(token_ceiling(100, 0.0), 100);
        assert_eq!(token_ceiling(100, f64::NAN), 100);
    }
}
