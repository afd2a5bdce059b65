//! Greedy maximal-marginal-relevance selection over oversampled candidates.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::types::Chunk;

/// Trades relevance against redundancy with weight `lambda` in `[0, 1]`.
///
/// Each step picks the remaining candidate maximizing
/// `score - lambda * max_jaccard(candidate, selected)`; ties go to the lower original rank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiversitySelector {
    lambda: f64,
}

impl Default for DiversitySelector {
    fn default() -> Self {
        Self { lambda: 0.5 }
    }
}

impl DiversitySelector {
    /// `lambda` is clamped into `[0, 1]`; NaN becomes 0.
    #[must_use]
    pub fn new(lambda: f64) -> Self {
        let lambda = if lambda.is_nan() {
            0.0
        } else {
            lambda.clamp(0.0, 1.0)
        };
        Self { lambda }
    }

    #[must_use]
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Pick up to `target_k` chunks from score-ordered `candidates`.
    ///
    /// With no more candidates than `target_k`, all of them are returned unchanged.
    #[must_use]
    pub fn select(&self, candidates: &[Chunk], target_k: usize) -> Vec<Chunk> {
        if candidates.len() <= target_k {
            return candidates.to_vec();
        }
        if target_k == 0 {
            return Vec::new();
        }

        let words: Vec<HashSet<String>> = candidates.iter().map(|c| word_set(&c.text)).collect();
        let mut remaining: Vec<usize> = (0..candidates.len()).collect();
        let mut max_sim = vec![0.0_f64; candidates.len()];
        let mut selected = Vec::with_capacity(target_k);

        while selected.len() < target_k && !remaining.is_empty() {
            let mut best_pos = 0;
            for pos in 1..remaining.len() {
                if self.better(candidates, &max_sim, remaining[pos], remaining[best_pos]) {
                    best_pos = pos;
                }
            }
            let picked = remaining.swap_remove(best_pos);
            selected.push(picked);

            for &idx in &remaining {
                let sim = jaccard(&words[picked], &words[idx]);
                if sim > max_sim[idx] {
                    max_sim[idx] = sim;
                }
            }
        }

        selected.into_iter().map(|i| candidates[i].clone()).collect()
    }

    fn mmr(&self, chunk: &Chunk, max_sim: f64) -> f64 {
        f64::from(chunk.similarity_score) - self.lambda * max_sim
    }

    fn better(&self, candidates: &[Chunk], max_sim: &[f64], a: usize, b: usize) -> bool {
        let sa = self.mmr(&candidates[a], max_sim[a]);
        let sb = self.mmr(&candidates[b], max_sim[b]);
        match sa.total_cmp(&sb) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => candidates[a].original_rank < candidates[b].original_rank,
        }
    }
}

/// First `target_k` candidates, for requests that skip diversity selection.
#[must_use]
pub fn take_top(candidates: &[Chunk], target_k: usize) -> Vec<Chunk> {
    candidates.iter().take(target_k).cloned().collect()
}

/// Lowercased alphanumeric words of `text`.
#[must_use]
pub fn word_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard similarity of two word sets. Two empty sets are identical.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let inter = small.iter().filter(|w| large.contains(*w)).count();
    let union = a.len() + b.len() - inter;
    inter as f64 / union as f64
}
