//! Context window assembly.

use std::collections::BTreeSet;

use tracing::debug;

use rag_core::{Budget, ContextWindow, DocId, Document, Excerpt, ScoredCandidate};

/// Jaccard similarity of two token sets. Empty sets are never similar.
pub fn jaccard(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f32 / union as f32
}

/// Build a context window from fused candidates, best first.
///
/// A candidate is skipped when its document is unknown, when its token set
/// is at least `dedup_threshold` similar to an excerpt already kept, or when
/// its text would overflow the remaining budget. The walk continues after a
/// skip, so a smaller later candidate may still fit.
pub fn assemble<'a, F>(
    candidates: &[ScoredCandidate],
    lookup: F,
    budget: Budget,
    dedup_threshold: f32,
) -> ContextWindow
where
    F: Fn(DocId) -> Option<&'a Document>,
{
    let mut window = ContextWindow::new(budget);
    let mut kept: Vec<BTreeSet<&'a str>> = Vec::new();

    for candidate in candidates {
        let Some(document) = lookup(candidate.doc_id) else {
            debug!("Candidate {} not in snapshot, skipping", candidate.doc_id);
            continue;
        };

        let tokens: BTreeSet<&str> = document.tokens.iter().map(String::as_str).collect();
        if let Some(similarity) = kept
            .iter()
            .map(|other| jaccard(&tokens, other))
            .find(|similarity| *similarity >= dedup_threshold)
        {
            debug!(
                "Dropping {} as redundant (similarity {:.2})",
                candidate.doc_id, similarity
            );
            continue;
        }

        let excerpt = Excerpt {
            doc_id: candidate.doc_id,
            text: document.text.clone(),
            score: candidate.fused_score,
        };
        if window.try_push(excerpt) {
            kept.push(tokens);
        } else {
            debug!(
                "Candidate {} does not fit the remaining budget of {}",
                candidate.doc_id,
                window.remaining()
            );
        }
    }

    window
}
