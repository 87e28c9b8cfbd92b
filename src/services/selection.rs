//! Question selection and ordering for new attempts.

use std::collections::HashMap;

use rand::{Rng, seq::SliceRandom};

use crate::{
    error::{AppError, AppResult},
    models::{
        attempt::NewAttemptItem,
        question::Question,
        quiz::RandomSelection,
    },
};

/// Arranges fetched questions in manual-list order.
/// The store returns them in arbitrary order; the list is authoritative.
pub fn resolve_manual(question_ids: &[i64], fetched: Vec<Question>) -> AppResult<Vec<Question>> {
    let mut by_id: HashMap<i64, Question> = fetched.into_iter().map(|q| (q.id, q)).collect();

    let mut missing = Vec::new();
    let mut ordered = Vec::with_capacity(question_ids.len());
    for id in question_ids {
        match by_id.remove(id) {
            Some(question) => ordered.push(question),
            None => missing.push(id.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(AppError::InvalidConfiguration(format!(
            "quiz references unknown questions: {}",
            missing.join(", ")
        )));
    }

    Ok(ordered)
}

/// Applies the difficulty and tag filters to the active pool, then draws
/// `count` questions uniformly. The result keeps the pool's order.
pub fn resolve_random<R: Rng + ?Sized>(
    pool: Vec<Question>,
    spec: &RandomSelection,
    rng: &mut R,
) -> Vec<Question> {
    let mut candidates: Vec<Question> = pool
        .into_iter()
        .filter(|q| q.is_active)
        .filter(|q| match &spec.difficulty {
            Some(wanted) => q
                .difficulty
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(wanted)),
            None => true,
        })
        .filter(|q| spec.tags.is_empty() || spec.tags.iter().any(|tag| q.has_tag(tag)))
        .collect();

    let Some(count) = spec.count.map(|c| c as usize) else {
        return candidates;
    };

    if candidates.len() <= count {
        if candidates.len() < count {
            tracing::warn!(
                available = candidates.len(),
                requested = count,
                "Question pool smaller than the requested count, using all of it"
            );
        }
        return candidates;
    }

    let mut picked: Vec<usize> = rand::seq::index::sample(rng, candidates.len(), count).into_vec();
    picked.sort_unstable();

    let mut index = 0;
    candidates.retain(|_| {
        let keep = picked.binary_search(&index).is_ok();
        index += 1;
        keep
    });
    candidates
}

/// Uniformly random permutation when `shuffle` is set, natural order otherwise.
pub fn order_questions<R: Rng + ?Sized>(
    mut questions: Vec<Question>,
    shuffle: bool,
    rng: &mut R,
) -> Vec<Question> {
    if shuffle {
        questions.shuffle(rng);
    }
    questions
}

/// One item per question, in the given order, each with its option display
/// order frozen.
pub fn build_items<R: Rng + ?Sized>(
    questions: &[Question],
    shuffle_options: bool,
    rng: &mut R,
) -> Vec<NewAttemptItem> {
    questions
        .iter()
        .map(|question| {
            let mut option_order = question.option_keys();
            if shuffle_options {
                option_order.shuffle(rng);
            }
            NewAttemptItem {
                question_id: question.id,
                option_order,
            }
        })
        .collect()
}
