//! Grading of submitted attempts.

use std::collections::HashMap;

use crate::models::{attempt::QuizAttempt, quiz::Quiz};

/// Percentage of correct answers.
/// `total_questions` is positive for every persisted attempt.
pub fn calculate_score(correct_answers: i32, total_questions: i32) -> f64 {
    debug_assert!(total_questions > 0, "attempt without questions");
    if total_questions <= 0 {
        return 0.0;
    }

    f64::from(correct_answers) / f64::from(total_questions) * 100.0
}

/// Records the answers on every item and fills in the attempt's result.
///
/// `answer_keys` maps question id to the correct option key. Questions missing
/// from it (deleted from the bank since the attempt started) are graded as
/// incorrect. Answers to questions outside the attempt are ignored.
/// Status and end time are left to the caller.
pub fn grade_attempt(
    attempt: &mut QuizAttempt,
    quiz: &Quiz,
    answer_keys: &HashMap<i64, String>,
    answers: &HashMap<i64, String>,
) {
    let attempt_id = attempt.id;
    let mut correct_answers = 0;

    for item in attempt.items.iter_mut() {
        let selected = answers.get(&item.question_id).cloned();

        let is_correct = match (&selected, answer_keys.get(&item.question_id)) {
            (Some(selected), Some(key)) => selected == key,
            (_, None) => {
                tracing::warn!(
                    attempt_id,
                    question_id = item.question_id,
                    "Question no longer exists, grading as incorrect"
                );
                false
            }
            (None, Some(_)) => false,
        };

        if is_correct {
            correct_answers += 1;
        }
        item.selected_option = selected;
        item.is_correct = Some(is_correct);
    }

    let stray = answers
        .keys()
        .filter(|id| !attempt.items.iter().any(|item| item.question_id == **id))
        .count();
    if stray > 0 {
        tracing::debug!(attempt_id, stray, "Ignoring answers to questions outside the attempt");
    }

    let score = calculate_score(correct_answers, attempt.total_questions);
    attempt.correct_answers = correct_answers;
    attempt.score = Some(score);
    attempt.is_passed = Some(quiz.is_passing(score));
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sqlx::types::Json;

    use super::*;
    use crate::models::{
        attempt::{AttemptStatus, QuizAttemptItem},
        quiz::{QuestionSelection, QuizSettings},
    };

    fn quiz(passing_score: i32) -> Quiz {
        Quiz {
            id: 1,
            lesson_id: 1,
            settings: QuizSettings {
                title: "quiz".to_string(),
                time_limit_minutes: None,
                max_attempts: 3,
                passing_score,
                shuffle_questions: false,
                shuffle_options: false,
                show_results_immediately: true,
                show_correct_answers: false,
                start_date: None,
                end_date: None,
                selection: QuestionSelection::Manual { question_ids: vec![1, 2, 3, 4] },
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn attempt(question_ids: &[i64]) -> QuizAttempt {
        QuizAttempt {
            id: 1,
            quiz_id: 1,
            student_id: 1,
            status: AttemptStatus::InProgress,
            start_time: Utc::now(),
            end_time: None,
            total_questions: question_ids.len() as i32,
            correct_answers: 0,
            score: None,
            is_passed: None,
            created_at: Utc::now(),
            items: question_ids
                .iter()
                .enumerate()
                .map(|(position, id)| QuizAttemptItem {
                    id: *id,
                    attempt_id: 1,
                    question_id: *id,
                    position: position as i32,
                    selected_option: None,
                    is_correct: None,
                    time_spent_seconds: None,
                    option_order: Json(vec![]),
                })
                .collect(),
        }
    }

    fn keys() -> HashMap<i64, String> {
        HashMap::from([
            (1, "A".to_string()),
            (2, "B".to_string()),
            (3, "C".to_string()),
            (4, "D".to_string()),
        ])
    }

    #[test]
    fn test_calculate_score_perfect() {
        assert_eq!(calculate_score(4, 4), 100.0);
    }

    #[test]
    fn test_calculate_score_half() {
        assert_eq!(calculate_score(1, 2), 50.0);
    }

    #[test]
    fn test_calculate_score_zero() {
        assert_eq!(calculate_score(0, 3), 0.0);
    }

    #[test]
    fn test_partial_answers_fail() {
        let mut attempt = attempt(&[1, 2, 3, 4]);
        let answers = HashMap::from([
            (1, "A".to_string()),
            (2, "B".to_string()),
            (3, "X".to_string()),
        ]);

        grade_attempt(&mut attempt, &quiz(60), &keys(), &answers);

        assert_eq!(attempt.correct_answers, 2);
        assert_eq!(attempt.score, Some(50.0));
        assert_eq!(attempt.is_passed, Some(false));
        assert_eq!(attempt.items[2].selected_option.as_deref(), Some("X"));
        assert_eq!(attempt.items[3].selected_option, None);
        assert_eq!(attempt.items[3].is_correct, Some(false));
    }

    #[test]
    fn test_all_correct_passes() {
        let mut attempt = attempt(&[1, 2, 3, 4]);
        let answers = keys();

        grade_attempt(&mut attempt, &quiz(60), &keys(), &answers);

        assert_eq!(attempt.correct_answers, 4);
        assert_eq!(attempt.score, Some(100.0));
        assert_eq!(attempt.is_passed, Some(true));
    }

    #[test]
    fn test_comparison_is_case_sensitive() {
        let mut attempt = attempt(&[1]);
        let answers = HashMap::from([(1, "a".to_string())]);

        grade_attempt(&mut attempt, &quiz(60), &keys(), &answers);
        assert_eq!(attempt.correct_answers, 0);
    }

    #[test]
    fn test_pass_threshold_is_inclusive() {
        // 5 questions. Need 3 correct for 60%.
        let mut attempt = attempt(&[1, 2, 3, 4, 5]);
        let mut answer_keys = keys();
        answer_keys.insert(5, "E".to_string());
        let answers = HashMap::from([
            (1, "A".to_string()),
            (2, "B".to_string()),
            (3, "C".to_string()),
            (4, "A".to_string()), // Wrong
        ]);

        grade_attempt(&mut attempt, &quiz(60), &answer_keys, &answers);
        assert_eq!(attempt.score, Some(60.0));
        assert_eq!(attempt.is_passed, Some(true));
    }

    #[test]
    fn test_deleted_question_and_stray_answers() {
        let mut attempt = attempt(&[1, 9]);
        let answers = HashMap::from([
            (1, "A".to_string()),
            (9, "A".to_string()),
            (42, "B".to_string()),
        ]);

        grade_attempt(&mut attempt, &quiz(50), &keys(), &answers);
        assert_eq!(attempt.correct_answers, 1);
        assert_eq!(attempt.score, Some(50.0));
        assert_eq!(attempt.is_passed, Some(true));
        assert_eq!(attempt.items[1].is_correct, Some(false));
    }
}
