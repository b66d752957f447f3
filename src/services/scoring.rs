// src/services/scoring.rs

use crate::models::{
    paper::{RuleEntry, RuleMap},
    question::{Answer, Question, QuestionType},
    record::QuestionScore,
    session::SessionAnswers,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSheet {
    pub per_question: Vec<QuestionScore>,
    pub total: f64,
}

/// Points for one question.
///
/// Multi-select: any letter outside the canonical set forfeits the question,
/// a strict non-empty subset earns the partial score.
pub fn score_question(question: &Question, answer: Option<&Answer>, rule: &RuleEntry) -> f64 {
    let Some(answer) = answer else {
        return 0.0;
    };

    match question.question_type {
        QuestionType::Single | QuestionType::Judge => {
            match (answer.as_single(), question.answer.as_single()) {
                (Some(given), Some(expected)) if given == expected => rule.full_score,
                _ => 0.0,
            }
        }
        QuestionType::Multiple => {
            let expected = question.answer.letters();
            let given = answer.letters();

            if given.is_empty() || !given.is_subset(&expected) {
                0.0
            } else if given == expected {
                rule.full_score
            } else {
                rule.partial_score
            }
        }
    }
}

/// Scores a whole attempt. Questions without a slot, or with a timed-out
/// slot, earn nothing.
pub fn score(questions: &[Question], answers: &SessionAnswers, rules: &RuleMap) -> ScoreSheet {
    let per_question: Vec<QuestionScore> = questions
        .iter()
        .map(|q| QuestionScore {
            question_id: q.id,
            points: score_question(q, answers.get(q.id).flatten(), rules.get(q.question_type)),
        })
        .collect();
    let total = per_question.iter().map(|s| s.points).sum();

    ScoreSheet { per_question, total }
}
