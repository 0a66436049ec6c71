//! Score delta computation
//!
//! Pure functions mapping a question definition and a grading outcome to
//! the signed point delta applied to a participant's cumulative score.
//! Deltas are always applied as relative increments by the caller, never as
//! absolute overwrites, so grading different participants in any
//! interleaving produces the same totals.

use crate::question::Question;

/// Computes the delta for an automatically graded answer
///
/// A correct answer earns the question's points; an incorrect one costs its
/// negative points. This is the rule applied at submission time for
/// multiple choice questions.
pub fn auto(question: &Question, correct: bool) -> i64 {
    if correct {
        i64::from(question.points)
    } else {
        -i64::from(question.negative_points)
    }
}

/// Computes the delta for a manually graded answer
///
/// Without an override this mirrors [`auto`]. The grader may instead award
/// an arbitrary signed amount, such as partial credit on a descriptive
/// answer, which is honored verbatim.
pub fn manual(question: &Question, correct: bool, override_points: Option<i64>) -> i64 {
    override_points.unwrap_or_else(|| auto(question, correct))
}
