use shared::{
    domain::{RiskLevel, TaskStatus},
    protocol::{Evaluation, TaskSnapshot},
};

use crate::{review::ReviewForm, status::label_for, view::ViewContext};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskCounts {
    pub green: usize,
    pub yellow: usize,
    pub red: usize,
}

impl RiskCounts {
    pub fn total(&self) -> usize {
        self.green + self.yellow + self.red
    }

    pub fn needs_attention(&self) -> usize {
        self.yellow + self.red
    }
}

/// Everything the result view shows for one task snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub status: TaskStatus,
    pub status_label: &'static str,
    pub counts: RiskCounts,
    /// Findings that already carry a human decision on the backend.
    pub reviewed: usize,
    pub final_report: Option<String>,
    pub review_form: Option<ReviewForm>,
}

/// Partitions the snapshot's findings by tier and, while the task waits for a
/// human, hands the yellow and red ones to the review form.
pub fn present(view: &ViewContext, snapshot: &TaskSnapshot) -> ResultView {
    let mut counts = RiskCounts::default();
    let mut attention: Vec<Evaluation> = Vec::new();

    for evaluation in &snapshot.evaluations {
        match evaluation.risk_level {
            RiskLevel::Green => counts.green += 1,
            RiskLevel::Yellow => {
                counts.yellow += 1;
                attention.push(evaluation.clone());
            }
            RiskLevel::Red => {
                counts.red += 1;
                attention.push(evaluation.clone());
            }
        }
    }

    let review_form = if snapshot.status.awaits_review() && !attention.is_empty() {
        ReviewForm::from_context(&view.with_evaluations(attention))
    } else {
        None
    };

    let reviewed = snapshot
        .human_reviews
        .iter()
        .filter(|review| {
            snapshot
                .evaluations
                .iter()
                .any(|evaluation| evaluation.id == review.evaluation_id)
        })
        .count();

    ResultView {
        status: snapshot.status,
        status_label: label_for(snapshot.status),
        counts,
        reviewed,
        final_report: snapshot
            .final_report
            .clone()
            .filter(|report| !report.is_empty()),
        review_form,
    }
}
