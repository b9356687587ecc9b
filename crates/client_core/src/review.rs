use shared::{
    domain::{EvaluationId, RiskLevel, TaskId},
    protocol::{Evaluation, Review, ReviewBatch},
};
use tracing::{debug, warn};

use crate::{error::ClientError, view::ViewContext};

const EXCERPT_CHARS: usize = 100;
const CONTINUATION_MARKER: &str = "...";

/// Badge text shown next to a finding of the given tier.
pub fn risk_badge(risk_level: RiskLevel) -> &'static str {
    match risk_level {
        RiskLevel::Red => "red risk",
        RiskLevel::Yellow => "needs confirmation",
        RiskLevel::Green => "no action",
    }
}

/// Per-finding choice. Every item starts approved, so an unanswered item
/// cannot exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Decision {
    #[default]
    Approve,
    Reject,
}

impl Decision {
    pub fn is_approved(self) -> bool {
        self == Decision::Approve
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewItem {
    evaluation: Evaluation,
    decision: Decision,
    comment: String,
}

impl ReviewItem {
    fn new(evaluation: Evaluation) -> Self {
        Self {
            evaluation,
            decision: Decision::default(),
            comment: String::new(),
        }
    }

    pub fn evaluation_id(&self) -> EvaluationId {
        self.evaluation.id
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.evaluation.risk_level
    }

    pub fn badge(&self) -> &'static str {
        risk_badge(self.evaluation.risk_level)
    }

    pub fn explanation(&self) -> &str {
        &self.evaluation.explanation
    }

    pub fn suggestion(&self) -> &str {
        &self.evaluation.suggestion
    }

    pub fn change_type(&self) -> Option<&str> {
        self.evaluation.difference.change_type.as_deref()
    }

    pub fn original_excerpt(&self) -> Option<String> {
        excerpt(self.evaluation.difference.original_section.as_deref())
    }

    pub fn modified_excerpt(&self) -> Option<String> {
        excerpt(self.evaluation.difference.modified_section.as_deref())
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    fn to_review(&self) -> Review {
        Review {
            evaluation_id: self.evaluation.id,
            approved: self.decision.is_approved(),
            modified_suggestion: self.evaluation.suggestion.clone(),
            comment: self.comment.clone(),
        }
    }
}

/// First 100 characters of a section followed by the continuation marker.
/// Empty or absent sections are not shown.
fn excerpt(section: Option<&str>) -> Option<String> {
    let section = section.filter(|s| !s.is_empty())?;
    let mut text: String = section.chars().take(EXCERPT_CHARS).collect();
    text.push_str(CONTINUATION_MARKER);
    Some(text)
}

/// Decision form for the findings of one task that need a human answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewForm {
    task_id: TaskId,
    items: Vec<ReviewItem>,
    submitted: bool,
}

impl ReviewForm {
    /// Builds the form from the yellow and red findings of `view`, in the
    /// order received. Returns `None` when the view carries no task id or no
    /// finding needs attention.
    pub fn from_context(view: &ViewContext) -> Option<Self> {
        let items: Vec<ReviewItem> = view
            .evaluations()
            .iter()
            .filter(|evaluation| evaluation.risk_level.requires_review())
            .cloned()
            .map(ReviewItem::new)
            .collect();

        if items.is_empty() {
            debug!("review: no findings need attention; form not built");
            return None;
        }

        let Some(task_id) = view.task_id().cloned() else {
            warn!(
                findings = items.len(),
                "review: view has no task id; form not built"
            );
            return None;
        };

        Some(Self {
            task_id,
            items,
            submitted: false,
        })
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn items(&self) -> &[ReviewItem] {
        &self.items
    }

    pub fn item(&self, evaluation_id: EvaluationId) -> Option<&ReviewItem> {
        self.items
            .iter()
            .find(|item| item.evaluation_id() == evaluation_id)
    }

    pub fn set_decision(
        &mut self,
        evaluation_id: EvaluationId,
        decision: Decision,
    ) -> Result<(), ClientError> {
        self.item_mut(evaluation_id)?.decision = decision;
        Ok(())
    }

    pub fn set_comment(
        &mut self,
        evaluation_id: EvaluationId,
        comment: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.item_mut(evaluation_id)?.comment = comment.into();
        Ok(())
    }

    /// One review per item, in form order, with the finding's own suggestion
    /// forwarded as `modified_suggestion`.
    pub fn build_batch(&self) -> ReviewBatch {
        ReviewBatch {
            task_id: self.task_id.clone(),
            reviews: self.items.iter().map(ReviewItem::to_review).collect(),
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub(crate) fn mark_submitted(&mut self) {
        self.submitted = true;
    }

    fn item_mut(&mut self, evaluation_id: EvaluationId) -> Result<&mut ReviewItem, ClientError> {
        self.items
            .iter_mut()
            .find(|item| item.evaluation_id() == evaluation_id)
            .ok_or_else(|| {
                ClientError::Validation(format!(
                    "finding {evaluation_id} is not awaiting review"
                ))
            })
    }
}

#[cfg(test)]
#[path = "tests/review_tests.rs"]
mod tests;
