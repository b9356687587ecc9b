use super::*;
use shared::protocol::Difference;

fn evaluation(id: i64, risk_level: RiskLevel) -> Evaluation {
    Evaluation {
        id: EvaluationId(id),
        risk_level,
        explanation: format!("explanation {id}"),
        suggestion: format!("suggestion {id}"),
        difference: Difference {
            original_section: Some(format!("original {id}")),
            modified_section: Some(format!("modified {id}")),
            similarity: None,
            change_type: None,
        },
        matched_rule: None,
    }
}

fn view(task_id: &str, evaluations: Vec<Evaluation>) -> ViewContext {
    ViewContext::for_task(TaskId::new(task_id)).with_evaluations(evaluations)
}

#[test]
fn form_contains_only_yellow_and_red_findings_in_order() {
    let form = ReviewForm::from_context(&view(
        "T",
        vec![
            evaluation(3, RiskLevel::Red),
            evaluation(1, RiskLevel::Green),
            evaluation(2, RiskLevel::Yellow),
        ],
    ))
    .expect("form");

    let ids: Vec<EvaluationId> = form.items().iter().map(ReviewItem::evaluation_id).collect();
    assert_eq!(ids, vec![EvaluationId(3), EvaluationId(2)]);
    assert!(form
        .items()
        .iter()
        .all(|item| item.decision() == Decision::Approve));
}

#[test]
fn batch_preserves_order_and_reflects_decisions() {
    let mut form = ReviewForm::from_context(&view(
        "T",
        vec![
            evaluation(1, RiskLevel::Green),
            evaluation(2, RiskLevel::Yellow),
            evaluation(3, RiskLevel::Red),
        ],
    ))
    .expect("form");

    form.set_decision(EvaluationId(3), Decision::Reject)
        .expect("reject item 3");
    form.set_comment(EvaluationId(3), "penalty clause too high")
        .expect("comment item 3");

    assert_eq!(
        form.build_batch(),
        ReviewBatch {
            task_id: TaskId::new("T"),
            reviews: vec![
                Review {
                    evaluation_id: EvaluationId(2),
                    approved: true,
                    modified_suggestion: "suggestion 2".to_string(),
                    comment: String::new(),
                },
                Review {
                    evaluation_id: EvaluationId(3),
                    approved: false,
                    modified_suggestion: "suggestion 3".to_string(),
                    comment: "penalty clause too high".to_string(),
                },
            ],
        }
    );
}

#[test]
fn no_form_without_attention_findings() {
    assert!(ReviewForm::from_context(&view("T", Vec::new())).is_none());
    assert!(ReviewForm::from_context(&view(
        "T",
        vec![evaluation(1, RiskLevel::Green), evaluation(2, RiskLevel::Green)]
    ))
    .is_none());
}

#[test]
fn no_form_without_task_id() {
    let view = ViewContext::from_location("/compare").with_evaluations(vec![evaluation(
        2,
        RiskLevel::Red,
    )]);
    assert!(ReviewForm::from_context(&view).is_none());
}

#[test]
fn decisions_for_findings_outside_the_form_are_rejected() {
    let mut form = ReviewForm::from_context(&view(
        "T",
        vec![evaluation(1, RiskLevel::Green), evaluation(2, RiskLevel::Red)],
    ))
    .expect("form");

    let err = form
        .set_decision(EvaluationId(1), Decision::Reject)
        .expect_err("green finding is not on the form");
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(form.build_batch().reviews.len(), 1);
    assert!(form.build_batch().reviews[0].approved);
}

#[test]
fn excerpts_truncate_to_one_hundred_characters() {
    let mut long = evaluation(5, RiskLevel::Yellow);
    long.difference.original_section = Some("甲".repeat(150));
    long.difference.modified_section = None;

    let form = ReviewForm::from_context(&view("T", vec![long])).expect("form");
    let item = &form.items()[0];

    let original = item.original_excerpt().expect("original excerpt");
    assert_eq!(original, format!("{}...", "甲".repeat(100)));
    assert_eq!(item.modified_excerpt(), None);
    assert_eq!(item.badge(), "needs confirmation");
}

#[test]
fn short_sections_still_carry_the_continuation_marker() {
    let form = ReviewForm::from_context(&view("T", vec![evaluation(7, RiskLevel::Red)]))
        .expect("form");
    let item = form.item(EvaluationId(7)).expect("item");
    assert_eq!(item.original_excerpt().as_deref(), Some("original 7..."));
    assert_eq!(item.badge(), "red risk");
}

#[test]
fn badges_follow_the_risk_tier() {
    assert_eq!(risk_badge(RiskLevel::Red), "red risk");
    assert_eq!(risk_badge(RiskLevel::Yellow), "needs confirmation");
    assert_eq!(risk_badge(RiskLevel::Green), "no action");

    let form = ReviewForm::from_context(&view(
        "T",
        vec![evaluation(1, RiskLevel::Green), evaluation(2, RiskLevel::Yellow)],
    ))
    .expect("form");
    let badges: Vec<_> = form.items().iter().map(ReviewItem::badge).collect();
    assert_eq!(badges, vec!["needs confirmation"]);
}
