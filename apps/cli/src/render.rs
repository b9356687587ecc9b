use client_core::{risk_badge, Decision, ResultView, ReviewForm, ReviewItem, StatusBadge};
use shared::domain::RiskLevel;

pub fn render_badge(badge: &StatusBadge) -> String {
    let mut line = format!(
        "[{}] {}: {}",
        badge.observed_at.format("%H:%M:%S"),
        badge.task_id,
        badge.label
    );
    if let Some(message) = &badge.message {
        line.push_str(&format!(" ({message})"));
    }
    if let Some(link) = &badge.result_link {
        line.push_str(&format!("\n  result: {link}"));
    }
    line
}

pub fn render_result(view: &ResultView) -> String {
    let mut lines = vec![
        format!("status: {}", view.status_label),
        format!(
            "findings: {} total, {} red, {} yellow, {} green",
            view.counts.total(),
            view.counts.red,
            view.counts.yellow,
            view.counts.green
        ),
    ];
    for (risk_level, count) in [
        (RiskLevel::Red, view.counts.red),
        (RiskLevel::Yellow, view.counts.yellow),
        (RiskLevel::Green, view.counts.green),
    ] {
        if count > 0 {
            lines.push(format!("  {}: {count}", risk_badge(risk_level)));
        }
    }
    if view.reviewed > 0 {
        lines.push(format!("already reviewed: {}", view.reviewed));
    }
    if let Some(report) = &view.final_report {
        lines.push(String::new());
        lines.push(report.trim_end().to_string());
    }
    if let Some(form) = &view.review_form {
        lines.push(String::new());
        lines.push(render_form(form));
    }
    lines.join("\n")
}

pub fn render_form(form: &ReviewForm) -> String {
    let mut lines = vec![format!(
        "{} finding(s) awaiting review for task {}",
        form.items().len(),
        form.task_id()
    )];
    for item in form.items() {
        lines.push(String::new());
        render_item(item, &mut lines);
    }
    lines.join("\n")
}

fn render_item(item: &ReviewItem, lines: &mut Vec<String>) {
    let mut header = format!("#{} [{}]", item.evaluation_id(), item.badge());
    if let Some(change) = item.change_type() {
        header.push_str(&format!(" {change}"));
    }
    lines.push(header);
    lines.push(format!("  why: {}", item.explanation()));
    if let Some(original) = item.original_excerpt() {
        lines.push(format!("  original: {original}"));
    }
    if let Some(modified) = item.modified_excerpt() {
        lines.push(format!("  modified: {modified}"));
    }
    if !item.suggestion().is_empty() {
        lines.push(format!("  suggestion: {}", item.suggestion()));
    }

    let decision = match item.decision() {
        Decision::Approve => "approve",
        Decision::Reject => "reject",
    };
    if item.comment().is_empty() {
        lines.push(format!("  decision: {decision}"));
    } else {
        lines.push(format!("  decision: {decision} ({})", item.comment()));
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
