//! Navigable view state.
//!
//! The review step can be opened directly from a result link, so the task id
//! travels in the link's query string instead of in client memory.

use shared::{domain::TaskId, protocol::Evaluation};
use url::{form_urlencoded, Url};

const RESULT_PATH: &str = "/compare";
const TASK_ID_PARAM: &str = "task_id";

pub fn result_link(task_id: &TaskId) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(TASK_ID_PARAM, task_id.as_str())
        .finish();
    format!("{RESULT_PATH}?{query}")
}

/// Task correlation state for one view: the task id recovered from the
/// location plus the findings the view was rendered with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewContext {
    task_id: Option<TaskId>,
    evaluations: Vec<Evaluation>,
}

impl ViewContext {
    pub fn for_task(task_id: TaskId) -> Self {
        Self {
            task_id: Some(task_id),
            evaluations: Vec::new(),
        }
    }

    /// Reads `task_id` from an absolute url or a relative link such as
    /// `/compare?task_id=abc`. Anything unparsable yields no task id.
    pub fn from_location(location: &str) -> Self {
        let task_id = parse_location(location).and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == TASK_ID_PARAM)
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(TaskId)
        });
        Self {
            task_id,
            evaluations: Vec::new(),
        }
    }

    pub fn with_evaluations(&self, evaluations: Vec<Evaluation>) -> Self {
        Self {
            task_id: self.task_id.clone(),
            evaluations,
        }
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        self.task_id.as_ref()
    }

    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }
}

fn parse_location(location: &str) -> Option<Url> {
    let location = location.trim();
    if let Ok(url) = Url::parse(location) {
        return Some(url);
    }
    let base = Url::parse("http://localhost/").ok()?;
    base.join(location).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_task_id_from_relative_and_absolute_locations() {
        let relative = ViewContext::from_location("/compare?task_id=abc");
        assert_eq!(relative.task_id(), Some(&TaskId::new("abc")));

        let absolute =
            ViewContext::from_location("https://review.example/compare?lang=en&task_id=t-42");
        assert_eq!(absolute.task_id(), Some(&TaskId::new("t-42")));
    }

    #[test]
    fn missing_or_blank_task_id_is_none() {
        assert_eq!(ViewContext::from_location("/compare").task_id(), None);
        assert_eq!(ViewContext::from_location("/compare?task_id=").task_id(), None);
        assert_eq!(ViewContext::from_location("").task_id(), None);
    }

    #[test]
    fn result_link_round_trips_through_location() {
        let task_id = TaskId::new("a b&c");
        let link = result_link(&task_id);
        assert_eq!(link, "/compare?task_id=a+b%26c");
        assert_eq!(ViewContext::from_location(&link).task_id(), Some(&task_id));
    }
}
