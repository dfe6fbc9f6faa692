use crate::state::{AgentState, Status};
use autofy_config::AgentConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Scroll,
    Aggregate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteLimits {
    pub max_scrolls: usize,
    pub min_summaries: usize,
    pub max_passes: usize,
}

impl RouteLimits {
    pub fn from_config(agent: &AgentConfig) -> Self {
        Self {
            max_scrolls: agent.max_scrolls,
            min_summaries: agent.min_summaries,
            max_passes: agent.effective_max_passes(),
        }
    }
}

impl Default for RouteLimits {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// A routing decision plus the reason shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub route: Route,
    pub reason: &'static str,
}

impl Decision {
    fn new(route: Route, reason: &'static str) -> Self {
        Self { route, reason }
    }
}

/// Decide what follows an analyze pass. Rules apply in order.
///
/// ```
/// use autofy_agent::router::{route, Route, RouteLimits};
/// use autofy_agent::state::{AgentState, Status};
///
/// let mut state = AgentState::new("task", Some("https://example.org".into()));
/// state.summaries.push("intro".into());
/// state.status = Status::ScrollRequired;
/// assert_eq!(route(&state, &RouteLimits::default()).route, Route::Scroll);
///
/// state.status = Status::Done;
/// assert_eq!(route(&state, &RouteLimits::default()).route, Route::Aggregate);
/// ```
pub fn route(state: &AgentState, limits: &RouteLimits) -> Decision {
    if state.url.is_none() {
        return Decision::new(Route::Aggregate, "no target page");
    }
    let scrolls = state.scroll_count();
    if scrolls >= limits.max_scrolls {
        return Decision::new(Route::Aggregate, "scroll limit reached");
    }
    if state.passes >= limits.max_passes {
        return Decision::new(Route::Aggregate, "pass limit reached");
    }
    if scrolls < limits.min_summaries {
        return Decision::new(Route::Scroll, "too little content yet, forcing a scroll");
    }
    if state.status == Status::ScrollRequired {
        return Decision::new(Route::Scroll, "model asked for more content");
    }
    Decision::new(Route::Aggregate, "model decided to stop")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(summaries: usize, status: Status) -> AgentState {
        AgentState {
            task: "t".into(),
            url: Some("https://example.org".into()),
            summaries: vec!["s".into(); summaries],
            status,
            passes: summaries,
        }
    }

    #[test]
    fn missing_url_always_aggregates() {
        let mut s = state(0, Status::ScrollRequired);
        s.url = None;
        assert_eq!(route(&s, &RouteLimits::default()).route, Route::Aggregate);
    }

    #[test]
    fn scroll_limit_beats_model_verdict() {
        let s = state(7, Status::ScrollRequired);
        let d = route(&s, &RouteLimits::default());
        assert_eq!(d.route, Route::Aggregate);
        assert_eq!(d.reason, "scroll limit reached");
    }

    #[test]
    fn forces_a_scroll_before_the_first_summary() {
        let mut s = state(0, Status::Done);
        s.passes = 1;
        assert_eq!(route(&s, &RouteLimits::default()).route, Route::Scroll);
    }

    #[test]
    fn failing_captures_stop_at_pass_limit() {
        let mut s = state(0, Status::Done);
        s.passes = 14;
        let d = route(&s, &RouteLimits::default());
        assert_eq!(d.route, Route::Aggregate);
        assert_eq!(d.reason, "pass limit reached");
    }

    #[test]
    fn follows_the_model_once_minimum_is_met() {
        let limits = RouteLimits {
            max_scrolls: 7,
            min_summaries: 2,
            max_passes: 14,
        };
        assert_eq!(route(&state(1, Status::Done), &limits).route, Route::Scroll);
        assert_eq!(route(&state(2, Status::Done), &limits).route, Route::Aggregate);
        assert_eq!(route(&state(2, Status::ScrollRequired), &limits).route, Route::Scroll);
    }
}
