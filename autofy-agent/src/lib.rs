//! The Autofy research workflow.
//!
//! A run walks a small graph of nodes over one browser session:
//!
//! ```text
//! Planner -> Init -> Analyze <-> Scroll
//!                       |
//!                   Aggregate -> End
//! ```
//!
//! Each `Analyze` pass captures the viewport and the page text, asks the
//! model for a summary plus a scroll/stop verdict, and hands the state to
//! [`router::route`]. Model calls are paced and wrapped in a retry policy
//! that cools down on rate limits and gives up on permission errors.
//! `Aggregate` turns the collected notes into a markdown report and appends
//! a CSV history row.
pub mod analysis;
pub mod capture;
pub mod events;
pub mod output;
pub mod pacing;
pub mod prompts;
pub mod retry;
pub mod router;
pub mod state;
pub mod workflow;

pub use events::{AgentEvent, Stage};
pub use state::{AgentState, RunOutcome, RunStatus, Status};
pub use workflow::ResearchAgent;
