//! Driver layer for browser automation.
//!
//! This crate owns the WebDriver session the research agent reads pages
//! through, plus the stealth and pacing helpers that keep it looking like a
//! person at a keyboard.
//!
//! - [`browser::driver::AutofyDriver`]: WebDriver client wrapper
//! - [`browser::page::AutofyPage`]: navigation, capture, scrolling and search helpers
//! - [`browser::BrowserSession`]: the page operations the agent depends on
//! - [`browser::behavioral::BehavioralEngine`]: human-like delays
//! - [`browser::stealth`]: stealth arguments and JS evasions
pub mod browser;

pub use browser::driver::AutofyDriver;
pub use browser::page::AutofyPage;
pub use browser::BrowserSession;
