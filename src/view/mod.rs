//! View Composer.
//!
//! [`compose`] is the pure function from store state to rows and bars;
//! [`ViewWatcher`] re-runs it on every store change.

pub mod composer;
pub mod watcher;

pub use composer::{compose, css_class, EventBar, ResourceRow, TimelineView, ViewSettings};
pub use watcher::ViewWatcher;
