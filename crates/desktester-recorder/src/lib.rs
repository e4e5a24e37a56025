//! desktester-recorder - turns human input into replayable test steps
//!
//! Pipeline: an [`EventListener`] hooks OS input, the [`ElementResolver`]
//! maps each pointer event to the element under it and its best locator,
//! [`EventToStep`] produces a step, and the optimizer cleans the recording
//! up when the [`RecordingSession`] stops.
//!
//! ## Platform Support
//!
//! - **macOS**: listen-only CGEventTap (needs Input Monitoring access)
//! - **Windows**: low-level mouse and keyboard hooks
//! - **Linux**: no hooks; drive a session through [`ChannelListener`]

pub mod convert;
pub mod events;
pub mod listener;
pub mod optimizer;
pub mod platform;
pub mod resolver;
pub mod session;

pub use convert::EventToStep;
pub use events::{RawEvent, RawEventKind};
pub use listener::{ChannelListener, Dispatcher, EventListener, EventSink, Subscription};
pub use optimizer::optimize;
pub use resolver::{best_locator, ElementResolver};
pub use session::RecordingSession;

pub mod prelude {
    pub use crate::events::{RawEvent, RawEventKind};
    pub use crate::listener::{ChannelListener, EventListener, Subscription};
    pub use crate::session::RecordingSession;
}
