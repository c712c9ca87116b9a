pub mod events;
pub mod frames;

pub use frames::{ClientEvent, FrameError, InboundFrame, ServerEvent};
