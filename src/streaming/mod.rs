//! Streaming adapter.
//!
//! Normalizes upstream chat replies into server-sent events so streaming
//! clients can consume every outcome the same way.

pub mod adapter;
pub mod frame;

pub use adapter::{adapt, plan, synthesize, Plan, UpstreamReply};
pub use frame::{encode_stream, StreamFrame, DONE, EVENT_STREAM};
