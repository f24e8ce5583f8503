//! Markup-safe chunked delivery engine.
//!
//! Takes an arbitrarily long, lightly marked-up message and turns it into a
//! sequence of transport-legal chunks — each within the transport's length
//! limit and independently well-formed — then delivers them in order with
//! per-chunk failure handling.
//!
//! Data flows one way: raw message → [`sanitize`] → [`segment`] →
//! [`deliver`]. The stages are independent; hosts that bring their own
//! sanitization or transport can call any subset.

pub mod delivery;
pub mod markup;
pub mod sanitize;
pub mod segment;

pub use delivery::{ChunkOutcome, ChunkSender, DeliveryReport, SendOutcome, deliver};
pub use markup::{MarkupOptions, TagToken, closing_sequence, open_tags, reopen_sequence};
pub use sanitize::{escape_html, sanitize};
pub use segment::{Chunk, DEFAULT_MAX_LENGTH, SegmentOptions, segment};
