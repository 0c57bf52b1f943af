//! Client side of the translation pipeline.
//!
//! A [`Coalescer`] answers lookups synchronously from its per-locale cache and
//! batches misses into debounced requests sent through a [`TranslationTransport`].

mod coalescer;
mod transport;

pub use coalescer::{Coalescer, CoalescerConfig, DEFAULT_DEBOUNCE};
pub use transport::{HttpTransport, TranslationTransport, TransportError, TransportReply};
