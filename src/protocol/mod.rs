//! Wire-level protocol: typed frame envelopes, the audio payload codec and
//! the data model shared with the provider's REST surface.

pub mod codec;
pub mod frames;
pub mod models;
