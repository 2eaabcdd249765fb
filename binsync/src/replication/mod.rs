pub mod apply;
pub mod buffer;
pub mod client;
pub mod preflight;
pub mod snapshot;
pub mod source;
