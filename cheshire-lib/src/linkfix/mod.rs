//! Link fixing: swaps Twitter/X/Reddit links for embed proxies and re-uploads
//! Instagram/Facebook media, then reposts as the author and removes the
//! original.

pub mod classify;
pub mod gate;
mod handler;
pub mod media;
pub mod pipeline;
pub mod repost;
pub mod rewrite;
pub mod scan;
pub mod webhook;

pub use handler::fix_links;
