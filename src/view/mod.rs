//! Views of the timer
//!
//! Zero or more transient surfaces mirror the authority's state and send it
//! commands. They connect through an [`AuthorityLink`], in-process or over
//! HTTP.

pub mod http_link;
pub mod link;
pub mod view_sync;

pub use http_link::HttpLink;
pub use link::{AuthorityLink, InProcessLink};
pub use view_sync::{SyncMode, ViewSync};
