//! teemaster-services — registry state and the operations that act on it.
//!
//! Everything here is transport-agnostic: the HTTP layer in teemaster-api
//! turns requests into calls on `Registrar`, `HeartbeatEngine` and
//! `Federation`, and maps `MasterError` onto status codes.

pub mod cache;
pub mod error;
pub mod federation;
pub mod heartbeat;
pub mod publisher;
pub mod reachability;
pub mod registration;
pub mod registry;

pub use cache::{MemoryCache, RedisCache, SharedCache};
pub use error::{CacheError, MasterError};
pub use federation::{refresh_loop, Federation, PeerView};
pub use heartbeat::{HeartbeatEngine, HeartbeatPolicy};
pub use publisher::{publish_loop, Publisher};
pub use reachability::ReachabilityChecker;
pub use registration::{Registrar, Registration};
pub use registry::{reap_loop, Registry};
