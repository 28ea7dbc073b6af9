//! skillfeed/crates/sf-engine/src/lib.rs
//!
//! The client-side interaction engine: the local entity store, optimistic
//! and confirmed mutations, feed composition and membership probing, plus
//! the view controllers a renderer drives.

pub mod composer;
pub mod directory;
pub mod feed;
pub mod inflight;
pub mod mutator;
pub mod probe;
pub mod store;

pub use composer::{compose, filter, related_progress, FeedQuery};
pub use directory::CommunityDirectory;
pub use feed::{Feed, FeedState};
pub use mutator::{MutationOutcome, OptimisticMutator};
pub use probe::{CardState, MembershipCard, MembershipProbe, MembershipSource, ScopeToken, ViewScope};
pub use store::{EntityStore, Patch, Snapshot};
