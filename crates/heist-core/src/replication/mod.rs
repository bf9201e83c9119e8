//! Replicated properties and change detection.
//!
//! The authority is the single writer of each entity's properties. Writes are
//! recorded as ordered [`PropertyUpdate`]s, carried to observers by a
//! [`ReplicationLink`], and applied to each observer's own [`PropertyStore`].
//! Observers never share memory with the authority; they learn about writes
//! only by comparing their store against a [`ChangeDetector`] snapshot once per
//! reconcile pass.

mod detector;
mod link;
mod store;
mod value;

pub use detector::{Change, ChangeDetector, ChangeSet, ObserverId};
pub use link::ReplicationLink;
pub use store::{EntitySnapshot, PropertyStore, PropertyUpdate, StoreSnapshot};
pub use value::{keys, PropKey, Value};
