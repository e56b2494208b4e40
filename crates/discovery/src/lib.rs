//! Leader discovery for active/standby backend clusters.
//!
//! A [`watcher::CoordinationWatcher`] keeps a watched read on a single
//! coordination-service path and turns every wake-up into a
//! [`state::StateEvent`]. The [`state::StateOwner`] task is the only writer
//! of the availability state and the resolved backend address; request
//! handlers read consistent snapshots through a [`state::StateReader`].

pub mod coordinator;
pub mod error;
pub mod leader_info;
pub mod memory;
pub mod session;
pub mod state;
pub mod watcher;
pub mod zookeeper;

pub use coordinator::{Coordinator, Watch, WatchEvent, WatchedRead};
pub use error::ResolutionError;
pub use session::ReconnectingCoordinator;
pub use state::{AvailabilityState, BackendAddress, Snapshot, StateReader};
