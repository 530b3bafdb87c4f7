// Advisory leases over a shared filesystem.
//
// A lease is an artifact created with an atomic create-if-absent primitive.
// Liveness is decided by artifact age against a TTL only: there is no
// heartbeat, and a crashed holder's lease becomes reclaimable once it is
// older than the TTL.

pub mod clock;
pub mod manager;
pub mod memory;
pub mod owner;
pub mod set;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{Backoff, LeaseError, LeaseManager, LeaseStatus};
pub use memory::MemoryLeaseStore;
pub use owner::OwnerRecord;
pub use set::LeaseSet;
pub use store::{FsLeaseStore, LeaseStore};
