//! SWIM Failure Detection
//!
//! Each process keeps a membership list and probes one random member per
//! cycle. A member that misses its direct ACK is suspected and probed again
//! through helpers; if no helper can reach it, it is removed and every other
//! member is told with a FAIL message.
//!
//! ```text
//!   scheduler ──PING──────────────────▶ target
//!       │ timeout
//!       └──PING_REQ──▶ helpers ──PING──▶ target
//!       ◀──relayed ACK── helpers ◀─ACK──┘
//!       │ deadline
//!       └──FAIL──▶ every other member
//! ```
pub mod addressing;
mod context;
pub mod detector;
pub mod disseminator;
pub mod dispatcher;
pub mod handlers;
pub mod indirect;
pub mod membership;
pub mod messages;
pub mod process_id;
pub mod prober;
pub mod scheduler;
pub mod stats;

pub use context::SwimContext;
pub use detector::{Detector, DetectorHandle};
pub use indirect::IndirectOutcome;
pub use membership::{Membership, MembershipEntry, Status};
pub use messages::{Message, MessageKind};
pub use process_id::ProcessId;
pub use prober::DirectOutcome;
pub use scheduler::CycleOutcome;
pub use stats::{DetectorStats, FrozenDetectorStats};
