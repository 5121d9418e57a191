//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming proxy call:
//!     → blacklist.rs (is the source banned?)
//!     → secret.rs (constant-time secret check)
//!         └─ on failure: failures.rs (count, maybe append to blacklist.rs)
//!     → target.rs (destination host policy)
//!     → headers.rs (strip hop-by-hop headers)
//!     → Pass to forwarding
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input
//! - Blacklisting is permanent until the file is edited by hand

pub mod blacklist;
pub mod failures;
pub mod headers;
pub mod secret;
pub mod target;

pub use blacklist::{BlacklistError, BlacklistStore};
pub use failures::FailureTracker;
pub use secret::{SecretVerifier, SECRET_HEADER, SECRET_LEN};
pub use target::TargetValidator;
