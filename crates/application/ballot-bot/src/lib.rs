//! # Ballot Bot
//!
//! Poll lifecycle on top of the core model: creation, voting, expiry and
//! closure, wired to whatever chat surface and permission source the host
//! provides.
//!
//! ```text
//!  Interaction ──► intake::dispatch ──► LifecycleController
//!                                          │   │   │
//!                        PollRegistry ◄────┘   │   └────► RenderSurface
//!              (per-poll lock + push gate)     │        (publish / update)
//!                                              ▼
//!                                       ExpiryScheduler
//!                                   (one timer per timed poll)
//! ```

pub mod access;
pub mod controller;
pub mod intake;
pub mod surface;

pub use access::{AccessPolicy, AdminList, DenyAll};
pub use controller::{EndOutcome, LifecycleController, PollCreated, VoteReceipt};
pub use intake::{dispatch, Interaction, Response};
pub use surface::{MemorySurface, NullSurface, RenderSurface, SurfaceError, SurfaceEvent};
