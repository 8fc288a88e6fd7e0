//! Conversion session: submission, status polling and the cosmetic
//! countdown for one job at a time.
//!
//! ## State machine
//!
//! ```text
//! idle ──submit──▶ submitting ──ok──▶ processing ◀──▶ creating-audio ──▶ completed
//!                      │                   │                │
//!                      └──err──▶ failed ◀──┴──poll err──────┘
//! ```
//!
//! `completed` and `failed` are terminal. Only a new `submit()` leaves them,
//! and it starts an unrelated session.
//!
//! 1. [`phase`]: phase names, exact mapping of service status strings
//! 2. [`countdown`]: the advisory countdown value
//! 3. [`state`]: pure transitions, no timers or I/O
//! 4. [`controller`]: tokio timers, stale-result discard, teardown

pub mod controller;
pub mod countdown;
pub mod phase;
pub mod state;

pub use controller::SessionController;
pub use countdown::Countdown;
pub use phase::Phase;
pub use state::{ConversionJob, SessionId, SessionSnapshot, StatusEffect};
