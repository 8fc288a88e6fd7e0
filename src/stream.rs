//! Snapshot stream: observe one session as a `Stream`.
//!
//! [`crate::SessionController::subscribe`] hands out a raw
//! `watch::Receiver`, which never ends and mixes sessions. The stream built
//! here follows exactly one session and finishes after its terminal
//! snapshot, which is what a progress display or a `while let` loop wants.
//!
//! Like any `watch` consumer it sees the latest value, not every value: two
//! transitions published back to back may be observed as one.

use crate::session::{SessionId, SessionSnapshot};
use futures::future;
use futures::stream::StreamExt;
use std::pin::Pin;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// A boxed stream of session snapshots.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = SessionSnapshot> + Send>>;

/// Follow a session through `rx`.
///
/// The stream pins itself to the first non-idle session it sees; idle
/// snapshots before that are skipped. It ends after yielding that session's
/// terminal snapshot, when another session replaces it, on teardown, or
/// when the controller is dropped.
pub fn snapshot_stream(rx: watch::Receiver<SessionSnapshot>) -> SnapshotStream {
    let follow = Follow::default();
    WatchStream::new(rx)
        .scan(follow, |follow, snap| future::ready(follow.step(snap)))
        .filter_map(future::ready)
        .boxed()
}

#[derive(Debug, Default)]
struct Follow {
    session: Option<SessionId>,
    done: bool,
}

impl Follow {
    /// `None` ends the stream, `Some(None)` skips the snapshot.
    fn step(&mut self, snap: SessionSnapshot) -> Option<Option<SessionSnapshot>> {
        if self.done {
            return None;
        }
        match self.session {
            None if snap.session == SessionId::IDLE => return Some(None),
            None => self.session = Some(snap.session),
            Some(id) if id != snap.session => return None,
            Some(_) => {}
        }
        self.done = snap.phase.is_terminal();
        Some(Some(snap))
    }
}
