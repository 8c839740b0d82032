// SPDX-License-Identifier: MIT
//
// Render thread: the only writer to the output sink.
//
// Producers never touch the terminal. They build a Snapshot and hand it to a
// RenderHandle, which drops it into a single-slot mailbox:
//
//   submit ──▶ [ pending: Option<Snapshot> ] ──▶ render thread ──▶ sink
//                     latest wins                 diff, encode,
//                                                 write, commit
//
// The slot holds at most one snapshot. A submission while a frame is being
// written just replaces whatever is pending, so a slow terminal sees fewer,
// newer frames instead of a growing queue. Every diff runs against the full
// last committed screen, so skipped frames never leave stale cells behind.
//
// Frames start at most once per `min_frame_interval`. Submissions that arrive
// in between keep coalescing in the slot.
//
// A failed write stops the thread from drawing: the terminal is in an unknown
// state and retrying would only scribble more. It reports once, sits in
// `Failed`, and waits for `reset()`, which forces a full repaint.

use std::io::Write;
use std::mem;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::render::{RenderStats, Renderer};
use crate::snapshot::Snapshot;

// ─── Public types ────────────────────────────────────────────────────────────

/// What the render thread is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Waiting for a snapshot.
    Idle,
    /// Computing the update plan.
    Diffing,
    /// Turning the plan into bytes.
    Encoding,
    /// Inside the sink write.
    Writing,
    /// A write failed. Nothing is drawn until `reset()`.
    Failed,
    /// The thread has exited.
    Stopped,
}

/// Outcome of a render cycle, sent on the report channel.
#[derive(Debug)]
pub enum Report {
    /// A frame was written and is now the committed screen.
    Committed {
        /// Sequence number of the committed snapshot.
        seq: u64,
        /// Frame statistics.
        stats: RenderStats,
    },
    /// The snapshot could not be drawn. The committed screen is unchanged.
    Rejected {
        /// Sequence number of the rejected snapshot.
        seq: u64,
        /// Why it was rejected.
        error: Error,
    },
    /// Writing to the sink failed. Sent once; the thread is now `Failed`.
    Failed(Error),
}

// ─── Mailbox ─────────────────────────────────────────────────────────────────

struct Mailbox {
    pending: Option<Snapshot>,
    /// Newest sequence number accepted, pending or committed.
    latest: Option<u64>,
    last_committed: Option<u64>,
    /// Declared terminal size; `None` accepts any size.
    size: Option<(u16, u16)>,
    /// Next frame takes the repaint path.
    force: bool,
    /// Repaint the committed snapshot if nothing newer is pending.
    redraw: bool,
    /// Forget what the terminal shows before the next frame.
    invalidate: bool,
    shutdown: bool,
    state: RenderState,
}

struct Shared {
    mailbox: Mutex<Mailbox>,
    /// Wakes the render thread.
    work: Condvar,
    /// Signals state changes (for `shutdown`).
    changed: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            mailbox: Mutex::new(Mailbox {
                pending: None,
                latest: None,
                last_committed: None,
                size: None,
                force: false,
                redraw: false,
                invalidate: false,
                shutdown: false,
                state: RenderState::Idle,
            }),
            work: Condvar::new(),
            changed: Condvar::new(),
        }
    }

    /// Lock the mailbox. A producer that panicked mid-submit cannot leave it
    /// half-updated, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Mailbox> {
        self.mailbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: RenderState) {
        self.lock().state = state;
        self.changed.notify_all();
    }

    fn request_shutdown(&self) {
        self.lock().shutdown = true;
        self.work.notify_all();
    }
}

// ─── RenderHandle ────────────────────────────────────────────────────────────

/// Producer side of the render thread. Cheap to clone, safe to share.
#[derive(Clone)]
pub struct RenderHandle {
    shared: Arc<Shared>,
}

impl RenderHandle {
    /// Offer a snapshot for drawing. Never blocks on the terminal.
    ///
    /// Replaces any snapshot still pending.
    ///
    /// # Errors
    ///
    /// - [`Error::StaleSnapshot`] if `snapshot.seq()` is not newer than the
    ///   last committed or pending one. Nothing changes.
    /// - [`Error::DimensionMismatch`] if it does not match the size declared
    ///   with [`resize`](Self::resize).
    /// - [`Error::ShutDown`] after shutdown, [`Error::Failed`] while failed.
    pub fn submit(&self, snapshot: Snapshot) -> Result<()> {
        let seq = snapshot.seq();
        let mut m = self.shared.lock();

        if m.shutdown || m.state == RenderState::Stopped {
            return Err(Error::ShutDown);
        }
        if m.state == RenderState::Failed {
            return Err(Error::Failed);
        }
        if let Some(latest) = m.latest {
            if seq <= latest {
                debug!(seq, latest, "stale snapshot dropped");
                return Err(Error::StaleSnapshot { seq, latest });
            }
        }
        if let Some(expected) = m.size {
            if snapshot.size() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: snapshot.size(),
                });
            }
        }

        if let Some(dropped) = m.pending.replace(snapshot) {
            debug!(dropped = dropped.seq(), seq, "coalesced pending snapshot");
        }
        m.latest = Some(seq);
        drop(m);
        self.shared.work.notify_one();
        Ok(())
    }

    /// Take the full repaint path next. With nothing pending, the committed
    /// snapshot is drawn again.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after shutdown.
    pub fn force_repaint(&self) -> Result<()> {
        let mut m = self.shared.lock();
        if m.shutdown {
            return Err(Error::ShutDown);
        }
        m.force = true;
        m.redraw = true;
        drop(m);
        self.shared.work.notify_one();
        Ok(())
    }

    /// Declare a new terminal size.
    ///
    /// A pending snapshot of another size is dropped, later submissions must
    /// match, and the next frame repaints.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after shutdown.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        let mut m = self.shared.lock();
        if m.shutdown {
            return Err(Error::ShutDown);
        }
        m.size = Some((rows, cols));
        if m.pending.as_ref().is_some_and(|s| s.size() != (rows, cols)) {
            if let Some(dropped) = m.pending.take() {
                debug!(seq = dropped.seq(), rows, cols, "pending snapshot dropped by resize");
            }
        }
        m.force = true;
        drop(m);
        self.shared.work.notify_one();
        Ok(())
    }

    /// Leave `Failed`: forget the terminal state and repaint.
    ///
    /// # Errors
    ///
    /// [`Error::ShutDown`] after shutdown.
    pub fn reset(&self) -> Result<()> {
        let mut m = self.shared.lock();
        if m.shutdown {
            return Err(Error::ShutDown);
        }
        if m.state == RenderState::Failed {
            m.state = RenderState::Idle;
        }
        m.invalidate = true;
        m.force = true;
        m.redraw = true;
        drop(m);
        self.shared.work.notify_one();
        self.shared.changed.notify_all();
        Ok(())
    }

    /// Current state of the render thread.
    #[must_use]
    pub fn state(&self) -> RenderState {
        self.shared.lock().state
    }

    /// Sequence number of the last frame written to the sink.
    #[must_use]
    pub fn last_committed(&self) -> Option<u64> {
        self.shared.lock().last_committed
    }
}

impl std::fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = self.shared.lock();
        f.debug_struct("RenderHandle")
            .field("state", &m.state)
            .field("pending", &m.pending.as_ref().map(Snapshot::seq))
            .field("last_committed", &m.last_committed)
            .finish_non_exhaustive()
    }
}

// ─── RenderThread ────────────────────────────────────────────────────────────

/// Owns the render thread and, through it, the output sink.
///
/// Dropping it asks the thread to stop without waiting. Call
/// [`shutdown`](Self::shutdown) to flush the last frame and get the sink back.
///
/// # Example
///
/// ```
/// use ttx_render::config::RenderConfig;
/// use ttx_render::snapshot::Snapshot;
/// use ttx_render::thread::{RenderThread, Report};
///
/// let (thread, reports) = RenderThread::spawn(Vec::new(), RenderConfig::default()).unwrap();
/// let handle = thread.handle();
///
/// handle.submit(Snapshot::blank(1, 24, 80)).unwrap();
/// assert!(matches!(reports.recv().unwrap(), Report::Committed { seq: 1, .. }));
///
/// let bytes = thread.shutdown().unwrap();
/// assert!(!bytes.is_empty());
/// ```
pub struct RenderThread<W> {
    shared: Arc<Shared>,
    /// `None` once `shutdown` has taken it.
    handle: Option<JoinHandle<W>>,
    shutdown_timeout: Duration,
}

impl<W: Write + Send + 'static> RenderThread<W> {
    /// Start the render thread writing to `sink`.
    ///
    /// Returns the thread and the receiving end of its report channel.
    /// Dropping the receiver is fine; reports are then discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the OS refuses to spawn a thread.
    pub fn spawn(sink: W, config: RenderConfig) -> Result<(Self, Receiver<Report>)> {
        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared::new());
        let worker = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name("ttx-render".into())
            .spawn(move || {
                let span = tracing::info_span!("render");
                let _enter = span.enter();
                render_loop(&worker, sink, &config, &tx)
            })?;

        Ok((
            Self {
                shared,
                handle: Some(handle),
                shutdown_timeout: config.shutdown_timeout(),
            },
            rx,
        ))
    }

    /// A new producer handle.
    #[must_use]
    pub fn handle(&self) -> RenderHandle {
        RenderHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stop accepting snapshots, flush the pending one, and return the sink.
    ///
    /// A write in progress is never interrupted.
    ///
    /// # Errors
    ///
    /// - [`Error::ShutdownTimeout`] if the thread is still busy after the
    ///   configured timeout. It is left to finish on its own.
    /// - [`Error::Failed`] if the thread panicked.
    pub fn shutdown(mut self) -> Result<W> {
        self.shared.request_shutdown();
        let Some(handle) = self.handle.take() else {
            return Err(Error::ShutDown);
        };

        let deadline = Instant::now() + self.shutdown_timeout;
        let mut m = self.shared.lock();
        while m.state != RenderState::Stopped && !handle.is_finished() {
            let now = Instant::now();
            if now >= deadline {
                warn!(state = ?m.state, "render thread did not stop in time");
                return Err(Error::ShutdownTimeout);
            }
            m = self
                .shared
                .changed
                .wait_timeout(m, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(m);

        handle.join().map_err(|_| Error::Failed)
    }
}

impl<W> Drop for RenderThread<W> {
    fn drop(&mut self) {
        self.shared.request_shutdown();
    }
}

impl<W> std::fmt::Debug for RenderThread<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderThread")
            .field("state", &self.shared.lock().state)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

// ─── Render loop ─────────────────────────────────────────────────────────────

/// Next thing for the render thread to do.
enum Work {
    Draw { snapshot: Snapshot, force: bool },
    Stop,
}

#[allow(clippy::needless_pass_by_value)] // The sink is handed back on exit.
fn render_loop<W: Write>(
    shared: &Shared,
    mut sink: W,
    config: &RenderConfig,
    reports: &Sender<Report>,
) -> W {
    let mut renderer = Renderer::new(config.capabilities);
    let interval = config.min_frame_interval();
    let mut last_start: Option<Instant> = None;

    debug!(?interval, caps = ?config.capabilities, "render thread started");

    loop {
        let (snapshot, force) = match next_work(shared, &mut renderer, last_start, interval) {
            Work::Draw { snapshot, force } => (snapshot, force),
            Work::Stop => break,
        };
        let seq = snapshot.seq();

        let frame = match renderer.plan(&snapshot, force).and_then(|plan| {
            shared.set_state(RenderState::Encoding);
            renderer.encode(&snapshot, &plan)
        }) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(seq, %error, "snapshot rejected");
                shared.set_state(RenderState::Idle);
                let _ = reports.send(Report::Rejected { seq, error });
                continue;
            }
        };

        shared.set_state(RenderState::Writing);
        last_start = Some(Instant::now());

        match renderer.flush_to(&mut sink) {
            Ok(()) => {
                let stats = frame.stats();
                renderer.commit(frame);
                {
                    let mut m = shared.lock();
                    m.last_committed = Some(seq);
                    m.state = RenderState::Idle;
                }
                shared.changed.notify_all();
                trace!(
                    seq,
                    bytes = stats.bytes_written,
                    cells = stats.cells_rendered,
                    skipped = stats.cells_skipped,
                    repaint = stats.repaint,
                    "frame committed"
                );
                let _ = reports.send(Report::Committed { seq, stats });
            }
            Err(error) => {
                error!(seq, %error, "output write failed, halting until reset");
                renderer.invalidate();
                shared.set_state(RenderState::Failed);
                let _ = reports.send(Report::Failed(error));
            }
        }
    }

    debug!(last_committed = ?renderer.committed().map(Snapshot::seq), "render thread stopped");
    sink
}

/// Block until there is a frame to draw (and pacing allows it) or the thread
/// should stop. Marks the state `Diffing` before returning a frame.
fn next_work(
    shared: &Shared,
    renderer: &mut Renderer,
    last_start: Option<Instant>,
    interval: Duration,
) -> Work {
    let mut m = shared.lock();
    loop {
        if mem::take(&mut m.invalidate) {
            renderer.invalidate();
        }

        // A redraw only makes sense if the committed screen still fits.
        if m.redraw {
            let size = m.size;
            let fits = renderer
                .committed()
                .is_some_and(|s| size.is_none_or(|size| size == s.size()));
            if !fits && m.pending.is_none() {
                m.redraw = false;
            }
        }

        let ready = m.state != RenderState::Failed && (m.pending.is_some() || m.redraw);
        if !ready {
            if m.shutdown {
                m.state = RenderState::Stopped;
                shared.changed.notify_all();
                return Work::Stop;
            }
            m = shared.work.wait(m).unwrap_or_else(PoisonError::into_inner);
            continue;
        }

        // Pacing. Skipped on shutdown so the last frame goes out promptly.
        if !m.shutdown {
            if let Some(last) = last_start {
                let due = last + interval;
                let now = Instant::now();
                if now < due {
                    m = shared
                        .work
                        .wait_timeout(m, due - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                    continue;
                }
            }
        }

        let snapshot = match m.pending.take() {
            Some(snapshot) => snapshot,
            None => match renderer.committed() {
                Some(committed) => committed.clone(),
                None => {
                    m.redraw = false;
                    continue;
                }
            },
        };
        m.redraw = false;
        let force = mem::take(&mut m.force);
        m.state = RenderState::Diffing;
        shared.changed.notify_all();
        return Work::Draw { snapshot, force };
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
