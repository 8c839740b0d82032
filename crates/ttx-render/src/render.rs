// SPDX-License-Identifier: MIT
//
// Renderer: the single-threaded frame pipeline.
//
// The render thread drives one of these. Per frame:
//
//   1. prepare() picks the path (incremental diff, or full repaint when there
//      is no previous frame, the size changed, or a repaint was forced),
//      builds the plan and encodes it into the OutputBuffer. Nothing that
//      describes the terminal changes yet.
//   2. flush_to() writes the whole frame with one write_all.
//   3. commit() records the snapshot and the cursor state the plan left
//      behind, so the next diff starts from what is really on screen.
//
// Splitting prepare from commit is what keeps a failed write from poisoning
// the next frame: if the write fails, nothing was committed and the caller
// invalidates instead.

use std::io::Write;

use crate::diff::{self, TerminalState, UpdatePlan};
use crate::encode::{Capabilities, Encoder};
use crate::error::{Error, Result};
use crate::output::OutputBuffer;
use crate::snapshot::Snapshot;

// ─── RenderStats ─────────────────────────────────────────────────────────────

/// Statistics from one frame, for profiling and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Cells written or erased.
    pub cells_rendered: usize,
    /// Cells that matched the previous frame and were skipped.
    pub cells_skipped: usize,
    /// Bytes of terminal output produced.
    pub bytes_written: usize,
    /// Whether the full repaint path was taken.
    pub repaint: bool,
}

impl RenderStats {
    /// Total cells processed (rendered + skipped).
    #[inline]
    #[must_use]
    pub const fn total_cells(&self) -> usize {
        self.cells_rendered + self.cells_skipped
    }
}

// ─── Frame ───────────────────────────────────────────────────────────────────

/// A prepared, not yet committed, frame.
///
/// Its bytes live in the renderer's output buffer until written.
#[derive(Debug)]
#[must_use = "a prepared frame must be committed once written"]
pub struct Frame {
    snapshot: Snapshot,
    after: TerminalState,
    stats: RenderStats,
}

impl Frame {
    /// Sequence number of the snapshot this frame draws.
    #[inline]
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.snapshot.seq()
    }

    /// Frame statistics.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> RenderStats {
        self.stats
    }
}

// ─── Renderer ────────────────────────────────────────────────────────────────

/// Owns the last committed screen and turns new snapshots into bytes.
///
/// # Usage
///
/// ```
/// use ttx_render::encode::Capabilities;
/// use ttx_render::render::Renderer;
/// use ttx_render::snapshot::Snapshot;
///
/// let mut renderer = Renderer::new(Capabilities::default());
/// let mut sink = Vec::new();
///
/// let snap = Snapshot::blank(1, 24, 80);
/// let stats = renderer.render_to(&snap, false, &mut sink).unwrap();
/// assert!(stats.repaint);
///
/// // Same screen again: nothing to do.
/// let stats = renderer.render_to(&snap, false, &mut sink).unwrap();
/// assert_eq!(stats.bytes_written, 0);
/// ```
pub struct Renderer {
    encoder: Encoder,
    output: OutputBuffer,
    committed: Option<Snapshot>,
    terminal: TerminalState,
    /// False after a failed write or `invalidate`: the screen content is
    /// unknown even though `committed` is kept for redraws.
    screen_known: bool,
}

impl Renderer {
    /// Create a renderer with no previous frame; the first frame repaints.
    #[must_use]
    pub fn new(caps: Capabilities) -> Self {
        Self {
            encoder: Encoder::new(caps),
            output: OutputBuffer::new(),
            committed: None,
            terminal: TerminalState::UNKNOWN,
            screen_known: false,
        }
    }

    /// The last committed snapshot. Kept across [`invalidate`](Self::invalidate)
    /// so it can be repainted.
    #[inline]
    #[must_use]
    pub const fn committed(&self) -> Option<&Snapshot> {
        self.committed.as_ref()
    }

    /// What we believe about the terminal's cursor.
    #[inline]
    #[must_use]
    pub const fn terminal_state(&self) -> TerminalState {
        self.terminal
    }

    /// Whether the next frame of `size` must take the repaint path.
    #[must_use]
    pub fn needs_repaint(&self, size: (u16, u16)) -> bool {
        !self.screen_known || self.committed.as_ref().is_none_or(|prev| prev.size() != size)
    }

    /// Compute the plan for `snapshot` without encoding it.
    ///
    /// # Errors
    ///
    /// Propagates diff errors; see [`diff::diff`].
    pub fn plan(&self, snapshot: &Snapshot, force: bool) -> Result<UpdatePlan> {
        match &self.committed {
            Some(prev) if self.screen_known && !force && prev.size() == snapshot.size() => {
                diff::diff(prev, snapshot, self.terminal)
            }
            _ => diff::repaint(snapshot),
        }
    }

    /// Diff and encode `snapshot` into the output buffer.
    ///
    /// Committed state is unchanged until [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWideCharPairing`] (or another diff error) when
    /// the snapshot cannot be drawn. The output buffer is then empty.
    pub fn prepare(&mut self, snapshot: &Snapshot, force: bool) -> Result<Frame> {
        self.output.clear();
        let plan = self.plan(snapshot, force)?;
        self.encode(snapshot, &plan)
    }

    /// Encode an already computed plan for `snapshot` into the output buffer.
    ///
    /// # Errors
    ///
    /// Only fails if encoding into memory fails, which it does not.
    pub fn encode(&mut self, snapshot: &Snapshot, plan: &UpdatePlan) -> Result<Frame> {
        self.output.clear();
        self.encoder.encode(plan, &mut self.output)?;

        Ok(Frame {
            snapshot: snapshot.clone(),
            after: plan.after,
            stats: RenderStats {
                cells_rendered: plan.stats.cells_rendered,
                cells_skipped: plan.stats.cells_skipped,
                bytes_written: self.output.len(),
                repaint: plan.is_repaint(),
            },
        })
    }

    /// The encoded bytes of the last prepared frame.
    #[inline]
    #[must_use]
    pub fn output_bytes(&self) -> &[u8] {
        self.output.as_bytes()
    }

    /// Write the prepared frame to `sink` in one `write_all`, then flush.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutputWriteFailure`] if the sink fails. The frame must
    /// not be committed then.
    pub fn flush_to(&mut self, sink: &mut impl Write) -> Result<()> {
        let result = self.output.flush_to(sink).map_err(Error::OutputWriteFailure);
        self.output.clear();
        result
    }

    /// Record a written frame as what the terminal now shows.
    pub fn commit(&mut self, frame: Frame) {
        self.terminal = frame.after;
        self.committed = Some(frame.snapshot);
        self.screen_known = true;
    }

    /// Forget what the terminal shows; the next frame repaints.
    pub fn invalidate(&mut self) {
        self.terminal = TerminalState::UNKNOWN;
        self.screen_known = false;
        self.output.clear();
    }

    /// Prepare, write and commit in one step.
    ///
    /// # Errors
    ///
    /// Diff errors leave everything unchanged. A write failure invalidates
    /// the renderer and returns [`Error::OutputWriteFailure`].
    pub fn render_to(
        &mut self,
        snapshot: &Snapshot,
        force: bool,
        sink: &mut impl Write,
    ) -> Result<RenderStats> {
        let frame = self.prepare(snapshot, force)?;
        if let Err(e) = self.flush_to(sink) {
            self.invalidate();
            return Err(e);
        }
        let stats = frame.stats();
        self.commit(frame);
        Ok(stats)
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("committed", &self.committed.as_ref().map(Snapshot::seq))
            .field("terminal", &self.terminal)
            .field("screen_known", &self.screen_known)
            .field("frames_sent", &self.output.frames_sent())
            .field("bytes_sent", &self.output.bytes_sent())
            .finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
