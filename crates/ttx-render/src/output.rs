// SPDX-License-Identifier: MIT
//
// Frame output buffer.
//
// The encoder writes a whole frame here, and the frame leaves in one
// `write_all`. A frame therefore reaches the sink whole or the write fails;
// it is never split between two escape sequences by us.
//
// A full repaint of a large terminal can be hundreds of kilobytes while a
// typical incremental frame is a few hundred bytes. After an oversized frame
// the allocation shrinks back so one resize does not pin memory forever.

use std::io::{self, Write};

/// Starting capacity. Covers a full repaint of an 80x24 screen with styles.
const INITIAL_CAPACITY: usize = 16 * 1024;

/// Capacity kept across frames; anything above it is released on reset.
const RETAINED_CAPACITY: usize = 256 * 1024;

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// Bytes of the frame being built, plus lifetime totals of what was sent.
pub struct OutputBuffer {
    frame: Vec<u8>,
    frames_sent: u64,
    bytes_sent: u64,
}

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame: Vec::with_capacity(INITIAL_CAPACITY),
            frames_sent: 0,
            bytes_sent: 0,
        }
    }

    /// Size of the pending frame in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    /// The pending frame.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.frame
    }

    /// Non-empty frames successfully written so far.
    #[inline]
    #[must_use]
    pub const fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Total bytes successfully written so far.
    #[inline]
    #[must_use]
    pub const fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Drop the pending frame, releasing memory left over from an oversized one.
    pub fn clear(&mut self) {
        self.frame.clear();
        if self.frame.capacity() > RETAINED_CAPACITY {
            self.frame.shrink_to(INITIAL_CAPACITY);
        }
    }

    /// Send the pending frame to `sink` with one `write_all`, then flush.
    ///
    /// An empty frame sends nothing and does not touch the sink. On success
    /// the frame is cleared; on failure it is kept so the caller can inspect
    /// or discard it.
    ///
    /// # Errors
    ///
    /// Whatever `sink` returns from `write_all` or `flush`.
    pub fn flush_to(&mut self, sink: &mut impl Write) -> io::Result<()> {
        if self.frame.is_empty() {
            return Ok(());
        }
        sink.write_all(&self.frame)?;
        sink.flush()?;

        self.frames_sent += 1;
        self.bytes_sent += self.frame.len() as u64;
        self.clear();
        Ok(())
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.frame.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    #[inline]
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.frame.extend_from_slice(bytes);
        Ok(())
    }

    /// Nothing to do: frames leave through [`OutputBuffer::flush_to`].
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("pending", &self.frame.len())
            .field("frames_sent", &self.frames_sent)
            .field("bytes_sent", &self.bytes_sent)
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// Refuses every write.
    struct Unplugged;

    impl Write for Unplugged {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Counts how often it is written to and flushed.
    #[derive(Default)]
    struct Counting {
        writes: usize,
        flushes: usize,
        bytes: Vec<u8>,
    }

    impl Write for Counting {
        fn write(&mut self, b: &[u8]) -> io::Result<usize> {
            self.writes += 1;
            self.bytes.extend_from_slice(b);
            Ok(b.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn starts_empty() {
        let out = OutputBuffer::new();
        assert!(out.is_empty());
        assert_eq!((out.frames_sent(), out.bytes_sent()), (0, 0));
    }

    #[test]
    fn frame_goes_out_in_one_write() {
        let mut out = OutputBuffer::new();
        write!(out, "\x1b[{};{}H", 3, 7).unwrap();
        out.write_all("héllo".as_bytes()).unwrap();

        let mut sink = Counting::default();
        out.flush_to(&mut sink).unwrap();
        assert_eq!(sink.bytes, "\x1b[3;7Hhéllo".as_bytes());
        assert_eq!((sink.writes, sink.flushes), (1, 1));
        assert!(out.is_empty());
    }

    #[test]
    fn totals_count_successful_frames() {
        let mut out = OutputBuffer::new();
        let mut sink = Vec::new();
        for frame in ["ab", "cde"] {
            out.write_all(frame.as_bytes()).unwrap();
            out.flush_to(&mut sink).unwrap();
        }
        out.write_all(b"lost").unwrap();
        let _ = out.flush_to(&mut Unplugged);
        assert_eq!((out.frames_sent(), out.bytes_sent()), (2, 5));
    }

    #[test]
    fn empty_frame_never_touches_sink() {
        let mut out = OutputBuffer::new();
        out.flush_to(&mut Unplugged).unwrap();
        let mut sink = Counting::default();
        out.flush_to(&mut sink).unwrap();
        assert_eq!((sink.writes, sink.flushes), (0, 0));
    }

    #[test]
    fn failed_frame_is_kept() {
        let mut out = OutputBuffer::new();
        out.write_all(b"frame").unwrap();
        assert!(out.flush_to(&mut Unplugged).is_err());
        assert_eq!(out.as_bytes(), b"frame");
    }

    #[test]
    fn oversized_frame_releases_memory() {
        let mut out = OutputBuffer::new();
        out.write_all(&vec![b'x'; RETAINED_CAPACITY * 2]).unwrap();
        out.clear();
        assert!(out.frame.capacity() <= RETAINED_CAPACITY);

        out.write_all(&[b'y'; 1000]).unwrap();
        out.clear();
        assert!(out.frame.capacity() >= 1000);
    }
}
