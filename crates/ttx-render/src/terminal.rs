// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Terminal setup for the multiplexer driver.
//
// The render core never opens a terminal: it writes to whatever sink it is
// given. This module is what a driver uses to turn its own tty into that
// sink: raw mode via termios, the alternate screen, a hidden cursor, and a
// guard that puts everything back on drop.
//
// termios, ioctl and isatty have no safe wrappers in std, so the unsafe
// blocks here are the plain POSIX calls and nothing more.
//
// A panic while the render thread owns stdout must still leave a usable
// shell. The panic hook writes a fixed restore sequence straight to fd 1,
// without taking the stdout lock, then restores termios from a global copy.

use std::io::{self, Write};
use std::sync::{Mutex, Once};

use crate::ansi::{self, CursorShape};

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal size in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Height in rows.
    pub rows: u16,
    /// Width in columns.
    pub cols: u16,
}

impl Size {
    /// Size used when the terminal cannot be queried.
    pub const FALLBACK: Self = Self { rows: 24, cols: 80 };

    /// `(rows, cols)`, the order grids and snapshots use.
    #[inline]
    #[must_use]
    pub const fn as_tuple(self) -> (u16, u16) {
        (self.rows, self.cols)
    }
}

// ─── Queries ────────────────────────────────────────────────────────────────

/// Ask the kernel for stdout's window size (`TIOCGWINSZ`).
///
/// `None` when stdout is not a terminal or reports a zero dimension.
#[cfg(unix)]
#[must_use]
pub fn get_size() -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &raw mut ws) };

    (rc == 0 && ws.ws_row > 0 && ws.ws_col > 0).then_some(Size {
        rows: ws.ws_row,
        cols: ws.ws_col,
    })
}

#[cfg(not(unix))]
#[must_use]
pub fn get_size() -> Option<Size> {
    None
}

/// Whether stdout is a terminal.
#[cfg(unix)]
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDOUT_FILENO) != 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty() -> bool {
    false
}

// ─── Panic restore ──────────────────────────────────────────────────────────

/// termios saved by [`Terminal::enter`], for the panic hook.
#[cfg(unix)]
static SAVED_TERMIOS: Mutex<Option<libc::termios>> = Mutex::new(None);

static PANIC_HOOK: Once = Once::new();

/// End sync output, reset SGR and cursor shape, show the cursor, and leave
/// the alternate screen last so the shell's screen comes back clean.
#[rustfmt::skip]
const RESTORE: &[u8] = b"\
    \x1b[?2026l\
    \x1b[0m\
    \x1b[0 q\
    \x1b[?25h\
    \x1b[?1049l";

#[cfg(unix)]
fn restore_saved_termios() {
    if let Ok(saved) = SAVED_TERMIOS.lock() {
        if let Some(ref termios) = *saved {
            unsafe {
                let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, termios);
            }
        }
    }
}

fn write_restore() {
    #[cfg(unix)]
    unsafe {
        let _ = libc::write(
            libc::STDOUT_FILENO,
            RESTORE.as_ptr().cast::<libc::c_void>(),
            RESTORE.len(),
        );
    }

    #[cfg(not(unix))]
    {
        let mut out = io::stdout();
        let _ = out.write_all(RESTORE);
        let _ = out.flush();
    }
}

fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            write_restore();
            #[cfg(unix)]
            restore_saved_termios();
            previous(info);
        }));
    });
}

// ─── Terminal ───────────────────────────────────────────────────────────────

/// RAII guard over the controlling terminal.
///
/// [`enter`](Self::enter) switches to raw mode and the alternate screen and
/// hides the cursor; dropping the guard undoes it.
///
/// ```no_run
/// use ttx_render::terminal::Terminal;
///
/// let mut term = Terminal::new();
/// term.enter()?;
/// // hand io::stdout() to the render thread ...
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct Terminal {
    #[cfg(unix)]
    original: Option<libc::termios>,
    size: Size,
    active: bool,
}

impl Terminal {
    /// A guard for stdout. Does not touch the terminal until `enter`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            #[cfg(unix)]
            original: None,
            size: get_size().unwrap_or(Size::FALLBACK),
            active: false,
        }
    }

    /// Size as of the last query.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Query the size again. Returns `Some` only if it changed.
    pub fn poll_resize(&mut self) -> Option<Size> {
        let now = get_size()?;
        if now == self.size {
            return None;
        }
        self.size = now;
        Some(now)
    }

    /// Whether `enter` is in effect.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Raw mode, alternate screen, hidden cursor, cleared screen.
    ///
    /// Calling it twice is a no-op.
    ///
    /// # Errors
    ///
    /// Fails if termios cannot be changed or stdout cannot be written.
    pub fn enter(&mut self) -> io::Result<()> {
        if self.active {
            return Ok(());
        }
        install_panic_hook();
        self.raw_mode_on()?;

        let mut out = io::stdout().lock();
        ansi::enter_alt_screen(&mut out)?;
        ansi::cursor_hide(&mut out)?;
        ansi::clear_screen(&mut out)?;
        out.flush()?;

        self.active = true;
        Ok(())
    }

    /// Undo [`enter`](Self::enter). Calling it while inactive is a no-op.
    ///
    /// Must not run while another thread is still writing frames to stdout.
    ///
    /// # Errors
    ///
    /// Fails if stdout cannot be written or termios cannot be restored.
    pub fn leave(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }

        let mut out = io::stdout().lock();
        ansi::end_sync(&mut out)?;
        ansi::reset(&mut out)?;
        ansi::set_cursor_shape(&mut out, CursorShape::Default)?;
        ansi::cursor_show(&mut out)?;
        ansi::exit_alt_screen(&mut out)?;
        out.flush()?;
        drop(out);

        self.raw_mode_off()?;
        self.active = false;
        Ok(())
    }

    #[cfg(unix)]
    fn raw_mode_on(&mut self) -> io::Result<()> {
        if unsafe { libc::isatty(libc::STDIN_FILENO) } == 0 {
            return Ok(());
        }

        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(libc::STDIN_FILENO, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }
            self.original = Some(termios);
            if let Ok(mut saved) = SAVED_TERMIOS.lock() {
                *saved = Some(termios);
            }

            libc::cfmakeraw(&raw mut termios);
            if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, &raw const termios) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn raw_mode_on(&mut self) -> io::Result<()> {
        Ok(())
    }

    #[cfg(unix)]
    fn raw_mode_off(&mut self) -> io::Result<()> {
        let Some(original) = self.original.take() else {
            return Ok(());
        };
        if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, &raw const original) } != 0 {
            return Err(io::Error::last_os_error());
        }
        if let Ok(mut saved) = SAVED_TERMIOS.lock() {
            *saved = None;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn raw_mode_off(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("size", &self.size)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
