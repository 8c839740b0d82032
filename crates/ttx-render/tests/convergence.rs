// SPDX-License-Identifier: MIT
//
// Convergence: whatever sequence of frames is drawn, and whichever of them
// are skipped, the terminal ends up showing exactly the last grid drawn.

mod support;

use proptest::prelude::*;

use support::VirtualTerminal;
use ttx_render::{
    Attr, Capabilities, Cell, Color, ColorDepth, Cursor, CursorShape, Grid, Renderer, Snapshot,
    Style, UnderlineStyle,
};

const ROWS: u16 = 4;
const COLS: u16 = 10;

const GLYPHS: &[&str] = &[
    "a", "b", "Z", " ", "-", "中", "😀", "é", "e\u{301}", "\u{301}", "\u{200b}",
];

const SHAPES: &[CursorShape] = &[
    CursorShape::Default,
    CursorShape::SteadyBlock,
    CursorShape::BlinkBar,
    CursorShape::SteadyUnderline,
];

fn styles() -> Vec<Style> {
    vec![
        Style::DEFAULT,
        Style::DEFAULT.with_attrs(Attr::BOLD),
        Style::DEFAULT.with_attrs(Attr::FAINT.union(Attr::ITALIC)),
        Style::DEFAULT.with_fg(Color::Indexed(1)),
        Style::DEFAULT.with_fg(Color::Indexed(12)).with_bg(Color::Indexed(4)),
        Style::DEFAULT.with_fg(Color::TrueColor(200, 120, 40)),
        Style::DEFAULT.with_bg(Color::Indexed(236)),
        Style::DEFAULT
            .with_underline(UnderlineStyle::Curly)
            .with_underline_color(Color::TrueColor(255, 0, 0)),
        Style::DEFAULT.with_attrs(Attr::REVERSE.union(Attr::BLINK)),
        Style::DEFAULT.with_attrs(Attr::STRIKETHROUGH.union(Attr::OVERLINE)),
    ]
}

// ── Strategies ──

#[derive(Debug, Clone)]
enum Edit {
    Put { row: u16, col: u16, glyph: usize, style: usize },
    Text { row: u16, col: u16, text: String, style: usize },
    Fill { style: usize },
    Clear,
}

#[derive(Debug, Clone)]
struct Frame {
    edits: Vec<Edit>,
    cursor: Cursor,
    dropped: bool,
    force: bool,
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    let style = 0..styles().len();
    prop_oneof![
        8 => (0..ROWS, 0..COLS, 0..GLYPHS.len(), style.clone())
            .prop_map(|(row, col, glyph, style)| Edit::Put { row, col, glyph, style }),
        3 => (0..ROWS, 0..COLS, "[a-z 中\u{301}\u{200b}]{1,12}", style.clone())
            .prop_map(|(row, col, text, style)| Edit::Text { row, col, text, style }),
        1 => style.prop_map(|style| Edit::Fill { style }),
        1 => Just(Edit::Clear),
    ]
}

prop_compose! {
    fn arb_cursor()(
        row in 0..ROWS,
        col in 0..COLS,
        visible in any::<bool>(),
        shape in 0..SHAPES.len(),
    ) -> Cursor {
        let cursor = Cursor::at(row, col).with_shape(SHAPES[shape]);
        if visible { cursor } else { cursor.hidden() }
    }
}

prop_compose! {
    fn arb_frame()(
        edits in prop::collection::vec(arb_edit(), 0..8),
        cursor in arb_cursor(),
        dropped in prop::bool::weighted(0.3),
        force in prop::bool::weighted(0.1),
    ) -> Frame {
        Frame { edits, cursor, dropped, force }
    }
}

fn arb_capabilities() -> impl Strategy<Value = Capabilities> {
    (
        prop_oneof![
            Just(ColorDepth::TrueColor),
            Just(ColorDepth::Indexed256),
            Just(ColorDepth::Ansi16),
        ],
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(color_depth, styled_underline, synchronized_output)| Capabilities {
            color_depth,
            styled_underline,
            synchronized_output,
        })
}

// ── Helpers ──

fn apply(grid: &mut Grid, frame: &Frame, styles: &[Style]) {
    for edit in &frame.edits {
        match edit {
            Edit::Put { row, col, glyph, style } => {
                grid.set(*row, *col, Cell::styled(GLYPHS[*glyph], styles[*style]));
            }
            Edit::Text { row, col, text, style } => {
                grid.put_str(*row, *col, text, styles[*style]);
            }
            Edit::Fill { style } => grid.fill(styles[*style]),
            Edit::Clear => grid.clear(),
        }
    }
    grid.set_cursor(frame.cursor);
}

/// What the terminal should show for `grid` once styles are reduced to
/// what `caps` can express.
fn as_displayed(grid: &Grid, caps: Capabilities) -> Grid {
    let mut shown = grid.clone();
    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            if let Some(cell) = grid.get(row, col) {
                let style = caps.adapt_style(cell.style);
                shown.set_raw(row, col, cell.clone().with_style(style));
            }
        }
    }
    shown
}

// ── Properties ──

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn terminal_converges_to_last_drawn_grid(
        frames in prop::collection::vec(arb_frame(), 1..16),
        caps in arb_capabilities(),
    ) {
        let styles = styles();
        let mut renderer = Renderer::new(caps);
        let mut vt = VirtualTerminal::new(ROWS, COLS);
        let mut grid = Grid::new(ROWS, COLS);
        let mut seq = 0;

        for frame in &frames {
            apply(&mut grid, frame, &styles);
            if frame.dropped {
                continue;
            }
            seq += 1;
            let mut out = Vec::new();
            renderer.render_to(&Snapshot::new(seq, grid.clone()), frame.force, &mut out).unwrap();
            vt.feed(&out);

            let mismatches = vt.mismatches(&as_displayed(&grid, caps));
            prop_assert!(mismatches.is_empty(), "frame {}: {:?}", seq, mismatches);
        }

        // The final state is always drawn, even if its frame was dropped.
        seq += 1;
        let mut out = Vec::new();
        renderer.render_to(&Snapshot::new(seq, grid.clone()), false, &mut out).unwrap();
        vt.feed(&out);
        vt.assert_shows(&as_displayed(&grid, caps));
    }

    #[test]
    fn redrawing_the_same_grid_is_silent(
        frame in arb_frame(),
        caps in arb_capabilities(),
    ) {
        let styles = styles();
        let mut grid = Grid::new(ROWS, COLS);
        apply(&mut grid, &frame, &styles);

        let mut renderer = Renderer::new(caps);
        let mut out = Vec::new();
        renderer.render_to(&Snapshot::new(1, grid.clone()), true, &mut out).unwrap();

        out.clear();
        let stats = renderer.render_to(&Snapshot::new(2, grid), false, &mut out).unwrap();
        prop_assert_eq!(stats.bytes_written, 0);
        prop_assert!(out.is_empty());
    }

    #[test]
    fn no_write_lands_on_a_continuation(frames in prop::collection::vec(arb_frame(), 1..8)) {
        let styles = styles();
        let mut renderer = Renderer::new(Capabilities::default());
        let mut grid = Grid::new(ROWS, COLS);

        for (seq, frame) in (1..).zip(&frames) {
            apply(&mut grid, frame, &styles);
            let snap = Snapshot::new(seq, grid.clone());
            let plan = renderer.plan(&snap, frame.force).unwrap();

            for op in &plan.ops {
                if let ttx_render::Op::MoveTo { row, col } = op {
                    let target = grid.get(*row, *col).unwrap();
                    // The final cursor placement may sit anywhere; text never starts there.
                    let is_cursor = (*row, *col) == (grid.cursor().row, grid.cursor().col);
                    prop_assert!(!target.is_continuation() || is_cursor, "MoveTo({}, {})", row, col);
                }
            }

            let mut out = Vec::new();
            renderer.render_to(&snap, frame.force, &mut out).unwrap();
        }
    }
}
