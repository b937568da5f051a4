//! The diff renderer.
//!
//! `render_frame` walks the current surface against its shadow and
//! appends exactly the bytes needed to bring the terminal display up to
//! date. Runs of unchanged cells are skipped by whichever is shortest of
//! re-printing the unchanged bytes, horizontal cursor motion, or
//! row-relative newlines.

use vtdetect::{Capability, CapabilitySet};
use vtwire::csi;
use vtsurface::cell::{Cell, CellText, Style, Underline};
use vtsurface::surface::FlushView;
use vtwire::color::{Color, ColorKind};

/// Shadow-only marker for cells hidden behind a cluster head; sanitized
/// text can never contain 0x01, so it compares unequal to everything.
pub(crate) const SHADOW_HIDDEN: CellText = CellText::Inline {
    len: 1,
    bytes: [1, 0, 0, 0, 0, 0, 0, 0],
};

fn push_int(out: &mut Vec<u8>, value: i32) {
    let mut buffer = itoa::Buffer::new();
    out.extend_from_slice(buffer.format(value).as_bytes());
}

// --- quantization --------------------------------------------------------

/// Nearest index in the 256-color cube axis {0, 95, 135, 175, 215, 255}.
/// Cut points: 47, 115, 155, 195, 235.
fn quantize_grid6(val: i32) -> i32 {
    if val <= 47 {
        return 0;
    }
    if val < 115 {
        return 1;
    }
    2 + (val - 115) / 40
}

/// Nearest index in the 88-color cube axis {0, 139, 205, 255}.
/// Cut points: 69, 172, 230.
fn quantize_grid4(val: i32) -> i32 {
    if val <= 172 {
        if val <= 69 { 0 } else { 1 }
    } else if val < 230 {
        2
    } else {
        3
    }
}

const GRID6_VALUES: [i32; 6] = [0, 95, 135, 175, 215, 255];
const GRID4_VALUES: [i32; 4] = [0, 139, 205, 255];
const RAMP8_VALUES: [i32; 8] = [46, 92, 115, 139, 162, 185, 208, 231];

fn sq(x: i32) -> i32 {
    x * x
}

/// Map RGB colors to the nearest palette entry when truecolor output is
/// not available. Other color kinds pass through unchanged.
pub(crate) fn quantize(caps: &CapabilitySet, color: Color) -> Color {
    if caps.use_truecolor() {
        return color;
    }
    let ColorKind::Rgb(r, g, b) = color.kind() else {
        return color;
    };
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));

    if caps.has(Capability::Color88) {
        let red_index = quantize_grid4(r);
        let green_index = quantize_grid4(g);
        let blue_index = quantize_grid4(b);

        let red_q = GRID4_VALUES[red_index as usize];
        let green_q = GRID4_VALUES[green_index as usize];
        let blue_q = GRID4_VALUES[blue_index as usize];

        let mut best = Color::indexed((16 + red_index * 16 + green_index * 4 + blue_index) as u8);
        let mut best_metric = sq(red_q - r) + sq(green_q - g) + sq(blue_q - b);

        for (grey_index, &grey_q) in RAMP8_VALUES.iter().enumerate() {
            let metric = sq(grey_q - r) + sq(grey_q - g) + sq(grey_q - b);
            if metric < best_metric {
                best = Color::indexed((80 + grey_index) as u8);
                best_metric = metric;
            }
        }
        best
    } else {
        let grey = (r + g + b) / 3;
        // nearest grey in {8, 18, .., 238}; -3 / 10 rounds towards zero,
        // so grey == 0 still lands on index 0
        let grey_index = (((grey - 8) + 5) / 10).min(23);
        let grey_q = 8 + grey_index * 10;

        let red_index = quantize_grid6(r);
        let green_index = quantize_grid6(g);
        let blue_index = quantize_grid6(b);

        let red_q = GRID6_VALUES[red_index as usize];
        let green_q = GRID6_VALUES[green_index as usize];
        let blue_q = GRID6_VALUES[blue_index as usize];

        if sq(grey_q - r) + sq(grey_q - g) + sq(grey_q - b)
            < sq(red_q - r) + sq(green_q - g) + sq(blue_q - b)
        {
            Color::indexed((232 + grey_index) as u8)
        } else {
            Color::indexed((16 + red_index * 36 + green_index * 6 + blue_index) as u8)
        }
    }
}

// --- SGR assembly --------------------------------------------------------

/// Running parameter count of one `CSI … m` sequence. Some terminals
/// silently truncate over-long parameter lists, so the sequence is closed
/// and reopened before the cap is exceeded.
struct SgrParams {
    index: usize,
    max: usize,
}

impl SgrParams {
    /// Append `cost` parameters introduced by `lead`, splitting the
    /// sequence if needed. `lead` starts with the separator that is
    /// dropped after a split.
    fn put(&mut self, out: &mut Vec<u8>, lead: &str, cost: usize) {
        if self.index + cost >= self.max {
            out.extend_from_slice(b"m\x1b[");
            out.extend_from_slice(&lead.as_bytes()[1..]);
            self.index = cost;
        } else {
            out.extend_from_slice(lead.as_bytes());
            self.index += cost;
        }
    }
}

fn write_color_sgr(
    out: &mut Vec<u8>,
    params: &mut SgrParams,
    color: Color,
    direct: &str,
    indexed: &str,
    sep: &str,
    named: u32,
    bright_named: u32,
) {
    match color.kind() {
        ColorKind::Rgb(r, g, b) => {
            params.put(out, direct, 5);
            push_int(out, i32::from(r));
            out.extend_from_slice(sep.as_bytes());
            push_int(out, i32::from(g));
            out.extend_from_slice(sep.as_bytes());
            push_int(out, i32::from(b));
        }
        ColorKind::Indexed(n) => {
            params.put(out, indexed, 3);
            push_int(out, i32::from(n));
        }
        ColorKind::Named(n) => {
            if named != 0 {
                params.put(out, ";", 1);
                if n < 8 {
                    push_int(out, (named + u32::from(n)) as i32);
                } else {
                    push_int(out, (bright_named + u32::from(n) - 8) as i32);
                }
            } else {
                // no named encoding for this channel (decoration colors);
                // fall back to the indexed form
                params.put(out, indexed, 3);
                push_int(out, i32::from(n));
            }
        }
        ColorKind::Default => {}
    }
}

// --- frame rendering -----------------------------------------------------

pub(crate) struct RenderSettings {
    pub full_repaint: bool,
    pub did_disable_wrap: bool,
    pub max_csi_parameters: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Softwrap {
    No,
    Single,
    Double,
}

fn cell_text<'a>(view: &'a FlushView<'_>, cell: &'a Cell) -> &'a [u8] {
    match &cell.text {
        CellText::Inline { .. } => cell.text.inline_str().unwrap_or("\u{fffd}").as_bytes(),
        CellText::Overflow(id) => view.overflow.text(*id).as_bytes(),
        CellText::Erased | CellText::WideRightPadding => b" ",
    }
}

/// Render one frame into `out`, updating the shadow to the transmitted
/// state. Returns the trailing unchanged-cell count of the last row,
/// which callers without an explicit cursor position advance over.
#[allow(clippy::too_many_lines)]
pub(crate) fn render_frame(
    view: &mut FlushView<'_>,
    caps: &CapabilitySet,
    settings: &RenderSettings,
    out: &mut Vec<u8>,
) -> i32 {
    let width = view.width;
    let height = view.height;

    out.extend_from_slice(csi!("H").as_bytes());

    let mut speculation = [0u8; 30];
    // 0 = cursor matches the current cell, -1 = force a move, > 0 bytes
    // buffered to print instead of a move
    let mut speculation_state: i32 = 0;
    let mut pending_row_move = 0;
    let mut pending_column_move: i32 = 0;
    let mut pending_column_move_digits = 1;
    let mut pending_column_move_digits_step = 10;

    let mut softwrap_prev = Softwrap::No;

    for y in 0..height {
        speculation_state = 0;
        pending_column_move = 0;
        pending_column_move_digits = 1;
        pending_column_move_digits_step = 10;

        let mut current_fg: Option<Color> = None;
        let mut current_bg: Option<Color> = None;
        let mut current_deco: Option<Color> = None;
        let mut current_style: Option<Style> = None;
        // the patch can do anything, so it never matches initially
        let mut current_patch_idx: u8 = 0;
        let mut cleared = false;

        let mut softwrap = Softwrap::No;
        if y + 1 < height && width > 0 {
            let first_next_line = &view.cells[(y + 1) * width];
            if first_next_line.style.contains(Style::SOFTWRAP_MARKER)
                && !first_next_line.text.is_erased()
            {
                let last_this_line = &view.cells[y * width + width - 1];
                if last_this_line.style.contains(Style::SOFTWRAP_MARKER)
                    && !last_this_line.text.is_erased()
                {
                    softwrap = Softwrap::Single;
                } else if last_this_line.text.is_erased() && width >= 2 {
                    let second_to_last = &view.cells[y * width + width - 2];
                    if second_to_last.style.contains(Style::SOFTWRAP_MARKER)
                        && !second_to_last.text.is_erased()
                        && first_next_line.expansion == 1
                    {
                        softwrap = Softwrap::Double;
                    }
                }
            }
        }

        // tail of erased cells that CSI K can cover
        let mut first_tail_erased = width;
        if caps.has(Capability::ClearedColoring) && softwrap == Softwrap::No {
            for x in (0..width).rev() {
                if view.cells[y * width + x].text.is_erased() {
                    first_tail_erased = x;
                } else {
                    break;
                }
            }
        }

        let mut x = 0;
        while x < width {
            let cell = view.cells[y * width + x];
            let old_cell = view.shadow[y * width + x];

            let mut text_buf = [0u8; 40];
            let text_len = {
                let t = cell_text(view, &cell);
                let len = t.len().min(text_buf.len());
                text_buf[..len].copy_from_slice(&t[..len]);
                len
            };
            let text = &text_buf[..text_len];
            let text_changed = cell.text != old_cell.text;

            let effective_fg = quantize(caps, cell.fg);
            let effective_bg = quantize(caps, cell.bg);

            let mut needs_paint = settings.full_repaint
                || effective_bg != old_cell.bg
                || effective_fg != old_cell.fg
                || cell.style != old_cell.style
                || cell.patch_idx != old_cell.patch_idx
                || text_changed;

            let effective_deco = if cell.style.has_deco() {
                needs_paint |= cell.deco != old_cell.deco;
                cell.deco
            } else {
                Color::DEFAULT
            };

            let needs_attribute_change = Some(effective_bg) != current_bg
                || Some(effective_fg) != current_fg
                || Some(effective_deco) != current_deco
                || Some(cell.style & Style::ATTR_MASK) != current_style
                || cell.patch_idx != current_patch_idx;

            if first_tail_erased < x {
                needs_paint = needs_attribute_change || (needs_paint && !cleared);
            }

            if softwrap == Softwrap::Single && x == width - 1 {
                needs_paint = true;
                if settings.did_disable_wrap {
                    // urxvt, screen and libvterm need wrap re-enabled
                    // before the cursor enters the pending-wrap state
                    out.extend_from_slice(csi!("?7h").as_bytes());
                }
            }

            let cluster_start = x;
            if softwrap == Softwrap::Double && x == width - 2 {
                needs_paint = true;
                x += 1; // the last cell rides along with the head
                if settings.did_disable_wrap {
                    out.extend_from_slice(csi!("?7h").as_bytes());
                }
            }

            if softwrap_prev != Softwrap::No {
                needs_paint = true;
            }

            // the shadow now reflects what will be on screen
            {
                let shadow_cell = &mut view.shadow[y * width + cluster_start];
                *shadow_cell = cell;
                shadow_cell.fg = effective_fg;
                shadow_cell.bg = effective_bg;
                for i in 0..usize::from(cell.expansion) {
                    let idx = y * width + cluster_start + i + 1;
                    if idx < (y + 1) * width {
                        view.shadow[idx].text = SHADOW_HIDDEN;
                    }
                }
            }

            if !needs_paint {
                if current_patch_idx != 0 {
                    if let Some(patch) = view.patches.get(current_patch_idx) {
                        out.extend_from_slice(&patch.cleanup);
                    }
                    current_patch_idx = 0;
                }

                pending_column_move += 1 + i32::from(cell.expansion);
                if speculation_state != -1 {
                    if needs_attribute_change {
                        // restoring attributes costs more than any cursor
                        // motion, so stop speculating
                        speculation_state = -1;
                    } else {
                        if pending_column_move >= pending_column_move_digits_step {
                            pending_column_move_digits += 1;
                            pending_column_move_digits_step *= 10;
                        }

                        if pending_column_move_digits + 3 < speculation_state + text.len() as i32 {
                            // the move sequence is shorter than re-printing
                            speculation_state = -1;
                        } else if speculation_state as usize + text.len() < speculation.len() {
                            speculation[speculation_state as usize..][..text.len()]
                                .copy_from_slice(text);
                            speculation_state += text.len() as i32;
                        } else {
                            speculation_state = -1;
                        }
                    }
                }
                x += 1 + usize::from(cell.expansion);
                continue;
            }

            if pending_row_move > 0 {
                out.push(b'\r');
                if pending_row_move < 4 {
                    for _ in 0..pending_row_move {
                        out.push(b'\n');
                    }
                } else {
                    out.extend_from_slice(b"\x1b[");
                    push_int(out, pending_row_move);
                    out.push(b'B');
                }
                pending_row_move = 0;
            }
            if pending_column_move > 0 {
                if speculation_state > 0 {
                    out.extend_from_slice(&speculation[..speculation_state as usize]);
                } else {
                    out.extend_from_slice(b"\x1b[");
                    if pending_column_move != 1 {
                        push_int(out, pending_column_move);
                    }
                    out.push(b'C');
                }
                speculation_state = 0;
                pending_column_move = 0;
                pending_column_move_digits = 1;
                pending_column_move_digits_step = 10;
            }

            if needs_attribute_change {
                out.extend_from_slice(b"\x1b[0");
                let mut params = SgrParams {
                    index: 1,
                    max: settings.max_csi_parameters,
                };
                write_color_sgr(out, &mut params, effective_bg, ";48;2;", ";48;5;", ";", 40, 100);
                write_color_sgr(out, &mut params, effective_fg, ";38;2;", ";38;5;", ";", 30, 90);
                write_color_sgr(out, &mut params, effective_deco, ";58:2:", ";58:5:", ":", 0, 0);
                let style = cell.style;
                if style.contains(Style::BOLD) {
                    params.put(out, ";1", 1);
                }
                if style.contains(Style::ITALIC) {
                    params.put(out, ";3", 1);
                }
                match style.underline() {
                    Underline::Single => params.put(out, ";4", 1),
                    Underline::Double => params.put(out, ";21", 1),
                    Underline::Curly => params.put(out, ";4:3", 2),
                    Underline::None => {}
                }
                if style.contains(Style::BLINK) {
                    params.put(out, ";5", 1);
                }
                if style.contains(Style::OVERLINE) {
                    params.put(out, ";53", 1);
                }
                if style.contains(Style::INVERSE) {
                    params.put(out, ";7", 1);
                }
                if style.contains(Style::STRIKE) {
                    params.put(out, ";9", 1);
                }
                out.push(b'm');

                current_bg = Some(effective_bg);
                current_fg = Some(effective_fg);
                current_deco = Some(effective_deco);
                current_style = Some(style & Style::ATTR_MASK);

                if current_patch_idx != cell.patch_idx {
                    if let Some(patch) = view.patches.get(current_patch_idx) {
                        out.extend_from_slice(&patch.cleanup);
                    }
                    if let Some(patch) = view.patches.get(cell.patch_idx) {
                        out.extend_from_slice(&patch.setup);
                    }
                }
                current_patch_idx = cell.patch_idx;
            }

            if first_tail_erased <= x {
                out.extend_from_slice(csi!("K").as_bytes());
                pending_column_move += 1;
                speculation_state = -1;
                cleared = true;
            } else {
                out.extend_from_slice(text);
                if softwrap_prev != Softwrap::No {
                    softwrap_prev = Softwrap::No;
                    if settings.did_disable_wrap {
                        out.extend_from_slice(csi!("?7l").as_bytes());
                    }
                }
                if softwrap == Softwrap::Double && x == width - 1 {
                    // clear the gap cell the wrapped double width cluster
                    // leaves behind
                    out.extend_from_slice(csi!("K").as_bytes());
                }
            }
            if current_patch_idx != 0 {
                if let Some(patch) = view.patches.get(cell.patch_idx) {
                    if !patch.optimize {
                        out.extend_from_slice(&patch.cleanup);
                        current_patch_idx = 0;
                    }
                }
            }
            x += 1 + usize::from(cell.expansion);
        }

        if current_patch_idx != 0 {
            if let Some(patch) = view.patches.get(current_patch_idx) {
                out.extend_from_slice(&patch.cleanup);
            }
        }

        if softwrap == Softwrap::No {
            if settings.full_repaint {
                if y + 1 < height {
                    out.extend_from_slice(b"\r\n");
                }
            } else {
                pending_row_move += 1;
            }
        }

        softwrap_prev = softwrap;
    }

    if pending_row_move > 1 {
        // don't move below the painted rectangle
        pending_row_move -= 1;
        out.push(b'\r');
        if pending_row_move < 4 {
            for _ in 0..pending_row_move {
                out.push(b'\n');
            }
        } else {
            out.extend_from_slice(b"\x1b[");
            push_int(out, pending_row_move);
            out.push(b'B');
        }
    }

    pending_column_move
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtdetect::CapabilitySet;

    fn caps_no_truecolor() -> CapabilitySet {
        let mut caps = CapabilitySet::new();
        caps.disable(Capability::TruecolorMaybeSupported);
        caps
    }

    #[test]
    fn test_quantize_passes_through_with_truecolor() {
        let caps = CapabilitySet::new();
        let c = Color::rgb(1, 2, 3);
        assert_eq!(quantize(&caps, c), c);
    }

    #[test]
    fn test_quantize_to_256_palette() {
        let caps = caps_no_truecolor();
        // the literal case from the cube: (255, 128, 128) -> 210
        assert_eq!(
            quantize(&caps, Color::rgb(255, 128, 128)),
            Color::indexed(210)
        );
        assert_eq!(quantize(&caps, Color::rgb(0, 0, 0)), Color::indexed(16));
        assert_eq!(
            quantize(&caps, Color::rgb(255, 255, 255)),
            Color::indexed(231)
        );
        // mid greys use the grey ramp
        assert_eq!(quantize(&caps, Color::rgb(8, 8, 8)), Color::indexed(232));
        assert_eq!(
            quantize(&caps, Color::rgb(128, 128, 128)),
            Color::indexed(244)
        );
    }

    #[test]
    fn test_quantize_to_88_palette() {
        let mut caps = caps_no_truecolor();
        caps.promise(Capability::Color88);
        assert_eq!(quantize(&caps, Color::rgb(0, 0, 0)), Color::indexed(16));
        assert_eq!(
            quantize(&caps, Color::rgb(255, 255, 255)),
            Color::indexed(79)
        );
        // pure grey prefers the ramp
        assert_eq!(
            quantize(&caps, Color::rgb(0x2e, 0x2e, 0x2e)),
            Color::indexed(80)
        );
    }

    #[test]
    fn test_quantize_leaves_named_and_indexed_alone() {
        let caps = caps_no_truecolor();
        assert_eq!(quantize(&caps, Color::named(3)), Color::named(3));
        assert_eq!(quantize(&caps, Color::indexed(99)), Color::indexed(99));
        assert_eq!(quantize(&caps, Color::DEFAULT), Color::DEFAULT);
    }

    #[test]
    fn test_sgr_parameter_splitting() {
        let mut out = b"\x1b[0".to_vec();
        let mut params = SgrParams { index: 1, max: 4 };
        params.put(&mut out, ";1", 1);
        params.put(&mut out, ";3", 1);
        // the next parameter would hit the cap: sequence is split
        params.put(&mut out, ";5", 1);
        out.push(b'm');
        assert_eq!(out, b"\x1b[0;1;3m\x1b[5m");
    }
}
