//! The cell grid and its mutation operations.

use vtmeasure::chars::{char_width, replace_unusable};
use vtwire::Color;

use crate::attr::Attributes;
use crate::cell::{Cell, CellText, CLUSTER_BYTE_LIMIT, INLINE_TEXT_CAP, Style};
use crate::overflow::{OverflowId, OverflowTable};
use crate::patch::PatchTable;
use crate::ERASED;

/// Edge handling for [`Surface::copy_rect`] when the copied region cuts
/// through a multi-cell cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CopyTile {
    /// Replace partial edge clusters with spaces.
    NoTile,
    /// Keep the destination cluster when it lines up with the source
    /// cluster exactly.
    Preserve,
    /// Carry partial edge clusters over in full, extending the copied
    /// region by one cell if needed.
    Put,
}

/// A width × height cell grid, optionally carrying a last-flushed shadow.
#[derive(Debug, Default)]
pub struct Surface {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    shadow: Option<Vec<Cell>>,
    overflow: OverflowTable,
    patches: PatchTable,
}

/// Borrowed view handed to the renderer for one flush pass.
pub struct FlushView<'a> {
    pub width: usize,
    pub height: usize,
    pub cells: &'a [Cell],
    pub shadow: &'a mut [Cell],
    pub overflow: &'a OverflowTable,
    pub patches: &'a PatchTable,
}

impl Surface {
    /// New auxiliary surface (no shadow). Non-positive dimensions collapse
    /// to an empty grid on which all writes are no-ops.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let mut surface = Self::default();
        surface.resize(width, height);
        surface
    }

    /// New primary surface carrying a last-flushed shadow.
    #[must_use]
    pub fn with_shadow(width: i32, height: i32) -> Self {
        let mut surface = Self::default();
        surface.shadow = Some(Vec::new());
        surface.resize(width, height);
        surface
    }

    #[must_use]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Resize, discarding all content. The shadow (when present) is reset
    /// too; the owning terminal forces a full repaint on the next flush.
    pub fn resize(&mut self, width: i32, height: i32) {
        if width <= 0 || height <= 0 {
            self.width = 0;
            self.height = 0;
            self.cells = Vec::new();
            if let Some(shadow) = &mut self.shadow {
                shadow.clear();
            }
            return;
        }
        self.width = width;
        self.height = height;
        let count = width as usize * height as usize;
        self.cells = vec![Cell::default(); count];
        if let Some(shadow) = &mut self.shadow {
            *shadow = vec![Cell::default(); count];
        }
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x >= 0 && y >= 0 && x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    /// Cell at (x, y); `None` outside the grid.
    #[must_use]
    pub fn cell(&self, x: i32, y: i32) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    fn cell_mut(&mut self, x: i32, y: i32) -> &mut Cell {
        let i = self.index(x, y).expect("cell out of range");
        &mut self.cells[i]
    }

    /// Renderer access to cells, shadow, overflow text and patches in one
    /// borrow. `None` when the surface has no shadow or is empty.
    pub fn flush_view(&mut self) -> Option<FlushView<'_>> {
        let shadow = self.shadow.as_mut()?;
        if self.cells.is_empty() {
            return None;
        }
        Some(FlushView {
            width: self.width as usize,
            height: self.height as usize,
            cells: &self.cells,
            shadow,
            overflow: &self.overflow,
            patches: &self.patches,
        })
    }

    /// Text of a cluster head cell, resolved through the overflow table.
    /// Erased cells and padding cells yield `None`.
    #[must_use]
    pub fn cluster_text<'a>(&'a self, cell: &'a Cell) -> Option<&'a str> {
        match &cell.text {
            CellText::Inline { .. } => cell.text.inline_str(),
            CellText::Overflow(id) => Some(self.overflow.text(*id)),
            CellText::Erased | CellText::WideRightPadding => None,
        }
    }

    // --- interning and patches -------------------------------------------

    /// Number of live overflow entries.
    #[must_use]
    pub fn overflow_len(&self) -> usize {
        self.overflow.len()
    }

    fn collect_overflow_refs(&self) -> Vec<OverflowId> {
        let mut refs = Vec::new();
        let all = self
            .cells
            .iter()
            .chain(self.shadow.iter().flat_map(|s| s.iter()));
        for cell in all {
            if let CellText::Overflow(id) = cell.text {
                refs.push(id);
            }
        }
        refs
    }

    fn set_overflow_text(&mut self, x: i32, y: i32, text: &str) {
        if self.overflow.wants_gc() {
            self.overflow.clear_marks();
            for id in self.collect_overflow_refs() {
                self.overflow.mark(id);
            }
            self.overflow.sweep();
        }
        let id = self.overflow.intern(text);
        self.cell_mut(x, y).text = CellText::Overflow(id);
    }

    fn ensure_patch_idx(&mut self, optimize: bool, setup: &[u8], cleanup: &[u8]) -> u8 {
        let cells = &self.cells;
        let shadow = &self.shadow;
        self.patches.ensure(optimize, setup, cleanup, move |idx| {
            cells.iter().any(|c| c.patch_idx == idx)
                || shadow
                    .as_ref()
                    .is_some_and(|s| s.iter().any(|c| c.patch_idx == idx))
        })
    }

    fn apply_attr(&mut self, x: i32, y: i32, attr: &Attributes) {
        let patch_idx = match attr.patch() {
            Some(p) => {
                let (optimize, setup, cleanup) = (p.optimize, p.setup.clone(), p.cleanup.clone());
                self.ensure_patch_idx(optimize, &setup, &cleanup)
            }
            None => 0,
        };
        let cell = self.cell_mut(x, y);
        cell.fg = attr.fg();
        cell.bg = attr.bg();
        cell.deco = attr.deco();
        cell.style = attr.style();
        cell.patch_idx = patch_idx;
    }

    // --- vanish ----------------------------------------------------------

    /// Ensure the cells `[x, x + cluster_width)` belong to no multi-cell
    /// cluster: every cell of an overlapped cluster (in both directions)
    /// becomes a space carrying its old attributes.
    fn vanish_cluster(&mut self, x: i32, y: i32, cluster_width: i32) {
        let mut rightmost_vanished = x;

        if self.cell(x, y).is_some_and(|c| c.text.is_wide_right_padding()) {
            // walk right over the padding cells of the overlapped cluster
            let mut i = x;
            while self
                .cell(i, y)
                .is_some_and(|c| c.text.is_wide_right_padding())
            {
                self.cell_mut(i, y).make_space();
                rightmost_vanished = i;
                if i + 1 == self.width {
                    break;
                }
                i += 1;
            }

            // walk left to the head and space it out too
            let mut i = x - 1;
            while i >= 0 {
                let cell = self.cell_mut(i, y);
                let was_head = cell.expansion != 0;
                cell.make_space();
                if was_head {
                    break;
                }
                i -= 1;
            }
        }

        let mut i = rightmost_vanished;
        while i <= x + cluster_width - 1 && i < self.width {
            let expansion = i32::from(self.cell(i, y).map_or(0, |c| c.expansion));
            for j in 0..=expansion {
                if i + j >= self.width {
                    break;
                }
                self.cell_mut(i + j, y).make_space();
            }
            i += expansion + 1;
        }
    }

    // --- writes ----------------------------------------------------------

    pub fn write(&mut self, x: i32, y: i32, text: &str, fg: Color, bg: Color) {
        self.write_clipped(x, y, text, fg, bg, 0, self.width - 1);
    }

    pub fn write_clipped(
        &mut self,
        x: i32,
        y: i32,
        text: &str,
        fg: Color,
        bg: Color,
        clip_x0: i32,
        clip_x1: i32,
    ) {
        let attr = Attributes::new(fg, bg);
        self.write_attr_clipped(x, y, text, &attr, clip_x0, clip_x1);
    }

    pub fn write_attr(&mut self, x: i32, y: i32, text: &str, attr: &Attributes) {
        self.write_attr_clipped(x, y, text, attr, 0, self.width - 1);
    }

    /// Write `text` starting at (x, y), clipped to `[clip_x0, clip_x1]`.
    ///
    /// Cluster assembly: the first codepoint fixes the cluster width; any
    /// directly following zero-width codepoints join it, up to the 40-byte
    /// cluster limit. A leading zero-width codepoint is given a U+00A0
    /// base. DEL terminates an open cluster without being stored and
    /// writes an erased cell where it starts a cluster of its own.
    pub fn write_attr_clipped(
        &mut self,
        x: i32,
        y: i32,
        text: &str,
        attr: &Attributes,
        clip_x0: i32,
        clip_x1: i32,
    ) {
        if y < 0 || y >= self.height {
            return;
        }
        let clip_x0 = clip_x0.max(0);
        let clip_x1 = clip_x1.min(self.width - 1);

        let mut x = x;
        let mut chars = text.chars().peekable();

        while chars.peek().is_some() {
            if x > clip_x1 {
                return;
            }

            let mut cluster = [0u8; CLUSTER_BYTE_LIMIT];
            let mut cluster_len = 0usize;
            let mut cluster_width: i32 = 1;

            // keep this in sync with TextMeasurement::feed_codepoint
            while let Some(&cp) = chars.peek() {
                if cp == '\u{7f}' {
                    if cluster_len != 0 {
                        // terminates the open cluster, reprocessed as the
                        // start of the next one
                        break;
                    }
                    // clear marker: erased cell, no combining allowed
                    chars.next();
                    break;
                }

                let sanitized = replace_unusable(cp);
                let width = char_width(sanitized);

                if cluster_len == 0 {
                    if width == 0 {
                        // a leading zero-width codepoint gets a base
                        cluster_len +=
                            '\u{a0}'.encode_utf8(&mut cluster[cluster_len..]).len();
                    } else {
                        cluster_width = width as i32;
                    }
                    cluster_len += sanitized.encode_utf8(&mut cluster[cluster_len..]).len();
                } else {
                    if width > 0 {
                        // starts the next cluster, do not consume
                        break;
                    }
                    if cluster_len + sanitized.len_utf8() <= CLUSTER_BYTE_LIMIT {
                        cluster_len += sanitized.encode_utf8(&mut cluster[cluster_len..]).len();
                    }
                    // over the limit: further combining codepoints are
                    // dropped, most terminals gave up long before this
                }
                chars.next();
            }

            let cluster_str =
                core::str::from_utf8(&cluster[..cluster_len]).expect("built from chars");

            if cluster_width == 2 && x + 1 == clip_x0 {
                // split by the clip boundary: materialize the right half
                self.cell_mut(x + 1, y).expansion = 0;
                self.vanish_cluster(x + 1, y, cluster_width - 1);
                self.apply_attr(x + 1, y, attr);
                self.cell_mut(x + 1, y).make_space();
            } else if x + cluster_width - 1 > clip_x1 {
                if x >= clip_x0 && x <= clip_x1 {
                    // split by the clip boundary: materialize the left half
                    self.cell_mut(x, y).expansion = 0;
                    self.vanish_cluster(x, y, cluster_width - 1);
                    self.apply_attr(x, y, attr);
                    self.cell_mut(x, y).make_space();
                }
            } else if x >= clip_x0 {
                self.vanish_cluster(x, y, cluster_width);
                self.apply_attr(x, y, attr);

                let head = self.index(x, y).expect("in range");
                self.cells[head].expansion = (cluster_width - 1) as u8;
                if cluster_len == 0 {
                    self.cells[head].text = CellText::Erased;
                } else if cluster_len <= INLINE_TEXT_CAP {
                    self.cells[head].text = CellText::inline(cluster_str);
                } else {
                    let owned = cluster_str.to_owned();
                    self.set_overflow_text(x, y, &owned);
                }
                for i in 1..cluster_width {
                    self.apply_attr(x + i, y, attr);
                    let cell = self.cell_mut(x + i, y);
                    cell.expansion = 0;
                    cell.text = CellText::WideRightPadding;
                }
            }

            x += cluster_width;
        }
    }

    // --- clears ----------------------------------------------------------

    pub fn clear(&mut self, fg: Color, bg: Color) {
        self.clear_with_attr(&Attributes::new(fg, bg));
    }

    pub fn clear_with_attr(&mut self, attr: &Attributes) {
        self.clear_rect_with_attr(0, 0, self.width, self.height, attr);
    }

    pub fn clear_with_char(&mut self, fg: Color, bg: Color, cp: char) {
        self.clear_rect_with_char(0, 0, self.width, self.height, fg, bg, cp);
    }

    pub fn clear_rect(&mut self, x: i32, y: i32, width: i32, height: i32, fg: Color, bg: Color) {
        self.clear_rect_with_attr(x, y, width, height, &Attributes::new(fg, bg));
    }

    pub fn clear_rect_with_attr(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        attr: &Attributes,
    ) {
        self.clear_rect_impl(x, y, width, height, attr, None);
    }

    /// Clear filling with a codepoint instead of the erased marker. Wide
    /// or unusable codepoints fall back to the plain clear.
    pub fn clear_rect_with_attr_char(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        attr: &Attributes,
        cp: char,
    ) {
        let sanitized = replace_unusable(cp);
        if cp == '\u{7f}' || char_width(sanitized) != 1 {
            self.clear_rect_impl(x, y, width, height, attr, None);
        } else {
            self.clear_rect_impl(x, y, width, height, attr, Some(sanitized));
        }
    }

    pub fn clear_rect_with_char(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        fg: Color,
        bg: Color,
        cp: char,
    ) {
        self.clear_rect_with_attr_char(x, y, width, height, &Attributes::new(fg, bg), cp);
    }

    fn clear_rect_impl(
        &mut self,
        x: i32,
        y: i32,
        mut width: i32,
        mut height: i32,
        attr: &Attributes,
        fill: Option<char>,
    ) {
        let mut x = x;
        let mut y = y;
        if x < 0 {
            width += x;
            x = 0;
        }
        if y < 0 {
            height += y;
            y = 0;
        }
        if width <= 0 || x >= self.width || y >= self.height {
            return;
        }
        width = width.min(self.width - x);
        height = height.min(self.height - y);

        let text = fill.map(|c| {
            let mut buf = [0u8; 4];
            CellText::inline(c.encode_utf8(&mut buf))
        });

        for y1 in y..y + height {
            self.vanish_cluster(x, y1, 1);
            self.vanish_cluster(x + width - 1, y1, 1);
            for x1 in x..x + width {
                let fg = attr.fg();
                let bg = attr.bg();
                let style = attr.style();
                let cell = self.cell_mut(x1, y1);
                cell.expansion = 0;
                cell.text = text.unwrap_or(CellText::Erased);
                cell.fg = fg;
                cell.bg = bg;
                cell.deco = Color::DEFAULT;
                cell.style = style;
                cell.patch_idx = 0;
            }
        }
    }

    // --- per-cell attribute edits ----------------------------------------

    fn with_cluster_head<F: FnMut(&mut Cell)>(&mut self, x: i32, y: i32, mut apply: F) {
        let Some(cell) = self.cell(x, y) else { return };
        if cell.text.is_wide_right_padding() {
            // only the head of a multi-cell cluster may be used to change
            // it, which keeps naive per-cell loops from double-applying
            return;
        }
        let expansion = i32::from(cell.expansion);
        for i in 0..=expansion {
            if self.index(x + i, y).is_some() {
                apply(self.cell_mut(x + i, y));
            }
        }
    }

    pub fn set_fg(&mut self, x: i32, y: i32, fg: Color) {
        self.with_cluster_head(x, y, |cell| cell.fg = fg);
    }

    pub fn set_bg(&mut self, x: i32, y: i32, bg: Color) {
        self.with_cluster_head(x, y, |cell| cell.bg = bg);
    }

    pub fn set_deco(&mut self, x: i32, y: i32, deco: Color) {
        self.with_cluster_head(x, y, |cell| cell.deco = deco);
    }

    pub fn set_softwrap_marker(&mut self, x: i32, y: i32, state: bool) {
        let Some(cell) = self.cell(x, y) else { return };
        if cell.text.is_wide_right_padding() {
            return;
        }
        let cell = self.cell_mut(x, y);
        cell.style.set(Style::SOFTWRAP_MARKER, state);
    }

    /// Recolor every cluster; the callback sees and may replace the
    /// foreground, background and decoration colors.
    pub fn tint<F: FnMut(&mut Color, &mut Color, &mut Color)>(&mut self, mut recolor: F) {
        for y in 0..self.height {
            let mut x = 0;
            while x < self.width {
                let cell = self.cell(x, y).expect("in range");
                let mut fg = cell.fg;
                let mut bg = cell.bg;
                let mut deco = cell.deco;
                let expansion = i32::from(cell.expansion);

                recolor(&mut fg, &mut bg, &mut deco);

                // a cluster changes color as a unit
                for i in 0..=expansion {
                    let cell = self.cell_mut(x + i, y);
                    cell.fg = fg;
                    cell.bg = bg;
                    cell.deco = deco;
                }
                x += expansion + 1;
            }
        }
    }

    // --- peeks -----------------------------------------------------------

    #[must_use]
    pub fn peek_fg(&self, x: i32, y: i32) -> Color {
        self.cell(x, y).map_or(Color::DEFAULT, |c| c.fg)
    }

    #[must_use]
    pub fn peek_bg(&self, x: i32, y: i32) -> Color {
        self.cell(x, y).map_or(Color::DEFAULT, |c| c.bg)
    }

    #[must_use]
    pub fn peek_deco(&self, x: i32, y: i32) -> Color {
        self.cell(x, y).map_or(Color::DEFAULT, |c| c.deco)
    }

    /// Style bits without the soft-wrap marker.
    #[must_use]
    pub fn peek_style(&self, x: i32, y: i32) -> Style {
        self.cell(x, y)
            .map_or(Style::empty(), |c| c.style & Style::ATTR_MASK)
    }

    #[must_use]
    pub fn peek_softwrap_marker(&self, x: i32, y: i32) -> bool {
        self.cell(x, y)
            .is_some_and(|c| c.style.contains(Style::SOFTWRAP_MARKER))
    }

    /// Patch fragments of the cell, if any.
    #[must_use]
    pub fn peek_patch(&self, x: i32, y: i32) -> Option<(&[u8], &[u8], bool)> {
        let cell = self.cell(x, y)?;
        let patch = self.patches.get(cell.patch_idx)?;
        Some((&patch.setup, &patch.cleanup, patch.optimize))
    }

    /// Cluster text at (x, y) together with the cluster's cell extent
    /// `[left, right]`. For erased cells the text is [`ERASED`].
    #[must_use]
    pub fn peek_text(&self, x: i32, y: i32) -> (&str, i32, i32) {
        let Some(mut cell) = self.cell(x, y) else {
            return (ERASED, x, x);
        };
        let mut left = x;
        while left > 0 && cell.text.is_wide_right_padding() {
            left -= 1;
            cell = self.cell(left, y).expect("in range");
        }

        let text = match &cell.text {
            CellText::Inline { .. } => cell.text.inline_str().unwrap_or(ERASED),
            CellText::Overflow(id) => self.overflow.text(*id),
            CellText::Erased | CellText::WideRightPadding => ERASED,
        };
        (text, left, left + i32::from(cell.expansion))
    }

    /// Compare visible contents (colors, styles, patches, cluster text and
    /// extents, soft-wrap markers) of two surfaces.
    #[must_use]
    pub fn same_contents(&self, other: &Surface) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.width != other.width || self.height != other.height {
            return false;
        }
        for y in 0..self.height {
            for x in 0..self.width {
                if self.peek_fg(x, y) != other.peek_fg(x, y)
                    || self.peek_bg(x, y) != other.peek_bg(x, y)
                    || self.peek_deco(x, y) != other.peek_deco(x, y)
                    || self.peek_style(x, y) != other.peek_style(x, y)
                    || self.peek_softwrap_marker(x, y) != other.peek_softwrap_marker(x, y)
                    || self.peek_patch(x, y) != other.peek_patch(x, y)
                    || self.peek_text(x, y) != other.peek_text(x, y)
                {
                    return false;
                }
            }
        }
        true
    }

    // --- copies ----------------------------------------------------------

    /// Copy of this surface's contents in a fresh (shadow-less) surface.
    #[must_use]
    pub fn duplicate(&self) -> Surface {
        let mut copy = Surface::new(self.width, self.height);
        copy.copy_rect(
            self,
            0,
            0,
            self.width,
            self.height,
            0,
            0,
            CopyTile::NoTile,
            CopyTile::NoTile,
        );
        copy
    }

    /// Copy `width` × `height` cells from `src` at (x, y) to (dst_x, dst_y)
    /// on `self`. `tile_left`/`tile_right` select the edge handling for
    /// clusters cut by the region boundary.
    #[allow(clippy::too_many_arguments, clippy::too_many_lines)]
    pub fn copy_rect(
        &mut self,
        src: &Surface,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        dst_x: i32,
        dst_y: i32,
        tile_left: CopyTile,
        tile_right: CopyTile,
    ) {
        let mut x = x;
        let mut y = y;
        let mut width = width;
        let mut height = height;
        let mut dst_x = dst_x;
        let mut dst_y = dst_y;
        let mut tile_left = tile_left;
        let mut tile_right = tile_right;

        if x < 0 {
            width += x;
            dst_x -= x;
            x = 0;
            tile_left = CopyTile::NoTile;
        }
        if y < 0 {
            dst_y -= y;
            height += y;
            y = 0;
        }
        if x >= src.width || y >= src.height {
            return;
        }
        if x + width > src.width {
            width = src.width - x;
            tile_right = CopyTile::NoTile;
        }
        if y + height > src.height {
            height = src.height - y;
        }
        if dst_x < 0 {
            x -= dst_x;
            width += dst_x;
            dst_x = 0;
            tile_left = CopyTile::NoTile;
        }
        if dst_y < 0 {
            y -= dst_y;
            height += dst_y;
            dst_y = 0;
        }
        if dst_x + width > self.width {
            width = self.width - dst_x;
            tile_right = CopyTile::NoTile;
        }
        if tile_right == CopyTile::Put && dst_x + width + 1 >= self.width {
            tile_right = CopyTile::NoTile;
        }
        if dst_y + height >= self.height {
            height = self.height - dst_y;
        }
        if width <= 0 || height <= 0 {
            return;
        }

        for y_off in 0..height {
            let mut in_complete_cluster = false;
            let mut x_start = 0;

            let src_cell = src.cell(x, y + y_off).expect("in range");
            if src_cell.text.is_wide_right_padding() {
                if tile_left == CopyTile::Preserve {
                    for i in 0..width {
                        let src_scan = src.cell(x + i, y + y_off).expect("in range");
                        let dst_scan = self.cell(dst_x + i, dst_y + y_off).expect("in range");

                        if !src_scan.text.is_wide_right_padding()
                            && !dst_scan.text.is_wide_right_padding()
                        {
                            // end of cluster in both surfaces: skip over the
                            // equal-length cluster prefix
                            x_start = i;
                            break;
                        }
                        if !dst_scan.text.is_wide_right_padding() {
                            // destination cluster is shorter or shifted:
                            // not valid tiling
                            break;
                        }
                        if i == width - 1 {
                            // the whole source line is one cluster and the
                            // destination has one there too
                            x_start = width;
                        }
                    }
                } else if tile_left == CopyTile::Put && x > 0 && dst_x > 0 {
                    let head = src.cell(x - 1, y + y_off).expect("in range");
                    if !head.text.is_wide_right_padding()
                        && head.expansion > 0
                        && i32::from(head.expansion) <= width
                    {
                        in_complete_cluster = true;
                        self.vanish_cluster(
                            dst_x - 1,
                            dst_y + y_off,
                            i32::from(head.expansion) + 1,
                        );
                        self.copy_cell_payload(src, x - 1, y + y_off, dst_x - 1, dst_y + y_off);
                        self.cell_mut(dst_x - 1, dst_y + y_off).expansion = head.expansion;
                    }
                }
            }

            let mut extra_width = 0;
            let mut x_off = x_start;
            while x_off < width + extra_width {
                let src_cell = *src.cell(x + x_off, y + y_off).expect("in range");

                if src_cell.text.is_wide_right_padding() {
                    self.vanish_cluster(dst_x + x_off, dst_y + y_off, 1);
                    self.copy_cell_attrs(src, &src_cell, dst_x + x_off, dst_y + y_off);
                    let dst_cell = self.cell_mut(dst_x + x_off, dst_y + y_off);
                    if in_complete_cluster {
                        dst_cell.text = CellText::WideRightPadding;
                        dst_cell.expansion = 0;
                    } else {
                        dst_cell.make_space();
                    }
                } else {
                    if tile_right == CopyTile::Preserve
                        && src_cell.expansion > 0
                        && x_off + i32::from(src_cell.expansion) >= width
                    {
                        let dst_cell = self.cell(dst_x + x_off, dst_y + y_off).expect("in range");
                        if src_cell.expansion == dst_cell.expansion {
                            // same cluster length in both: preserve it
                            break;
                        }
                    }

                    self.vanish_cluster(
                        dst_x + x_off,
                        dst_y + y_off,
                        i32::from(src_cell.expansion) + 1,
                    );
                    self.copy_cell_attrs(src, &src_cell, dst_x + x_off, dst_y + y_off);

                    let mut vanish = false;
                    if src_cell.expansion > 0 {
                        if x_off + i32::from(src_cell.expansion) >= width {
                            if tile_right == CopyTile::Put && src_cell.expansion == 1 {
                                extra_width = 1;
                                self.cell_mut(dst_x + x_off, dst_y + y_off).expansion =
                                    src_cell.expansion;
                                in_complete_cluster = true;
                            } else {
                                vanish = true;
                                in_complete_cluster = false;
                            }
                        } else {
                            self.cell_mut(dst_x + x_off, dst_y + y_off).expansion =
                                src_cell.expansion;
                            in_complete_cluster = true;
                        }
                    } else {
                        self.cell_mut(dst_x + x_off, dst_y + y_off).expansion = 0;
                        in_complete_cluster = false;
                    }

                    if vanish {
                        self.cell_mut(dst_x + x_off, dst_y + y_off).make_space();
                    } else {
                        self.copy_cell_text(src, &src_cell, dst_x + x_off, dst_y + y_off);
                    }
                }
                x_off += 1;
            }
        }
    }

    /// Same-surface copy; overlap is handled through a one-cell-padded
    /// temporary surface.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_rect_within(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        dst_x: i32,
        dst_y: i32,
        tile_left: CopyTile,
        tile_right: CopyTile,
    ) {
        let pad_left = i32::from(x != 0);
        let pad_top = i32::from(y != 0);
        let pad_right = i32::from(x + width != self.width);
        let pad_bottom = i32::from(y + height != self.height);

        let mut temp = Surface::new(width + pad_left + pad_right, height + pad_top + pad_bottom);
        temp.copy_rect(
            self,
            x - pad_left,
            y - pad_top,
            temp.width,
            temp.height,
            0,
            0,
            CopyTile::NoTile,
            CopyTile::NoTile,
        );
        self.copy_rect(
            &temp,
            pad_left,
            pad_top,
            width,
            height,
            dst_x,
            dst_y,
            tile_left,
            tile_right,
        );
    }

    fn copy_cell_attrs(&mut self, src: &Surface, src_cell: &Cell, dst_x: i32, dst_y: i32) {
        let patch_idx = if let Some(patch) = src.patches.get(src_cell.patch_idx) {
            let (optimize, setup, cleanup) =
                (patch.optimize, patch.setup.clone(), patch.cleanup.clone());
            self.ensure_patch_idx(optimize, &setup, &cleanup)
        } else {
            0
        };
        let dst_cell = self.cell_mut(dst_x, dst_y);
        dst_cell.fg = src_cell.fg;
        dst_cell.bg = src_cell.bg;
        dst_cell.deco = src_cell.deco;
        dst_cell.style = src_cell.style;
        dst_cell.patch_idx = patch_idx;
    }

    fn copy_cell_text(&mut self, src: &Surface, src_cell: &Cell, dst_x: i32, dst_y: i32) {
        match src_cell.text {
            CellText::Inline { .. } => {
                self.cell_mut(dst_x, dst_y).text = src_cell.text;
            }
            CellText::Overflow(id) => {
                let text = src.overflow.text(id).to_owned();
                self.set_overflow_text(dst_x, dst_y, &text);
            }
            CellText::Erased => {
                self.cell_mut(dst_x, dst_y).text = CellText::Erased;
            }
            CellText::WideRightPadding => {
                self.cell_mut(dst_x, dst_y).text = CellText::WideRightPadding;
            }
        }
    }

    fn copy_cell_payload(&mut self, src: &Surface, x: i32, y: i32, dst_x: i32, dst_y: i32) {
        let src_cell = *src.cell(x, y).expect("in range");
        self.copy_cell_attrs(src, &src_cell, dst_x, dst_y);
        self.copy_cell_text(src, &src_cell, dst_x, dst_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn surface(w: i32, h: i32) -> Surface {
        let mut s = Surface::new(w, h);
        s.clear(Color::DEFAULT, Color::DEFAULT);
        s
    }

    #[test]
    fn test_simple_write_and_peek() {
        let mut s = surface(80, 24);
        s.write(10, 3, "Sample", Color::DEFAULT, Color::DEFAULT);
        for (i, ch) in "Sample".chars().enumerate() {
            let (text, left, right) = s.peek_text(10 + i as i32, 3);
            assert_eq!(text, ch.to_string());
            assert_eq!(left, 10 + i as i32);
            assert_eq!(right, left);
        }
        assert_eq!(s.peek_text(9, 3).0, ERASED);
        assert_eq!(s.peek_text(16, 3).0, ERASED);
    }

    #[test]
    fn test_write_stops_at_right_edge() {
        let mut s = surface(10, 2);
        s.write(8, 0, "abcd", Color::DEFAULT, Color::DEFAULT);
        assert_eq!(s.peek_text(8, 0).0, "a");
        assert_eq!(s.peek_text(9, 0).0, "b");
        assert_eq!(s.peek_text(0, 1).0, ERASED);
    }

    #[test]
    fn test_negative_y_is_noop() {
        let mut s = surface(10, 2);
        s.write(0, -1, "abc", Color::RED, Color::DEFAULT);
        assert_eq!(s.peek_fg(0, 0), Color::DEFAULT);
    }

    #[test]
    fn test_wide_cluster_layout() {
        let mut s = surface(10, 2);
        s.write(3, 0, "あ", Color::DEFAULT, Color::DEFAULT);
        let head = s.cell(3, 0).unwrap();
        assert_eq!(head.expansion, 1);
        assert!(s.cell(4, 0).unwrap().text.is_wide_right_padding());
        let (text, left, right) = s.peek_text(4, 0);
        assert_eq!((text, left, right), ("あ", 3, 4));
    }

    #[test]
    fn test_vanish_on_overwrite() {
        let mut s = surface(10, 2);
        s.write(3, 0, "あえ", Color::RED, Color::GREEN);
        s.write(4, 0, "ab", Color::YELLOW, Color::BLUE);

        assert_eq!(s.peek_text(3, 0).0, " ");
        assert_eq!(s.peek_fg(3, 0), Color::RED);
        assert_eq!(s.peek_bg(3, 0), Color::GREEN);
        assert_eq!(s.peek_text(4, 0).0, "a");
        assert_eq!(s.peek_fg(4, 0), Color::YELLOW);
        assert_eq!(s.peek_text(5, 0).0, "b");
        assert_eq!(s.peek_text(6, 0).0, " ");
        assert_eq!(s.peek_bg(6, 0), Color::GREEN);
    }

    #[test]
    fn test_overwrite_wide_head_before_adjacent_wide() {
        // single cell, then a wide cluster; a wide write over both must
        // vanish the second cluster completely
        let mut s = surface(10, 2);
        s.write(0, 0, "aあ", Color::DEFAULT, Color::DEFAULT);
        s.write(0, 0, "い", Color::DEFAULT, Color::DEFAULT);
        assert_eq!(s.peek_text(0, 0), ("い", 0, 1));
        assert_eq!(s.peek_text(2, 0).0, " ");
        assert!(!s.cell(2, 0).unwrap().text.is_wide_right_padding());
    }

    #[test]
    fn test_combining_mark_stays_with_base() {
        let mut s = surface(10, 2);
        s.write(1, 0, "a\u{308}b", Color::DEFAULT, Color::DEFAULT);
        assert_eq!(s.peek_text(1, 0).0, "a\u{308}");
        assert_eq!(s.peek_text(2, 0).0, "b");
    }

    #[test]
    fn test_leading_combining_mark_gets_nbsp_base() {
        let mut s = surface(10, 2);
        s.write(0, 0, "\u{308}x", Color::DEFAULT, Color::DEFAULT);
        assert_eq!(s.peek_text(0, 0).0, "\u{a0}\u{308}");
        assert_eq!(s.peek_text(1, 0).0, "x");
    }

    #[test]
    fn test_del_clears_cell_and_cluster() {
        let mut s = surface(10, 2);
        s.write(0, 0, "a\u{7f}b", Color::DEFAULT, Color::DEFAULT);
        assert_eq!(s.peek_text(0, 0).0, "a");
        assert_eq!(s.peek_text(1, 0).0, ERASED);
        assert_eq!(s.peek_text(2, 0).0, "b");
    }

    #[test]
    fn test_long_cluster_goes_to_overflow() {
        let mut s = surface(10, 2);
        // base + 8 combining marks exceeds the 8-byte inline capacity
        let text: String = std::iter::once('a')
            .chain(std::iter::repeat_n('\u{308}', 8))
            .collect();
        s.write(0, 0, &text, Color::DEFAULT, Color::DEFAULT);
        assert!(matches!(s.cell(0, 0).unwrap().text, CellText::Overflow(_)));
        assert_eq!(s.peek_text(0, 0).0, text);
    }

    #[test]
    fn test_cluster_byte_limit_drops_excess_marks() {
        let mut s = surface(10, 2);
        let text: String = std::iter::once('a')
            .chain(std::iter::repeat_n('\u{308}', 40))
            .collect();
        s.write(0, 0, &text, Color::DEFAULT, Color::DEFAULT);
        let (stored, _, _) = s.peek_text(0, 0);
        assert!(stored.len() <= CLUSTER_BYTE_LIMIT);
        assert!(stored.starts_with("a\u{308}"));
    }

    #[test]
    fn test_clip_splits_wide_cluster() {
        let mut s = surface(10, 2);
        s.write(0, 0, "ああ", Color::RED, Color::GREEN);
        // write "い" so its left half lands outside the clip
        s.write_clipped(3, 0, "い", Color::YELLOW, Color::BLUE, 4, 9);
        assert_eq!(s.peek_text(4, 0).0, " ");
        assert_eq!(s.peek_bg(4, 0), Color::BLUE);
        // the overlapped "あ" lost its other half
        assert_eq!(s.peek_text(3, 0).0, " ");
        assert_eq!(s.peek_bg(3, 0), Color::GREEN);
    }

    #[test]
    fn test_clip_right_boundary_splits_cluster() {
        let mut s = surface(10, 2);
        s.write_clipped(4, 0, "あ", Color::YELLOW, Color::BLUE, 0, 4);
        assert_eq!(s.peek_text(4, 0).0, " ");
        assert_eq!(s.peek_bg(4, 0), Color::BLUE);
        assert_eq!(s.peek_text(5, 0).0, ERASED);
    }

    #[test]
    fn test_clear_rect_vanishes_edge_clusters() {
        let mut s = surface(10, 2);
        s.write(1, 0, "あ", Color::RED, Color::GREEN);
        s.clear_rect(2, 0, 3, 1, Color::DEFAULT, Color::DEFAULT);
        assert_eq!(s.peek_text(1, 0).0, " ");
        assert_eq!(s.peek_text(2, 0).0, ERASED);
    }

    #[test]
    fn test_clear_rect_with_char() {
        let mut s = surface(4, 2);
        s.clear_rect_with_char(0, 0, 4, 1, Color::DEFAULT, Color::DEFAULT, '.');
        assert_eq!(s.peek_text(0, 0).0, ".");
        assert_eq!(s.peek_text(3, 0).0, ".");
        assert_eq!(s.peek_text(0, 1).0, ERASED);
    }

    #[test]
    fn test_clear_rect_with_wide_char_falls_back() {
        let mut s = surface(4, 1);
        s.clear_rect_with_char(0, 0, 4, 1, Color::DEFAULT, Color::DEFAULT, 'あ');
        assert_eq!(s.peek_text(0, 0).0, ERASED);
    }

    #[test]
    fn test_set_colors_apply_to_whole_cluster() {
        let mut s = surface(10, 1);
        s.write(0, 0, "あ", Color::DEFAULT, Color::DEFAULT);
        s.set_fg(0, 0, Color::RED);
        assert_eq!(s.cell(0, 0).unwrap().fg, Color::RED);
        assert_eq!(s.cell(1, 0).unwrap().fg, Color::RED);
        // padding cells cannot be used to change the cluster
        s.set_fg(1, 0, Color::BLUE);
        assert_eq!(s.cell(0, 0).unwrap().fg, Color::RED);
    }

    #[test]
    fn test_softwrap_marker_roundtrip() {
        let mut s = surface(10, 2);
        s.write(9, 0, "x", Color::DEFAULT, Color::DEFAULT);
        s.set_softwrap_marker(9, 0, true);
        assert!(s.peek_softwrap_marker(9, 0));
        s.set_softwrap_marker(9, 0, false);
        assert!(!s.peek_softwrap_marker(9, 0));
    }

    #[test]
    fn test_tint_recolors_clusters() {
        let mut s = surface(10, 1);
        s.write(0, 0, "aあ", Color::RED, Color::DEFAULT);
        s.tint(|fg, _bg, _deco| {
            if *fg == Color::RED {
                *fg = Color::BLUE;
            }
        });
        assert_eq!(s.peek_fg(0, 0), Color::BLUE);
        assert_eq!(s.peek_fg(1, 0), Color::BLUE);
        assert_eq!(s.peek_fg(2, 0), Color::BLUE);
    }

    #[test]
    fn test_duplicate_has_same_contents() {
        let mut s = surface(20, 4);
        s.write(0, 0, "hello あえ\u{308} world", Color::RED, Color::GREEN);
        s.set_softwrap_marker(19, 0, true);
        let copy = s.duplicate();
        assert!(s.same_contents(&copy));
    }

    #[test]
    fn test_same_contents_detects_difference() {
        let mut a = surface(5, 1);
        let mut b = surface(5, 1);
        a.write(0, 0, "x", Color::DEFAULT, Color::DEFAULT);
        b.write(0, 0, "y", Color::DEFAULT, Color::DEFAULT);
        assert!(!a.same_contents(&b));
    }

    #[test]
    fn test_copy_rect_no_tile_erases_partial_clusters() {
        let mut src = surface(10, 1);
        src.write(0, 0, "あbc", Color::DEFAULT, Color::DEFAULT);
        let mut dst = surface(10, 1);
        // copy starting mid-cluster
        dst.copy_rect(&src, 1, 0, 3, 1, 1, 0, CopyTile::NoTile, CopyTile::NoTile);
        assert_eq!(dst.peek_text(1, 0).0, " ");
        assert_eq!(dst.peek_text(2, 0).0, "b");
        assert_eq!(dst.peek_text(3, 0).0, "c");
    }

    #[test]
    fn test_copy_rect_put_carries_partial_cluster() {
        let mut src = surface(10, 1);
        src.write(0, 0, "あbc", Color::DEFAULT, Color::DEFAULT);
        let mut dst = surface(10, 1);
        dst.copy_rect(&src, 1, 0, 3, 1, 1, 0, CopyTile::Put, CopyTile::NoTile);
        // the wide cluster is carried over in full, head landing at 0
        assert_eq!(dst.peek_text(0, 0), ("あ", 0, 1));
        assert_eq!(dst.peek_text(2, 0).0, "b");
    }

    #[test]
    fn test_copy_rect_preserve_keeps_matching_cluster() {
        let mut src = surface(10, 1);
        src.write(0, 0, "あx", Color::RED, Color::DEFAULT);
        let mut dst = surface(10, 1);
        dst.write(0, 0, "あy", Color::BLUE, Color::DEFAULT);
        // region starts on the padding cell of a cluster matching in both
        dst.copy_rect(&src, 1, 0, 2, 1, 1, 0, CopyTile::Preserve, CopyTile::NoTile);
        assert_eq!(dst.peek_text(0, 0), ("あ", 0, 1));
        assert_eq!(dst.peek_fg(0, 0), Color::BLUE);
        assert_eq!(dst.peek_text(2, 0).0, "x");
    }

    #[test]
    fn test_copy_rect_within_overlapping() {
        let mut s = surface(10, 1);
        s.write(0, 0, "abcdef", Color::DEFAULT, Color::DEFAULT);
        s.copy_rect_within(0, 0, 6, 1, 2, 0, CopyTile::NoTile, CopyTile::NoTile);
        for (i, ch) in "abcdef".chars().enumerate() {
            assert_eq!(s.peek_text(2 + i as i32, 0).0, ch.to_string());
        }
    }

    #[test]
    fn test_resize_discards_content() {
        let mut s = surface(10, 2);
        s.write(0, 0, "abc", Color::DEFAULT, Color::DEFAULT);
        s.resize(5, 1);
        assert_eq!(s.width(), 5);
        assert_eq!(s.height(), 1);
        assert_eq!(s.peek_text(0, 0).0, ERASED);
    }

    #[test]
    fn test_zero_size_surface_ignores_writes() {
        let mut s = Surface::new(0, 0);
        s.write(0, 0, "abc", Color::DEFAULT, Color::DEFAULT);
        s.clear(Color::DEFAULT, Color::DEFAULT);
        assert_eq!(s.peek_text(0, 0).0, ERASED);
    }

    #[test]
    fn test_overflow_gc_keeps_referenced_entries() {
        let mut s = surface(40, 2);
        let long: String = std::iter::once('a')
            .chain(std::iter::repeat_n('\u{308}', 8))
            .collect();
        // churn many distinct long clusters through one cell
        for i in 0..100 {
            let text: String = std::iter::once(char::from_u32('b' as u32 + i % 20).unwrap())
                .chain(std::iter::repeat_n('\u{308}', 8))
                .collect();
            s.write(0, 0, &text, Color::DEFAULT, Color::DEFAULT);
        }
        s.write(2, 0, &long, Color::DEFAULT, Color::DEFAULT);
        assert_eq!(s.peek_text(2, 0).0, long);
        // far fewer live entries than the 101 interned over time
        assert!(s.overflow_len() <= 32);
    }

    #[test]
    fn test_patch_attributes_roundtrip() {
        let mut s = surface(10, 1);
        let mut attr = Attributes::new(Color::DEFAULT, Color::DEFAULT);
        attr.set_patch(true, b"\x1b[8m", b"\x1b[28m");
        s.write_attr(0, 0, "x", &attr);
        let (setup, cleanup, optimize) = s.peek_patch(0, 0).unwrap();
        assert_eq!(setup, b"\x1b[8m");
        assert_eq!(cleanup, b"\x1b[28m");
        assert!(optimize);
        assert_eq!(s.peek_patch(1, 0), None);
    }
}
