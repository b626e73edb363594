//! In-process layout functions.
//!
//! A layout takes the attach-ordered tiled clients of one view and produces
//! one outer box (border included) per client. Tile, bottom-stack and grid
//! boxes never overlap; monocle and the deck's stack column stack boxes on
//! purpose since only the topmost of them is visible.

use super::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    Tile,
    Bstack,
    Monocle,
    Grid,
    Deck,
    Floating,
}

impl LayoutKind {
    pub const ALL: [LayoutKind; 6] = [
        LayoutKind::Tile,
        LayoutKind::Bstack,
        LayoutKind::Monocle,
        LayoutKind::Grid,
        LayoutKind::Deck,
        LayoutKind::Floating,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LayoutKind::Tile => "tile",
            LayoutKind::Bstack => "bstack",
            LayoutKind::Monocle => "monocle",
            LayoutKind::Grid => "grid",
            LayoutKind::Deck => "deck",
            LayoutKind::Floating => "floating",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Base symbol, without the monocle client count.
    pub fn symbol(self) -> &'static str {
        match self {
            LayoutKind::Tile => "[]=",
            LayoutKind::Bstack => "TTT",
            LayoutKind::Monocle => "[M]",
            LayoutKind::Grid => "###",
            LayoutKind::Deck => "[D]",
            LayoutKind::Floating => "><>",
        }
    }

    /// Label shown for a monitor with `visible` tiled clients.
    pub fn label(self, visible: usize) -> String {
        match self {
            LayoutKind::Monocle if visible > 0 => format!("[{}]", visible),
            _ => self.symbol().to_string(),
        }
    }

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn arranges(self) -> bool {
        self != LayoutKind::Floating
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LayoutParams {
    pub area: Rect,
    pub master_count: u32,
    pub master_fraction: f32,
    /// Space between boxes and around the area edge.
    pub gap: u32,
}

/// Compute outer boxes for `factors.len()` clients, one size factor each.
/// Returns an empty list for the floating layout.
pub fn arrange(kind: LayoutKind, params: &LayoutParams, factors: &[f32]) -> Vec<Rect> {
    if factors.is_empty() {
        return vec![];
    }
    let area = if params.gap > 0 {
        params.area.inset(params.gap)
    } else {
        params.area
    };
    match kind {
        LayoutKind::Tile => tile(&area, params, factors, false),
        LayoutKind::Bstack => tile(&area, params, factors, true),
        LayoutKind::Monocle => vec![area; factors.len()],
        LayoutKind::Grid => grid(&area, params.gap, factors.len()),
        LayoutKind::Deck => deck(&area, params, factors),
        LayoutKind::Floating => vec![],
    }
}

/// Split `total` pixels starting at `start` into segments proportional to
/// `weights`, leaving `gap` pixels between consecutive segments. Segments
/// are derived from cumulative offsets so they never overlap.
fn split(start: i32, total: u32, weights: &[f32], gap: u32) -> Vec<(i32, u32)> {
    let n = weights.len();
    if n == 0 {
        return vec![];
    }
    let gaps = gap as i64 * (n as i64 - 1);
    let avail = (total as i64 - gaps).max(n as i64);
    let weights: Vec<f64> = weights
        .iter()
        .map(|w| if *w > 0.0 { *w as f64 } else { 1.0 })
        .collect();
    let sum: f64 = weights.iter().sum();

    let mut out = Vec::with_capacity(n);
    let mut acc = 0.0;
    let mut prev = 0i64;
    for (i, w) in weights.iter().enumerate() {
        acc += w;
        let end = if i + 1 == n {
            avail
        } else {
            ((avail as f64) * acc / sum).floor() as i64
        };
        let len = (end - prev).max(1);
        out.push((start + (prev + gap as i64 * i as i64) as i32, len as u32));
        prev = end;
    }
    out
}

fn tile(area: &Rect, params: &LayoutParams, factors: &[f32], bottom: bool) -> Vec<Rect> {
    let n = factors.len();
    let masters = (params.master_count as usize).min(n);
    let (master_factors, stack_factors) = factors.split_at(masters);

    // Extent along the axis the master/stack split happens on.
    let (origin, extent) = if bottom {
        (area.y, area.height)
    } else {
        (area.x, area.width)
    };
    let columns = if masters > 0 && !stack_factors.is_empty() {
        let fraction = params.master_fraction.clamp(0.05, 0.95);
        split(origin, extent, &[fraction, 1.0 - fraction], params.gap)
    } else {
        vec![(origin, extent)]
    };

    let mut out = Vec::with_capacity(n);
    let mut groups = Vec::new();
    if masters > 0 {
        groups.push(master_factors);
    }
    if !stack_factors.is_empty() {
        groups.push(stack_factors);
    }
    for (group, (col_start, col_len)) in groups.into_iter().zip(columns) {
        let (cross_start, cross_len) = if bottom {
            (area.x, area.width)
        } else {
            (area.y, area.height)
        };
        for (pos, len) in split(cross_start, cross_len, group, params.gap) {
            out.push(if bottom {
                Rect::new(pos, col_start, len, col_len)
            } else {
                Rect::new(col_start, pos, col_len, len)
            });
        }
    }
    out
}

fn grid(area: &Rect, gap: u32, n: usize) -> Vec<Rect> {
    let mut cols = 1;
    while cols * cols < n {
        cols += 1;
    }
    let rows = n.div_ceil(cols);
    let row_boxes = split(area.y, area.height, &vec![1.0f32; rows], gap);

    let mut out = Vec::with_capacity(n);
    for (r, (y, h)) in row_boxes.into_iter().enumerate() {
        let in_row = cols.min(n - r * cols);
        for (x, w) in split(area.x, area.width, &vec![1.0f32; in_row], gap) {
            out.push(Rect::new(x, y, w, h));
        }
    }
    out
}

fn deck(area: &Rect, params: &LayoutParams, factors: &[f32]) -> Vec<Rect> {
    let masters = (params.master_count as usize).min(factors.len());
    if masters == 0 || masters == factors.len() {
        return tile(area, params, factors, false);
    }
    let mut out = tile(area, params, &factors[..masters + 1], false);
    let stack_box = out[masters];
    out.resize(factors.len(), stack_box);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(master_count: u32, gap: u32) -> LayoutParams {
        LayoutParams {
            area: Rect::new(0, 20, 1000, 600),
            master_count,
            master_fraction: 0.6,
            gap,
        }
    }

    fn assert_disjoint(boxes: &[Rect]) {
        for (i, a) in boxes.iter().enumerate() {
            for b in &boxes[i + 1..] {
                assert_eq!(a.overlap_area(b), 0, "{:?} overlaps {:?}", a, b);
            }
        }
    }

    fn assert_inside(boxes: &[Rect], area: &Rect) {
        for b in boxes {
            assert!(b.x >= area.x && b.right() <= area.right(), "{:?}", b);
            assert!(b.y >= area.y && b.bottom() <= area.bottom(), "{:?}", b);
        }
    }

    #[test]
    fn test_single_client_fills_area() {
        let boxes = arrange(LayoutKind::Tile, &params(1, 0), &[1.0]);
        assert_eq!(boxes, vec![Rect::new(0, 20, 1000, 600)]);
    }

    #[test]
    fn test_tile_master_and_stack() {
        let boxes = arrange(LayoutKind::Tile, &params(1, 0), &[1.0, 1.0, 1.0]);
        assert_eq!(boxes[0], Rect::new(0, 20, 600, 600));
        assert_eq!(boxes[1], Rect::new(600, 20, 400, 300));
        assert_eq!(boxes[2], Rect::new(600, 320, 400, 300));
    }

    #[test]
    fn test_tile_size_factor_weights_column() {
        let boxes = arrange(LayoutKind::Tile, &params(0, 0), &[1.0, 3.0]);
        assert_eq!(boxes[0].height, 150);
        assert_eq!(boxes[1].height, 450);
    }

    #[test]
    fn test_layouts_without_overlap() {
        for kind in [LayoutKind::Tile, LayoutKind::Bstack, LayoutKind::Grid] {
            for n in 1..12 {
                for gap in [0, 7] {
                    let p = params(2, gap);
                    let factors: Vec<f32> = (0..n).map(|i| 1.0 + (i % 3) as f32 * 0.5).collect();
                    let boxes = arrange(kind, &p, &factors);
                    assert_eq!(boxes.len(), n, "{:?} n={}", kind, n);
                    assert_disjoint(&boxes);
                    assert_inside(&boxes, &p.area);
                }
            }
        }
    }

    #[test]
    fn test_gaps_inset_area() {
        let boxes = arrange(LayoutKind::Tile, &params(1, 10), &[1.0, 1.0]);
        assert_eq!(boxes[0].x, 10);
        assert_eq!(boxes[0].y, 30);
        assert_eq!(boxes[1].right(), 990);
        assert_eq!(boxes[1].x - boxes[0].right(), 10);
    }

    #[test]
    fn test_bstack_masters_on_top() {
        let boxes = arrange(LayoutKind::Bstack, &params(1, 0), &[1.0, 1.0, 1.0]);
        assert_eq!(boxes[0], Rect::new(0, 20, 1000, 360));
        assert_eq!(boxes[1].y, 380);
        assert_eq!(boxes[1].width + boxes[2].width, 1000);
    }

    #[test]
    fn test_grid_last_row_spreads() {
        let boxes = arrange(LayoutKind::Grid, &params(1, 0), &[1.0; 5]);
        assert_eq!(boxes.len(), 5);
        assert_eq!(boxes[3].width, 500);
        assert_eq!(boxes[4].width, 500);
    }

    #[test]
    fn test_deck_stacks_share_one_box() {
        let boxes = arrange(LayoutKind::Deck, &params(1, 0), &[1.0; 4]);
        assert_eq!(boxes[1], boxes[2]);
        assert_eq!(boxes[2], boxes[3]);
        assert_eq!(boxes[0].overlap_area(&boxes[1]), 0);
    }

    #[test]
    fn test_floating_and_monocle() {
        assert!(arrange(LayoutKind::Floating, &params(1, 0), &[1.0, 1.0]).is_empty());
        let boxes = arrange(LayoutKind::Monocle, &params(1, 0), &[1.0, 1.0]);
        assert_eq!(boxes[0], boxes[1]);
    }

    #[test]
    fn test_labels() {
        assert_eq!(LayoutKind::Monocle.label(3), "[3]");
        assert_eq!(LayoutKind::Tile.label(3), "[]=");
        assert_eq!(LayoutKind::Floating.next(), LayoutKind::Tile);
        assert_eq!(LayoutKind::from_name("grid"), Some(LayoutKind::Grid));
        assert_eq!(LayoutKind::from_name("spiral"), None);
    }
}
