//! Attached displays and their placement in virtual-screen space.

use super::CaptureError;
use crate::geometry::{self, Absolute, Physical, Point, Rect};
use serde::Serialize;

/// One physical monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Display {
    pub id: String,
    /// Logical bounds in the shared virtual-screen space.
    pub bounds: Rect<Absolute>,
    pub scale_factor: f64,
    pub primary: bool,
    /// Placement as the platform reports it, when known. Overlay windows
    /// are positioned with this so they land exactly on the monitor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical: Option<Rect<Physical>>,
}

/// A monitor as the platform enumerates it, before layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformMonitor {
    pub name: Option<String>,
    pub bounds: Rect<Physical>,
    pub scale_factor: f64,
    pub primary: bool,
}

/// Lists the currently attached displays.
///
/// Implementations must query the platform on every call; monitors can be
/// plugged or unplugged between two captures.
pub trait DisplayEnumerator: Send + Sync {
    fn displays(&self) -> Result<Vec<Display>, CaptureError>;
}

/// The display flagged primary, or the first one if none is.
pub fn primary_display(displays: &[Display]) -> Option<(usize, &Display)> {
    displays
        .iter()
        .enumerate()
        .find(|(_, d)| d.primary)
        .or_else(|| displays.first().map(|d| (0, d)))
}

/// First enumerated display whose bounds contain `point`.
///
/// Overlapping arrangements are resolved by enumeration order.
pub fn display_at(displays: &[Display], point: Point<Absolute>) -> Option<(usize, &Display)> {
    displays
        .iter()
        .enumerate()
        .find(|(_, d)| geometry::rect_contains_point(&d.bounds, point))
}

/// Display owning `selection`, judged by its centre point; falls back to the
/// primary display when the centre lies outside every display.
pub fn owning_display<'a>(
    displays: &'a [Display],
    selection: &Rect<Absolute>,
) -> Option<(usize, &'a Display)> {
    let center = selection.center();
    display_at(displays, center).or_else(|| {
        log::warn!(
            "[CAPTURE] Selection centre ({}, {}) is outside every display, using primary",
            center.x,
            center.y
        );
        primary_display(displays)
    })
}

/// Extent of the whole virtual screen.
pub fn virtual_screen(displays: &[Display]) -> Option<Rect<Absolute>> {
    geometry::union(displays.iter().map(|d| d.bounds))
}

/// Lays platform monitors out in one logical virtual-screen space.
///
/// Each size is divided by the monitor's own scale factor. Origins cannot
/// be: with mixed scale factors that pulls neighbours on top of each other.
/// Instead the primary keeps its origin and every other monitor is placed
/// against its nearest already-placed neighbour, with the gap and the edge
/// offset measured in that neighbour's scale. Monitors that touch stay
/// touching and never overlap.
///
/// Ids are the platform names, made unique with the index when two
/// monitors share one. Only the first monitor flagged primary keeps the
/// flag.
pub fn layout_displays(monitors: &[PlatformMonitor]) -> Vec<Display> {
    let anchor = match monitors.iter().position(|m| m.primary) {
        Some(index) => index,
        None if !monitors.is_empty() => 0,
        None => return Vec::new(),
    };

    let mut placed: Vec<Option<Rect<Absolute>>> = vec![None; monitors.len()];
    let primary = &monitors[anchor];
    let scale = valid_scale(primary.scale_factor);
    placed[anchor] = Some(Rect::new(
        logical_offset(primary.bounds.x as i64, scale),
        logical_offset(primary.bounds.y as i64, scale),
        logical_len(primary.bounds.width, scale),
        logical_len(primary.bounds.height, scale),
    ));

    while let Some((next, neighbour)) = nearest_unplaced(monitors, &placed) {
        if let Some(anchor_rect) = placed[neighbour] {
            placed[next] = Some(place_beside(&monitors[next], &monitors[neighbour], anchor_rect));
        }
    }

    let ids = unique_ids(monitors);
    monitors
        .iter()
        .zip(placed)
        .zip(ids)
        .enumerate()
        .filter_map(|(index, ((m, bounds), id))| {
            Some(Display {
                id,
                bounds: bounds?,
                scale_factor: valid_scale(m.scale_factor),
                primary: index == anchor && m.primary,
                physical: Some(m.bounds),
            })
        })
        .collect()
}

/// Platform names, suffixed with the index where a name is shared or
/// missing.
fn unique_ids(monitors: &[PlatformMonitor]) -> Vec<String> {
    monitors
        .iter()
        .enumerate()
        .map(|(index, m)| match m.name.as_deref() {
            Some(name)
                if monitors
                    .iter()
                    .filter(|o| o.name.as_deref() == Some(name))
                    .count()
                    == 1 =>
            {
                name.to_string()
            }
            Some(name) => format!("{}#{}", name, index),
            None => format!("display-{}", index),
        })
        .collect()
}

/// Closest (unplaced, placed) pair by physical edge distance. Ties go to
/// enumeration order.
fn nearest_unplaced(
    monitors: &[PlatformMonitor],
    placed: &[Option<Rect<Absolute>>],
) -> Option<(usize, usize)> {
    let mut best: Option<(i64, usize, usize)> = None;
    for (i, m) in monitors.iter().enumerate() {
        if placed[i].is_some() {
            continue;
        }
        for (j, n) in monitors.iter().enumerate() {
            if placed[j].is_none() {
                continue;
            }
            let gap = edge_gap(&m.bounds, &n.bounds);
            if best.map_or(true, |(g, _, _)| gap < g) {
                best = Some((gap, i, j));
            }
        }
    }
    best.map(|(_, i, j)| (i, j))
}

fn edge_gap(a: &Rect<Physical>, b: &Rect<Physical>) -> i64 {
    let dx = (b.x as i64 - a.right()).max(a.x as i64 - b.right()).max(0);
    let dy = (b.y as i64 - a.bottom()).max(a.y as i64 - b.bottom()).max(0);
    dx + dy
}

fn place_beside(
    monitor: &PlatformMonitor,
    neighbour: &PlatformMonitor,
    anchor: Rect<Absolute>,
) -> Rect<Absolute> {
    let own = valid_scale(monitor.scale_factor);
    let theirs = valid_scale(neighbour.scale_factor);
    let (m, n) = (&monitor.bounds, &neighbour.bounds);
    let width = logical_len(m.width, own);
    let height = logical_len(m.height, own);
    let along_x = anchor.x.saturating_add(logical_offset(m.x as i64 - n.x as i64, theirs));
    let along_y = anchor.y.saturating_add(logical_offset(m.y as i64 - n.y as i64, theirs));

    let (x, y) = if m.x as i64 >= n.right() {
        let gap = logical_offset(m.x as i64 - n.right(), theirs);
        (clamp_i32(anchor.right() + gap as i64), along_y)
    } else if m.right() <= n.x as i64 {
        let gap = logical_offset(n.x as i64 - m.right(), theirs);
        (clamp_i32(anchor.x as i64 - gap as i64 - width as i64), along_y)
    } else if m.y as i64 >= n.bottom() {
        let gap = logical_offset(m.y as i64 - n.bottom(), theirs);
        (along_x, clamp_i32(anchor.bottom() + gap as i64))
    } else if m.bottom() <= n.y as i64 {
        let gap = logical_offset(n.y as i64 - m.bottom(), theirs);
        (along_x, clamp_i32(anchor.y as i64 - gap as i64 - height as i64))
    } else {
        // Mirrored or overlapping in physical space; keep the overlap.
        (along_x, along_y)
    };
    Rect::new(x, y, width, height)
}

fn valid_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

fn logical_len(px: u32, scale: f64) -> u32 {
    (px as f64 / scale).round().clamp(0.0, u32::MAX as f64) as u32
}

fn logical_offset(px: i64, scale: f64) -> i32 {
    clamp_i32((px as f64 / scale).round() as i64)
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
pub(crate) fn test_display(id: &str, x: i32, y: i32, w: u32, h: u32, scale: f64) -> Display {
    Display {
        id: id.to_string(),
        bounds: Rect::new(x, y, w, h),
        scale_factor: scale,
        primary: false,
        physical: None,
    }
}
