use crate::ir::{Point, Rect};

use super::LayoutDirection;

// ── Geometry tolerances ─────────────────────────────────────────────
/// Distances below this are treated as zero when clipping and compressing.
const EPS: f32 = 1e-4;

/// Route between two node boxes. Orthogonal elbow when the target lies
/// strictly further along the flow axis, otherwise a straight border-to-border
/// segment.
pub(crate) fn route_edge(from: &Rect, to: &Rect, direction: LayoutDirection) -> Vec<Point> {
    let start_center = from.center();
    let end_center = to.center();
    let elbow = match direction {
        LayoutDirection::Down if to.y > from.bottom() => Some((
            Point::new(start_center.x, from.bottom()),
            Point::new(end_center.x, to.y),
        )),
        LayoutDirection::Up if to.bottom() < from.y => Some((
            Point::new(start_center.x, from.y),
            Point::new(end_center.x, to.bottom()),
        )),
        LayoutDirection::Right if to.x > from.right() => Some((
            Point::new(from.right(), start_center.y),
            Point::new(to.x, end_center.y),
        )),
        LayoutDirection::Left if to.right() < from.x => Some((
            Point::new(from.x, start_center.y),
            Point::new(to.right(), end_center.y),
        )),
        _ => None,
    };

    let Some((start, end)) = elbow else {
        return vec![
            clip_to_border(from, end_center),
            clip_to_border(to, start_center),
        ];
    };

    let points = if direction.is_horizontal() {
        let mid_x = (start.x + end.x) / 2.0;
        vec![
            start,
            Point::new(mid_x, start.y),
            Point::new(mid_x, end.y),
            end,
        ]
    } else {
        let mid_y = (start.y + end.y) / 2.0;
        vec![
            start,
            Point::new(start.x, mid_y),
            Point::new(end.x, mid_y),
            end,
        ]
    };
    compress_path(&points)
}

/// Point where the ray from the box centre towards `toward` leaves the box.
pub(crate) fn clip_to_border(rect: &Rect, toward: Point) -> Point {
    let center = rect.center();
    let dx = toward.x - center.x;
    let dy = toward.y - center.y;
    if dx.abs() <= EPS && dy.abs() <= EPS {
        return center;
    }
    let half_w = rect.width / 2.0;
    let half_h = rect.height / 2.0;
    let tx = if dx.abs() <= EPS {
        f32::INFINITY
    } else {
        half_w / dx.abs()
    };
    let ty = if dy.abs() <= EPS {
        f32::INFINITY
    } else {
        half_h / dy.abs()
    };
    let t = tx.min(ty).min(1.0);
    Point::new(center.x + dx * t, center.y + dy * t)
}

/// Drops repeated points and collinear interior points.
pub(crate) fn compress_path(points: &[Point]) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    out.push(points[0]);
    for idx in 1..points.len() - 1 {
        let prev = out[out.len() - 1];
        let curr = points[idx];
        let next = points[idx + 1];
        if (curr.x - prev.x).abs() <= EPS && (curr.y - prev.y).abs() <= EPS {
            continue;
        }
        let dx1 = curr.x - prev.x;
        let dy1 = curr.y - prev.y;
        let dx2 = next.x - curr.x;
        let dy2 = next.y - curr.y;
        if (dx1.abs() <= EPS && dx2.abs() <= EPS) || (dy1.abs() <= EPS && dy2.abs() <= EPS) {
            continue;
        }
        out.push(curr);
    }
    let last = points[points.len() - 1];
    let tail = out[out.len() - 1];
    if (last.x - tail.x).abs() > EPS || (last.y - tail.y).abs() > EPS || out.len() == 1 {
        out.push(last);
    }
    out
}

pub(crate) fn path_length(points: &[Point]) -> f32 {
    let mut length = 0.0;
    for segment in points.windows(2) {
        let dx = segment[1].x - segment[0].x;
        let dy = segment[1].y - segment[0].y;
        length += (dx * dx + dy * dy).sqrt();
    }
    length
}

fn orientation(a: Point, b: Point, c: Point) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Proper crossing only; shared endpoints and touching do not count.
pub(crate) fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);
    ((o1 > EPS && o2 < -EPS) || (o1 < -EPS && o2 > EPS))
        && ((o3 > EPS && o4 < -EPS) || (o3 < -EPS && o4 > EPS))
}
