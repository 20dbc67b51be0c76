use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in window coordinates
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Overlap of two rectangles, or `None` when they do not overlap
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

/// Where a tracked surface sits relative to its display root
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct SurfaceGeometry {
    /// Surface frame in window coordinates
    pub frame: Rect,

    /// Clip rects of the containers between the surface and the window,
    /// innermost first
    pub containers: Vec<Rect>,

    /// Window bounds
    pub viewport: Rect,

    /// False once the surface is removed from its display root
    pub attached: bool,
}

/// Fraction of the surface area currently on screen, in `0.0..=1.0`
pub fn visible_ratio(geometry: &SurfaceGeometry) -> f64 {
    if !geometry.attached {
        return 0.0;
    }
    let total = geometry.frame.area();
    if total <= 0.0 {
        return 0.0;
    }

    let visible = geometry
        .containers
        .iter()
        .chain(std::iter::once(&geometry.viewport))
        .try_fold(geometry.frame, |visible, clip| visible.intersection(clip));

    match visible {
        Some(rect) => (rect.area() / total).min(1.0),
        None => 0.0,
    }
}

/// True iff the surface is attached and at least `threshold` of it is visible
pub fn is_visible(geometry: &SurfaceGeometry, threshold: f64) -> bool {
    geometry.attached && geometry.frame.area() > 0.0 && visible_ratio(geometry) >= threshold
}

/// Turn a geometry source into the polling predicate the impression tracker expects
pub fn visibility_predicate<S>(
    mut sample: S,
    threshold: f64,
) -> impl FnMut() -> bool + Send + 'static
where
    S: FnMut() -> SurfaceGeometry + Send + 'static,
{
    move || is_visible(&sample(), threshold)
}
