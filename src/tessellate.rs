//! Path construction and lyon tessellation into [`Mesh`]es.

use lyon::geom::Arc;
use lyon::math::{point, vector, Angle, Box2D};
use lyon::path::builder::BorderRadii;
use lyon::path::{Path, Winding};
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, StrokeOptions,
    StrokeTessellator, StrokeVertex, VertexBuffers,
};

use crate::types::{Mesh, Vertex};

/// Incremental path builder. Sub-paths left open are ended implicitly.
pub struct PathBuilder {
    builder: lyon::path::path::Builder,
    open: bool,
}

impl Default for PathBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PathBuilder {
    /// Empty path.
    pub fn new() -> Self {
        Self {
            builder: Path::builder(),
            open: false,
        }
    }

    /// Starts a new sub-path at `(x, y)`.
    pub fn move_to(&mut self, x: f32, y: f32) {
        if self.open {
            self.builder.end(false);
        }
        self.builder.begin(point(x, y));
        self.open = true;
    }

    /// Straight segment to `(x, y)`. Starts a sub-path at the point if none
    /// is open.
    pub fn line_to(&mut self, x: f32, y: f32) {
        if self.open {
            self.builder.line_to(point(x, y));
        } else {
            self.move_to(x, y);
        }
    }

    /// Quadratic bezier through control point `(x1, y1)` to `(x, y)`.
    pub fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        if !self.open {
            self.move_to(x1, y1);
        }
        self.builder.quadratic_bezier_to(point(x1, y1), point(x, y));
    }

    /// Cubic bezier through `(x1, y1)` and `(x2, y2)` to `(x, y)`.
    pub fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        if !self.open {
            self.move_to(x1, y1);
        }
        self.builder
            .cubic_bezier_to(point(x1, y1), point(x2, y2), point(x, y));
    }

    /// Closes the current sub-path.
    pub fn close(&mut self) {
        if self.open {
            self.builder.close();
            self.open = false;
        }
    }

    /// Finishes the path.
    pub fn build(mut self) -> Path {
        if self.open {
            self.builder.end(false);
        }
        self.builder.build()
    }
}

/// Axis-aligned rectangle.
pub fn rect_path(x: f32, y: f32, width: f32, height: f32) -> Path {
    let mut builder = Path::builder();
    builder.add_rectangle(
        &Box2D::new(point(x, y), point(x + width, y + height)),
        Winding::Positive,
    );
    builder.build()
}

/// Rectangle with every corner rounded by `radius`.
pub fn rounded_rect_path(x: f32, y: f32, width: f32, height: f32, radius: f32) -> Path {
    let mut builder = Path::builder();
    builder.add_rounded_rectangle(
        &Box2D::new(point(x, y), point(x + width, y + height)),
        &BorderRadii::new(radius),
        Winding::Positive,
    );
    builder.build()
}

/// Circle around `(cx, cy)`.
pub fn circle_path(cx: f32, cy: f32, radius: f32) -> Path {
    let mut builder = Path::builder();
    builder.add_circle(point(cx, cy), radius, Winding::Positive);
    builder.build()
}

/// Open circular arc around `(cx, cy)` starting at `start` radians and
/// sweeping `sweep` radians, flattened to line segments within `tolerance`.
pub fn arc_path(cx: f32, cy: f32, radius: f32, start: f32, sweep: f32, tolerance: f32) -> Path {
    let arc = Arc {
        center: point(cx, cy),
        radii: vector(radius, radius),
        start_angle: Angle::radians(start),
        sweep_angle: Angle::radians(sweep),
        x_rotation: Angle::radians(0.0),
    };
    let mut builder = Path::builder();
    builder.begin(arc.from());
    for p in arc.flattened(tolerance) {
        builder.line_to(p);
    }
    builder.end(false);
    builder.build()
}

/// Reusable fill and stroke tessellators.
pub struct Tessellator {
    fill: FillTessellator,
    stroke: StrokeTessellator,
    tolerance: f32,
}

impl Tessellator {
    /// Tessellator producing meshes within `tolerance` of the true curves.
    pub fn new(tolerance: f32) -> Self {
        Self {
            fill: FillTessellator::new(),
            stroke: StrokeTessellator::new(),
            tolerance,
        }
    }

    /// Curve tolerance.
    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Tessellate a path's interior (non-zero rule) into an indexed triangle
    /// mesh. `None` if the path covers nothing or lyon rejects it.
    pub fn fill(&mut self, path: &Path) -> Option<Mesh> {
        let mut geometry: VertexBuffers<Vertex, u32> = VertexBuffers::new();
        let result = self.fill.tessellate_path(
            path,
            &FillOptions::tolerance(self.tolerance).with_fill_rule(FillRule::NonZero),
            &mut BuffersBuilder::new(&mut geometry, |vertex: FillVertex| Vertex {
                position: vertex.position().to_array(),
            }),
        );
        finish(result.map_err(|e| format!("{e:?}")), geometry, "fill")
    }

    /// Tessellate a path outline `width` units wide into an indexed
    /// triangle mesh.
    pub fn stroke(&mut self, path: &Path, width: f32) -> Option<Mesh> {
        let mut geometry: VertexBuffers<Vertex, u32> = VertexBuffers::new();
        let result = self.stroke.tessellate_path(
            path,
            &StrokeOptions::tolerance(self.tolerance).with_line_width(width),
            &mut BuffersBuilder::new(&mut geometry, |vertex: StrokeVertex| Vertex {
                position: vertex.position().to_array(),
            }),
        );
        finish(result.map_err(|e| format!("{e:?}")), geometry, "stroke")
    }
}

fn finish(
    result: std::result::Result<(), String>,
    geometry: VertexBuffers<Vertex, u32>,
    kind: &'static str,
) -> Option<Mesh> {
    match result {
        Ok(()) if !geometry.indices.is_empty() => Some(Mesh {
            vertices: geometry.vertices,
            indices: geometry.indices,
        }),
        Ok(()) => None,
        Err(error) => {
            tracing::warn!(kind, %error, "tessellation failed");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn within(bounds: [f32; 4], expected: [f32; 4], slack: f32) -> bool {
        bounds.iter().zip(expected).all(|(a, b)| (a - b).abs() <= slack)
    }

    fn assert_valid(mesh: &Mesh) {
        assert_eq!(mesh.indices.len() % 3, 0);
        let n = u32::try_from(mesh.vertices.len()).unwrap();
        assert!(mesh.indices.iter().all(|&i| i < n));
    }

    #[test]
    fn rect_fills_to_its_bounds() {
        let mut t = Tessellator::new(0.01);
        let mesh = t.fill(&rect_path(10.0, 20.0, 30.0, 40.0)).unwrap();
        assert_valid(&mesh);
        assert!(mesh.indices.len() >= 6);
        assert!(within(mesh.bounds().unwrap(), [10.0, 20.0, 40.0, 60.0], 1e-4));
    }

    #[test]
    fn circle_stays_within_tolerance() {
        let mut t = Tessellator::new(0.01);
        let mesh = t.fill(&circle_path(0.0, 0.0, 5.0)).unwrap();
        assert_valid(&mesh);
        assert!(within(mesh.bounds().unwrap(), [-5.0, -5.0, 5.0, 5.0], 0.02));
    }

    #[test]
    fn rounded_rect_keeps_outer_bounds() {
        let mut t = Tessellator::new(0.01);
        let mesh = t.fill(&rounded_rect_path(0.0, 0.0, 10.0, 4.0, 2.0)).unwrap();
        assert_valid(&mesh);
        assert!(within(mesh.bounds().unwrap(), [0.0, 0.0, 10.0, 4.0], 0.02));
    }

    #[test]
    fn stroke_widens_a_line() {
        let mut builder = PathBuilder::new();
        builder.move_to(0.0, 0.0);
        builder.line_to(10.0, 0.0);
        let mut t = Tessellator::new(0.01);
        let mesh = t.stroke(&builder.build(), 2.0).unwrap();
        assert_valid(&mesh);
        let [_, y0, _, y1] = mesh.bounds().unwrap();
        assert!((y0 + 1.0).abs() < 1e-4 && (y1 - 1.0).abs() < 1e-4);
    }

    #[test]
    fn arc_quarter_turn() {
        let path = arc_path(0.0, 0.0, 10.0, 0.0, std::f32::consts::FRAC_PI_2, 0.01);
        let mut t = Tessellator::new(0.01);
        let mesh = t.stroke(&path, 1.0).unwrap();
        assert_valid(&mesh);
        let [x0, y0, x1, y1] = mesh.bounds().unwrap();
        assert!(x0 > -0.6 && y0 > -0.6);
        assert!(x1 < 10.6 && y1 < 10.6);
    }

    #[test]
    fn empty_path_has_no_mesh() {
        let mut t = Tessellator::new(0.01);
        assert!(t.fill(&PathBuilder::new().build()).is_none());
    }

    #[test]
    fn builder_ends_open_subpaths() {
        let mut builder = PathBuilder::new();
        builder.move_to(0.0, 0.0);
        builder.line_to(4.0, 0.0);
        builder.line_to(4.0, 4.0);
        builder.move_to(10.0, 10.0);
        builder.line_to(14.0, 10.0);
        builder.line_to(14.0, 14.0);
        builder.close();
        let mut t = Tessellator::new(0.01);
        let mesh = t.fill(&builder.build()).unwrap();
        assert!(within(mesh.bounds().unwrap(), [0.0, 0.0, 14.0, 14.0], 1e-4));
    }
}
