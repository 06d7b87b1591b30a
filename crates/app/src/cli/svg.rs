//! SVG rendering surface for the response curve

use std::fmt::Write;
use trieq_core::domain::response::{Canvas, Color, Rect, ResponsePath};

pub struct SvgCanvas {
    width: u32,
    height: u32,
    body: String,
}

impl SvgCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            body: String::new(),
        }
    }

    /// Complete SVG document
    pub fn finish(self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n{body}</svg>\n",
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}

impl Canvas for SvgCanvas {
    fn fill_background(&mut self, color: Color) {
        let _ = writeln!(
            self.body,
            "  <rect x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" fill=\"{}\"/>",
            self.width,
            self.height,
            color.to_hex()
        );
    }

    fn draw_rounded_rectangle(&mut self, rect: Rect, corner_radius: f32, thickness: f32, color: Color) {
        // Inset by half the stroke so the border stays inside the canvas
        let inset = thickness / 2.0;
        let _ = writeln!(
            self.body,
            "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" rx=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"/>",
            rect.x + inset,
            rect.y + inset,
            (rect.width - thickness).max(0.0),
            (rect.height - thickness).max(0.0),
            corner_radius,
            color.to_hex(),
            thickness
        );
    }

    fn stroke_path(&mut self, path: &ResponsePath, thickness: f32, color: Color) {
        if path.is_empty() {
            return;
        }

        let mut points = String::with_capacity(path.len() * 14);
        for (i, point) in path.points().iter().enumerate() {
            if i > 0 {
                points.push(' ');
            }
            let _ = write!(points, "{:.2},{:.2}", point.x, point.y);
        }

        let _ = writeln!(
            self.body,
            "  <polyline points=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"/>",
            points,
            color.to_hex(),
            thickness
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trieq_core::domain::response::Point;

    #[test]
    fn test_empty_document() {
        let svg = SvgCanvas::new(100, 50).finish();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("viewBox=\"0 0 100 50\""));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_polyline_points() {
        let mut path = ResponsePath::new();
        path.start_new_sub_path(Point::new(0.0, 10.0));
        path.line_to(Point::new(1.0, 12.5));

        let mut canvas = SvgCanvas::new(2, 20);
        canvas.stroke_path(&path, 2.0, Color::WHITE);
        let svg = canvas.finish();

        assert!(svg.contains("points=\"0.00,10.00 1.00,12.50\""));
        assert!(svg.contains("stroke=\"#ffffff\""));
    }

    #[test]
    fn test_empty_path_is_skipped() {
        let mut canvas = SvgCanvas::new(10, 10);
        canvas.stroke_path(&ResponsePath::new(), 2.0, Color::WHITE);
        assert!(!canvas.finish().contains("polyline"));
    }
}
