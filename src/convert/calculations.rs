//! Pure calculation functions for output geometry and encoder settings.
//!
//! All functions here are pure and testable without any I/O or images.

/// Dimensions after scaling down to fit `max_edge` on the longer side.
///
/// Never upscales: images already within the limit keep their size.
pub fn fit_within(source: (u32, u32), max_edge: u32) -> (u32, u32) {
    let (w, h) = source;
    let longer = w.max(h);
    if longer <= max_edge || longer == 0 {
        return (w, h);
    }
    let ratio = max_edge as f64 / longer as f64;
    let scale = |v: u32| ((v as f64 * ratio).round() as u32).max(1);
    if w >= h {
        (max_edge, scale(h))
    } else {
        (scale(w), max_edge)
    }
}

/// Geometry of the play indicator drawn onto a square thumbnail: a dark
/// disc with a right-pointing triangle, centered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayGlyph {
    pub center: (f64, f64),
    pub radius: f64,
    /// Triangle vertices: top-left, bottom-left, right tip.
    pub triangle: [(f64, f64); 3],
}

/// Play glyph for a `size`×`size` thumbnail. The disc spans 40% of the edge.
pub fn play_glyph(size: u32) -> PlayGlyph {
    let s = size as f64;
    let c = s / 2.0;
    let r = s * 0.2;
    // Shift the triangle right so its centroid sits on the disc center.
    let half_h = r * 0.55;
    let left = c - half_h * 0.8;
    let tip = c + half_h * 1.2;
    PlayGlyph {
        center: (c, c),
        radius: r,
        triangle: [(left, c - half_h), (left, c + half_h), (tip, c)],
    }
}

impl PlayGlyph {
    /// ImageMagick `-draw` arguments for this glyph.
    pub fn magick_draw_args(&self) -> Vec<String> {
        let (cx, cy) = self.center;
        let [a, b, t] = self.triangle;
        vec![
            "-fill".into(),
            "rgba(0,0,0,0.45)".into(),
            "-draw".into(),
            format!("circle {cx:.1},{cy:.1} {:.1},{cy:.1}", cx + self.radius),
            "-fill".into(),
            "rgba(255,255,255,0.9)".into(),
            "-draw".into(),
            format!(
                "polygon {:.1},{:.1} {:.1},{:.1} {:.1},{:.1}",
                a.0, a.1, b.0, b.1, t.0, t.1
            ),
        ]
    }

    pub fn in_disc(&self, x: f64, y: f64) -> bool {
        let (cx, cy) = self.center;
        (x - cx).powi(2) + (y - cy).powi(2) <= self.radius.powi(2)
    }

    pub fn in_triangle(&self, x: f64, y: f64) -> bool {
        let [a, b, c] = self.triangle;
        let sign = |p: (f64, f64), q: (f64, f64), r: (f64, f64)| {
            (p.0 - r.0) * (q.1 - r.1) - (q.0 - r.0) * (p.1 - r.1)
        };
        let d1 = sign((x, y), a, b);
        let d2 = sign((x, y), b, c);
        let d3 = sign((x, y), c, a);
        let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
        let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
        !(has_neg && has_pos)
    }
}

/// Map 1-100 quality onto ffmpeg's MJPEG `-q:v` scale (2 = best, 31 = worst).
pub fn ffmpeg_jpeg_qscale(quality: u32) -> u32 {
    let q = quality.clamp(1, 100);
    31 - (q - 1) * 29 / 99
}
