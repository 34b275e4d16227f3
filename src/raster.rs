//! Software drawing surface. Pixels persist between frames, which is what
//! lets a translucent fill leave a fading trail behind moving points.

use iced::Color;

/// Drawing context the compositor paints through.
///
/// Transforms are rigid (translations and rotations only), so radii and
/// side lengths mean the same thing in local and device space.
pub trait Surface {
    fn size(&self) -> (u32, u32);

    /// Pushes the current transform.
    fn save(&mut self);

    /// Pops the transform pushed by the matching `save`.
    fn restore(&mut self);

    fn rotate_about(&mut self, cx: f64, cy: f64, angle: f64);

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color);

    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, color: Color);
}

/// Row-major 2D affine map: `x' = a·x + c·y + e`, `y' = b·x + d·y + f`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Affine {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Affine {
    const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn rotation_about(cx: f64, cy: f64, angle: f64) -> Affine {
        let (sin, cos) = angle.sin_cos();
        Affine {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: cx - cos * cx + sin * cy,
            f: cy - sin * cx - cos * cy,
        }
    }

    /// `self ∘ inner`: applies `inner` first.
    fn then(self, inner: Affine) -> Affine {
        Affine {
            a: self.a * inner.a + self.c * inner.b,
            b: self.b * inner.a + self.d * inner.b,
            c: self.a * inner.c + self.c * inner.d,
            d: self.b * inner.c + self.d * inner.d,
            e: self.a * inner.e + self.c * inner.f + self.e,
            f: self.b * inner.e + self.d * inner.f + self.f,
        }
    }

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn invert(&self) -> Option<Affine> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON {
            return None;
        }
        Some(Affine {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }
}

/// BGRA8 pixel buffer, the byte order iced's image handles expect.
#[derive(Clone, Debug)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    transform: Affine,
    saved: Vec<Affine>,
}

impl Raster {
    /// Opaque black.
    pub fn new(width: u32, height: u32) -> Self {
        let mut pixels = vec![0; width as usize * height as usize * 4];
        for pixel in pixels.chunks_exact_mut(4) {
            pixel[3] = 255;
        }
        Self {
            width,
            height,
            pixels,
            transform: Affine::IDENTITY,
            saved: Vec::new(),
        }
    }

    /// Starts over at the new size; previous contents are discarded.
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bgra(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        let p = &self.pixels[i..i + 4];
        Some([p[2], p[1], p[0], p[3]])
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Source-over blend. Results are floored so repeated dark fills decay
    /// all the way to black.
    #[inline]
    fn blend(&mut self, x: u32, y: u32, color: Color, alpha: f32) {
        let i = self.index(x, y);
        let keep = 1.0 - alpha;
        let pixel = &mut self.pixels[i..i + 4];
        pixel[0] = (color.b * 255.0 * alpha + pixel[0] as f32 * keep) as u8;
        pixel[1] = (color.g * 255.0 * alpha + pixel[1] as f32 * keep) as u8;
        pixel[2] = (color.r * 255.0 * alpha + pixel[2] as f32 * keep) as u8;
    }

    /// Shapes smaller than a pixel tint the pixel under their centre in
    /// proportion to their area.
    fn cover(&mut self, x: f64, y: f64, color: Color, area: f64) {
        let (x, y) = self.transform.apply(x, y);
        if x < 0.0 || y < 0.0 {
            return;
        }
        let (px, py) = (x.floor() as u32, y.floor() as u32);
        if px < self.width && py < self.height {
            self.blend(px, py, color, color.a * area as f32);
        }
    }

    /// Device-space pixel range covering `xs`×`ys`, clipped to the raster.
    fn span(&self, xs: (f64, f64), ys: (f64, f64)) -> Option<(u32, u32, u32, u32)> {
        let x0 = xs.0.floor().max(0.0);
        let y0 = ys.0.floor().max(0.0);
        let x1 = xs.1.ceil().min(self.width as f64);
        let y1 = ys.1.ceil().min(self.height as f64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

impl Surface for Raster {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn save(&mut self) {
        self.saved.push(self.transform);
    }

    fn restore(&mut self) {
        if let Some(transform) = self.saved.pop() {
            self.transform = transform;
        }
    }

    fn rotate_about(&mut self, cx: f64, cy: f64, angle: f64) {
        self.transform = self
            .transform
            .then(Affine::rotation_about(cx, cy, angle));
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) {
        if !(width > 0.0 && height > 0.0) || !x.is_finite() || !y.is_finite() {
            return;
        }
        let area = width * height;
        if area < 1.0 {
            self.cover(x + width / 2.0, y + height / 2.0, color, area);
            return;
        }

        let corners = [
            self.transform.apply(x, y),
            self.transform.apply(x + width, y),
            self.transform.apply(x, y + height),
            self.transform.apply(x + width, y + height),
        ];
        let xs = corners
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
                (lo.min(c.0), hi.max(c.0))
            });
        let ys = corners
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
                (lo.min(c.1), hi.max(c.1))
            });
        let (x0, y0, x1, y1) = match self.span(xs, ys) {
            Some(span) => span,
            None => return,
        };
        let inverse = match self.transform.invert() {
            Some(inverse) => inverse,
            None => return,
        };
        let identity = self.transform == Affine::IDENTITY;

        for py in y0..y1 {
            for px in x0..x1 {
                let (sx, sy) = (px as f64 + 0.5, py as f64 + 0.5);
                let (u, v) = if identity {
                    (sx, sy)
                } else {
                    inverse.apply(sx, sy)
                };
                if u >= x && u < x + width && v >= y && v < y + height {
                    self.blend(px, py, color, color.a);
                }
            }
        }
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, color: Color) {
        if !(radius > 0.0) || !cx.is_finite() || !cy.is_finite() {
            return;
        }
        let area = std::f64::consts::PI * radius * radius;
        if area < 1.0 {
            self.cover(cx, cy, color, area);
            return;
        }

        let (dx, dy) = self.transform.apply(cx, cy);
        let xs = (dx - radius, dx + radius);
        let ys = (dy - radius, dy + radius);
        let (x0, y0, x1, y1) = match self.span(xs, ys) {
            Some(span) => span,
            None => return,
        };
        let r2 = radius * radius;
        for py in y0..y1 {
            for px in x0..x1 {
                let ox = px as f64 + 0.5 - dx;
                let oy = py as f64 + 0.5 - dy;
                if ox * ox + oy * oy <= r2 {
                    self.blend(px, py, color, color.a);
                }
            }
        }
    }
}
