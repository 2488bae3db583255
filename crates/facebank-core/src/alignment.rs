//! Face alignment via a 4-DOF similarity transform.
//!
//! Maps the five detected landmarks onto the InsightFace reference layout and
//! warps the face into the canonical 112×112 crop the recognizer expects.

use image::{Rgb, RgbImage};

/// Side length of the canonical aligned crop.
pub const ALIGNED_SIZE: u32 = 112;

/// ArcFace reference landmarks for a 112×112 crop.
pub(crate) const REFERENCE_LANDMARKS: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

/// Similarity transform `p' = [[a, -b], [b, a]] · p + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Similarity {
    a: f32,
    b: f32,
    tx: f32,
    ty: f32,
}

impl Similarity {
    /// Closed-form least-squares fit mapping `src` points onto `dst` points.
    ///
    /// Degenerate input (all source points coincide) yields `None`.
    fn estimate(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Option<Self> {
        let centroid = |pts: &[(f32, f32); 5]| {
            let (sx, sy) = pts.iter().fold((0.0, 0.0), |acc, p| (acc.0 + p.0, acc.1 + p.1));
            (sx / 5.0, sy / 5.0)
        };
        let (msx, msy) = centroid(src);
        let (mdx, mdy) = centroid(dst);

        let mut spread = 0.0f32;
        let mut dot = 0.0f32;
        let mut cross = 0.0f32;
        for (s, d) in src.iter().zip(dst) {
            let (sx, sy) = (s.0 - msx, s.1 - msy);
            let (dx, dy) = (d.0 - mdx, d.1 - mdy);
            spread += sx * sx + sy * sy;
            dot += sx * dx + sy * dy;
            cross += sx * dy - sy * dx;
        }
        if spread < 1e-12 {
            return None;
        }

        let a = dot / spread;
        let b = cross / spread;
        Some(Self {
            a,
            b,
            tx: mdx - (a * msx - b * msy),
            ty: mdy - (b * msx + a * msy),
        })
    }

    fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    fn inverse(&self) -> Option<Self> {
        let det = self.a * self.a + self.b * self.b;
        if det < 1e-12 {
            return None;
        }
        let a = self.a / det;
        let b = -self.b / det;
        Some(Self {
            a,
            b,
            tx: -(a * self.tx - b * self.ty),
            ty: -(b * self.tx + a * self.ty),
        })
    }
}

/// Bilinear RGB sample; pixels outside the image read as black.
fn sample(image: &RgbImage, x: f32, y: f32) -> [f32; 3] {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let texel = |xi: f32, yi: f32| -> [f32; 3] {
        if xi < 0.0 || yi < 0.0 || xi >= image.width() as f32 || yi >= image.height() as f32 {
            return [0.0; 3];
        }
        let Rgb(p) = *image.get_pixel(xi as u32, yi as u32);
        [p[0] as f32, p[1] as f32, p[2] as f32]
    };

    let corners = [
        (texel(x0, y0), (1.0 - fx) * (1.0 - fy)),
        (texel(x0 + 1.0, y0), fx * (1.0 - fy)),
        (texel(x0, y0 + 1.0), (1.0 - fx) * fy),
        (texel(x0 + 1.0, y0 + 1.0), fx * fy),
    ];

    let mut out = [0.0f32; 3];
    for (px, w) in corners {
        for c in 0..3 {
            out[c] += px[c] * w;
        }
    }
    out
}

/// Warp `image` through the transform from source pixels to crop pixels.
///
/// `None` if the transform is not invertible.
fn warp(image: &RgbImage, to_crop: &Similarity, size: u32) -> Option<RgbImage> {
    let to_source = to_crop.inverse()?;

    Some(RgbImage::from_fn(size, size, |ox, oy| {
        let (sx, sy) = to_source.apply((ox as f32, oy as f32));
        let v = sample(image, sx, sy);
        Rgb(v.map(|c| c.round().clamp(0.0, 255.0) as u8))
    }))
}

/// Align a detected face to the canonical 112×112 crop using its landmarks.
///
/// Returns `None` when the landmarks are degenerate and no transform exists.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> Option<RgbImage> {
    let aligned = Similarity::estimate(landmarks, &REFERENCE_LANDMARKS)
        .and_then(|transform| warp(image, &transform, ALIGNED_SIZE));
    if aligned.is_none() {
        tracing::debug!(?landmarks, "degenerate landmarks, cannot align");
    }
    aligned
}
