// ============================================================================
// ADJUSTMENT OPERATIONS — threshold primitive + luminance histogram
// ============================================================================
//
// `threshold` follows the familiar five-type contract (binary, binary-inv,
// truncate, to-zero, to-zero-inv) with an optional Otsu auto-level. It is
// applied per colour channel, alpha is copied through untouched, and rows are
// processed in parallel via rayon.
// ============================================================================

use image::{GrayImage, Rgba, RgbaImage};
use rayon::prelude::*;

// ============================================================================
// THRESHOLD TYPES
// ============================================================================

/// Base thresholding rule applied to every channel value `v` against level `t`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThresholdType {
    /// `v > t ? max : 0`
    #[default]
    Binary,
    /// `v > t ? 0 : max`
    BinaryInv,
    /// `v > t ? t : v`
    Trunc,
    /// `v > t ? v : 0`
    ToZero,
    /// `v > t ? 0 : v`
    ToZeroInv,
}

impl ThresholdType {
    /// Conventional numeric code (0..=4).
    pub fn code(self) -> u32 {
        match self {
            ThresholdType::Binary => 0,
            ThresholdType::BinaryInv => 1,
            ThresholdType::Trunc => 2,
            ThresholdType::ToZero => 3,
            ThresholdType::ToZeroInv => 4,
        }
    }

    #[inline]
    fn apply(self, v: u8, t: u8, max_value: u8) -> u8 {
        let above = v > t;
        match self {
            ThresholdType::Binary => if above { max_value } else { 0 },
            ThresholdType::BinaryInv => if above { 0 } else { max_value },
            ThresholdType::Trunc => if above { t } else { v },
            ThresholdType::ToZero => if above { v } else { 0 },
            ThresholdType::ToZeroInv => if above { 0 } else { v },
        }
    }
}

/// Flag OR'd into [`ThresholdType::code`] when the level is chosen by Otsu.
pub const OTSU_FLAG: u32 = 8;

/// A base type plus the Otsu auto-level modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ThresholdKind {
    pub ty: ThresholdType,
    pub otsu: bool,
}

impl ThresholdKind {
    pub fn new(ty: ThresholdType, otsu: bool) -> Self {
        Self { ty, otsu }
    }

    pub fn code(self) -> u32 {
        if self.otsu {
            self.ty.code() | OTSU_FLAG
        } else {
            self.ty.code()
        }
    }
}

// ============================================================================
// THRESHOLD
// ============================================================================

/// Otsu level of `src`, computed on the luminance of the same pixels
/// [`compute_histogram`] counts. A fully transparent image falls back to
/// every pixel.
pub fn otsu_level(src: &RgbaImage) -> u8 {
    let visible: Vec<u8> = src.pixels().filter_map(visible_luminance).collect();
    let gray = u32::try_from(visible.len())
        .ok()
        .filter(|&n| n > 0)
        .and_then(|n| GrayImage::from_raw(n, 1, visible));
    match gray {
        Some(gray) => imageproc::contrast::otsu_level(&gray),
        None => imageproc::contrast::otsu_level(&image::imageops::grayscale(src)),
    }
}

/// Threshold `src` into `dst` and return the level actually used.
///
/// `dst` is reallocated when its dimensions differ from `src`. With
/// `kind.otsu` set, `level` is ignored and the Otsu level of `src` is used.
pub fn threshold(
    src: &RgbaImage,
    dst: &mut RgbaImage,
    level: u8,
    max_value: u8,
    kind: ThresholdKind,
) -> u8 {
    let (w, h) = src.dimensions();
    if dst.dimensions() != (w, h) {
        *dst = RgbaImage::new(w, h);
    }
    if w == 0 || h == 0 {
        return level;
    }

    let t = if kind.otsu { otsu_level(src) } else { level };
    let ty = kind.ty;
    let stride = w as usize * 4;
    let src_raw: &[u8] = src.as_raw();
    let dst_raw: &mut [u8] = &mut **dst;

    dst_raw
        .par_chunks_mut(stride)
        .zip(src_raw.par_chunks(stride))
        .for_each(|(row_out, row_in)| {
            for (px_out, px_in) in row_out.chunks_exact_mut(4).zip(row_in.chunks_exact(4)) {
                px_out[0] = ty.apply(px_in[0], t, max_value);
                px_out[1] = ty.apply(px_in[1], t, max_value);
                px_out[2] = ty.apply(px_in[2], t, max_value);
                px_out[3] = px_in[3];
            }
        });

    t
}

// ============================================================================
// HISTOGRAM COMPUTATION (for the threshold dialog)
// ============================================================================

/// 256-bin Rec.709 luminance histogram. Fully transparent pixels are skipped.
pub fn compute_histogram(img: &RgbaImage) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for lum in img.pixels().filter_map(visible_luminance) {
        hist[lum as usize] += 1;
    }
    hist
}

/// Rec.709 luminance, or `None` for a fully transparent pixel.
fn visible_luminance(px: &Rgba<u8>) -> Option<u8> {
    let [r, g, b, a] = px.0;
    if a == 0 {
        return None;
    }
    let lum = 0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32;
    Some(lum.round().min(255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_row(values: &[u8]) -> RgbaImage {
        let mut img = RgbaImage::new(values.len() as u32, 1);
        for (x, &v) in values.iter().enumerate() {
            img.put_pixel(x as u32, 0, Rgba([v, v, v, 200]));
        }
        img
    }

    fn reds(img: &RgbaImage) -> Vec<u8> {
        img.pixels().map(|p| p.0[0]).collect()
    }

    #[test]
    fn each_type_follows_its_rule() {
        let src = gray_row(&[0, 99, 100, 101, 250]);
        let mut dst = RgbaImage::new(1, 1);
        let cases = [
            (ThresholdType::Binary, vec![0, 0, 0, 255, 255]),
            (ThresholdType::BinaryInv, vec![255, 255, 255, 0, 0]),
            (ThresholdType::Trunc, vec![0, 99, 100, 100, 100]),
            (ThresholdType::ToZero, vec![0, 0, 0, 101, 250]),
            (ThresholdType::ToZeroInv, vec![0, 99, 100, 0, 0]),
        ];
        for (ty, expected) in cases {
            let used = threshold(&src, &mut dst, 100, 255, ThresholdKind::new(ty, false));
            assert_eq!(used, 100);
            assert_eq!(reds(&dst), expected, "{:?}", ty);
        }
    }

    #[test]
    fn max_value_and_alpha() {
        let src = gray_row(&[10, 200]);
        let mut dst = RgbaImage::new(2, 1);
        threshold(&src, &mut dst, 127, 180, ThresholdKind::new(ThresholdType::Binary, false));
        assert_eq!(*dst.get_pixel(0, 0), Rgba([0, 0, 0, 200]));
        assert_eq!(*dst.get_pixel(1, 0), Rgba([180, 180, 180, 200]));
    }

    #[test]
    fn channels_are_independent() {
        let mut src = RgbaImage::new(1, 1);
        src.put_pixel(0, 0, Rgba([200, 50, 128, 255]));
        let mut dst = RgbaImage::new(1, 1);
        threshold(&src, &mut dst, 127, 255, ThresholdKind::new(ThresholdType::Binary, false));
        assert_eq!(*dst.get_pixel(0, 0), Rgba([255, 0, 255, 255]));
    }

    #[test]
    fn otsu_ignores_passed_level() {
        let mut values = vec![20u8; 50];
        values.extend(std::iter::repeat_n(200u8, 50));
        let src = gray_row(&values);
        let mut dst = RgbaImage::new(1, 1);
        let used = threshold(&src, &mut dst, 250, 255, ThresholdKind::new(ThresholdType::Binary, true));
        assert_eq!(used, otsu_level(&src));
        assert!((20..200).contains(&used));
        let out = reds(&dst);
        assert!(out[..50].iter().all(|&v| v == 0));
        assert!(out[50..].iter().all(|&v| v == 255));
    }

    #[test]
    fn destination_is_resized() {
        let src = gray_row(&[1, 2, 3]);
        let mut dst = RgbaImage::new(7, 7);
        threshold(&src, &mut dst, 0, 255, ThresholdKind::default());
        assert_eq!(dst.dimensions(), (3, 1));
    }

    #[test]
    fn codes_carry_otsu_flag() {
        assert_eq!(ThresholdKind::new(ThresholdType::ToZeroInv, false).code(), 4);
        assert_eq!(ThresholdKind::new(ThresholdType::BinaryInv, true).code(), 9);
    }

    #[test]
    fn histogram_skips_transparent() {
        let mut img = gray_row(&[0, 0, 255]);
        img.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        let hist = compute_histogram(&img);
        assert_eq!(hist[0], 1);
        assert_eq!(hist[255], 1);
        assert_eq!(hist.iter().sum::<u32>(), 2);
    }

    #[test]
    fn otsu_sees_the_histogram_population() {
        let mut values = vec![0u8; 60];
        values.extend(std::iter::repeat_n(100u8, 20));
        values.extend(std::iter::repeat_n(200u8, 20));
        let mut img = gray_row(&values);
        for x in 0..60 {
            img.put_pixel(x, 0, Rgba([0, 0, 0, 0]));
        }

        let hist = compute_histogram(&img);
        assert_eq!(hist[0], 0);
        // Counting the transparent zeros would split 0 | 100,200 instead
        assert!((100..200).contains(&otsu_level(&img)));
    }

    #[test]
    fn otsu_of_fully_transparent_image_uses_every_pixel() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([90, 90, 90, 0]));
        assert_eq!(otsu_level(&img), imageproc::contrast::otsu_level(&image::imageops::grayscale(&img)));
    }
}
