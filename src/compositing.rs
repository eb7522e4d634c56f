//! Separable blend modes and Porter-Duff operators.
//!
//! A draw composites in two stages. The fragment epilogue mixes the sampled
//! color with the backdrop according to the [`BlendMode`], then fixed
//! function blending applies the [`PorterDuff`] operator to the
//! premultiplied result.

/// Separable blend mode, as in the W3C compositing model.
///
/// The discriminants are the values of the `u_blend_mode` uniform read by
/// the fragment epilogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum BlendMode {
    /// Source replaces backdrop.
    #[default]
    Normal = 0,
    /// `cb * cs`
    Multiply = 1,
    /// `cb + cs - cb * cs`
    Screen = 2,
    /// Hard light with the layers swapped.
    Overlay = 3,
    /// `min(cb, cs)`
    Darken = 4,
    /// `max(cb, cs)`
    Lighten = 5,
    /// Brightens the backdrop toward the source.
    ColorDodge = 6,
    /// Darkens the backdrop toward the source.
    ColorBurn = 7,
    /// Multiply or screen depending on the source.
    HardLight = 8,
    /// Softer variant of hard light.
    SoftLight = 9,
    /// `|cb - cs|`
    Difference = 10,
    /// `cb + cs - 2 * cb * cs`
    Exclusion = 11,
}

impl BlendMode {
    /// Every mode, in code order.
    pub const ALL: [Self; 12] = [
        Self::Normal,
        Self::Multiply,
        Self::Screen,
        Self::Overlay,
        Self::Darken,
        Self::Lighten,
        Self::ColorDodge,
        Self::ColorBurn,
        Self::HardLight,
        Self::SoftLight,
        Self::Difference,
        Self::Exclusion,
    ];

    /// Value uploaded to `u_blend_mode`.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Mode for a `u_blend_mode` value.
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Returns `true` if the shader must read the backdrop, which the
    /// canvas then copies into a texture before drawing.
    pub const fn needs_backdrop(self) -> bool {
        !matches!(self, Self::Normal)
    }

    /// Blends one straight-alpha channel. Mirrors `__blend_channel` in the
    /// fragment epilogue.
    pub fn blend_channel(self, cb: f32, cs: f32) -> f32 {
        match self {
            Self::Normal => cs,
            Self::Multiply => cb * cs,
            Self::Screen => cb + cs - cb * cs,
            Self::Overlay => Self::HardLight.blend_channel(cs, cb),
            Self::Darken => cb.min(cs),
            Self::Lighten => cb.max(cs),
            Self::ColorDodge => {
                if cb <= 0.0 {
                    0.0
                } else if cs >= 1.0 {
                    1.0
                } else {
                    (cb / (1.0 - cs)).min(1.0)
                }
            }
            Self::ColorBurn => {
                if cb >= 1.0 {
                    1.0
                } else if cs <= 0.0 {
                    0.0
                } else {
                    1.0 - ((1.0 - cb) / cs).min(1.0)
                }
            }
            Self::HardLight => {
                if cs <= 0.5 {
                    cb * 2.0 * cs
                } else {
                    Self::Screen.blend_channel(cb, 2.0 * cs - 1.0)
                }
            }
            Self::SoftLight => {
                if cs <= 0.5 {
                    cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
                } else {
                    let d = if cb <= 0.25 {
                        ((16.0 * cb - 12.0) * cb + 4.0) * cb
                    } else {
                        cb.sqrt()
                    };
                    cb + (2.0 * cs - 1.0) * (d - cb)
                }
            }
            Self::Difference => (cb - cs).abs(),
            Self::Exclusion => cb + cs - 2.0 * cb * cs,
        }
    }

    /// Blends straight-alpha `source` over `backdrop`: the blended color is
    /// weighted by the backdrop's alpha, the source's alpha is kept.
    pub fn apply(self, backdrop: [f32; 4], source: [f32; 4]) -> [f32; 4] {
        let ab = backdrop[3];
        let mut out = source;
        for i in 0..3 {
            let blended = self.blend_channel(backdrop[i], source[i]);
            out[i] = (1.0 - ab) * source[i] + ab * blended;
        }
        out
    }
}

/// Porter-Duff compositing operator on premultiplied colors:
/// `result = Fa * source + Fb * destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PorterDuff {
    /// Neither.
    Clear,
    /// Source only.
    Source,
    /// Destination only.
    Destination,
    /// Source over destination.
    #[default]
    SourceOver,
    /// Destination over source.
    DestinationOver,
    /// Source where destination is.
    SourceIn,
    /// Destination where source is.
    DestinationIn,
    /// Source where destination is not.
    SourceOut,
    /// Destination where source is not.
    DestinationOut,
    /// Source over destination, only where destination is.
    SourceAtop,
    /// Destination over source, only where source is.
    DestinationAtop,
    /// Source and destination where the other is not.
    Xor,
    /// Sum.
    Plus,
}

impl PorterDuff {
    /// Every operator.
    pub const ALL: [Self; 13] = [
        Self::Clear,
        Self::Source,
        Self::Destination,
        Self::SourceOver,
        Self::DestinationOver,
        Self::SourceIn,
        Self::DestinationIn,
        Self::SourceOut,
        Self::DestinationOut,
        Self::SourceAtop,
        Self::DestinationAtop,
        Self::Xor,
        Self::Plus,
    ];

    /// `(Fa, Fb)` for source alpha `alpha_s` and destination alpha `alpha_d`.
    pub fn factors(self, alpha_s: f32, alpha_d: f32) -> (f32, f32) {
        match self {
            Self::Clear => (0.0, 0.0),
            Self::Source => (1.0, 0.0),
            Self::Destination => (0.0, 1.0),
            Self::SourceOver => (1.0, 1.0 - alpha_s),
            Self::DestinationOver => (1.0 - alpha_d, 1.0),
            Self::SourceIn => (alpha_d, 0.0),
            Self::DestinationIn => (0.0, alpha_s),
            Self::SourceOut => (1.0 - alpha_d, 0.0),
            Self::DestinationOut => (0.0, 1.0 - alpha_s),
            Self::SourceAtop => (alpha_d, 1.0 - alpha_s),
            Self::DestinationAtop => (1.0 - alpha_d, alpha_s),
            Self::Xor => (1.0 - alpha_d, 1.0 - alpha_s),
            Self::Plus => (1.0, 1.0),
        }
    }

    /// `(sfactor, dfactor)` for `glBlendFunc`.
    pub const fn gl_blend_factors(self) -> (u32, u32) {
        match self {
            Self::Clear => (glow::ZERO, glow::ZERO),
            Self::Source => (glow::ONE, glow::ZERO),
            Self::Destination => (glow::ZERO, glow::ONE),
            Self::SourceOver => (glow::ONE, glow::ONE_MINUS_SRC_ALPHA),
            Self::DestinationOver => (glow::ONE_MINUS_DST_ALPHA, glow::ONE),
            Self::SourceIn => (glow::DST_ALPHA, glow::ZERO),
            Self::DestinationIn => (glow::ZERO, glow::SRC_ALPHA),
            Self::SourceOut => (glow::ONE_MINUS_DST_ALPHA, glow::ZERO),
            Self::DestinationOut => (glow::ZERO, glow::ONE_MINUS_SRC_ALPHA),
            Self::SourceAtop => (glow::DST_ALPHA, glow::ONE_MINUS_SRC_ALPHA),
            Self::DestinationAtop => (glow::ONE_MINUS_DST_ALPHA, glow::SRC_ALPHA),
            Self::Xor => (glow::ONE_MINUS_DST_ALPHA, glow::ONE_MINUS_SRC_ALPHA),
            Self::Plus => (glow::ONE, glow::ONE),
        }
    }

    /// Composites premultiplied `source` onto premultiplied `destination`.
    pub fn composite(self, source: [f32; 4], destination: [f32; 4]) -> [f32; 4] {
        let (fa, fb) = self.factors(source[3], destination[3]);
        std::array::from_fn(|i| fa * source[i] + fb * destination[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f32; 4], b: [f32; 4]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn codes_round_trip() {
        for mode in BlendMode::ALL {
            assert_eq!(BlendMode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(BlendMode::from_code(12), None);
        assert_eq!(BlendMode::from_code(-1), None);
    }

    #[test]
    fn only_normal_skips_backdrop() {
        let needing: Vec<_> = BlendMode::ALL
            .into_iter()
            .filter(|m| !m.needs_backdrop())
            .collect();
        assert_eq!(needing, vec![BlendMode::Normal]);
    }

    #[test]
    fn known_channel_values() {
        assert!((BlendMode::Multiply.blend_channel(0.5, 0.5) - 0.25).abs() < 1e-6);
        assert!((BlendMode::Screen.blend_channel(0.5, 0.5) - 0.75).abs() < 1e-6);
        assert!((BlendMode::Difference.blend_channel(0.2, 0.7) - 0.5).abs() < 1e-6);
        assert!((BlendMode::Exclusion.blend_channel(1.0, 1.0)).abs() < 1e-6);
        assert!((BlendMode::ColorDodge.blend_channel(0.0, 1.0)).abs() < 1e-6);
        assert!((BlendMode::ColorBurn.blend_channel(1.0, 0.0) - 1.0).abs() < 1e-6);
        assert!((BlendMode::SoftLight.blend_channel(0.5, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn blending_over_transparent_backdrop_is_identity() {
        let source = [0.3, 0.6, 0.9, 0.5];
        for mode in BlendMode::ALL {
            assert!(close(mode.apply([0.8, 0.1, 0.4, 0.0], source), source));
        }
    }

    #[test]
    fn source_over_matches_gl_factors() {
        let src = [0.5, 0.0, 0.0, 0.5];
        let dst = [0.0, 0.0, 1.0, 1.0];
        assert!(close(
            PorterDuff::SourceOver.composite(src, dst),
            [0.5, 0.0, 0.5, 1.0]
        ));
        assert_eq!(
            PorterDuff::SourceOver.gl_blend_factors(),
            (glow::ONE, glow::ONE_MINUS_SRC_ALPHA)
        );
    }

    #[test]
    fn operator_identities() {
        let src = [0.2, 0.4, 0.6, 0.8];
        let dst = [0.1, 0.1, 0.1, 0.5];
        assert!(close(PorterDuff::Clear.composite(src, dst), [0.0; 4]));
        assert!(close(PorterDuff::Source.composite(src, dst), src));
        assert!(close(PorterDuff::Destination.composite(src, dst), dst));
        assert!(close(
            PorterDuff::Plus.composite(src, dst),
            [0.3, 0.5, 0.7, 1.3]
        ));
        let xor = PorterDuff::Xor.composite(src, dst);
        assert!((xor[3] - (0.8 * 0.5 + 0.5 * 0.2)).abs() < 1e-6);
    }

    #[test]
    fn every_operator_has_distinct_factors() {
        let mut seen = Vec::new();
        for op in PorterDuff::ALL {
            let f = op.gl_blend_factors();
            assert!(!seen.contains(&f), "{op:?} duplicates another operator");
            seen.push(f);
        }
    }
}
