use serde::{Deserialize, Serialize};

/// Bytes of a mean-color packet needed before it can be classified.
pub const MEAN_REPLY_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorCategory {
    #[default]
    Unknown,
    Yellow,
    Green,
    White,
    Red,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Rgb,
    YCrCb,
}

impl ColorCategory {
    /// Color space the camera must be in for this category's thresholds to
    /// mean anything. `None` for categories with no rule.
    pub fn color_space(self) -> Option<ColorSpace> {
        match self {
            ColorCategory::Green | ColorCategory::Red => Some(ColorSpace::YCrCb),
            ColorCategory::Yellow | ColorCategory::Blue => Some(ColorSpace::Rgb),
            ColorCategory::White | ColorCategory::Unknown => None,
        }
    }

    pub fn is_detectable(self) -> bool {
        self.color_space().is_some()
    }

    /// Threshold test against a raw mean packet. Bytes 2..=4 carry the three
    /// channel means (Cr Y Cb in YCrCb mode, R G B in RGB mode).
    pub fn matches(self, reply: &[u8]) -> bool {
        if reply.len() < MEAN_REPLY_LEN {
            return false;
        }
        let (a, b, c) = (reply[2], reply[3], reply[4]);
        match self {
            ColorCategory::Green => (85..=120).contains(&a) && (80..=134).contains(&c),
            ColorCategory::Red => a >= 190 && c <= 40,
            ColorCategory::Yellow => (100..=254).contains(&a) && (75..=150).contains(&b) && c <= 20,
            ColorCategory::Blue => a <= 150 && b <= 150 && c >= 135,
            ColorCategory::White | ColorCategory::Unknown => false,
        }
    }
}

/// `active` if the packet passes its test, `Unknown` otherwise.
pub fn classify(reply: &[u8], active: ColorCategory) -> ColorCategory {
    if active.matches(reply) {
        active
    } else {
        ColorCategory::Unknown
    }
}
