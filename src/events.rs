use std::path::PathBuf;

/// Sign of a carousel step.
///
/// `Positive` is `+1` and `Negative` is `-1`. The active index moves by
/// `-direction`, so a positive step always rotates toward lower indices no
/// matter whether a wheel impulse or a drag produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    pub const fn sign(self) -> i32 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }

    pub fn as_f32(self) -> f32 {
        self.sign() as f32
    }

    /// Maps the sign of `value` onto a direction; zero and NaN have none.
    pub fn from_sign(value: f32) -> Option<Self> {
        if value > 0.0 {
            Some(Self::Positive)
        } else if value < 0.0 {
            Some(Self::Negative)
        } else {
            None
        }
    }
}

/// One raw wheel event.
///
/// `delta` follows the legacy `wheelDelta` convention: positive when the wheel
/// rolls away from the user, roughly 120 per notch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelSample {
    pub delta: f32,
}

/// Intent reported by the drag recognizer for a single pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragIntent {
    pub direction: Option<Direction>,
    pub intentional: bool,
    pub dragging: bool,
}

/// Which gesture source the host enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointerKind {
    /// Mouse or trackpad: wheel impulses drive the carousel.
    #[default]
    Fine,
    /// Touch-like: horizontal drags drive the carousel.
    Coarse,
}

/// A decoded image ready for GPU upload.
#[derive(Debug, Clone)]
pub struct PreparedImageCpu {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl PreparedImageCpu {
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

/// Developer controls bound to the debug panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebugCommand {
    /// Nudge `progress` by the given amount (clamped to `[0, 1]`).
    Scrub(f32),
    /// Fire an advance as if a gesture had requested it.
    Advance(Direction),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_signs() {
        assert_eq!(Direction::Positive.sign(), 1);
        assert_eq!(Direction::Negative.sign(), -1);
        assert_eq!(Direction::from_sign(3.5), Some(Direction::Positive));
        assert_eq!(Direction::from_sign(-0.1), Some(Direction::Negative));
        assert_eq!(Direction::from_sign(0.0), None);
        assert_eq!(Direction::from_sign(f32::NAN), None);
    }
}
