// src/estimation/direction.rs

use crate::types::{BoundingBox, Direction};

const LEFT_BOUNDARY: f32 = 0.33;
const RIGHT_BOUNDARY: f32 = 0.67;

/// Splits the frame into left / center / right thirds by box center.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionClassifier;

impl DirectionClassifier {
    pub fn classify(&self, bbox: &BoundingBox, frame_width: f32) -> Direction {
        if frame_width <= 0.0 {
            return Direction::Center;
        }
        let (cx, _) = bbox.center();
        if cx < frame_width * LEFT_BOUNDARY {
            Direction::Left
        } else if cx > frame_width * RIGHT_BOUNDARY {
            Direction::Right
        } else {
            Direction::Center
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zones() {
        let c = DirectionClassifier;
        assert_eq!(c.classify(&BoundingBox::new(100.0, 100.0, 50.0, 150.0), 640.0), Direction::Left);
        assert_eq!(c.classify(&BoundingBox::new(300.0, 0.0, 40.0, 40.0), 640.0), Direction::Center);
        assert_eq!(c.classify(&BoundingBox::new(500.0, 0.0, 40.0, 40.0), 640.0), Direction::Right);
    }

    #[test]
    fn test_just_inside_center_band() {
        let c = DirectionClassifier;
        assert_eq!(c.classify(&BoundingBox::new(32.0, 0.0, 4.0, 4.0), 100.0), Direction::Center);
        assert_eq!(c.classify(&BoundingBox::new(64.0, 0.0, 4.0, 4.0), 100.0), Direction::Center);
        assert_eq!(c.classify(&BoundingBox::new(30.0, 0.0, 4.0, 4.0), 100.0), Direction::Left);
        assert_eq!(c.classify(&BoundingBox::new(66.0, 0.0, 4.0, 4.0), 100.0), Direction::Right);
    }

    #[test]
    fn test_zero_width_frame() {
        let c = DirectionClassifier;
        assert_eq!(c.classify(&BoundingBox::new(0.0, 0.0, 4.0, 4.0), 0.0), Direction::Center);
    }
}
