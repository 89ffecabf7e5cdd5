use crate::world::rng::WorldRng;
use serde::{Deserialize, Serialize};

/// A rectangular area in tile units. Zero-sized rects are valid and
/// describe a single point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Rect { x, y, w, h }
    }

    pub fn point(x: f32, y: f32) -> Self {
        Rect { x, y, w: 0.0, h: 0.0 }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.w && y >= self.y && y <= self.y + self.h
    }

    pub fn random_point(&self, rng: &mut WorldRng) -> (f32, f32) {
        (self.x + self.w * rng.unit(), self.y + self.h * rng.unit())
    }
}

pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_point() {
        let rect = Rect::new(2.0, 3.0, 4.0, 5.0);
        assert!(rect.contains(2.0, 3.0));
        assert!(rect.contains(6.0, 8.0));
        assert!(rect.contains(4.0, 5.0));
        assert!(!rect.contains(1.9, 4.0));
        assert!(!rect.contains(6.1, 4.0));
    }

    #[test]
    fn random_point_stays_inside() {
        let rect = Rect::new(10.0, 20.0, 5.0, 2.0);
        let mut rng = WorldRng::from_seed(3);
        for _ in 0..500 {
            let (x, y) = rect.random_point(&mut rng);
            assert!(rect.contains(x, y), "({x}, {y}) escaped {rect:?}");
        }
    }

    #[test]
    fn zero_sized_rect_yields_its_corner() {
        let rect = Rect::point(4.0, 7.0);
        let mut rng = WorldRng::from_seed(3);
        assert_eq!(rect.random_point(&mut rng), (4.0, 7.0));
    }

    #[test]
    fn clamp_limits_both_ends() {
        assert_eq!(clamp(-1.0, 0.0, 10.0), 0.0);
        assert_eq!(clamp(11.0, 0.0, 10.0), 10.0);
        assert_eq!(clamp(5.0, 0.0, 10.0), 5.0);
    }
}
