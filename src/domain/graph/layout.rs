use std::f64::consts::PI;

use serde::Serialize;

use crate::config::LayoutConfig;

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }
}

/// Places the orchestrator in the center and every other device on a circle around it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleLayout {
    pub center: Position,
    pub radius: f64,
}

impl From<LayoutConfig> for CircleLayout {
    fn from(config: LayoutConfig) -> Self {
        CircleLayout { center: Position::new(config.center_x, config.center_y), radius: config.radius }
    }
}

impl Default for CircleLayout {
    fn default() -> Self {
        CircleLayout::from(LayoutConfig::default())
    }
}

impl CircleLayout {
    /// Position of the `slot`-th of `ring_size` devices on the circle. Slot 0 sits at angle 0
    /// (to the right of the center), the rest follow clockwise in screen coordinates.
    pub fn ring_position(&self, slot: usize, ring_size: usize) -> Position {
        if ring_size == 0 {
            return self.center;
        }
        let radians = (slot as f64) * 2.0 * PI / (ring_size as f64);
        Position::new(self.center.x + self.radius * radians.cos(), self.center.y + self.radius * radians.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Position, b: Position) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn ring_positions_are_evenly_spread() {
        let layout = CircleLayout { center: Position::new(0.0, 0.0), radius: 10.0 };

        assert!(close(layout.ring_position(0, 4), Position::new(10.0, 0.0)));
        assert!(close(layout.ring_position(1, 4), Position::new(0.0, 10.0)));
        assert!(close(layout.ring_position(2, 4), Position::new(-10.0, 0.0)));
        assert!(close(layout.ring_position(3, 4), Position::new(0.0, -10.0)));
    }

    #[test]
    fn every_ring_position_is_at_radius() {
        let layout = CircleLayout::default();
        for slot in 0..7 {
            let p = layout.ring_position(slot, 7);
            let distance = ((p.x - layout.center.x).powi(2) + (p.y - layout.center.y).powi(2)).sqrt();
            assert!((distance - layout.radius).abs() < 1e-9);
        }
    }
}
