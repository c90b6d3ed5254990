use bitflags::bitflags;
use glam::Vec2;

use crate::net::OutboundEvent;

bitflags! {
    /// Movement intent as sent in the `inputs` event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Direction: u8 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

impl Direction {
    pub const NONE: Self = Self::empty();
}

/// Physical keys the encoder cares about, named by keyboard position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    KeyW,
    KeyA,
    KeyS,
    KeyD,
    Other,
}

impl KeyCode {
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::KeyW => Some(Direction::UP),
            Self::KeyS => Some(Direction::DOWN),
            Self::KeyD => Some(Direction::RIGHT),
            Self::KeyA => Some(Direction::LEFT),
            Self::Other => None,
        }
    }
}

/// Fire angle in radians for a click at `pointer` on a canvas of `canvas` size.
pub fn fire_angle(pointer: Vec2, canvas: Vec2) -> f32 {
    let offset = pointer - canvas / 2.0;
    offset.y.atan2(offset.x)
}

#[derive(Debug, Default)]
pub struct InputEncoder {
    current: Direction,
}

impl InputEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key event yields an `inputs` emission, mapped or not.
    pub fn key_down(&mut self, key: KeyCode) -> OutboundEvent {
        if let Some(direction) = key.direction() {
            self.current |= direction;
        }
        OutboundEvent::Inputs(self.current)
    }

    pub fn key_up(&mut self, key: KeyCode) -> OutboundEvent {
        if let Some(direction) = key.direction() {
            self.current &= !direction;
        }
        OutboundEvent::Inputs(self.current)
    }

    /// One-shot fire intent. Not gated on `can_fire`; the server decides.
    pub fn click(&self, pointer: Vec2, canvas: Vec2) -> OutboundEvent {
        OutboundEvent::Snowball(fire_angle(pointer, canvas))
    }

    pub fn current(&self) -> Direction {
        self.current
    }

    pub fn release_all(&mut self) -> OutboundEvent {
        self.current = Direction::NONE;
        OutboundEvent::Inputs(self.current)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use super::*;

    #[test]
    fn keys_combine_and_release() {
        let mut encoder = InputEncoder::new();

        assert_eq!(encoder.key_down(KeyCode::KeyW), OutboundEvent::Inputs(Direction::UP));
        assert_eq!(
            encoder.key_down(KeyCode::KeyD),
            OutboundEvent::Inputs(Direction::UP | Direction::RIGHT)
        );
        assert_eq!(encoder.key_up(KeyCode::KeyW), OutboundEvent::Inputs(Direction::RIGHT));
        assert_eq!(encoder.key_up(KeyCode::KeyD), OutboundEvent::Inputs(Direction::NONE));
    }

    #[test]
    fn repeated_and_unmapped_keys_still_emit() {
        let mut encoder = InputEncoder::new();
        encoder.key_down(KeyCode::KeyA);

        assert_eq!(encoder.key_down(KeyCode::KeyA), OutboundEvent::Inputs(Direction::LEFT));
        assert_eq!(encoder.key_down(KeyCode::Other), OutboundEvent::Inputs(Direction::LEFT));
    }

    #[test]
    fn fire_angle_relative_to_center() {
        let canvas = Vec2::new(200.0, 100.0);
        assert!((fire_angle(Vec2::new(150.0, 50.0), canvas)).abs() < 1e-6);
        assert!((fire_angle(Vec2::new(100.0, 90.0), canvas) - FRAC_PI_2).abs() < 1e-6);
        assert!((fire_angle(Vec2::new(0.0, 50.0), canvas) - PI).abs() < 1e-6);
    }

    #[test]
    fn wire_value_is_raw_bits() {
        assert_eq!((Direction::DOWN | Direction::LEFT).bits(), 6);
        assert_eq!(Direction::NONE.bits(), 0);
    }
}
