//! Automatic lighting policy.
//!
//! A pure function from a [`TrainState`] snapshot to its lamp configuration.
//! Only `lights_state` and `lights_source` are written; everything else is
//! read-only input. Precedence, highest first:
//!
//! 1. Fail-safe forces red at both ends.
//! 2. Operator override bits, white winning over red per end (suppressed
//!    entirely while the override is telemetry-only).
//! 3. Automatic base colors from the active cab and direction: the leading
//!    end shows a white headlight, the trailing end a red marker; neutral or
//!    no cab means red at both ends.

use crate::frame::{LIGHTS_FRONT_RED, LIGHTS_FRONT_WHITE, LIGHTS_REAR_RED, LIGHTS_REAR_WHITE};
use crate::state::{ActiveCab, Direction, LightsSource, LightsState, TrainState};

#[derive(Clone, Copy, PartialEq)]
enum LampColor {
    Red,
    White,
}

fn base_colors(state: &TrainState) -> (LampColor, LampColor) {
    if state.active_cab == ActiveCab::None || state.direction == Direction::Neutral {
        return (LampColor::Red, LampColor::Red);
    }

    let moving_forward = state.direction == Direction::Forward;
    match state.active_cab {
        ActiveCab::Front if moving_forward => (LampColor::White, LampColor::Red),
        ActiveCab::Front => (LampColor::Red, LampColor::White),
        ActiveCab::Rear if moving_forward => (LampColor::Red, LampColor::White),
        ActiveCab::Rear => (LampColor::White, LampColor::Red),
        ActiveCab::None => (LampColor::Red, LampColor::Red),
    }
}

fn select(force_white: bool, force_red: bool, fallback: LampColor) -> LampColor {
    if force_white {
        LampColor::White
    } else if force_red {
        LampColor::Red
    } else {
        fallback
    }
}

fn encode(front: LampColor, rear: LampColor) -> LightsState {
    match (front, rear) {
        (LampColor::White, LampColor::Red) => LightsState::FrontWhiteRearRed,
        (LampColor::Red, LampColor::White) => LightsState::FrontRedRearWhite,
        (LampColor::White, LampColor::White) => LightsState::BothWhite,
        (LampColor::Red, LampColor::Red) => LightsState::BothRed,
    }
}

/// Recompute `lights_state` and `lights_source` from the rest of the state.
///
/// Idempotent: applying the policy twice to the same snapshot yields the
/// same lamp configuration.
pub fn apply(state: &mut TrainState) {
    if state.fail_safe_active {
        state.lights_state = LightsState::BothRed;
        state.lights_source = LightsSource::FailSafe;
        return;
    }

    let (base_front, base_rear) = base_colors(state);
    let mut mask = state.lights_override_mask & 0x0F;
    if state.lights_telemetry_only {
        mask = 0;
    }

    let (front, rear) = if mask != 0 {
        (
            select(
                mask & LIGHTS_FRONT_WHITE != 0,
                mask & LIGHTS_FRONT_RED != 0,
                base_front,
            ),
            select(
                mask & LIGHTS_REAR_WHITE != 0,
                mask & LIGHTS_REAR_RED != 0,
                base_rear,
            ),
        )
    } else {
        (base_front, base_rear)
    };

    state.lights_state = encode(front, rear);
    state.lights_source = if mask != 0 {
        LightsSource::Override
    } else {
        LightsSource::Automatic
    };
}
