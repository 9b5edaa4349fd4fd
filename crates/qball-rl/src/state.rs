//! State, Action, and Reward types for RL
//!
//! Both key types are stored in integer-quantized form: a [`State`] holds four
//! integers, an [`Action`] holds two values in hundredths. Rounding happens
//! once, at construction, using round-half-to-even.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reward value from environment
pub type Reward = f64;

/// Number of action steps per unit (two decimal places)
pub const ACTION_SCALE: f64 = 100.0;

/// Largest action magnitude in hundredths
pub const ACTION_LIMIT: i16 = 100;

/// Raw 2D vector as reported by the environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Discretized observation used as a Q-table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State {
    position: [i32; 2],
    orientation: [i32; 2],
}

impl State {
    /// Build a state from the tracked object's relative position and the
    /// agent's orientation, rounding every component to the nearest integer.
    pub fn new(position_delta: Vec2, orientation: Vec2) -> Self {
        Self {
            position: [round_unit(position_delta.x), round_unit(position_delta.y)],
            orientation: [round_unit(orientation.x), round_unit(orientation.y)],
        }
    }

    /// Build a state from components that are already integral
    pub const fn from_components(position: [i32; 2], orientation: [i32; 2]) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn position(&self) -> [i32; 2] {
        self.position
    }

    pub fn orientation(&self) -> [i32; 2] {
        self.orientation
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pos({}, {}) rot({}, {})",
            self.position[0], self.position[1], self.orientation[0], self.orientation[1]
        )
    }
}

/// Discretized pair of control inputs in [-1, 1]
///
/// Ordering is x-major, which is also the enumeration order of [`ActionGrid`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Action {
    x: i16,
    z: i16,
}

impl Action {
    /// Clamp both inputs to [-1, 1] and round them to two decimals
    pub fn new(x: f64, z: f64) -> Self {
        Self {
            x: quantize(x),
            z: quantize(z),
        }
    }

    /// Build an action from hundredths, clamped to [-100, 100]
    pub fn from_hundredths(x: i16, z: i16) -> Self {
        Self {
            x: x.clamp(-ACTION_LIMIT, ACTION_LIMIT),
            z: z.clamp(-ACTION_LIMIT, ACTION_LIMIT),
        }
    }

    pub fn x(&self) -> f64 {
        f64::from(self.x) / ACTION_SCALE
    }

    pub fn z(&self) -> f64 {
        f64::from(self.z) / ACTION_SCALE
    }

    pub fn hundredths(&self) -> (i16, i16) {
        (self.x, self.z)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x(), self.z())
    }
}

/// Round-half-to-even to an integer; NaN maps to 0 and infinities saturate
fn round_unit(value: f64) -> i32 {
    value.round_ties_even() as i32
}

fn quantize(value: f64) -> i16 {
    let clamped = value.clamp(-1.0, 1.0);
    (clamped * ACTION_SCALE).round_ties_even() as i16
}

/// Discretize a raw observation into a [`State`]
pub fn discretize_state(position_delta: Vec2, orientation: Vec2) -> State {
    State::new(position_delta, orientation)
}

/// Discretize raw control inputs into an [`Action`]
pub fn discretize_action(x: f64, z: f64) -> Action {
    Action::new(x, z)
}

/// The grid of actions scanned by value lookup and greedy selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionGrid {
    /// Both components over [-1.00, 1.00]: the full action domain, 201 x 201
    #[default]
    Symmetric,
    /// Both components over [0.00, 1.00]: the historical scan range, 101 x 101.
    /// Actions with a negative component can be explored but never chosen
    /// greedily.
    Reference,
}

// A grid always holds at least one action
#[allow(clippy::len_without_is_empty)]
impl ActionGrid {
    /// Lowest component value, in hundredths
    pub const fn min_hundredths(&self) -> i16 {
        match self {
            ActionGrid::Symmetric => -ACTION_LIMIT,
            ActionGrid::Reference => 0,
        }
    }

    /// Highest component value, in hundredths
    pub const fn max_hundredths(&self) -> i16 {
        ACTION_LIMIT
    }

    /// Number of values per axis
    pub const fn axis_len(&self) -> usize {
        (self.max_hundredths() - self.min_hundredths()) as usize + 1
    }

    /// Total number of actions on the grid
    pub const fn len(&self) -> usize {
        self.axis_len() * self.axis_len()
    }

    /// Whether the action is one of the scanned grid points
    pub fn contains(&self, action: &Action) -> bool {
        let (x, z) = action.hundredths();
        let range = self.min_hundredths()..=self.max_hundredths();
        range.contains(&x) && range.contains(&z)
    }

    /// First action in enumeration order
    pub fn first(&self) -> Action {
        Action::from_hundredths(self.min_hundredths(), self.min_hundredths())
    }

    /// All grid actions, x-major, both components ascending
    pub fn iter(&self) -> impl Iterator<Item = Action> {
        let (lo, hi) = (self.min_hundredths(), self.max_hundredths());
        (lo..=hi).flat_map(move |x| (lo..=hi).map(move |z| Action::from_hundredths(x, z)))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionGrid::Symmetric => "symmetric",
            ActionGrid::Reference => "reference",
        }
    }
}

impl fmt::Display for ActionGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionGrid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "symmetric" => Ok(ActionGrid::Symmetric),
            "reference" => Ok(ActionGrid::Reference),
            other => Err(format!(
                "unknown action grid '{other}', expected 'symmetric' or 'reference'"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_rounds_to_nearest_integer() {
        let state = discretize_state(Vec2::new(1.4, -2.6), Vec2::new(0.2, -0.7));
        assert_eq!(state.position(), [1, -3]);
        assert_eq!(state.orientation(), [0, -1]);
    }

    #[test]
    fn test_state_rounds_half_to_even() {
        let state = discretize_state(Vec2::new(0.5, 1.5), Vec2::new(2.5, -0.5));
        assert_eq!(state.position(), [0, 2]);
        assert_eq!(state.orientation(), [2, 0]);
    }

    #[test]
    fn test_sub_threshold_perturbation_yields_equal_states() {
        let a = discretize_state(Vec2::new(1.1, 2.2), Vec2::new(0.1, 0.0));
        let b = discretize_state(Vec2::new(0.9, 1.8), Vec2::new(-0.3, 0.4));
        assert_eq!(a, b);
    }

    #[test]
    fn test_state_nan_maps_to_zero() {
        let state = discretize_state(Vec2::new(f64::NAN, 0.0), Vec2::default());
        assert_eq!(state.position(), [0, 0]);
    }

    #[test]
    fn test_action_rounds_to_two_decimals() {
        let action = discretize_action(0.123, -0.456);
        assert_eq!(action.hundredths(), (12, -46));
        assert_eq!(action.x(), 0.12);
        assert_eq!(action.z(), -0.46);
    }

    #[test]
    fn test_action_clamps_inputs() {
        let action = discretize_action(3.0, -7.5);
        assert_eq!(action.hundredths(), (100, -100));
    }

    #[test]
    fn test_action_handles_float_noise() {
        // 0.29 * 100 is 28.999999999999996 in binary floating point
        assert_eq!(discretize_action(0.29, 0.57).hundredths(), (29, 57));
    }

    #[test]
    fn test_action_equality_is_structural() {
        assert_eq!(discretize_action(0.101, 0.5), discretize_action(0.099, 0.5));
        assert_ne!(discretize_action(0.11, 0.5), discretize_action(0.1, 0.5));
    }

    #[test]
    fn test_action_display() {
        assert_eq!(discretize_action(-0.5, 0.25).to_string(), "(-0.50, 0.25)");
    }

    #[test]
    fn test_grid_sizes() {
        assert_eq!(ActionGrid::Symmetric.axis_len(), 201);
        assert_eq!(ActionGrid::Symmetric.len(), 40_401);
        assert_eq!(ActionGrid::Reference.axis_len(), 101);
        assert_eq!(ActionGrid::Reference.len(), 10_201);
        assert_eq!(ActionGrid::Reference.iter().count(), 10_201);
    }

    #[test]
    fn test_grid_enumeration_order() {
        let mut iter = ActionGrid::Reference.iter();
        assert_eq!(iter.next(), Some(Action::from_hundredths(0, 0)));
        assert_eq!(iter.next(), Some(Action::from_hundredths(0, 1)));
        assert_eq!(ActionGrid::Reference.iter().last(), Some(Action::from_hundredths(100, 100)));
        assert_eq!(ActionGrid::Symmetric.first(), Action::from_hundredths(-100, -100));

        let actions: Vec<_> = ActionGrid::Reference.iter().take(500).collect();
        assert!(actions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_grid_contains() {
        assert!(ActionGrid::Symmetric.contains(&discretize_action(-0.4, 0.3)));
        assert!(!ActionGrid::Reference.contains(&discretize_action(-0.4, 0.3)));
        assert!(ActionGrid::Reference.contains(&discretize_action(0.0, 1.0)));
    }

    #[test]
    fn test_grid_from_str() {
        assert_eq!("Reference".parse::<ActionGrid>().unwrap(), ActionGrid::Reference);
        assert!("diagonal".parse::<ActionGrid>().is_err());
    }

    #[test]
    fn test_state_serialization() {
        let state = discretize_state(Vec2::new(2.2, -1.0), Vec2::new(0.0, 0.0));
        let json = serde_json::to_string(&state).unwrap();
        let parsed: State = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
