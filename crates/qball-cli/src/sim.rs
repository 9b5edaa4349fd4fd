//! Ball-balancing environment
//!
//! A ball rolls on a square platform that the agent tilts around its x and z
//! axes. The state reported to the learner is the ball position relative to
//! the platform centre and the platform orientation as the x/z components of
//! its rotation quaternion. Simple rigid-body kinematics, no collisions.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use qball_rl::{Action, Environment, Observation, Vec2};

/// Gravitational acceleration
const GRAVITY: f64 = 9.81;
/// Rolling solid sphere: a = 5/7 g sin(theta)
const ROLLING_FACTOR: f64 = 5.0 / 7.0;
/// Degrees of rotation per tick at full action
const DEGREES_PER_TICK: f64 = 2.0;
/// Quaternion component limit beyond which tilting further is refused
const TILT_LIMIT: f64 = 0.25;
/// Half side length of the platform surface
const PLATFORM_HALF_EXTENT: f64 = 2.5;
/// Horizontal distance that ends the episode
const TERMINAL_DISTANCE: f64 = 3.0;
/// Drop below the platform that ends the episode
const TERMINAL_DROP: f64 = -2.0;
/// Range of the random horizontal start position
const SPAWN_EXTENT: f64 = 2.25;
/// Height of the ball centre above the platform when resting on it
const BALL_REST_HEIGHT: f64 = 0.5;

/// Ball on a tilting platform
#[derive(Debug, Clone)]
pub struct BallPlatform<R = StdRng> {
    /// Ball centre relative to the platform centre (x, height, z)
    position: [f64; 3],
    velocity: [f64; 3],
    /// Platform rotation about its x and z axes, in degrees
    angle_x: f64,
    angle_z: f64,
    dt: f64,
    rng: R,
}

impl BallPlatform<StdRng> {
    /// Environment stepping `tick_rate_hz` times per simulated second
    pub fn new(tick_rate_hz: f64, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self::with_rng(tick_rate_hz, rng)
    }
}

impl<R: Rng> BallPlatform<R> {
    pub fn with_rng(tick_rate_hz: f64, rng: R) -> Self {
        let mut env = Self {
            position: [0.0, BALL_REST_HEIGHT, 0.0],
            velocity: [0.0; 3],
            angle_x: 0.0,
            angle_z: 0.0,
            dt: 1.0 / tick_rate_hz,
            rng,
        };
        env.reset();
        env
    }

    /// Ball centre relative to the platform (x, height, z)
    pub fn ball_position(&self) -> [f64; 3] {
        self.position
    }

    /// Quaternion x/z components of the platform rotation
    pub fn orientation(&self) -> Vec2 {
        Vec2::new(quaternion_component(self.angle_x), quaternion_component(self.angle_z))
    }

    fn on_platform(&self) -> bool {
        self.position[0].abs() <= PLATFORM_HALF_EXTENT
            && self.position[2].abs() <= PLATFORM_HALF_EXTENT
    }

    fn rotate(&mut self, action: Action) {
        let step_x = DEGREES_PER_TICK * action.x().clamp(-1.0, 1.0);
        let step_z = DEGREES_PER_TICK * action.z().clamp(-1.0, 1.0);
        let orientation = self.orientation();

        // Tilt further only while inside the limit; tilting back is always allowed
        if (orientation.y < TILT_LIMIT && step_z > 0.0) || (orientation.y > -TILT_LIMIT && step_z < 0.0)
        {
            self.angle_z += step_z;
        }
        if (orientation.x < TILT_LIMIT && step_x > 0.0) || (orientation.x > -TILT_LIMIT && step_x < 0.0)
        {
            self.angle_x += step_x;
        }
    }

    fn integrate(&mut self) {
        let dt = self.dt;
        if self.on_platform() {
            // Tilt about z rolls the ball along -x, tilt about x along +z
            let ax = -ROLLING_FACTOR * GRAVITY * self.angle_z.to_radians().sin();
            let az = ROLLING_FACTOR * GRAVITY * self.angle_x.to_radians().sin();
            self.velocity[0] += ax * dt;
            self.velocity[1] = 0.0;
            self.velocity[2] += az * dt;
        } else {
            self.velocity[1] -= GRAVITY * dt;
        }
        for (p, v) in self.position.iter_mut().zip(self.velocity) {
            *p += v * dt;
        }
    }
}

fn quaternion_component(angle_degrees: f64) -> f64 {
    (angle_degrees.to_radians() / 2.0).sin()
}

impl<R: Rng> Environment for BallPlatform<R> {
    fn observe(&self) -> Observation {
        let [x, _, z] = self.ball_position();
        Observation {
            position_delta: Vec2::new(x, z),
            orientation: self.orientation(),
        }
    }

    fn apply_action(&mut self, action: Action) {
        self.rotate(action);
        self.integrate();
    }

    fn is_terminal(&self) -> bool {
        self.position[1] < TERMINAL_DROP
            || self.position[0].abs() > TERMINAL_DISTANCE
            || self.position[2].abs() > TERMINAL_DISTANCE
    }

    fn reset(&mut self) {
        self.position = [
            self.rng.gen_range(-SPAWN_EXTENT..=SPAWN_EXTENT),
            BALL_REST_HEIGHT,
            self.rng.gen_range(-SPAWN_EXTENT..=SPAWN_EXTENT),
        ];
        self.velocity = [0.0; 3];
        self.angle_x = 0.0;
        self.angle_z = 0.0;
    }
}
