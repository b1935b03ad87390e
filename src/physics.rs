//! Small 2D math kit shared by the simulation, the ray caster and the
//! sprite projector. World units are grid cells.

/// Stand-in for a zero denominator in distance and projection formulas.
pub const EPSILON: f64 = 1e-9;

/// Returns `v`, or [`EPSILON`] when `v` is exactly zero, so it can be used
/// as a divisor.
#[inline(always)]
pub fn nonzero(v: f64) -> f64 {
    if v == 0.0 {
        EPSILON
    } else {
        v
    }
}

/// 2D vector in world units
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    #[inline(always)]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline(always)]
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    #[inline(always)]
    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    #[inline(always)]
    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    #[inline(always)]
    pub fn scale(&self, s: f64) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
        }
    }

    #[inline(always)]
    pub fn add(&self, other: &Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    #[inline(always)]
    pub fn sub(&self, other: &Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    /// Rotates by `angle` radians with the standard 2D rotation matrix.
    #[inline(always)]
    pub fn rotate(&self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    #[inline(always)]
    pub fn distance_to(&self, other: &Self) -> f64 {
        self.sub(other).length()
    }

    #[inline(always)]
    pub fn distance_squared_to(&self, other: &Self) -> f64 {
        self.sub(other).length_squared()
    }

    /// Component-wise closeness, used by tests and by the patrol arrival check.
    #[inline(always)]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

/// Circle collider for entities
#[derive(Clone, Copy, Debug)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f64,
}

impl Circle {
    #[inline(always)]
    pub fn new(center: Vec2, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Squared-distance overlap test against the sum of both radii.
    #[inline(always)]
    pub fn intersects_circle(&self, other: &Circle) -> bool {
        let dist_sq = self.center.distance_squared_to(&other.center);
        let radii_sum = self.radius + other.radius;
        dist_sq <= radii_sum * radii_sum
    }
}
