use std::ops::Sub;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::DIMS;
use crate::error::{Result, WaveError};

/// A point in the 4D coordinate space.
///
/// Axes cycle x, y, z, w in that order; `axis(i)` indexes them the same way
/// the KD-tree splits them. No unit or range invariant is enforced.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point4 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Point4 {
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// The origin (0, 0, 0, 0).
    pub const fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Build from a slice, rejecting anything that is not exactly 4 long.
    pub fn from_slice(coords: &[f64]) -> Result<Self> {
        match coords {
            [x, y, z, w] => Ok(Self::new(*x, *y, *z, *w)),
            _ => Err(WaveError::DimensionMismatch {
                expected: DIMS,
                got: coords.len(),
            }),
        }
    }

    /// Convert to [x, y, z, w].
    pub fn to_array(self) -> [f64; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Create from [x, y, z, w].
    pub fn from_array(arr: [f64; 4]) -> Self {
        Self::new(arr[0], arr[1], arr[2], arr[3])
    }

    /// Coordinate along `axis` (0 = x, 1 = y, 2 = z, 3 = w). Wraps modulo 4.
    pub fn axis(self, axis: usize) -> f64 {
        match axis % DIMS {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            _ => self.w,
        }
    }

    /// 4D dot product.
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    pub fn distance_squared(self, other: Self) -> f64 {
        let d = self - other;
        d.dot(d)
    }

    /// Euclidean distance.
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Uniform random point in the axis-aligned cube `[lo, hi)^4`.
    pub fn random_in_cube(lo: f64, hi: f64, rng: &mut impl Rng) -> Self {
        let span = hi - lo;
        Self::new(
            lo + span * rng.random::<f64>(),
            lo + span * rng.random::<f64>(),
            lo + span * rng.random::<f64>(),
            lo + span * rng.random::<f64>(),
        )
    }
}

impl Sub for Point4 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
            w: self.w - rhs.w,
        }
    }
}

impl From<[f64; 4]> for Point4 {
    fn from(arr: [f64; 4]) -> Self {
        Self::from_array(arr)
    }
}

/// One ranked search result. Result lists are always sorted by ascending distance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Neighbor<T> {
    pub data: T,
    pub distance: f64,
}

impl<T> Neighbor<T> {
    pub fn new(data: T, distance: f64) -> Self {
        Self { data, distance }
    }
}

/// Euclidean distance between two equal-length slices.
pub(crate) fn slice_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Box-Muller transform for generating Gaussian-distributed random numbers.
pub(crate) fn gauss_random(rng: &mut impl Rng) -> f64 {
    // Clamp u1 away from 0 to avoid ln(0) = -inf
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
