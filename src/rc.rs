//! Reward-cost pairs and the running-average accumulators built on top of them.

use std::ops::{Add, AddAssign, Div, Mul};

/// A reward and a cost, carried in lock-step through every discounted accumulation.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct RC {
    pub r: f64,
    pub c: f64,
}

impl RC {
    pub const ZERO: RC = RC { r: 0.0, c: 0.0 };

    pub const fn new(r: f64, c: f64) -> Self {
        RC { r, c }
    }
}

impl Add for RC {
    type Output = RC;
    fn add(self, rhs: RC) -> RC {
        RC::new(self.r + rhs.r, self.c + rhs.c)
    }
}

impl AddAssign for RC {
    fn add_assign(&mut self, rhs: RC) {
        self.r += rhs.r;
        self.c += rhs.c;
    }
}

impl Mul<f64> for RC {
    type Output = RC;
    fn mul(self, rhs: f64) -> RC {
        RC::new(self.r * rhs, self.c * rhs)
    }
}

impl Mul<RC> for f64 {
    type Output = RC;
    fn mul(self, rhs: RC) -> RC {
        rhs * self
    }
}

impl Div<f64> for RC {
    type Output = RC;
    fn div(self, rhs: f64) -> RC {
        RC::new(self.r / rhs, self.c / rhs)
    }
}

/// A running count/total accumulator with the convention that an empty accumulator reports its
/// raw (zero) total rather than dividing by zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct Value {
    count: f64,
    total: RC,
}

impl Value {
    pub fn new() -> Self {
        Value::default()
    }

    pub fn set(&mut self, count: f64, total: RC) {
        self.count = count;
        self.total = total;
    }

    /// Add an observation with unit weight.
    pub fn add(&mut self, x: RC) {
        self.add_weighted(x, 1.0);
    }

    /// Add an observation with an arbitrary (possibly fractional) weight, as used by RAVE/AMAF
    /// bookkeeping and depth-weighted backpropagation.
    pub fn add_weighted(&mut self, x: RC, weight: f64) {
        self.count += weight;
        self.total += x * weight;
    }

    pub fn count(&self) -> f64 {
        self.count
    }

    pub fn total(&self) -> RC {
        self.total
    }

    /// Mean value; returns the raw total (not divided) when the accumulator is empty, matching
    /// the convention `GetValue()` uses in the reference algorithm.
    pub fn value(&self) -> RC {
        if self.count <= 0.0 {
            self.total
        } else {
            self.total / self.count
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_returns_raw_total() {
        let v = Value::new();
        assert_eq!(v.value(), RC::ZERO);
    }

    #[test]
    fn weighted_add_accumulates_mean() {
        let mut v = Value::new();
        v.add(RC::new(1.0, 2.0));
        v.add(RC::new(3.0, 0.0));
        assert_eq!(v.count(), 2.0);
        assert_eq!(v.value(), RC::new(2.0, 1.0));
    }

    #[test]
    fn fractional_weight_scales_contribution() {
        let mut v = Value::new();
        v.add_weighted(RC::new(10.0, 10.0), 0.5);
        assert_eq!(v.count(), 0.5);
        assert_eq!(v.value(), RC::new(10.0, 10.0));
    }

    #[test]
    fn rc_algebra() {
        let a = RC::new(1.0, 2.0);
        let b = RC::new(3.0, 4.0);
        assert_eq!(a + b, RC::new(4.0, 6.0));
        assert_eq!(a * 2.0, RC::new(2.0, 4.0));
        assert_eq!(2.0 * a, RC::new(2.0, 4.0));
        assert_eq!((a + b) / 2.0, RC::new(2.0, 3.0));
    }
}
