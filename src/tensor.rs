use std::fmt::{Debug, Display};

/// A trait that represents a type that can be used as a node value in this library.
///
/// An implementation for f64 is provided by the crate, along with the dense array
/// [`crate::Dense`]. You can implement it for your own type, such as a matrix
/// backed by another crate.
///
/// Element-wise operations between two values are expected to broadcast when
/// one side holds a single element. [`Tensor::broadcasts_with`] is consulted
/// before any arithmetic is performed, so the operator implementations can
/// assume compatible operands.
pub trait Tensor:
    std::ops::Add<Self, Output = Self>
    + std::ops::Sub<Self, Output = Self>
    + std::ops::Mul<Self, Output = Self>
    + std::ops::Div<Self, Output = Self>
    + std::ops::Neg<Output = Self>
    + Sized
    + Display
    + Debug
    + Clone
{
    /// Lift a plain number into this value type.
    fn from_scalar(value: f64) -> Self;

    fn shape(&self) -> Vec<usize>;

    fn map(&self, f: impl Fn(f64) -> f64) -> Self;

    /// Element-wise combination, broadcasting a single-element side.
    fn zip_map(&self, rhs: &Self, f: impl Fn(f64, f64) -> f64) -> Self;

    /// Returns the first element that satisfies the predicate.
    fn find(&self, pred: impl Fn(f64) -> bool) -> Option<f64>;

    /// Reduce every element into a single-element value.
    fn sum(&self) -> Self;

    fn one_like(&self) -> Self {
        self.map(|_| 1.)
    }

    fn zero_like(&self) -> Self {
        self.map(|_| 0.)
    }

    fn broadcasts_with(&self, rhs: &Self) -> bool {
        let (lhs, rhs) = (self.shape(), rhs.shape());
        lhs == rhs || numel(&lhs) == 1 || numel(&rhs) == 1
    }

    /// Fold a broadcast gradient back into the shape of `like`.
    ///
    /// A contribution computed against a broadcast operand has the shape of
    /// the wider operand; the operand's own gradient is the sum over it.
    fn reduce_to(self, like: &Self) -> Self {
        if self.shape() == like.shape() {
            self
        } else {
            self.sum()
        }
    }
}

pub(crate) fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

impl Tensor for f64 {
    fn from_scalar(value: f64) -> Self {
        value
    }

    fn shape(&self) -> Vec<usize> {
        vec![]
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        f(*self)
    }

    fn zip_map(&self, rhs: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        f(*self, *rhs)
    }

    fn find(&self, pred: impl Fn(f64) -> bool) -> Option<f64> {
        pred(*self).then_some(*self)
    }

    fn sum(&self) -> Self {
        *self
    }

    fn broadcasts_with(&self, _rhs: &Self) -> bool {
        true
    }

    fn reduce_to(self, _like: &Self) -> Self {
        self
    }
}
