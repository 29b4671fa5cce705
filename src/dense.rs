use std::fmt::Display;

use crate::{
    error::{AdError, Result},
    tensor::numel,
    Tensor,
};

/// A dense, row-major n-dimensional array of f64.
///
/// Arithmetic is element-wise. A value holding a single element broadcasts
/// against any shape, which is how constants and reductions combine with
/// arrays.
#[derive(Clone, Debug, PartialEq)]
pub struct Dense {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Dense {
    pub fn new(data: Vec<f64>, shape: Vec<usize>) -> Result<Self> {
        if numel(&shape) != data.len() {
            return Err(AdError::ShapeMismatch {
                op: "Dense::new",
                lhs: vec![data.len()],
                rhs: shape,
            });
        }
        Ok(Self { shape, data })
    }

    /// A one-dimensional array.
    pub fn from_vec(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// A zero-dimensional array holding a single element.
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: vec![],
            data: vec![value],
        }
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The only element of a single-element array.
    pub fn item(&self) -> Option<f64> {
        match self.data.as_slice() {
            [v] => Some(*v),
            _ => None,
        }
    }

    fn broadcast(&self, rhs: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        let shape = if self.data.len() == 1 && rhs.data.len() != 1 {
            rhs.shape.clone()
        } else {
            self.shape.clone()
        };
        let len = self.data.len().max(rhs.data.len());
        if self.data.is_empty() || rhs.data.is_empty() {
            return Self {
                shape,
                data: vec![],
            };
        }
        let data = (0..len)
            .map(|i| f(self.data[i % self.data.len()], rhs.data[i % rhs.data.len()]))
            .collect();
        Self { shape, data }
    }
}

impl Display for Dense {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.shape.is_empty() {
            if let Some(v) = self.item() {
                return write!(f, "{v}");
            }
        }
        write!(f, "[")?;
        for (i, v) in self.data.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}

impl std::ops::Add for Dense {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        self.broadcast(&rhs, |a, b| a + b)
    }
}

impl std::ops::Sub for Dense {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        self.broadcast(&rhs, |a, b| a - b)
    }
}

impl std::ops::Mul for Dense {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        self.broadcast(&rhs, |a, b| a * b)
    }
}

impl std::ops::Div for Dense {
    type Output = Self;
    fn div(self, rhs: Self) -> Self::Output {
        self.broadcast(&rhs, |a, b| a / b)
    }
}

impl std::ops::Neg for Dense {
    type Output = Self;
    fn neg(self) -> Self::Output {
        self.map(|v| -v)
    }
}

impl Tensor for Dense {
    fn from_scalar(value: f64) -> Self {
        Self::scalar(value)
    }

    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(|v| f(*v)).collect(),
        }
    }

    fn zip_map(&self, rhs: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        self.broadcast(rhs, f)
    }

    fn find(&self, pred: impl Fn(f64) -> bool) -> Option<f64> {
        self.data.iter().copied().find(|v| pred(*v))
    }

    fn sum(&self) -> Self {
        Self::scalar(self.data.iter().sum())
    }

    fn reduce_to(self, like: &Self) -> Self {
        if self.shape == like.shape {
            self
        } else if like.data.len() == 1 {
            // Keep the shape of the operand, e.g. [1] rather than [].
            Self {
                shape: like.shape.clone(),
                data: vec![self.data.iter().sum()],
            }
        } else {
            self
        }
    }
}
