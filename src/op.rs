//! Tags for the operation that produced a node, and the local partial
//! derivative rules for each of them.

use std::fmt::Display;

use crate::{
    error::{AdError, Result},
    Tensor,
};

#[derive(Clone, Debug, PartialEq)]
pub enum OpKind {
    Leaf,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Sqrt,
    Tanh,
    Sigmoid,
    Sinh,
    Cosh,
    Asin,
    Acos,
    Atan,
    /// Logarithm with a constant base.
    LogBase(f64),
    /// Reduction of all elements into one.
    Sum,
    Custom(String),
}

impl OpKind {
    pub fn label(&self) -> &'static str {
        use OpKind::*;
        match self {
            Leaf => "leaf",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Pow => "pow",
            Neg => "neg",
            Sin => "sin",
            Cos => "cos",
            Tan => "tan",
            Exp => "exp",
            Log => "log",
            Sqrt => "sqrt",
            Tanh => "tanh",
            Sigmoid => "sigmoid",
            Sinh => "sinh",
            Cosh => "cosh",
            Asin => "asin",
            Acos => "acos",
            Atan => "atan",
            LogBase(_) => "log_base",
            Sum => "sum",
            Custom(_) => "custom",
        }
    }

    /// Infix symbol for binary arithmetic.
    pub(crate) fn symbol(&self) -> Option<&'static str> {
        match self {
            Self::Add => Some("+"),
            Self::Sub => Some("-"),
            Self::Mul => Some("*"),
            Self::Div => Some("/"),
            Self::Pow => Some("^"),
            _ => None,
        }
    }
}

impl Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LogBase(base) => write!(f, "log_{base}"),
            Self::Custom(name) => write!(f, "{name}"),
            _ => write!(f, "{}", self.label()),
        }
    }
}

/// Forward value and local partials of a binary operation.
/// A partial is `None` when its operand is a constant and was not asked for.
pub(crate) struct BinaryOutput<T> {
    pub value: T,
    pub lhs: Option<T>,
    pub rhs: Option<T>,
}

fn domain<T: Tensor>(op: &'static str, x: &T, invalid: impl Fn(f64) -> bool) -> Result<()> {
    match x.find(invalid) {
        Some(value) => Err(AdError::Domain { op, value }),
        None => Ok(()),
    }
}

/// `want` tells which operands are nodes and therefore need a partial.
pub(crate) fn binary<T: Tensor>(
    op: &OpKind,
    lhs: &T,
    rhs: &T,
    want: (bool, bool),
) -> Result<BinaryOutput<T>> {
    let (want_lhs, want_rhs) = want;
    let out = match op {
        OpKind::Add => BinaryOutput {
            value: lhs.clone() + rhs.clone(),
            lhs: want_lhs.then(|| lhs.one_like()),
            rhs: want_rhs.then(|| rhs.one_like()),
        },
        OpKind::Sub => BinaryOutput {
            value: lhs.clone() - rhs.clone(),
            lhs: want_lhs.then(|| lhs.one_like()),
            rhs: want_rhs.then(|| -rhs.one_like()),
        },
        OpKind::Mul => BinaryOutput {
            value: lhs.clone() * rhs.clone(),
            lhs: want_lhs.then(|| rhs.clone()),
            rhs: want_rhs.then(|| lhs.clone()),
        },
        OpKind::Div => {
            if rhs.find(|v| v == 0.).is_some() {
                return Err(AdError::DivisionByZero);
            }
            BinaryOutput {
                value: lhs.clone() / rhs.clone(),
                lhs: want_lhs.then(|| rhs.map(f64::recip)),
                rhs: want_rhs.then(|| lhs.zip_map(rhs, |a, b| -a / (b * b))),
            }
        }
        OpKind::Pow => {
            if want_rhs {
                // d(a^b)/db = ln(a) * a^b
                domain("pow", lhs, |a| a <= 0.)?;
            } else {
                // A negative base only has a real power for integer exponents.
                let invalid = lhs.zip_map(rhs, |a, b| {
                    if a < 0. && b.fract() != 0. {
                        a
                    } else {
                        f64::NAN
                    }
                });
                if let Some(value) = invalid.find(|a| !a.is_nan()) {
                    return Err(AdError::Domain { op: "pow", value });
                }
            }
            BinaryOutput {
                value: lhs.zip_map(rhs, f64::powf),
                lhs: want_lhs.then(|| lhs.zip_map(rhs, |a, b| b * a.powf(b - 1.))),
                rhs: want_rhs.then(|| lhs.zip_map(rhs, |a, b| a.ln() * a.powf(b))),
            }
        }
        _ => unreachable!("{op} is not a binary operation"),
    };
    Ok(out)
}

/// Forward value and local partial of a unary operation.
pub(crate) fn unary<T: Tensor>(op: &OpKind, x: &T) -> Result<(T, T)> {
    use OpKind::*;
    let res = match op {
        Neg => (-x.clone(), -x.one_like()),
        Sin => (x.map(f64::sin), x.map(f64::cos)),
        Cos => (x.map(f64::cos), x.map(|v| -v.sin())),
        Tan => (
            x.map(f64::tan),
            x.map(|v| {
                let t = v.tan();
                1. + t * t
            }),
        ),
        Exp => (x.map(f64::exp), x.map(f64::exp)),
        Log => {
            domain("log", x, |v| v <= 0.)?;
            (x.map(f64::ln), x.map(f64::recip))
        }
        Sqrt => {
            domain("sqrt", x, |v| v < 0.)?;
            (x.map(f64::sqrt), x.map(|v| 0.5 / v.sqrt()))
        }
        Tanh => (
            x.map(f64::tanh),
            x.map(|v| {
                let t = v.tanh();
                1. - t * t
            }),
        ),
        Sigmoid => (
            x.map(sigmoid),
            x.map(|v| {
                let s = sigmoid(v);
                s * (1. - s)
            }),
        ),
        Sinh => (x.map(f64::sinh), x.map(f64::cosh)),
        Cosh => (x.map(f64::cosh), x.map(f64::sinh)),
        Asin => {
            domain("asin", x, |v| v.abs() >= 1.)?;
            (x.map(f64::asin), x.map(|v| 1. / (1. - v * v).sqrt()))
        }
        Acos => {
            domain("acos", x, |v| v.abs() >= 1.)?;
            (x.map(f64::acos), x.map(|v| -1. / (1. - v * v).sqrt()))
        }
        Atan => (x.map(f64::atan), x.map(|v| 1. / (1. + v * v))),
        LogBase(base) => {
            let base = *base;
            if base <= 0. || base == 1. {
                return Err(AdError::Domain {
                    op: "log_base",
                    value: base,
                });
            }
            domain("log_base", x, |v| v <= 0.)?;
            let ln_base = base.ln();
            (
                x.map(|v| v.ln() / ln_base),
                x.map(|v| 1. / (v * ln_base)),
            )
        }
        Sum => (x.sum(), x.one_like()),
        _ => unreachable!("{op} is not a builtin unary operation"),
    };
    Ok(res)
}

fn sigmoid(x: f64) -> f64 {
    1. / (1. + (-x).exp())
}
