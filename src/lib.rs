//! Reverse-mode automatic differentiation on a tape.
//!
//! Operations on [`TapeTerm`]s compute their values eagerly and record, on each
//! operand, the local derivative of the result. Seeding a root and querying
//! [`Tape::partial`] walks those records backwards with the chain rule.
//!
//! ```
//! use revgrad::Tape;
//!
//! let tape = Tape::new();
//! let x = tape.variable("x", 3.);
//! let y = x * x + 2. * x;
//! tape.seed(y).unwrap();
//! assert_eq!(tape.partial(y, x), Ok(8.));
//! ```

mod dense;
mod dot;
mod episode;
pub mod error;
mod grad;
mod op;
pub mod tape;
mod tensor;
mod unary_fn;

pub use dense::Dense;
pub use dot::DotBuilder;
pub use error::AdError;
pub use op::OpKind;
pub use tape::{Operand, Tape, TapeTerm};
pub use tensor::Tensor;
pub use unary_fn::{PtrUnaryFn, UnaryFn};

#[cfg(feature = "macro")]
pub use revgrad_macro::graph;
