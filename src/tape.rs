//! Implementation of shared memory arena for the terms, aka a tape.
//! See https://rufflewind.com/2016-12-30/reverse-mode-automatic-differentiation
//!
//! Each node keeps the list of nodes that used it as an operand, together
//! with the local derivative of that dependent with respect to it.
//! Dependents are always appended after their operands, so every edge points
//! from a lower index to a higher one and the graph cannot contain a cycle.

use std::cell::{Cell, RefCell};

use crate::{
    error::{AdError, Result},
    op::{self, OpKind},
    unary_fn::{PtrUnaryFn, UnaryFn},
    Dense, Tensor,
};

#[derive(Debug)]
pub struct Tape<T = f64> {
    pub(crate) nodes: RefCell<Vec<Node<T>>>,
    /// Generation of the current gradient episode.
    pub(crate) episode: Cell<u64>,
    pub(crate) root: Cell<Option<u32>>,
}

#[derive(Clone, Debug)]
pub(crate) struct Edge<T> {
    /// Derivative of `dependent` with respect to the node owning this edge.
    pub(crate) local: T,
    pub(crate) dependent: u32,
}

#[derive(Clone, Debug)]
pub(crate) struct Node<T> {
    pub(crate) name: String,
    pub(crate) op: OpKind,
    pub(crate) value: T,
    pub(crate) edges: Vec<Edge<T>>,
    pub(crate) grad: Option<T>,
    /// Episode `grad` was computed in.
    pub(crate) episode: u64,
}

impl<T> Node<T> {
    pub(crate) fn cached(&self, episode: u64) -> Option<&T> {
        if self.episode == episode {
            self.grad.as_ref()
        } else {
            None
        }
    }
}

/// A handle to a node in a [`Tape`].
///
/// Handles compare by identity: two variables holding the same value are
/// different nodes.
pub struct TapeTerm<'a, T = f64> {
    pub(crate) tape: &'a Tape<T>,
    pub(crate) idx: u32,
}

impl<'a, T> Clone for TapeTerm<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for TapeTerm<'a, T> {}

impl<'a, T> PartialEq for TapeTerm<'a, T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tape, other.tape) && self.idx == other.idx
    }
}

impl<'a, T> Eq for TapeTerm<'a, T> {}

impl<'a, T> std::hash::Hash for TapeTerm<'a, T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.tape, state);
        self.idx.hash(state);
    }
}

impl<'a, T> std::fmt::Debug for TapeTerm<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapeTerm").field("idx", &self.idx).finish()
    }
}

/// An argument of an operation: either a node, or a constant that does not
/// get an identity in the graph.
#[derive(Clone, Debug)]
pub enum Operand<'a, T = f64> {
    Term(TapeTerm<'a, T>),
    Constant(T),
}

impl<'a, T> From<TapeTerm<'a, T>> for Operand<'a, T> {
    fn from(term: TapeTerm<'a, T>) -> Self {
        Self::Term(term)
    }
}

impl<'a, T: Tensor> From<f64> for Operand<'a, T> {
    fn from(value: f64) -> Self {
        Self::Constant(T::from_scalar(value))
    }
}

impl<'a> From<Dense> for Operand<'a, Dense> {
    fn from(value: Dense) -> Self {
        Self::Constant(value)
    }
}

impl<T> Default for Tape<T> {
    fn default() -> Self {
        Self {
            nodes: RefCell::new(vec![]),
            episode: Cell::new(0),
            root: Cell::new(None),
        }
    }
}

macro_rules! impl_unary {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name<'a>(&'a self, x: impl Into<Operand<'a, T>>) -> Result<TapeTerm<'a, T>> {
                self.unary(OpKind::$op, x.into())
            }
        )*
    };
}

impl<T: Tensor> Tape<T> {
    /// Create a leaf node.
    ///
    /// # Panics
    ///
    /// Panics if the tape already holds `u32::MAX + 1` nodes.
    pub fn variable<'a>(&'a self, name: impl Into<String>, value: T) -> TapeTerm<'a, T> {
        match self.push(Some(name.into()), OpKind::Leaf, value) {
            Ok(idx) => TapeTerm { tape: self, idx },
            Err(e) => panic!("{e}"),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Drop every node, e.g. to rebuild the graph for the next iteration.
    pub fn clear(&mut self) {
        let nodes = self.nodes.get_mut();
        let count = nodes.len();
        nodes.clear();
        self.invalidate();
        log::debug!("cleared {count} nodes");
    }

    fn push(&self, name: Option<String>, op: OpKind, value: T) -> Result<u32> {
        let mut nodes = self.nodes.borrow_mut();
        let idx = node_index(nodes.len())?;
        let name = name.unwrap_or_else(|| format!("a{idx}"));
        log::trace!("node {idx}: {op} {name}");
        nodes.push(Node {
            name,
            op,
            value,
            edges: vec![],
            grad: None,
            episode: 0,
        });
        Ok(idx)
    }

    pub(crate) fn check(&self, term: &TapeTerm<'_, T>) -> Result<u32> {
        if !std::ptr::eq(self, term.tape) {
            return Err(AdError::ForeignNode);
        }
        if term.idx as usize >= self.nodes.borrow().len() {
            return Err(AdError::InvalidNode { node: term.idx });
        }
        Ok(term.idx)
    }

    fn resolve(&self, operand: &Operand<'_, T>) -> Result<(Option<u32>, T)> {
        match operand {
            Operand::Term(term) => {
                let idx = self.check(term)?;
                Ok((Some(idx), self.nodes.borrow()[idx as usize].value.clone()))
            }
            Operand::Constant(value) => Ok((None, value.clone())),
        }
    }

    /// Name built from the expression when the `expr_name` feature is on.
    fn expr_name(&self, op: &OpKind, args: &[&Operand<'_, T>]) -> Option<String> {
        if !cfg!(feature = "expr_name") {
            return None;
        }
        let nodes = self.nodes.borrow();
        let args: Vec<String> = args
            .iter()
            .map(|arg| match arg {
                Operand::Term(term) => nodes[term.idx as usize].name.clone(),
                Operand::Constant(value) => value.to_string(),
            })
            .collect();
        Some(match (op.symbol(), args.as_slice()) {
            (Some(symbol), [lhs, rhs]) => format!("({lhs} {symbol} {rhs})"),
            _ => format!("{op}({})", args.join(", ")),
        })
    }

    /// Append a result node and an edge from each operand to it.
    fn record<'a>(
        &'a self,
        name: Option<String>,
        op: OpKind,
        value: T,
        partials: impl IntoIterator<Item = (u32, T)>,
    ) -> Result<TapeTerm<'a, T>> {
        let idx = self.push(name, op, value)?;
        let mut nodes = self.nodes.borrow_mut();
        for (operand, local) in partials {
            nodes[operand as usize].edges.push(Edge {
                local,
                dependent: idx,
            });
        }
        Ok(TapeTerm { tape: self, idx })
    }

    pub(crate) fn binary<'a>(
        &'a self,
        op: OpKind,
        lhs: Operand<'a, T>,
        rhs: Operand<'a, T>,
    ) -> Result<TapeTerm<'a, T>> {
        let (lhs_idx, lhs_value) = self.resolve(&lhs)?;
        let (rhs_idx, rhs_value) = self.resolve(&rhs)?;
        if lhs_idx.is_none() && rhs_idx.is_none() {
            return Err(AdError::ConstantOperands { op: op.label() });
        }
        if !lhs_value.broadcasts_with(&rhs_value) {
            return Err(AdError::ShapeMismatch {
                op: op.label(),
                lhs: lhs_value.shape(),
                rhs: rhs_value.shape(),
            });
        }
        let out = op::binary(
            &op,
            &lhs_value,
            &rhs_value,
            (lhs_idx.is_some(), rhs_idx.is_some()),
        )?;
        let name = self.expr_name(&op, &[&lhs, &rhs]);
        let partials = [(lhs_idx, out.lhs), (rhs_idx, out.rhs)]
            .into_iter()
            .filter_map(|(idx, local)| Some((idx?, local?)));
        self.record(name, op, out.value, partials)
    }

    pub(crate) fn unary<'a>(&'a self, op: OpKind, x: Operand<'a, T>) -> Result<TapeTerm<'a, T>> {
        let (idx, value) = self.resolve(&x)?;
        let Some(idx) = idx else {
            return Err(AdError::ConstantOperands { op: op.label() });
        };
        let (value, local) = op::unary(&op, &value)?;
        let name = self.expr_name(&op, &[&x]);
        self.record(name, op, value, [(idx, local)])
    }

    pub fn add<'a>(
        &'a self,
        lhs: impl Into<Operand<'a, T>>,
        rhs: impl Into<Operand<'a, T>>,
    ) -> Result<TapeTerm<'a, T>> {
        self.binary(OpKind::Add, lhs.into(), rhs.into())
    }

    pub fn sub<'a>(
        &'a self,
        lhs: impl Into<Operand<'a, T>>,
        rhs: impl Into<Operand<'a, T>>,
    ) -> Result<TapeTerm<'a, T>> {
        self.binary(OpKind::Sub, lhs.into(), rhs.into())
    }

    pub fn mul<'a>(
        &'a self,
        lhs: impl Into<Operand<'a, T>>,
        rhs: impl Into<Operand<'a, T>>,
    ) -> Result<TapeTerm<'a, T>> {
        self.binary(OpKind::Mul, lhs.into(), rhs.into())
    }

    /// Fails with [`AdError::DivisionByZero`] if the divisor holds an exact zero.
    pub fn div<'a>(
        &'a self,
        lhs: impl Into<Operand<'a, T>>,
        rhs: impl Into<Operand<'a, T>>,
    ) -> Result<TapeTerm<'a, T>> {
        self.binary(OpKind::Div, lhs.into(), rhs.into())
    }

    /// `base ^ exponent`. When the exponent is a node the base must be
    /// positive, because the derivative with respect to the exponent
    /// involves `ln(base)`.
    pub fn pow<'a>(
        &'a self,
        base: impl Into<Operand<'a, T>>,
        exponent: impl Into<Operand<'a, T>>,
    ) -> Result<TapeTerm<'a, T>> {
        self.binary(OpKind::Pow, base.into(), exponent.into())
    }

    impl_unary! {
        neg => Neg,
        sin => Sin,
        cos => Cos,
        tan => Tan,
        exp => Exp,
        log => Log,
        sqrt => Sqrt,
        tanh => Tanh,
        sigmoid => Sigmoid,
        sinh => Sinh,
        cosh => Cosh,
        asin => Asin,
        acos => Acos,
        atan => Atan,
        sum => Sum,
    }

    /// Logarithm of `x` in a constant `base`.
    pub fn log_base<'a>(
        &'a self,
        x: impl Into<Operand<'a, T>>,
        base: f64,
    ) -> Result<TapeTerm<'a, T>> {
        self.unary(OpKind::LogBase(base), x.into())
    }

    /// Record a user-defined unary function.
    pub fn apply<'a>(
        &'a self,
        x: impl Into<Operand<'a, T>>,
        f: &impl UnaryFn<T>,
    ) -> Result<TapeTerm<'a, T>> {
        let x = x.into();
        let op = OpKind::Custom(f.name());
        let (idx, value) = self.resolve(&x)?;
        let Some(idx) = idx else {
            return Err(AdError::ConstantOperands { op: op.label() });
        };
        let local = f.grad(&value)?;
        let value = f.f(&value)?;
        let name = self.expr_name(&op, &[&x]);
        self.record(name, op, value, [(idx, local)])
    }
}

macro_rules! impl_term_unary {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name(&self) -> Result<TapeTerm<'a, T>> {
                self.tape.$name(*self)
            }
        )*
    };
}

impl<'a, T: Tensor> TapeTerm<'a, T> {
    /// Index of the node in its tape.
    pub fn id(&self) -> u32 {
        self.idx
    }

    pub fn value(&self) -> T {
        self.tape.nodes.borrow()[self.idx as usize].value.clone()
    }

    pub fn name(&self) -> String {
        self.tape.nodes.borrow()[self.idx as usize].name.clone()
    }

    pub fn op(&self) -> OpKind {
        self.tape.nodes.borrow()[self.idx as usize].op.clone()
    }

    pub fn is_leaf(&self) -> bool {
        self.op() == OpKind::Leaf
    }

    /// Number of nodes that used this node as an operand, counting repeats.
    pub fn edges_len(&self) -> usize {
        self.tape.nodes.borrow()[self.idx as usize].edges.len()
    }

    pub fn div(&self, rhs: impl Into<Operand<'a, T>>) -> Result<TapeTerm<'a, T>> {
        self.tape.div(*self, rhs)
    }

    pub fn pow(&self, exponent: impl Into<Operand<'a, T>>) -> Result<TapeTerm<'a, T>> {
        self.tape.pow(*self, exponent)
    }

    impl_term_unary!(sin, cos, tan, exp, log, sqrt, tanh, sigmoid, sinh, cosh, asin, acos, atan, sum);

    pub fn log_base(&self, base: f64) -> Result<TapeTerm<'a, T>> {
        self.tape.log_base(*self, base)
    }

    pub fn apply(&self, f: &impl UnaryFn<T>) -> Result<TapeTerm<'a, T>> {
        self.tape.apply(*self, f)
    }

    pub fn apply_fn(
        &self,
        name: &(impl AsRef<str> + ?Sized),
        f: fn(&T) -> T,
        grad: fn(&T) -> T,
    ) -> Result<TapeTerm<'a, T>> {
        self.tape.apply(
            *self,
            &PtrUnaryFn {
                name: name.as_ref().to_string(),
                f,
                grad,
            },
        )
    }

    /// One-time derivation: seeds this node unless it already is the root of
    /// the current episode, then returns `d self / d wrt`.
    pub fn derive(&self, wrt: &Self) -> Result<T> {
        if self.tape.seeded_root() != Some(*self) {
            self.tape.seed(*self)?;
        }
        self.tape.partial(*self, *wrt)
    }

    /// Gradient cached for this node in the current episode, if computed.
    pub fn grad(&self) -> Option<T> {
        self.tape.grad(*self)
    }
}

impl Tape<f64> {
    /// A tape of scalar values. Use `Tape::<Dense>::default()` for arrays.
    pub fn new() -> Self {
        Self::default()
    }

    fn overloaded<'a>(&'a self, op: OpKind, lhs: Operand<'a>, rhs: Operand<'a>) -> TapeTerm<'a> {
        match self.binary(op, lhs, rhs) {
            Ok(term) => term,
            Err(e) => panic!("{e}"),
        }
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:ident) => {
        /// # Panics
        ///
        /// Panics if the operands belong to different tapes.
        impl<'a> std::ops::$trait for TapeTerm<'a> {
            type Output = TapeTerm<'a>;
            fn $method(self, rhs: Self) -> Self::Output {
                self.tape.overloaded(OpKind::$op, self.into(), rhs.into())
            }
        }

        impl<'a> std::ops::$trait<f64> for TapeTerm<'a> {
            type Output = TapeTerm<'a>;
            fn $method(self, rhs: f64) -> Self::Output {
                self.tape.overloaded(OpKind::$op, self.into(), rhs.into())
            }
        }

        impl<'a> std::ops::$trait<TapeTerm<'a>> for f64 {
            type Output = TapeTerm<'a>;
            fn $method(self, rhs: TapeTerm<'a>) -> Self::Output {
                rhs.tape.overloaded(OpKind::$op, self.into(), rhs.into())
            }
        }
    };
}

impl_binary_op!(Add, add, Add);
impl_binary_op!(Sub, sub, Sub);
impl_binary_op!(Mul, mul, Mul);

impl<'a> std::ops::Neg for TapeTerm<'a> {
    type Output = TapeTerm<'a>;
    fn neg(self) -> Self::Output {
        match self.tape.unary(OpKind::Neg, self.into()) {
            Ok(term) => term,
            Err(e) => panic!("{e}"),
        }
    }
}

/// Index of the node appended to a tape holding `len` nodes.
pub(crate) fn node_index(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| AdError::TapeFull)
}

/// Marks every node from which `root` can be reached, `root` included.
///
/// Edges only point to higher indices, so a single scan downwards from the
/// root settles each node after all of its dependents.
pub(crate) fn ancestors<T>(nodes: &[Node<T>], root: u32) -> Vec<bool> {
    let root = root as usize;
    let mut marks = vec![false; root + 1];
    marks[root] = true;
    for i in (0..root).rev() {
        marks[i] = nodes[i].edges.iter().any(|edge| {
            let dependent = edge.dependent as usize;
            dependent <= root && marks[dependent]
        });
    }
    marks
}
