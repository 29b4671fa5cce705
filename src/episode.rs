//! Gradient episodes: one seeded root, one set of cached gradients.
//!
//! Cached gradients are tagged with the generation they were computed in.
//! Starting a new episode bumps the generation, which invalidates every cache
//! at once without touching the nodes.

use crate::{
    error::{AdError, Result},
    tape::ancestors,
    Tape, TapeTerm, Tensor,
};

impl<T: Tensor> Tape<T> {
    /// Start an episode rooted at `root`, seeding its gradient with ones.
    pub fn seed<'a>(&'a self, root: TapeTerm<'a, T>) -> Result<()> {
        let idx = self.check(&root)?;
        let one = self.nodes.borrow()[idx as usize].value.one_like();
        self.seed_with(root, one)
    }

    /// Start an episode rooted at `root` with an explicit upstream gradient.
    pub fn seed_with<'a>(&'a self, root: TapeTerm<'a, T>, grad: T) -> Result<()> {
        let idx = self.check(&root)?;
        let mut nodes = self.nodes.borrow_mut();
        let node = &mut nodes[idx as usize];
        if node.value.shape() != grad.shape() {
            return Err(AdError::ShapeMismatch {
                op: "seed",
                lhs: node.value.shape(),
                rhs: grad.shape(),
            });
        }
        let episode = self.episode.get() + 1;
        self.episode.set(episode);
        self.root.set(Some(idx));
        log::debug!("episode {episode} seeded at node {idx} ({}) with {grad}", node.name);
        node.grad = Some(grad);
        node.episode = episode;
        Ok(())
    }

    /// The root of the current episode, if any.
    pub fn seeded_root(&self) -> Option<TapeTerm<'_, T>> {
        self.root.get().map(|idx| TapeTerm { tape: self, idx })
    }

    /// Clear the cached gradient of `root` and of every node it was computed
    /// from, and end the current episode. Returns the number of caches cleared.
    ///
    /// A new root must be seeded before the next [`Tape::partial`] query.
    pub fn reset<'a>(&'a self, root: TapeTerm<'a, T>) -> Result<usize> {
        let idx = self.check(&root)?;
        let mut cleared = 0;
        {
            let mut nodes = self.nodes.borrow_mut();
            let marks = ancestors(&nodes, idx);
            for (node, mark) in nodes.iter_mut().zip(marks) {
                if mark && node.grad.take().is_some() {
                    cleared += 1;
                }
            }
        }
        self.invalidate();
        log::debug!("reset at node {idx} cleared {cleared} gradients");
        Ok(cleared)
    }

    /// End the current episode without clearing anything.
    pub(crate) fn invalidate(&self) {
        self.episode.set(self.episode.get() + 1);
        self.root.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dense;

    #[test]
    fn reset_clears_ancestors_only() {
        let tape = Tape::new();
        let x = tape.variable("x", 2.);
        let y = tape.variable("y", 5.);
        let f = x * x;
        let g = y * 3.;
        tape.seed(g).unwrap();
        tape.partial(g, y).unwrap();
        tape.seed(f).unwrap();
        tape.partial(f, x).unwrap();
        // f and x; y still holds a (stale) cache from the previous episode.
        assert_eq!(tape.reset(f), Ok(2));
        assert_eq!(tape.seeded_root(), None);
        assert_eq!(tape.nodes.borrow()[y.id() as usize].grad, Some(3.));
        assert_eq!(tape.grad(y), None);
    }

    #[test]
    fn seed_with_checks_shape() {
        let tape = Tape::<Dense>::default();
        let x = tape.variable("x", Dense::from_vec(vec![1., 2.]));
        assert!(tape.seed_with(x, Dense::from_vec(vec![1.])).is_err());
        tape.seed_with(x, Dense::from_vec(vec![2., 3.])).unwrap();
        assert_eq!(tape.seeded_root(), Some(x));
        assert_eq!(tape.grad(x), Some(Dense::from_vec(vec![2., 3.])));
    }

    #[test]
    fn seeding_invalidates_previous_caches() {
        let tape = Tape::new();
        let x = tape.variable("x", 2.);
        let f = x * 3.;
        let g = x * 5.;
        assert_eq!(f.derive(&x), Ok(3.));
        assert_eq!(tape.grad(x), Some(3.));
        tape.seed(g).unwrap();
        assert_eq!(tape.grad(x), None);
        assert_eq!(tape.partial(g, x), Ok(5.));
    }
}
