//! Reverse accumulation of `d root / d x` over the forward edges of a tape.

use std::collections::HashSet;

use crate::{
    error::{AdError, Result},
    tape::Node,
    Tape, TapeTerm, Tensor,
};

enum Visit {
    /// Schedule the dependents of a node.
    Enter(u32),
    /// All dependents are cached; sum their contributions.
    Exit(u32),
}

impl<T: Tensor> Tape<T> {
    /// Returns `d root / d x` for the episode seeded at `root`.
    ///
    /// Every node on the way gets its gradient cached, so later queries in the
    /// same episode only compute what is missing. A node that cannot reach the
    /// root has a zero gradient.
    pub fn partial<'a>(&'a self, root: TapeTerm<'a, T>, x: TapeTerm<'a, T>) -> Result<T> {
        let root = self.check(&root)?;
        let x = self.check(&x)?;
        if self.root.get() != Some(root) {
            return Err(AdError::UnseededRoot { root });
        }
        let episode = self.episode.get();
        let mut nodes = self.nodes.borrow_mut();

        if x > root {
            return Ok(nodes[x as usize].value.zero_like());
        }
        if let Some(grad) = nodes[x as usize].cached(episode) {
            return Ok(grad.clone());
        }

        let mut computing = HashSet::new();
        let mut stack = vec![Visit::Enter(x)];
        let mut computed = 0;
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(idx) => {
                    let node = &nodes[idx as usize];
                    if node.cached(episode).is_some() {
                        continue;
                    }
                    if !computing.insert(idx) {
                        return Err(AdError::CyclicGraph { node: idx });
                    }
                    stack.push(Visit::Exit(idx));
                    for edge in &node.edges {
                        let dependent = edge.dependent;
                        if dependent > root || nodes[dependent as usize].cached(episode).is_some()
                        {
                            continue;
                        }
                        if computing.contains(&dependent) {
                            return Err(AdError::CyclicGraph { node: dependent });
                        }
                        stack.push(Visit::Enter(dependent));
                    }
                }
                Visit::Exit(idx) => {
                    let grad = accumulate(&nodes, idx, root, episode)?;
                    log::trace!("grad of node {idx}: {grad}");
                    let node = &mut nodes[idx as usize];
                    node.grad = Some(grad);
                    node.episode = episode;
                    computing.remove(&idx);
                    computed += 1;
                }
            }
        }
        log::debug!("partial(root: {root}, x: {x}) computed {computed} nodes");

        nodes[x as usize]
            .cached(episode)
            .cloned()
            .ok_or(AdError::CyclicGraph { node: x })
    }

    /// Partial derivatives of `root` with respect to each of `xs`, in order.
    pub fn gradients<'a>(&'a self, root: TapeTerm<'a, T>, xs: &[TapeTerm<'a, T>]) -> Result<Vec<T>> {
        xs.iter().map(|x| self.partial(root, *x)).collect()
    }

    /// Gradient cached for `x` in the current episode, without computing anything.
    pub fn grad(&self, x: TapeTerm<'_, T>) -> Option<T> {
        let idx = self.check(&x).ok()?;
        self.nodes.borrow()[idx as usize]
            .cached(self.episode.get())
            .cloned()
    }
}

/// Sum of `local * grad(dependent)` over the edges of a node whose reachable
/// dependents are all cached.
fn accumulate<T: Tensor>(nodes: &[Node<T>], idx: u32, root: u32, episode: u64) -> Result<T> {
    let node = &nodes[idx as usize];
    let mut sum = node.value.zero_like();
    for edge in &node.edges {
        if edge.dependent > root {
            continue;
        }
        let Some(upstream) = nodes[edge.dependent as usize].cached(episode) else {
            return Err(AdError::CyclicGraph {
                node: edge.dependent,
            });
        };
        sum = sum + (edge.local.clone() * upstream.clone()).reduce_to(&node.value);
    }
    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::Edge;

    #[test]
    fn root_is_its_own_seed() {
        let tape = Tape::new();
        let x = tape.variable("x", 3.);
        let y = x * x;
        tape.seed(y).unwrap();
        assert_eq!(tape.partial(y, y), Ok(1.));
        assert_eq!(tape.partial(y, x), Ok(6.));
    }

    #[test]
    fn memoized_nodes_are_not_recomputed() {
        let tape = Tape::new();
        let x = tape.variable("x", 2.);
        let y = x * 3.;
        let z = y * y;
        tape.seed(z).unwrap();
        assert_eq!(tape.grad(y), None);
        assert_eq!(tape.partial(z, x), Ok(36.));
        assert_eq!(tape.grad(y), Some(12.));
        // Overwrite the cache; a memoized lookup must return it untouched.
        tape.nodes.borrow_mut()[y.id() as usize].grad = Some(100.);
        assert_eq!(tape.partial(z, y), Ok(100.));
    }

    #[test]
    fn requires_seed() {
        let tape = Tape::new();
        let x = tape.variable("x", 2.);
        let y = x + 1.;
        assert_eq!(
            tape.partial(y, x),
            Err(AdError::UnseededRoot { root: y.id() })
        );
        tape.seed(x).unwrap();
        assert_eq!(
            tape.partial(y, x),
            Err(AdError::UnseededRoot { root: y.id() })
        );
    }

    #[test]
    fn detects_cycle() {
        let tape = Tape::new();
        let a = tape.variable("a", 1.);
        let b = a * 2.;
        let root = b + 1.;
        // Corrupt the graph with an edge pointing back to `a`.
        tape.nodes.borrow_mut()[b.id() as usize].edges.push(Edge {
            local: 1.,
            dependent: a.id(),
        });
        tape.seed(root).unwrap();
        assert_eq!(
            tape.partial(root, a),
            Err(AdError::CyclicGraph { node: a.id() })
        );
    }

    #[test]
    fn nodes_after_root_are_zero() {
        let tape = Tape::new();
        let x = tape.variable("x", 2.);
        let y = x * 4.;
        let later = tape.variable("later", 1.);
        tape.seed(y).unwrap();
        assert_eq!(tape.partial(y, later), Ok(0.));
        assert_eq!(tape.gradients(y, &[x, y, later]), Ok(vec![4., 1., 0.]));
    }
}
