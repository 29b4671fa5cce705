use std::io::Write;

use crate::{tape::ancestors, OpKind, TapeTerm, Tensor};

/// Builder for a graphviz dot rendering of the graph behind a term.
pub struct DotBuilder<'a, T> {
    term: TapeTerm<'a, T>,
    show_values: bool,
    highlights: Option<u32>,
}

impl<'a, T: Tensor> TapeTerm<'a, T> {
    pub fn dot_builder(&self) -> DotBuilder<'a, T> {
        DotBuilder {
            term: *self,
            show_values: false,
            highlights: None,
        }
    }
}

impl<'a, T: Tensor> DotBuilder<'a, T> {
    /// Print values and cached gradients in the labels.
    pub fn show_values(mut self, v: bool) -> Self {
        self.show_values = v;
        self
    }

    /// Fill the node with the given index.
    pub fn highlights(mut self, idx: u32) -> Self {
        self.highlights = Some(idx);
        self
    }

    /// Write graphviz dot file to the given writer.
    pub fn dot(self, writer: &mut impl Write) -> std::io::Result<()> {
        let tape = self.term.tape;
        let nodes = tape.nodes.borrow();
        if self.term.idx as usize >= nodes.len() {
            return Ok(());
        }
        let marks = ancestors(&nodes, self.term.idx);
        let episode = tape.episode.get();
        writeln!(writer, "digraph G {{\nrankdir=\"LR\";")?;
        for (id, node) in nodes.iter().enumerate().take(marks.len()).filter(|(id, _)| marks[*id]) {
            let shape = if node.op == OpKind::Leaf {
                "ellipse"
            } else {
                "rect"
            };
            let style = if self.highlights == Some(id as u32) {
                " style=filled fillcolor=\"#ffff7f\""
            } else {
                ""
            };
            if self.show_values {
                let grad = node
                    .cached(episode)
                    .map_or_else(|| "-".to_string(), |g| g.to_string());
                writeln!(
                    writer,
                    "a{id} [label=\"{} ({})\\ndata:{}, grad:{}\" shape={shape}{style}];",
                    node.name, node.op, node.value, grad
                )?;
            } else {
                writeln!(
                    writer,
                    "a{id} [label=\"{} ({})\" shape={shape}{style}];",
                    node.name, node.op
                )?;
            }
        }
        for (id, node) in nodes.iter().enumerate().take(marks.len()).filter(|(id, _)| marks[*id]) {
            for edge in &node.edges {
                let dependent = edge.dependent as usize;
                if dependent < marks.len() && marks[dependent] {
                    writeln!(writer, "a{id} -> a{dependent};")?;
                }
            }
        }
        writeln!(writer, "}}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Tape;

    #[test]
    fn dot_lists_ancestors() {
        let tape = Tape::new();
        let x = tape.variable("x", 2.);
        let y = tape.variable("y", 3.);
        let unrelated = tape.variable("u", 1.);
        let z = x * y;
        let _w = unrelated * z;
        z.derive(&x).unwrap();

        let mut buf = vec![];
        z.dot_builder()
            .show_values(true)
            .highlights(x.id())
            .dot(&mut buf)
            .unwrap();
        let dot = String::from_utf8(buf).unwrap();
        assert!(dot.starts_with("digraph G {"));
        assert!(dot.contains("a0 -> a3;"));
        assert!(dot.contains("a1 -> a3;"));
        assert!(dot.contains("data:2, grad:3"));
        assert!(dot.contains("fillcolor"));
        assert!(!dot.contains("a2 ["));
        assert!(!dot.contains("a4"));
    }
}
