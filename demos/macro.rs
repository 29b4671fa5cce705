use revgrad::{AdError, Tape};
use revgrad_macro::graph;

fn main() -> Result<(), AdError> {
    let tape = Tape::new();
    graph! { tape => {
        let x = 123.;
        let result = 2. * x + 321.;
    }}
    println!("f(x): {}", result.value());
    println!("df/dx: {}", result.derive(&x)?);
    Ok(())
}
