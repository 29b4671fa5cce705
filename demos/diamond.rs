//! Dependency graph in diamond shape. It uses the same term twice, so the derivative should add up.
//!
//! Writes `dot0.dot` before any gradient is computed and `dot1.dot` after,
//! highlighting the node queried.

use revgrad::Tape;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let tape = Tape::new();
    let a = tape.variable("a", 1.);
    let a2 = -a;
    let b = tape.variable("b", 3.);
    let c = tape.variable("c", 5.);
    let ab = a2 + b;
    let ac = a2 + c;
    let abac = ab + ac;

    let write_dot = |i: usize, highlight: u32| -> std::io::Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(format!("dot{i}.dot"))?);
        abac.dot_builder()
            .show_values(true)
            .highlights(highlight)
            .dot(&mut file)
    };

    tape.seed(abac)?;
    write_dot(0, a.id())?;
    let grads = tape.gradients(abac, &[a, b, c])?;
    write_dot(1, a.id())?;

    println!("abac: {}", abac.value());
    println!("a: {}", grads[0]);
    println!("b: {}", grads[1]);
    println!("c: {}", grads[2]);
    abac.dot_builder()
        .show_values(true)
        .dot(&mut std::io::stdout())?;
    Ok(())
}
