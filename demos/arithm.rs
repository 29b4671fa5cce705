use revgrad::Tape;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let tape = Tape::new();
    let a = tape.variable("a", 123.);
    let b = tape.variable("b", 321.);
    let c = tape.variable("c", 42.);
    let ab = a + b;
    let abc = ab * c;
    println!("a + b: {}", ab.value());
    println!("(a + b) * c: {}", abc.value());
    println!("d(a + b) / da = {}", ab.derive(&a)?);

    tape.seed(abc)?;
    println!("d((a + b) * c) / da = {}", tape.partial(abc, a)?);
    println!("d((a + b) * c) / db = {}", tape.partial(abc, b)?);
    println!("d((a + b) * c) / dc = {}", tape.partial(abc, c)?);

    let d = tape.variable("d", 2.);
    let abcd = abc.div(d)?;
    println!("d((a + b) * c / d) / dc = {}", abcd.derive(&c)?);

    abcd.dot_builder()
        .show_values(true)
        .dot(&mut std::io::stdout())?;
    Ok(())
}
