use approx::assert_relative_eq;
use revgrad::{AdError, Dense, Tape, Tensor};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn dot_product() {
    init();
    let tape = Tape::<Dense>::default();
    let a = tape.variable("a", Dense::from_vec(vec![1., 2., 3.]));
    let b = tape.variable("b", Dense::from_vec(vec![4., 5., 6.]));
    let s = tape.mul(a, b).unwrap().sum().unwrap();
    assert_eq!(s.value().item(), Some(32.));

    tape.seed(s).unwrap();
    assert_eq!(tape.partial(s, a), Ok(Dense::from_vec(vec![4., 5., 6.])));
    assert_eq!(tape.partial(s, b), Ok(Dense::from_vec(vec![1., 2., 3.])));
}

#[test]
fn broadcast_gradient_is_summed() {
    init();
    let tape = Tape::<Dense>::default();
    let a = tape.variable("a", Dense::from_vec(vec![1., 2., 3.]));
    let c = tape.variable("c", Dense::from_vec(vec![2.]));
    let y = tape.mul(a, c).unwrap().sum().unwrap();
    assert_eq!(y.value().item(), Some(12.));

    tape.seed(y).unwrap();
    assert_eq!(tape.partial(y, c), Ok(Dense::from_vec(vec![6.])));
    assert_eq!(tape.partial(y, a), Ok(Dense::from_vec(vec![2., 2., 2.])));
}

#[test]
fn elementwise_functions() {
    init();
    let tape = Tape::<Dense>::default();
    let values = vec![0., 0.5, 1.];
    let a = tape.variable("a", Dense::from_vec(values.clone()));
    let s = a.sin().unwrap().sum().unwrap();
    let expected = Dense::from_vec(values.iter().map(|v| v.cos()).collect());
    assert_eq!(s.derive(&a), Ok(expected));
}

#[test]
fn seed_with_ones() {
    init();
    let tape = Tape::<Dense>::default();
    let a = tape.variable("a", Dense::from_vec(vec![1., -2., 3.]));
    let y = tape.mul(a, a).unwrap();
    let ones = y.value().one_like();
    tape.seed_with(y, ones).unwrap();
    assert_eq!(tape.partial(y, a), Ok(Dense::from_vec(vec![2., -4., 6.])));
}

#[test]
fn constants_and_shapes() {
    init();
    let tape = Tape::<Dense>::default();
    let a = tape.variable("a", Dense::from_vec(vec![1., 2., 3.]));
    let b = tape.variable("b", Dense::from_vec(vec![1., 2.]));
    assert_eq!(
        tape.add(a, b).err(),
        Some(AdError::ShapeMismatch {
            op: "add",
            lhs: vec![3],
            rhs: vec![2],
        })
    );

    let shift = tape.add(a, Dense::from_vec(vec![1., 1., 1.])).unwrap();
    let scaled = tape.mul(shift, 2.).unwrap();
    assert_eq!(scaled.value(), Dense::from_vec(vec![4., 6., 8.]));
    let total = scaled.sum().unwrap();
    assert_eq!(total.derive(&a), Ok(Dense::from_vec(vec![2., 2., 2.])));

    let zero = Dense::from_vec(vec![1., 0., 1.]);
    assert_eq!(tape.div(a, zero).err(), Some(AdError::DivisionByZero));
}

#[test]
fn broadcast_sub_and_div() {
    init();
    let tape = Tape::<Dense>::default();
    let a = tape.variable("a", Dense::from_vec(vec![1., 2., 3.]));
    let c = tape.variable("c", Dense::from_vec(vec![2.]));

    let diff = tape.sub(a, c).unwrap().sum().unwrap();
    tape.seed(diff).unwrap();
    assert_eq!(tape.partial(diff, a), Ok(Dense::from_vec(vec![1., 1., 1.])));
    assert_eq!(tape.partial(diff, c), Ok(Dense::from_vec(vec![-3.])));

    // Single-element denominator.
    let quot = tape.div(a, c).unwrap().sum().unwrap();
    tape.seed(quot).unwrap();
    assert_eq!(tape.partial(quot, a), Ok(Dense::from_vec(vec![0.5, 0.5, 0.5])));
    assert_eq!(tape.partial(quot, c), Ok(Dense::from_vec(vec![-1.5])));

    // Single-element numerator.
    let inv = tape.div(c, a).unwrap().sum().unwrap();
    tape.seed(inv).unwrap();
    let dc = tape.partial(inv, c).unwrap();
    assert_eq!(dc.shape(), vec![1]);
    assert_relative_eq!(dc.data()[0], 1. + 0.5 + 1. / 3.);
    let da = tape.partial(inv, a).unwrap();
    for (got, v) in da.data().iter().zip([1., 2., 3.]) {
        assert_relative_eq!(*got, -2. / (v * v));
    }
}

#[test]
fn broadcast_pow() {
    init();
    let tape = Tape::<Dense>::default();
    let a = tape.variable("a", Dense::from_vec(vec![1., 2., 3.]));
    let c = tape.variable("c", Dense::from_vec(vec![2.]));
    let y = tape.pow(a, c).unwrap().sum().unwrap();
    assert_eq!(y.value().item(), Some(14.));

    tape.seed(y).unwrap();
    assert_eq!(tape.partial(y, a), Ok(Dense::from_vec(vec![2., 4., 6.])));
    let dc = tape.partial(y, c).unwrap();
    assert_eq!(dc.shape(), vec![1]);
    assert_relative_eq!(dc.data()[0], 4. * 2f64.ln() + 9. * 3f64.ln());
}

#[test]
fn pow_checks_each_base_against_its_exponent() {
    init();
    let tape = Tape::<Dense>::default();
    let base = tape.variable("base", Dense::from_vec(vec![-2., 4.]));
    let y = tape.pow(base, Dense::from_vec(vec![2., 0.5])).unwrap();
    assert_eq!(y.value(), Dense::from_vec(vec![4., 2.]));
    let total = y.sum().unwrap();
    assert_eq!(total.derive(&base), Ok(Dense::from_vec(vec![-4., 0.25])));

    assert_eq!(
        tape.pow(base, Dense::from_vec(vec![0.5, 2.])).err(),
        Some(AdError::Domain {
            op: "pow",
            value: -2.
        })
    );
}
