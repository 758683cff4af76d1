//! End-to-end behaviour of graph construction and the backward engine.

use dyngrad_autograd::functions::{Add, Clip, Reshape, Sigmoid, SoftMax, SumTo, Tanh};
use dyngrad_autograd::{
    call, clear_grads, enable_grad, no_grad, AutogradError, Function, Parameter, Variable, VariableKind,
};
use dyngrad_core::{CoreError, NdArray, Shape};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn sigmoid_of_matrix() {
    init_tracing();
    let x = Variable::new(NdArray::new([[1.0, 2.0], [3.0, 4.0]]).unwrap());
    let y = x.sigmoid().unwrap();
    y.sum().unwrap().backward().unwrap();

    let y = y.value();
    let gx = x.grad().unwrap();
    for (g, s) in gx.as_slice().iter().zip(y.as_slice()) {
        assert!((g - s * (1.0 - s)).abs() < 1e-6);
    }
}

#[test]
fn add_broadcasts_second_operand() {
    let a = Variable::new(NdArray::ones([2, 3]).unwrap());
    let b = Variable::new(NdArray::new([[1.0, 2.0, 3.0]]).unwrap());
    let c = a.add(&b).unwrap();
    assert_eq!(c.shape().dims(), &[2, 3]);
    assert_eq!(c.value().as_slice(), &[2.0, 3.0, 4.0, 2.0, 3.0, 4.0]);

    c.backward().unwrap();
    let gb = b.grad().unwrap();
    assert_eq!(gb.shape().dims(), &[1, 3]);
    assert_eq!(gb.as_slice(), &[2.0, 2.0, 2.0]);
}

#[test]
fn diamond_accumulates_both_paths() {
    // y = x^2, z = exp(x), l = y + z
    let x = Variable::new(NdArray::scalar(1.5));
    let y = x.square().unwrap();
    let z = x.exp().unwrap();
    let l = y.add(&z).unwrap();
    l.backward().unwrap();

    let expected = 2.0 * 1.5 + 1.5f32.exp();
    assert!((x.grad().unwrap().item().unwrap() - expected).abs() < 1e-5);
}

#[test]
fn shared_intermediate_waits_for_all_consumers() {
    // a = x^2; y = a^2 + a^2 = 2x^4, dy/dx = 8x^3
    let x = Variable::new(NdArray::scalar(2.0));
    let a = x.square().unwrap();
    let y = a.square().unwrap().add(&a.square().unwrap()).unwrap();
    y.backward().unwrap();

    assert_eq!(y.value().item().unwrap(), 32.0);
    assert_eq!(x.grad().unwrap().item().unwrap(), 64.0);
    assert_eq!(a.grad().unwrap().item().unwrap(), 16.0);
}

#[test]
fn uneven_branch_depths() {
    // the short branch reaches `a` before the long one in graph depth
    let x = Variable::new(NdArray::scalar(0.5));
    let a = x.mul_scalar(2.0).unwrap();
    let long = a.exp().unwrap().sin().unwrap().square().unwrap();
    let l = long.add(&a).unwrap();
    l.backward().unwrap();

    let av = 1.0f32;
    let e = av.exp();
    let dlong_da = 2.0 * e.sin() * e.cos() * e;
    let expected = 2.0 * (dlong_da + 1.0);
    assert!((x.grad().unwrap().item().unwrap() - expected).abs() < 1e-4);
}

#[test]
fn generations_follow_depth() {
    let x = Variable::new(NdArray::scalar(1.0));
    assert_eq!(x.generation(), 0);
    assert_eq!(x.kind(), VariableKind::Leaf);

    let a = x.exp().unwrap();
    let b = a.exp().unwrap().exp().unwrap();
    let c = b.add(&x).unwrap();
    assert_eq!(a.generation(), 1);
    assert_eq!(b.generation(), 3);
    assert_eq!(c.generation(), 4);
    assert_eq!(c.kind(), VariableKind::Internal);
    assert_eq!(c.creator_name(), Some("Add"));
}

#[test]
fn fresh_functions_refuse_backward() {
    let g = NdArray::ones([2, 2]).unwrap();
    let fresh: Vec<Box<dyn Function>> = vec![
        Box::new(Add::new()),
        Box::new(Sigmoid::new()),
        Box::new(Tanh::new()),
        Box::new(Clip::new(0.0, 1.0)),
        Box::new(Reshape::new([4])),
        Box::new(SoftMax::new()),
        Box::new(SumTo::new([1, 2])),
    ];
    for f in fresh {
        let err = f.backward(&g).unwrap_err();
        assert!(
            matches!(err, AutogradError::GraphState(_)),
            "{} returned {err:?}",
            f.name()
        );
    }
}

#[test]
fn arity_errors_from_call() {
    let a = Variable::new(NdArray::scalar(1.0));
    let err = call(Sigmoid::new(), &[&a, &a]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Sigmoid expects 1 input(s), got 2"
    );
    assert!(matches!(
        call(Add::new(), &[]),
        Err(AutogradError::Arity { expected: 2, got: 0, .. })
    ));
}

#[test]
fn shape_mismatch_names_both_shapes() {
    let a = Variable::new(NdArray::ones([2, 3]).unwrap());
    let b = Variable::new(NdArray::ones([3, 2]).unwrap());
    let err = a.add(&b).unwrap_err();
    match &err {
        AutogradError::Core(CoreError::ShapeMismatch { lhs, rhs, .. }) => {
            assert_eq!(lhs, &Shape::new(&[2, 3]));
            assert_eq!(rhs, &Shape::new(&[3, 2]));
        }
        other => panic!("unexpected error {other:?}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("[2, 3]") && msg.contains("[3, 2]"), "{msg}");
}

#[test]
fn backward_on_leaf_is_noop() {
    let x = Variable::new(NdArray::ones([3]).unwrap());
    x.backward().unwrap();
    assert!(x.grad().is_none());
}

#[test]
fn backward_on_unrecorded_output_fails() {
    let x = Variable::new(NdArray::ones([3]).unwrap());
    let y = no_grad(|| x.tanh()).unwrap();
    assert!(y.creator().is_none());
    assert!(matches!(y.backward(), Err(AutogradError::GraphState(_))));
}

#[test]
fn enable_grad_records_inside_no_grad() {
    let x = Variable::new(NdArray::scalar(1.0));
    let (frozen, tracked) = no_grad(|| (x.exp(), enable_grad(|| x.exp())));
    assert!(frozen.unwrap().creator().is_none());
    let tracked = tracked.unwrap();
    assert_eq!(tracked.creator_name(), Some("Exp"));
    tracked.backward().unwrap();
    assert!((x.grad().unwrap().item().unwrap() - 1f32.exp()).abs() < 1e-6);
}

#[test]
fn unchain_stops_propagation() {
    let x = Variable::new(NdArray::scalar(2.0));
    let a = x.square().unwrap();
    let b = a.mul_scalar(3.0).unwrap();
    a.unchain();
    b.backward().unwrap();
    assert_eq!(a.grad().unwrap().item().unwrap(), 3.0);
    assert!(x.grad().is_none());
}

#[test]
fn unchain_backward_releases_graph() {
    let x = Variable::new(NdArray::scalar(2.0));
    let y = x.exp().unwrap().sin().unwrap().cos().unwrap();
    y.unchain_backward();
    assert!(y.creator().is_none());
    assert!(matches!(y.backward(), Err(AutogradError::GraphState(_))));
}

#[test]
fn gradients_accumulate_until_cleared() {
    let w = Parameter::new("w", NdArray::new([1.0, 2.0]).unwrap());
    let x = Variable::constant(NdArray::new([3.0, 4.0]).unwrap());

    for _ in 0..2 {
        w.mul(&x).unwrap().sum().unwrap().backward().unwrap();
    }
    assert_eq!(w.grad().unwrap().as_slice(), &[6.0, 8.0]);
    assert!(x.grad().is_none());

    clear_grads([w.variable()]);
    assert!(w.grad().is_none());
}

#[test]
fn losses_sharing_an_intermediate_accumulate_once_each() {
    // t = 2x; l1 = 3t; l2 = 5t => dl1/dx + dl2/dx = 6 + 10
    let x = Variable::new(NdArray::scalar(1.0));
    let t = x.mul_scalar(2.0).unwrap();
    let l1 = t.mul_scalar(3.0).unwrap();
    let l2 = t.mul_scalar(5.0).unwrap();
    l1.backward().unwrap();
    l2.backward().unwrap();

    assert_eq!(t.grad().unwrap().item().unwrap(), 8.0);
    assert_eq!(x.grad().unwrap().item().unwrap(), 16.0);
}

#[test]
fn repeated_backward_adds_one_pass_per_call() {
    // l = 3x^2, dl/dx = 6x = 12 at x = 2
    let x = Variable::new(NdArray::scalar(2.0));
    let a = x.square().unwrap();
    let l = a.mul_scalar(3.0).unwrap();
    l.backward().unwrap();
    assert_eq!(x.grad().unwrap().item().unwrap(), 12.0);
    l.backward().unwrap();
    assert_eq!(x.grad().unwrap().item().unwrap(), 24.0);
    assert_eq!(a.grad().unwrap().item().unwrap(), 6.0);
}

#[test]
fn deep_chain_backward_and_drop() {
    let x = Variable::new(NdArray::scalar(0.0));
    let mut y = x.clone();
    for _ in 0..20_000 {
        y = y.add_scalar(1.0).unwrap();
    }
    y.backward().unwrap();
    assert_eq!(x.grad().unwrap().item().unwrap(), 1.0);
    drop(y);
    assert!(x.creator().is_none());
}

#[test]
fn clip_rejects_nan_bounds() {
    let x = Variable::new(NdArray::ones([2]).unwrap());
    assert!(matches!(
        x.clip(f32::NAN, 1.0),
        Err(AutogradError::Core(CoreError::InvalidData(_)))
    ));
}

#[test]
fn unused_parameter_keeps_absent_grad() {
    let used = Parameter::new("used", NdArray::scalar(1.0));
    let unused = Parameter::new("unused", NdArray::scalar(1.0));
    used.exp().unwrap().backward().unwrap();
    assert!(used.grad().is_some());
    assert!(unused.grad().is_none());
}

#[test]
fn wildcard_reshape_binds_batch_dimension() {
    let target = Shape::of(&[-1, 4]).unwrap();
    let x = Variable::new(NdArray::ones([2, 2, 4]).unwrap());
    let y = x.reshape(target.clone()).unwrap();
    assert_eq!(y.shape().dims(), &[4, 4]);
    y.sum().unwrap().backward().unwrap();
    assert_eq!(x.grad().unwrap().shape().dims(), &[2, 2, 4]);

    let bad = Variable::new(NdArray::ones([3]).unwrap());
    assert!(matches!(bad.reshape(target), Err(AutogradError::Core(_))));
}

#[test]
fn separate_threads_build_disjoint_graphs() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let x = Variable::new(NdArray::scalar(i as f32));
                x.square().unwrap().backward().unwrap();
                x.grad().unwrap().item().unwrap()
            })
        })
        .collect();
    let grads: Vec<f32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(grads, vec![0.0, 2.0, 4.0, 6.0]);
}
