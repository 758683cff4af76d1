//! Gradients of broadcasting binary functions always come back in the
//! operand's own shape, carrying the broadcast multiplicity.

use dyngrad_autograd::Variable;
use dyngrad_core::NdArray;
use proptest::prelude::*;

/// A (small, large) pair where `small` is broadcastable to `large`.
fn broadcast_pair() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    prop::collection::vec((1usize..4, any::<bool>()), 1..4).prop_flat_map(|dims| {
        let large: Vec<usize> = dims.iter().map(|&(d, _)| d).collect();
        let small: Vec<usize> = dims.iter().map(|&(d, ones)| if ones { 1 } else { d }).collect();
        (0..=large.len()).prop_map(move |skip| (small[skip..].to_vec(), large.clone()))
    })
}

proptest! {
    #[test]
    fn add_grads_match_operand_shapes((small, large) in broadcast_pair(), small_first in any::<bool>()) {
        let s = Variable::new(NdArray::ones(small.as_slice()).unwrap());
        let l = Variable::new(NdArray::ones(large.as_slice()).unwrap());
        let y = (if small_first { s.add(&l) } else { l.add(&s) }).unwrap();
        let y_shape = y.shape();
        prop_assert_eq!(y_shape.dims(), large.as_slice());

        y.sum().unwrap().backward().unwrap();
        let gs = s.grad().unwrap();
        let gl = l.grad().unwrap();
        prop_assert_eq!(gs.shape().dims(), small.as_slice());
        prop_assert_eq!(gl.shape().dims(), large.as_slice());

        // each small element was replicated numel(large) / numel(small) times
        let fan_out = (large.iter().product::<usize>() / small.iter().product::<usize>()) as f32;
        prop_assert!(gs.as_slice().iter().all(|&g| g == fan_out));
        prop_assert!(gl.as_slice().iter().all(|&g| g == 1.0));
    }

    #[test]
    fn mul_and_sub_grads_match_operand_shapes((small, large) in broadcast_pair()) {
        let s = Variable::new(NdArray::ones(small.as_slice()).unwrap());
        let l = Variable::new(NdArray::ones(large.as_slice()).unwrap());
        let y = l.mul(&s).unwrap().sub(&s).unwrap();
        y.sum().unwrap().backward().unwrap();

        // d/ds sum(l*s - s) = fan_out * (1 - 1) = 0, still shaped like s
        let gs = s.grad().unwrap();
        prop_assert_eq!(gs.shape().dims(), small.as_slice());
        prop_assert!(gs.as_slice().iter().all(|&g| g == 0.0));
        let gl = l.grad().unwrap();
        prop_assert_eq!(gl.shape().dims(), large.as_slice());
    }
}
