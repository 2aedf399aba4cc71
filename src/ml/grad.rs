// ============================================================
// Layer 5 — Gradient Scaling
// ============================================================
// Forward pass:   y = x
// Backward pass:  dL/dx = c · dL/dy
//
// c = -1 reverses the gradient, c = 0 stops it.

use burn::prelude::*;

/// Identity in the forward pass; scales the gradient by `c` in
/// the backward pass.
///
/// Written as `detach(x) + c·(x - detach(x))`. The bracket is
/// exactly zero, so the value is bit-for-bit `x`.
pub fn grad_mul_const<B: Backend, const D: usize>(x: Tensor<B, D>, c: f64) -> Tensor<B, D> {
    if c == 1.0 {
        return x;
    }
    let detached = x.clone().detach();
    detached.clone() + (x - detached).mul_scalar(c)
}
