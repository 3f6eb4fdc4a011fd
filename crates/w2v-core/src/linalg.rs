use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::tensor::Matrix;

// Dense matrix kernels
//
// Plain triple loops over row-major snapshots of the operands. The inputs
// are read once into dense vectors and the result is written back through
// the output's layout in a single pass, so an output that happens to share
// storage with an input still sees the inputs as they were at call time.
//
//   dot            ret  = A  · B
//   dot_transpose  ret += A  · Bᵀ
//   transpose_dot  ret += Aᵀ · B
//
// The transposed variants accumulate into `ret`; callers wanting a plain
// product zero it first.

/// `ret = a · b` for `a: [m, k]`, `b: [k, n]`, `ret: [m, n]`.
///
/// The first product term is assigned rather than added, so `ret` needs no
/// prior zeroing.
pub fn dot<T: Element>(a: &Matrix<T>, b: &Matrix<T>, ret: &Matrix<T>) -> Result<()> {
    let [m, k] = *a.shape();
    let [k2, n] = *b.shape();
    if k != k2 {
        return Err(Error::MatmulShapeMismatch { m, k1: k, k2, n });
    }
    check_output(ret, [m, n])?;

    let av = a.to_vec();
    let bv = b.to_vec();
    let mut out = Vec::with_capacity(m * n);
    for i in 0..m {
        for j in 0..n {
            if k == 0 {
                out.push(T::zero());
                continue;
            }
            let mut acc = av[i * k] * bv[j];
            for kk in 1..k {
                acc += av[i * k + kk] * bv[kk * n + j];
            }
            out.push(acc);
        }
    }
    write_back(ret, out);
    Ok(())
}

/// `ret += a · bᵀ` for `a: [m, k]`, `b: [n, k]`, `ret: [m, n]`.
pub fn dot_transpose<T: Element>(a: &Matrix<T>, b: &Matrix<T>, ret: &Matrix<T>) -> Result<()> {
    let [m, k] = *a.shape();
    let [n, k2] = *b.shape();
    if k != k2 {
        return Err(Error::MatmulShapeMismatch { m, k1: k, k2, n });
    }
    check_output(ret, [m, n])?;

    let av = a.to_vec();
    let bv = b.to_vec();
    let mut out = ret.to_vec();
    for i in 0..m {
        for j in 0..n {
            let acc = &mut out[i * n + j];
            for kk in 0..k {
                *acc += av[i * k + kk] * bv[j * k + kk];
            }
        }
    }
    write_back(ret, out);
    Ok(())
}

/// `ret += aᵀ · b` for `a: [k, m]`, `b: [k, n]`, `ret: [m, n]`.
pub fn transpose_dot<T: Element>(a: &Matrix<T>, b: &Matrix<T>, ret: &Matrix<T>) -> Result<()> {
    let [k, m] = *a.shape();
    let [k2, n] = *b.shape();
    if k != k2 {
        return Err(Error::MatmulShapeMismatch { m, k1: k, k2, n });
    }
    check_output(ret, [m, n])?;

    let av = a.to_vec();
    let bv = b.to_vec();
    let mut out = ret.to_vec();
    for i in 0..m {
        for j in 0..n {
            let acc = &mut out[i * n + j];
            for kk in 0..k {
                *acc += av[kk * m + i] * bv[kk * n + j];
            }
        }
    }
    write_back(ret, out);
    Ok(())
}

fn check_output<T: Element>(ret: &Matrix<T>, expected: [usize; 2]) -> Result<()> {
    if ret.shape() != &expected {
        return Err(Error::shape_mismatch(&expected, ret.shape()));
    }
    Ok(())
}

fn write_back<T: Element>(ret: &Matrix<T>, values: Vec<T>) {
    let mut data = ret.storage().write();
    for (pos, v) in ret.indices().zip(values) {
        data[pos] = v;
    }
}
