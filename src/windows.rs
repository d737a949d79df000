//! Sliding-window views used to turn a convolution into one matrix product.
//!
//! For an input `(lead..., n_1, ..., n_d)`, a kernel `(k_1, ..., k_d)` and a
//! stride `(s_1, ..., s_d)` the view has shape
//! `(lead..., out_1, ..., out_d, k_1, ..., k_d)` and
//! `view[l, i_1, .., i_d, j_1, .., j_d] == x[l, i_1 * s_1 + j_1, .., i_d * s_d + j_d]`.
//! The view borrows the input; overlapping windows read the same elements.

use ndarray::*;

use crate::{Error, Result};

/// Number of window positions along one axis, `floor((input - kernel) / stride) + 1`,
/// or zero when the kernel does not fit.
pub fn output_len(input: usize, kernel: usize, stride: usize) -> usize {
    if input < kernel {
        0
    } else {
        (input - kernel) / stride + 1
    }
}

pub(crate) fn check_window_args(ndim: usize, kernel: &[usize], stride: &[usize]) -> Result<()> {
    if kernel.len() != stride.len() {
        return Err(Error::ShapeMismatch(format!(
            "kernel has {} spatial dimensions but stride has {}",
            kernel.len(),
            stride.len()
        )));
    }
    if kernel.len() > ndim {
        return Err(Error::ShapeMismatch(format!(
            "kernel with {} spatial dimensions does not fit an array of rank {}",
            kernel.len(),
            ndim
        )));
    }
    if kernel.contains(&0) {
        return Err(Error::Precondition(format!(
            "kernel dimensions must be positive, got {:?}",
            kernel
        )));
    }
    if stride.contains(&0) {
        return Err(Error::Precondition(format!(
            "stride must be positive, got {:?}",
            stride
        )));
    }
    Ok(())
}

/// Returns a view of every `kernel`-sized window of the trailing axes of `x`,
/// stepping by `stride`.
///
/// No data is copied: window positions advance by `stride * axis_stride`
/// elements and window offsets by `axis_stride`. If the kernel does not fit
/// along some axis, the result is an empty view of the right shape.
///
/// `x` must not have negative strides; views obtained from reversed slices
/// should go through `as_standard_layout` first.
pub fn extract_windows<'a, F>(
    x: ArrayViewD<'a, F>,
    kernel: &[usize],
    stride: &[usize],
) -> Result<ArrayViewD<'a, F>> {
    check_window_args(x.ndim(), kernel, stride)?;
    if x.strides().iter().any(|&s| s < 0) {
        return Err(Error::Precondition(format!(
            "window extraction needs non-negative strides, got {:?}",
            x.strides()
        )));
    }
    let lead = x.ndim() - kernel.len();
    let in_shape = x.shape();
    let in_strides: Vec<usize> = x.strides().iter().map(|&s| s as usize).collect();

    let mut shape = in_shape[..lead].to_vec();
    let mut strides = in_strides[..lead].to_vec();
    for (i, (&k, &s)) in kernel.iter().zip(stride).enumerate() {
        shape.push(output_len(in_shape[lead + i], k, s));
        strides.push(s * in_strides[lead + i]);
    }
    shape.extend_from_slice(kernel);
    strides.extend_from_slice(&in_strides[lead..]);

    if shape.contains(&0) {
        return Ok(ArrayView::from_shape(shape, &[])?);
    }

    // SAFETY: the view is read-only and lives as long as `x`'s borrow. The
    // largest offset it reaches along a spatial axis is
    // ((out - 1) * s + k - 1) * axis_stride <= (n - 1) * axis_stride, and the
    // lead axes keep `x`'s own extent, so every index stays inside `x`.
    // Aliasing between overlapping windows is fine for a shared view.
    let windows = unsafe {
        ArrayView::from_shape_ptr(IxDyn(&shape).strides(IxDyn(&strides)), x.as_ptr())
    };
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_1d() {
        let x = Array::from_shape_vec((1, 1, 6), vec![0., 1., 2., 3., 4., 5.]).unwrap();

        let w = extract_windows(x.view().into_dyn(), &[3], &[2]).unwrap();

        assert_eq!(w.shape(), &[1, 1, 2, 3]);
        assert_eq!(
            w.into_dimensionality::<Ix4>().unwrap(),
            arr3(&[[[0., 1., 2.], [2., 3., 4.]]]).insert_axis(Axis(0))
        );
    }

    #[test]
    fn windows_2d_match_indexing() {
        let x = Array::from_shape_vec((2, 3, 5, 7), (0..210).map(|v| v as f32).collect()).unwrap();
        let (kh, kw, sh, sw) = (2, 3, 2, 1);

        let w = extract_windows(x.view().into_dyn(), &[kh, kw], &[sh, sw]).unwrap();
        let w = w.into_dimensionality::<Ix6>().unwrap();

        assert_eq!(w.shape(), &[2, 3, 2, 5, 2, 3]);
        for ((b, c, i, j, p, q), v) in w.indexed_iter() {
            assert_eq!(*v, x[[b, c, i * sh + p, j * sw + q]]);
        }
    }

    #[test]
    fn windows_alias_the_input() {
        let x = Array::from_shape_vec((1, 1, 4), vec![1.0_f64, 2., 3., 4.]).unwrap();

        let w = extract_windows(x.view().into_dyn(), &[2], &[1]).unwrap();

        assert_eq!(w.as_ptr(), x.as_ptr());
        assert_eq!(w[[0, 0, 1, 0]], w[[0, 0, 0, 1]]);
    }

    #[test]
    fn kernel_larger_than_input_gives_empty_view() {
        let x = Array::<f32, _>::zeros((2, 3, 2));

        let w = extract_windows(x.view().into_dyn(), &[5], &[1]).unwrap();

        assert_eq!(w.shape(), &[2, 3, 0, 5]);
        assert_eq!(w.len(), 0);
    }

    #[test]
    fn rejects_bad_arguments() {
        let x = Array::<f32, _>::zeros((1, 1, 4, 4));
        let v = x.view().into_dyn();

        assert!(matches!(
            extract_windows(v.clone(), &[2, 2], &[1]),
            Err(Error::ShapeMismatch(_))
        ));
        assert!(matches!(
            extract_windows(v.clone(), &[0, 2], &[1, 1]),
            Err(Error::Precondition(_))
        ));
        assert!(matches!(
            extract_windows(v, &[2, 2], &[1, 0]),
            Err(Error::Precondition(_))
        ));
    }

    #[test]
    fn output_len_law() {
        assert_eq!(output_len(10, 3, 1), 8);
        assert_eq!(output_len(10, 3, 3), 3);
        assert_eq!(output_len(2, 3, 1), 0);
        assert_eq!(output_len(3, 3, 4), 1);
    }
}
