//! Module that contains classical convolutions, as used f.e. in convolutional neural networks.
//!
//! All convolutions are cross-correlations (the kernel is not flipped) in
//! channel-first layout, which agrees with the Pytorch implementation.
//! Inputs are padded, viewed as sliding windows and contracted with the
//! flattened kernels in a single matrix product.
//!
//! More can be read here:
//! - <https://leonardoaraujosantos.gitbook.io/artificial-inteligence/machine_learning/deep_learning/convolution_layer/making_faster>

use std::fmt;

use ndarray::*;
use num_traits::Float;
use rand::distributions::uniform::SampleUniform;
use rand::Rng;
use tracing::{debug, warn};

use crate::init::uniform;
use crate::layer::{expect_rank, Layer};
use crate::padding::pad_nd;
use crate::windows::{check_window_args, extract_windows, output_len};
use crate::{Device, Error, Result};

/// Cross-correlation over any number of spatial axes.
///
/// Input:
/// -----------------------------------------------
/// - x: input of shape (B, C_in, N_1, ..., N_d)
/// - weights: kernels of shape (C_out, C_in, K_1, ..., K_d)
/// - stride: step between windows per spatial axis, d entries
/// - padding: zero padding (before, after) per spatial axis, d entries
///
/// Returns:
/// -----------------------------------------------
/// - out: output of shape (B, C_out, O_1, ..., O_d) with
///   O_i = floor((N_i + before_i + after_i - K_i) / stride_i) + 1,
///   or 0 if the kernel does not fit.
pub fn conv_nd<'a, V, T, F>(
    x: V,
    weights: T,
    stride: &[usize],
    padding: &[(usize, usize)],
    device: Device,
) -> Result<ArrayD<F>>
where
    V: AsArray<'a, F, IxDyn>,
    T: AsArray<'a, F, IxDyn>,
    F: 'static + Float,
{
    let x: ArrayViewD<F> = x.into();
    let kernel_weights: ArrayViewD<F> = weights.into();

    if x.ndim() < 3 {
        return Err(Error::ShapeMismatch(format!(
            "expected input of shape (batch, channels, spatial...), got {:?}",
            x.shape()
        )));
    }
    if kernel_weights.ndim() != x.ndim() {
        return Err(Error::ShapeMismatch(format!(
            "weights of shape {:?} do not match input of shape {:?}",
            kernel_weights.shape(),
            x.shape()
        )));
    }
    let spatial = x.ndim() - 2;
    if padding.len() != spatial {
        return Err(Error::ShapeMismatch(format!(
            "expected padding for {} spatial dimensions, got {}",
            spatial,
            padding.len()
        )));
    }
    let kernel = &kernel_weights.shape()[2..];
    check_window_args(x.ndim(), kernel, stride)?;

    // Dimensions: B, C, spatial...
    let batch = x.len_of(Axis(0));
    let im_channel = x.len_of(Axis(1));
    let num_filters = kernel_weights.len_of(Axis(0));
    if kernel_weights.len_of(Axis(1)) != im_channel {
        return Err(Error::ShapeMismatch(format!(
            "input has {} channels but weights expect {}",
            im_channel,
            kernel_weights.len_of(Axis(1))
        )));
    }

    let out_spatial: Vec<usize> = x.shape()[2..]
        .iter()
        .zip(kernel.iter().zip(stride).zip(padding))
        .map(|(&n, ((&k, &s), &(before, after)))| output_len(n + before + after, k, s))
        .collect();
    debug!(
        input = ?x.shape(),
        weights = ?kernel_weights.shape(),
        ?stride,
        ?padding,
        output = ?out_spatial,
        %device,
        "conv"
    );
    if out_spatial.contains(&0) {
        warn!(
            input = ?x.shape(),
            ?kernel,
            ?padding,
            "convolution output is empty, kernel does not fit the padded input"
        );
    }

    // Padding always produces a fresh standard layout array, otherwise we only
    // copy if the caller handed us something with an odd memory layout.
    let im_padded: CowArray<F, IxDyn> = if padding.iter().any(|&(before, after)| before + after > 0) {
        pad_nd(x.view(), padding, F::zero(), device)?.into()
    } else {
        x.as_standard_layout()
    };

    // (B, C, O..., K...) -> (B, O..., C, K...), so that every row of the
    // im2col matrix is one flattened window.
    let windows = extract_windows(im_padded.view(), kernel, stride)?;
    let mut window_order = vec![0];
    window_order.extend(2..2 + spatial);
    window_order.push(1);
    window_order.extend(2 + spatial..2 + 2 * spatial);
    let windows = windows.permuted_axes(window_order);

    let rows = batch * out_spatial.iter().product::<usize>();
    let cols = im_channel * kernel.iter().product::<usize>();
    // The matrix product needs contiguous rows, so this is where the window
    // data is materialized.
    let im_col = Array::from_iter(windows.iter().copied()).into_shape((rows, cols))?;

    // weights.reshape(F, C*K...)
    let filter_col = kernel_weights
        .as_standard_layout()
        .into_shape((num_filters, cols))?;

    let mul = im_col.dot(&filter_col.t());

    // (B, O..., F) -> (B, F, O...)
    let mut out_shape = vec![batch];
    out_shape.extend_from_slice(&out_spatial);
    out_shape.push(num_filters);
    let mut out_order = vec![0, spatial + 1];
    out_order.extend(1..=spatial);
    let output = mul.into_shape(out_shape)?.permuted_axes(out_order);

    Ok(output.as_standard_layout().into_owned())
}

/// 1D cross-correlation.
///
/// - x: input of shape (B, C_in, W)
/// - weights: kernels of shape (C_out, C_in, K)
/// - padding: zeros added on both sides of the width axis
///
/// Returns an array of shape (B, C_out, floor((W + 2 * padding - K) / stride) + 1).
pub fn conv1d<'a, V, T, F>(
    x: V,
    weights: T,
    stride: usize,
    padding: usize,
    device: Device,
) -> Result<Array3<F>>
where
    V: AsArray<'a, F, Ix3>,
    T: AsArray<'a, F, Ix3>,
    F: 'static + Float,
{
    let x: ArrayView3<F> = x.into();
    let kernel_weights: ArrayView3<F> = weights.into();
    let output = conv_nd(
        x.into_dyn(),
        kernel_weights.into_dyn(),
        &[stride],
        &[(padding, padding)],
        device,
    )?;
    Ok(output.into_dimensionality::<Ix3>()?)
}

/// 2D cross-correlation.
///
/// - x: input of shape (B, C_in, H, W)
/// - weights: kernels of shape (C_out, C_in, KH, KW)
/// - stride: (height, width) step between windows
/// - padding: (height, width) zeros added on both sides of each axis
///
/// Returns an array of shape (B, C_out, H', W').
pub fn conv2d<'a, V, T, F>(
    x: V,
    weights: T,
    stride: (usize, usize),
    padding: (usize, usize),
    device: Device,
) -> Result<Array4<F>>
where
    V: AsArray<'a, F, Ix4>,
    T: AsArray<'a, F, Ix4>,
    F: 'static + Float,
{
    let x: ArrayView4<F> = x.into();
    let kernel_weights: ArrayView4<F> = weights.into();
    let output = conv_nd(
        x.into_dyn(),
        kernel_weights.into_dyn(),
        &[stride.0, stride.1],
        &[(padding.0, padding.0), (padding.1, padding.1)],
        device,
    )?;
    Ok(output.into_dimensionality::<Ix4>()?)
}

pub(crate) fn add_bias<F, D>(mut x: Array<F, D>, bias: Option<&Array1<F>>) -> Array<F, D>
where
    F: Float,
    D: RemoveAxis,
{
    if let Some(bias_array) = bias {
        for (mut channel, &b) in x.axis_iter_mut(Axis(1)).zip(bias_array) {
            channel.mapv_inplace(|v| v + b);
        }
    }
    x
}

fn check_bias<F>(bias: Option<&Array1<F>>, num_filters: usize) -> Result<()> {
    match bias {
        Some(b) if b.len() != num_filters => Err(Error::ShapeMismatch(format!(
            "bias has {} entries for {} output channels",
            b.len(),
            num_filters
        ))),
        _ => Ok(()),
    }
}

/// Rust implementation of a 1D convolutional layer.
/// The weight matrix has shape (out channels, in channels, kernel width),
/// to comply with the order in which pytorch weights are saved.
pub struct Conv1d<F: Float> {
    pub(crate) kernel: Array3<F>,
    pub(crate) bias: Option<Array1<F>>,
    pub(crate) stride: usize,
    pub(crate) padding: usize,
    pub(crate) device: Device,
}

impl<F: 'static + Float> Conv1d<F> {
    /// Creates a layer with weights and bias drawn from
    /// U(-sqrt(1 / (in_channels * kernel_size)), sqrt(1 / (in_channels * kernel_size))).
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        bias: bool,
    ) -> Result<Conv1d<F>>
    where
        F: SampleUniform,
    {
        Self::new_with_rng(
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
            bias,
            &mut rand::thread_rng(),
        )
    }

    pub fn new_with_rng<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        bias: bool,
        rng: &mut R,
    ) -> Result<Conv1d<F>>
    where
        F: SampleUniform,
    {
        let fan_in = in_channels * kernel_size;
        let weights = uniform((out_channels, in_channels, kernel_size), fan_in, rng)?;
        let bias_array = if bias {
            Some(uniform(out_channels, fan_in, rng)?)
        } else {
            None
        };
        Self::from_weights(weights, bias_array, stride, padding)
    }

    /// Wraps existing weights, given in Pytorch layout
    /// (out channels, in channels, kernel width).
    pub fn from_weights(
        weights: Array3<F>,
        bias_array: Option<Array1<F>>,
        stride: usize,
        padding: usize,
    ) -> Result<Conv1d<F>> {
        check_window_args(3, &weights.shape()[2..], &[stride])?;
        check_bias(bias_array.as_ref(), weights.len_of(Axis(0)))?;
        Ok(Conv1d {
            kernel: weights,
            bias: bias_array,
            stride,
            padding,
            device: Device::default(),
        })
    }

    pub fn with_device(mut self, device: Device) -> Conv1d<F> {
        self.device = device;
        self
    }

    pub fn weight(&self) -> ArrayView3<'_, F> {
        self.kernel.view()
    }

    pub fn bias(&self) -> Option<ArrayView1<'_, F>> {
        self.bias.as_ref().map(|b| b.view())
    }

    /// Analog to conv1d, plus the bias of every output channel.
    pub fn convolve<'a, V>(&self, x: V) -> Result<Array3<F>>
    where
        V: AsArray<'a, F, Ix3>,
        F: 'a,
    {
        let x: ArrayView3<F> = x.into();
        let output = conv1d(x.view(), &self.kernel, self.stride, self.padding, self.device)?;
        Ok(add_bias(output, self.bias.as_ref()))
    }
}

impl<F: 'static + Float> Layer<F> for Conv1d<F> {
    fn forward(&self, x: ArrayViewD<'_, F>) -> Result<ArrayD<F>> {
        let x = expect_rank(x, 3)?.into_dimensionality::<Ix3>()?;
        Ok(self.convolve(x)?.into_dyn())
    }

    fn extra_repr(&self) -> String {
        let shape = self.kernel.shape();
        format!(
            "in_channels: {}, out_channels: {}, kernel_size: {}, stride: {}, padding: {}, bias: {}",
            shape[1],
            shape[0],
            shape[2],
            self.stride,
            self.padding,
            self.bias.is_some()
        )
    }
}

impl<F: 'static + Float> fmt::Display for Conv1d<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Conv1d({})", self.extra_repr())
    }
}

/// Rust implementation of a 2D convolutional layer.
/// The weight matrix has shape (out channels, in channels, kernel height, kernel width),
/// to comply with the order in which pytorch weights are saved.
pub struct Conv2d<F: Float> {
    pub(crate) kernel: Array4<F>,
    pub(crate) bias: Option<Array1<F>>,
    pub(crate) stride: (usize, usize),
    pub(crate) padding: (usize, usize),
    pub(crate) device: Device,
}

impl<F: 'static + Float> Conv2d<F> {
    /// Creates a layer with weights and bias drawn from
    /// U(-sqrt(1 / fan_in), sqrt(1 / fan_in)), fan_in = in_channels * kernel height * kernel width.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        stride: (usize, usize),
        padding: (usize, usize),
        bias: bool,
    ) -> Result<Conv2d<F>>
    where
        F: SampleUniform,
    {
        Self::new_with_rng(
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
            bias,
            &mut rand::thread_rng(),
        )
    }

    pub fn new_with_rng<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        stride: (usize, usize),
        padding: (usize, usize),
        bias: bool,
        rng: &mut R,
    ) -> Result<Conv2d<F>>
    where
        F: SampleUniform,
    {
        let (kernel_height, kernel_width) = kernel_size;
        let fan_in = in_channels * kernel_height * kernel_width;
        let weights = uniform(
            (out_channels, in_channels, kernel_height, kernel_width),
            fan_in,
            rng,
        )?;
        let bias_array = if bias {
            Some(uniform(out_channels, fan_in, rng)?)
        } else {
            None
        };
        Self::from_weights(weights, bias_array, stride, padding)
    }

    /// Wraps existing weights, given in Pytorch layout
    /// (out channels, in channels, kernel height, kernel width).
    pub fn from_weights(
        weights: Array4<F>,
        bias_array: Option<Array1<F>>,
        stride: (usize, usize),
        padding: (usize, usize),
    ) -> Result<Conv2d<F>> {
        check_window_args(4, &weights.shape()[2..], &[stride.0, stride.1])?;
        check_bias(bias_array.as_ref(), weights.len_of(Axis(0)))?;
        Ok(Conv2d {
            kernel: weights,
            bias: bias_array,
            stride,
            padding,
            device: Device::default(),
        })
    }

    pub fn with_device(mut self, device: Device) -> Conv2d<F> {
        self.device = device;
        self
    }

    pub fn weight(&self) -> ArrayView4<'_, F> {
        self.kernel.view()
    }

    pub fn bias(&self) -> Option<ArrayView1<'_, F>> {
        self.bias.as_ref().map(|b| b.view())
    }

    /// Analog to conv2d, plus the bias of every output channel.
    pub fn convolve<'a, V>(&self, x: V) -> Result<Array4<F>>
    where
        V: AsArray<'a, F, Ix4>,
        F: 'a,
    {
        let x: ArrayView4<F> = x.into();
        let output = conv2d(x.view(), &self.kernel, self.stride, self.padding, self.device)?;
        Ok(add_bias(output, self.bias.as_ref()))
    }
}

impl<F: 'static + Float> Layer<F> for Conv2d<F> {
    fn forward(&self, x: ArrayViewD<'_, F>) -> Result<ArrayD<F>> {
        let x = expect_rank(x, 4)?.into_dimensionality::<Ix4>()?;
        Ok(self.convolve(x)?.into_dyn())
    }

    fn extra_repr(&self) -> String {
        let shape = self.kernel.shape();
        format!(
            "in_channels: {}, out_channels: {}, kernel_size: ({}, {}), stride: {:?}, padding: {:?}, bias: {}",
            shape[1],
            shape[0],
            shape[2],
            shape[3],
            self.stride,
            self.padding,
            self.bias.is_some()
        )
    }
}

impl<F: 'static + Float> fmt::Display for Conv2d<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Conv2d({})", self.extra_repr())
    }
}
