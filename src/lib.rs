//! This package provides the functional core of a small neural network layer library:
//! constant padding, 1D and 2D convolutions, plus linear, flatten and convolution layers.
//! Input and output are ndarrays in channel-first layout, (batch, channels, spatial...).
//!
//! In all implementations, we conform to the Pytorch implementation of convolutions,
//! i.e. the kernel is not flipped (cross-correlation).
//! Convolutions pad the input, look at it through a strided window view without
//! copying, and contract the windows with the kernels in one matrix product:
//! - <https://leonardoaraujosantos.gitbook.io/artificial-inteligence/machine_learning/deep_learning/convolution_layer/making_faster>
//!
//! Example:
//! ```
//! use layers_rs::convolutions::*;
//! use layers_rs::Device;
//! use ndarray::*;
//!
//! // Input has shape (batch, channels, height, width)
//! let input = Array::from_shape_vec(
//!     (1, 1, 4, 4),
//!     vec![1.,2.,3.,4.,5.,6.,7.,8.,9.,10.,11.,12.,13.,14.,15.,16.]
//! )
//! .unwrap();
//!
//! // Kernel has shape (channels out, channels in, height, width)
//! let kernel: Array4<f32> = Array::from_shape_vec(
//!     (2,1,2,2),
//!     vec![1.,1.,1.,1.,1.,1.,1.,1.]
//! )
//! .unwrap();
//!
//! let conv_layer = Conv2d::from_weights(kernel.clone(), None, (1, 1), (0, 0)).unwrap();
//! let output_layer: Array4<f32> = conv_layer.convolve(&input).unwrap();
//! let output_free = conv2d(&input, &kernel, (1, 1), (0, 0), Device::Cpu).unwrap();
//!
//! assert_eq!(output_layer, output_free);
//! assert_eq!(output_free.shape(), &[1, 2, 3, 3]);
//! ```

pub mod convolutions;
mod device;
mod error;
mod init;
pub mod layer;
pub mod linear;
pub mod padding;
pub mod windows;

pub use convolutions::{conv1d, conv2d, conv_nd, Conv1d, Conv2d};
pub use device::Device;
pub use error::{Error, Result};
pub use layer::Layer;
pub use linear::{Flatten, Linear};
pub use padding::{pad1d, pad2d, pad_nd};
pub use windows::{extract_windows, output_len};
