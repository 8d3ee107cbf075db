use crate::io::StateDict;
use crate::nn::Module;
use crate::shape::conv_output_hw;
use crate::tensor::{RawTensor, Tensor};

/// 2D max pooling layer
///
/// Accepts tensors shaped (batch, channels, height, width) and downsamples each
/// spatial window to its maximum value.
pub struct MaxPool2d {
    kernel: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
}

impl MaxPool2d {
    /// Square-kernel constructor for convenience
    #[must_use]
    pub const fn new(kernel: usize, stride: usize, padding: usize) -> Self {
        Self {
            kernel: (kernel, kernel),
            stride: (stride, stride),
            padding: (padding, padding),
        }
    }
}

impl Module for MaxPool2d {
    fn forward(&self, x: &Tensor) -> Tensor {
        let (data, shape) = {
            let s = x.borrow();
            assert_eq!(s.shape.len(), 4, "MaxPool2d expects input shape (B, C, H, W)");
            (s.data.clone(), s.shape.clone())
        };
        let (batch, channels, h, w) = (shape[0], shape[1], shape[2], shape[3]);
        let (kh, kw) = self.kernel;
        let (sh, sw) = self.stride;
        let (ph, pw) = self.padding;
        let (h_out, w_out) = conv_output_hw((h, w), self.kernel, self.stride, self.padding);

        let mut out = vec![f32::NEG_INFINITY; batch * channels * h_out * w_out];
        for b in 0..batch {
            for c in 0..channels {
                for oh in 0..h_out {
                    for ow in 0..w_out {
                        let mut max_val = f32::NEG_INFINITY;
                        for dh in 0..kh {
                            let h_in = oh * sh + dh;
                            if h_in < ph || h_in - ph >= h {
                                continue;
                            }
                            let h_in = h_in - ph;
                            for dw in 0..kw {
                                let w_in = ow * sw + dw;
                                if w_in < pw || w_in - pw >= w {
                                    continue;
                                }
                                let w_in = w_in - pw;
                                let idx = ((b * channels + c) * h + h_in) * w + w_in;
                                if data[idx] > max_val {
                                    max_val = data[idx];
                                }
                            }
                        }
                        out[((b * channels + c) * h_out + oh) * w_out + ow] = max_val;
                    }
                }
            }
        }

        RawTensor::new(out, &[batch, channels, h_out, w_out], false)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }

    fn state_dict(&self) -> StateDict {
        StateDict::new()
    }

    fn load_state_dict(&mut self, _state: &StateDict) {
        // Stateless
    }
}

/// Global average pooling: (B, C, H, W) -> (B, C).
///
/// Averages each feature map down to a single value; the usual Xception exit.
pub struct GlobalAvgPool2d;

impl Module for GlobalAvgPool2d {
    fn forward(&self, x: &Tensor) -> Tensor {
        global_pool(x, |plane| plane.iter().sum::<f32>() / plane.len() as f32)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }

    fn state_dict(&self) -> StateDict {
        StateDict::new()
    }

    fn load_state_dict(&mut self, _state: &StateDict) {
        // Stateless
    }
}

/// Global max pooling: (B, C, H, W) -> (B, C).
pub struct GlobalMaxPool2d;

impl Module for GlobalMaxPool2d {
    fn forward(&self, x: &Tensor) -> Tensor {
        global_pool(x, |plane| {
            plane.iter().cloned().fold(f32::NEG_INFINITY, f32::max)
        })
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }

    fn state_dict(&self) -> StateDict {
        StateDict::new()
    }

    fn load_state_dict(&mut self, _state: &StateDict) {
        // Stateless
    }
}

fn global_pool(x: &Tensor, reduce: impl Fn(&[f32]) -> f32) -> Tensor {
    let s = x.borrow();
    assert_eq!(
        s.shape.len(),
        4,
        "Global pooling expects input shape (B, C, H, W)"
    );
    let (batch, channels) = (s.shape[0], s.shape[1]);
    let plane = s.shape[2] * s.shape[3];
    let mut out = vec![0.0f32; batch * channels];
    for b in 0..batch {
        for c in 0..channels {
            let base = (b * channels + c) * plane;
            out[b * channels + c] = reduce(&s.data[base..base + plane]);
        }
    }
    RawTensor::new(out, &[batch, channels], false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maxpool_shape() {
        let pool = MaxPool2d::new(2, 2, 0);
        let x = RawTensor::randn(&[1, 3, 8, 8]);
        let y = pool.forward(&x);
        assert_eq!(y.borrow().shape, vec![1, 3, 4, 4]);
    }

    #[test]
    fn test_maxpool_same_padding_halves_odd_inputs() {
        // 3x3 kernel, stride 2, pad 1: 9 -> 5
        let pool = MaxPool2d::new(3, 2, 1);
        let x = RawTensor::randn(&[1, 1, 9, 9]);
        let y = pool.forward(&x);
        assert_eq!(y.borrow().shape, vec![1, 1, 5, 5]);
    }

    #[test]
    fn test_global_avg_pool_values() {
        let x = RawTensor::new(vec![1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0], &[1, 2, 2, 2], false);
        let y = GlobalAvgPool2d.forward(&x);
        assert_eq!(y.borrow().shape, vec![1, 2]);
        assert_eq!(y.borrow().data, vec![2.5, 25.0]);
    }

    #[test]
    fn test_global_max_pool_values() {
        let x = RawTensor::new(vec![1.0, 7.0, 3.0, 4.0, -1.0, -2.0, -3.0, -4.0], &[1, 2, 2, 2], false);
        let y = GlobalMaxPool2d.forward(&x);
        assert_eq!(y.borrow().data, vec![7.0, -1.0]);
    }
}
