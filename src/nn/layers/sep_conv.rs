use crate::io::{StateDict, TensorData};
use crate::nn::Module;
use crate::shape::conv_output_hw;
use crate::tensor::{RawTensor, Tensor};

/// Depthwise-separable 2D convolution.
///
/// A spatial filter applied per input channel (depthwise) followed by a 1x1
/// channel-mixing convolution (pointwise). Same receptive field as a full
/// conv at a fraction of the parameters; the workhorse of Xception-style
/// residual blocks.
pub struct SeparableConv2d {
    depthwise: Tensor, // [in_channels, kernel_h, kernel_w]
    pointwise: Tensor, // [out_channels, in_channels]
    bias: Option<Tensor>,
    in_channels: usize,
    out_channels: usize,
    kernel: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
}

impl SeparableConv2d {
    pub fn new(in_ch: usize, out_ch: usize, kernel: usize, use_bias: bool) -> Self {
        Self::with_params(
            in_ch,
            out_ch,
            (kernel, kernel),
            (1, 1),
            (kernel / 2, kernel / 2),
            use_bias,
        )
    }

    pub fn with_params(
        in_ch: usize,
        out_ch: usize,
        kernel: (usize, usize),
        stride: (usize, usize),
        padding: (usize, usize),
        use_bias: bool,
    ) -> Self {
        assert!(kernel.0 > 0 && kernel.1 > 0, "Kernel size must be positive");
        assert!(stride.0 > 0 && stride.1 > 0, "Stride must be positive");

        let dw = RawTensor::he_normal(&[in_ch, kernel.0, kernel.1], kernel.0 * kernel.1);
        dw.borrow_mut().requires_grad = true;
        let pw = RawTensor::he_normal(&[out_ch, in_ch], in_ch);
        pw.borrow_mut().requires_grad = true;
        let b = if use_bias {
            let b = RawTensor::zeros(&[out_ch]);
            b.borrow_mut().requires_grad = true;
            Some(b)
        } else {
            None
        };
        SeparableConv2d {
            depthwise: dw,
            pointwise: pw,
            bias: b,
            in_channels: in_ch,
            out_channels: out_ch,
            kernel,
            stride,
            padding,
        }
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        let (data, shape) = {
            let s = x.borrow();
            assert_eq!(
                s.shape.len(),
                4,
                "SeparableConv2d expects input shape (B, C, H, W)"
            );
            assert_eq!(s.shape[1], self.in_channels, "Channel mismatch");
            (s.data.clone(), s.shape.clone())
        };
        let (batch, _, h, w) = (shape[0], shape[1], shape[2], shape[3]);
        let (kh, kw) = self.kernel;
        let (sh, sw) = self.stride;
        let (ph, pw_pad) = self.padding;
        let (h_out, w_out) = conv_output_hw((h, w), self.kernel, self.stride, self.padding);

        // Depthwise pass: one spatial filter per channel, channels stay put
        let dw = self.depthwise.borrow();
        let mut mid = vec![0.0f32; batch * self.in_channels * h_out * w_out];
        for b in 0..batch {
            for c in 0..self.in_channels {
                for oh in 0..h_out {
                    for ow in 0..w_out {
                        let mut acc = 0.0;
                        for dh in 0..kh {
                            let h_in = oh * sh + dh;
                            if h_in < ph || h_in - ph >= h {
                                continue;
                            }
                            let h_in = h_in - ph;
                            for dwi in 0..kw {
                                let w_in = ow * sw + dwi;
                                if w_in < pw_pad || w_in - pw_pad >= w {
                                    continue;
                                }
                                let w_in = w_in - pw_pad;
                                let x_idx = ((b * self.in_channels + c) * h + h_in) * w + w_in;
                                let k_idx = (c * kh + dh) * kw + dwi;
                                acc += data[x_idx] * dw.data[k_idx];
                            }
                        }
                        mid[((b * self.in_channels + c) * h_out + oh) * w_out + ow] = acc;
                    }
                }
            }
        }

        // Pointwise pass: 1x1 mixing across channels
        let pw = self.pointwise.borrow();
        let bias = self.bias.as_ref().map(|b| b.borrow().data.clone());
        let mut out = vec![0.0f32; batch * self.out_channels * h_out * w_out];
        for b in 0..batch {
            for oc in 0..self.out_channels {
                let base = bias.as_ref().map_or(0.0, |bv| bv[oc]);
                for oh in 0..h_out {
                    for ow in 0..w_out {
                        let mut acc = base;
                        for ic in 0..self.in_channels {
                            let m_idx = ((b * self.in_channels + ic) * h_out + oh) * w_out + ow;
                            acc += mid[m_idx] * pw.data[oc * self.in_channels + ic];
                        }
                        out[((b * self.out_channels + oc) * h_out + oh) * w_out + ow] = acc;
                    }
                }
            }
        }

        RawTensor::new(out, &[batch, self.out_channels, h_out, w_out], false)
    }

    /// Learnable parameter count; handy for comparing against a full conv.
    pub fn num_weights(&self) -> usize {
        let dw = self.depthwise.borrow().data.len();
        let pw = self.pointwise.borrow().data.len();
        let b = self.bias.as_ref().map_or(0, |b| b.borrow().data.len());
        dw + pw + b
    }
}

impl Module for SeparableConv2d {
    fn forward(&self, x: &Tensor) -> Tensor {
        self.forward(x)
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut p = vec![self.depthwise.clone(), self.pointwise.clone()];
        if let Some(ref b) = self.bias {
            p.push(b.clone());
        }
        p
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert(
            "depthwise".to_string(),
            TensorData::from_tensor(&self.depthwise),
        );
        state.insert(
            "pointwise".to_string(),
            TensorData::from_tensor(&self.pointwise),
        );
        if let Some(ref b) = self.bias {
            state.insert("bias".to_string(), TensorData::from_tensor(b));
        }
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) {
        if let Some(t) = state.get("depthwise") {
            let mut w = self.depthwise.borrow_mut();
            w.data = t.data.clone();
            w.shape = t.shape.clone();
        }
        if let Some(t) = state.get("pointwise") {
            let mut w = self.pointwise.borrow_mut();
            w.data = t.data.clone();
            w.shape = t.shape.clone();
        }
        if let (Some(ref bias), Some(t)) = (&self.bias, state.get("bias")) {
            let mut b = bias.borrow_mut();
            b.data = t.data.clone();
            b.shape = t.shape.clone();
        }
    }
}

#[cfg(test)]
mod sep_conv_tests {
    use super::*;

    #[test]
    fn test_forward_shape_preserved_with_same_padding() {
        let conv = SeparableConv2d::new(3, 8, 3, false);
        let x = RawTensor::randn(&[2, 3, 16, 16]);
        let y = conv.forward(&x);
        assert_eq!(y.borrow().shape, vec![2, 8, 16, 16]);
    }

    #[test]
    fn test_fewer_weights_than_full_conv() {
        // full 3x3 conv: 64*32*9 weights; separable: 32*9 + 64*32
        let sep = SeparableConv2d::new(32, 64, 3, false);
        assert!(sep.num_weights() < 64 * 32 * 9);
    }
}
