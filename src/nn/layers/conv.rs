use crate::io::{StateDict, TensorData};
use crate::nn::Module;
use crate::shape::conv_output_hw;
use crate::tensor::{RawTensor, Tensor};

/// 2D convolution over (B, C, H, W) inputs.
///
/// Direct (non-im2col) forward: padding is handled by bounds checks rather
/// than materializing a padded copy.
pub struct Conv2d {
    weight: Tensor,       // [out_channels, in_channels, kernel_h, kernel_w]
    bias: Option<Tensor>, // [out_channels]
    in_channels: usize,
    out_channels: usize,
    kernel: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
}

impl Conv2d {
    /// Square-kernel constructor for convenience
    pub fn new(
        in_ch: usize,
        out_ch: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        use_bias: bool,
    ) -> Self {
        Self::with_params(
            in_ch,
            out_ch,
            (kernel, kernel),
            (stride, stride),
            (padding, padding),
            use_bias,
        )
    }

    /// Arbitrary kernel/stride/padding constructor
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

        let fan_in = in_ch * kernel.0 * kernel.1;
        let w = RawTensor::he_normal(&[out_ch, in_ch, kernel.0, kernel.1], fan_in);
        w.borrow_mut().requires_grad = true;
        let b = if use_bias {
            let b = RawTensor::zeros(&[out_ch]);
            b.borrow_mut().requires_grad = true;
            Some(b)
        } else {
            None
        };
        Conv2d {
            weight: w,
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
            assert_eq!(s.shape.len(), 4, "Conv2d expects input shape (B, C, H, W)");
            assert_eq!(s.shape[1], self.in_channels, "Channel mismatch");
            (s.data.clone(), s.shape.clone())
        };
        let (batch, _, h, w) = (shape[0], shape[1], shape[2], shape[3]);
        let (kh, kw) = self.kernel;
        let (sh, sw) = self.stride;
        let (ph, pw) = self.padding;
        let (h_out, w_out) = conv_output_hw((h, w), self.kernel, self.stride, self.padding);

        let weight = self.weight.borrow();
        let bias = self.bias.as_ref().map(|b| b.borrow().data.clone());

        let mut out = vec![0.0f32; batch * self.out_channels * h_out * w_out];
        for b in 0..batch {
            for oc in 0..self.out_channels {
                let base = bias.as_ref().map_or(0.0, |bv| bv[oc]);
                for oh in 0..h_out {
                    for ow in 0..w_out {
                        let mut acc = base;
                        for ic in 0..self.in_channels {
                            for dh in 0..kh {
                                // padded coordinate, may fall outside the input
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
                                    let x_idx =
                                        ((b * self.in_channels + ic) * h + h_in) * w + w_in;
                                    let w_idx = ((oc * self.in_channels + ic) * kh + dh) * kw + dw;
                                    acc += data[x_idx] * weight.data[w_idx];
                                }
                            }
                        }
                        let out_idx = ((b * self.out_channels + oc) * h_out + oh) * w_out + ow;
                        out[out_idx] = acc;
                    }
                }
            }
        }

        RawTensor::new(out, &[batch, self.out_channels, h_out, w_out], false)
    }
}

impl Module for Conv2d {
    fn forward(&self, x: &Tensor) -> Tensor {
        self.forward(x)
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut p = vec![self.weight.clone()];
        if let Some(ref b) = self.bias {
            p.push(b.clone());
        }
        p
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert("weight".to_string(), TensorData::from_tensor(&self.weight));
        if let Some(ref b) = self.bias {
            state.insert("bias".to_string(), TensorData::from_tensor(b));
        }
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) {
        if let Some(t) = state.get("weight") {
            let mut w = self.weight.borrow_mut();
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
