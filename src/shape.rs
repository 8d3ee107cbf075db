//! Spatial shape arithmetic shared by conv/pool layers and the assembler.

/// Output height/width of a conv or pool window.
///
/// out = floor((in + 2*pad - kernel) / stride) + 1, per axis.
///
/// # Panics
/// Panics if the (padded) input is smaller than the kernel.
pub fn conv_output_hw(
    input_hw: (usize, usize),
    kernel: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
) -> (usize, usize) {
    let (h, w) = input_hw;
    let padded_h = h + 2 * padding.0;
    let padded_w = w + 2 * padding.1;
    assert!(
        padded_h >= kernel.0 && padded_w >= kernel.1,
        "Kernel {:?} larger than padded input ({}, {})",
        kernel,
        padded_h,
        padded_w
    );
    (
        (padded_h - kernel.0) / stride.0 + 1,
        (padded_w - kernel.1) / stride.1 + 1,
    )
}

/// "Same" padding for an odd kernel: keeps H/W unchanged at stride 1.
pub fn same_padding(kernel: (usize, usize)) -> (usize, usize) {
    (kernel.0 / 2, kernel.1 / 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_padding_preserves_size_at_stride_one() {
        let pad = same_padding((3, 3));
        assert_eq!(conv_output_hw((28, 28), (3, 3), (1, 1), pad), (28, 28));
    }

    #[test]
    fn test_strided_output_rounds_up_with_same_padding() {
        let pad = same_padding((3, 3));
        assert_eq!(conv_output_hw((32, 32), (3, 3), (2, 2), pad), (16, 16));
        assert_eq!(conv_output_hw((33, 33), (3, 3), (2, 2), pad), (17, 17));
    }
}
