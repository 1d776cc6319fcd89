/// Full linear convolution of `input` with `impulse` by directly evaluating the sum.
///
/// The output has `input.len() + impulse.len() - 1` samples, and is empty if either argument is.  Complexity is
/// `theta(M*N)`, so this is only for tests, benchmarks, and other places where the answer matters more than the time.
pub fn convolve_direct(input: &[f32], impulse: &[f32]) -> Vec<f32> {
    if input.is_empty() || impulse.is_empty() {
        return vec![];
    }

    let mut output = vec![0.0f32; input.len() + impulse.len() - 1];
    for (i, x) in input.iter().enumerate() {
        for (j, h) in impulse.iter().enumerate() {
            output[i + j] += x * h;
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known() {
        assert_eq!(
            convolve_direct(&[1.0, 2.0, 3.0], &[1.0, -1.0]),
            vec![1.0, 1.0, 1.0, -3.0]
        );
    }

    #[test]
    fn test_empty() {
        assert!(convolve_direct(&[], &[1.0]).is_empty());
        assert!(convolve_direct(&[1.0], &[]).is_empty());
    }
}
