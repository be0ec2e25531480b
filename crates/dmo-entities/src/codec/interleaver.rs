/// Block interleaver (K, a): bit i (1-based) moves to position 1 + (a*i mod K).
#[inline]
const fn interleaved_pos(k: usize, a: usize, i: usize) -> usize {
    1 + (a * i) % k
}

pub fn block_interleave(k: usize, a: usize, input: &[u8], output: &mut [u8]) {
    assert!(input.len() >= k && output.len() >= k);
    for i in 1..=k {
        output[interleaved_pos(k, a, i) - 1] = input[i - 1];
    }
}

pub fn block_deinterleave(k: usize, a: usize, input: &[u8], output: &mut [u8]) {
    assert!(input.len() >= k && output.len() >= k);
    for i in 1..=k {
        output[i - 1] = input[interleaved_pos(k, a, i) - 1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_interleave_is_permutation() {
        for (k, a) in [(120, 11), (216, 101), (432, 103)] {
            let data: Vec<u8> = (0..k).map(|i| (i % 251) as u8).collect();
            let mut tmp = vec![0u8; k];
            let mut out = vec![0u8; k];
            block_interleave(k, a, &data, &mut tmp);
            assert_ne!(tmp, data);
            block_deinterleave(k, a, &tmp, &mut out);
            assert_eq!(out, data);
        }
    }
}
