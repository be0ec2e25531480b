use super::convenc::ConvEncoder;

const NUM_STATES: usize = 16;

/// Soft symbol for an erased (punctured) position.
pub const ERASURE: u8 = 0xff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSoftBit(pub u8);

/// Hard bits and erasures to soft values: 0 -> -1, 1 -> +1, erasure -> 0.
fn soft_value(b: u8) -> Result<i8, InvalidSoftBit> {
    match b {
        0 => Ok(-1),
        1 => Ok(1),
        ERASURE => Ok(0),
        other => Err(InvalidSoftBit(other)),
    }
}

/// Output symbols of the mother code for every (state, input) pair. States pack
/// the shift register as `d0 | d1<<1 | d2<<2 | d3<<3`.
fn branch_table() -> [[[i8; 4]; 2]; NUM_STATES] {
    let mut table = [[[0i8; 4]; 2]; NUM_STATES];
    for (state, entry) in table.iter_mut().enumerate() {
        for input in 0..2u8 {
            let mut enc = ConvEncoder::new();
            let mut out = [0u8; 4 * 5];
            // Prime the register by shifting in the state bits oldest first
            let prime = [
                ((state >> 3) & 1) as u8,
                ((state >> 2) & 1) as u8,
                ((state >> 1) & 1) as u8,
                (state & 1) as u8,
                input,
            ];
            enc.encode(&prime, &mut out);
            for k in 0..4 {
                entry[input as usize][k] = if out[16 + k] == 1 { 1 } else { -1 };
            }
        }
    }
    table
}

/// Soft-decision Viterbi decoder for the rate 1/4, K=5 mother code.
///
/// `coded` holds 4 symbols per output bit (0, 1 or [`ERASURE`]). The encoder is assumed to
/// start in state 0 and, because every block ends with tail bits, to finish there too.
pub fn decode(coded: &[u8], out: &mut [u8]) -> Result<(), InvalidSoftBit> {
    let steps = out.len();
    assert!(coded.len() >= 4 * steps);

    let branches = branch_table();
    let mut metrics = [i32::MIN / 2; NUM_STATES];
    metrics[0] = 0;
    let mut survivors: Vec<[u8; NUM_STATES]> = Vec::with_capacity(steps);

    for step in 0..steps {
        let mut soft = [0i8; 4];
        for k in 0..4 {
            soft[k] = soft_value(coded[4 * step + k])?;
        }

        let mut next = [i32::MIN / 2; NUM_STATES];
        let mut from = [0u8; NUM_STATES];
        for (state, &metric) in metrics.iter().enumerate() {
            for input in 0..2usize {
                let expected = &branches[state][input];
                let corr: i32 = (0..4).map(|k| soft[k] as i32 * expected[k] as i32).sum();
                let ns = ((state << 1) | input) & (NUM_STATES - 1);
                if metric + corr > next[ns] {
                    next[ns] = metric + corr;
                    from[ns] = state as u8;
                }
            }
        }
        metrics = next;
        survivors.push(from);
    }

    let mut state = 0usize;
    for step in (0..steps).rev() {
        out[step] = (state & 1) as u8;
        state = survivors[step][state] as usize;
    }
    Ok(())
}
