use crate::utils::tables::AAN_SCALE_FACTORS;

/// Per-coefficient multipliers folding the quantizer and the AAN output scaling.
///
/// `table` is in natural order, as is the result.
pub fn divisors(table: &[u16; 64]) -> [f32; 64] {
    let mut out = [0f32; 64];

    for row in 0..8 {
        for col in 0..8 {
            let k = row * 8 + col;
            out[k] = 1.0 / (table[k] as f32 * AAN_SCALE_FACTORS[row] * AAN_SCALE_FACTORS[col] * 8.0);
        }
    }

    out
}

/// Arai, Agui and Nakajima forward DCT of level-shifted samples, followed by quantization.
///
/// Returns the quantized coefficients in natural order, rounded half away from zero.
pub fn forward_dct_quantize(samples: &[f32; 64], divisors: &[f32; 64]) -> [i32; 64] {
    let mut data = *samples;

    for row in 0..8 {
        transform(&mut data, row * 8, 1);
    }
    for col in 0..8 {
        transform(&mut data, col, 8);
    }

    let mut out = [0i32; 64];
    for i in 0..64 {
        let value = data[i] * divisors[i];
        out[i] = if value > 0.0 {
            (value + 0.5) as i32
        } else {
            (value - 0.5) as i32
        };
    }

    out
}

/// One-dimensional pass over the eight values `data[start + k * stride]`.
fn transform(data: &mut [f32; 64], start: usize, stride: usize) {
    let at = |k: usize| start + k * stride;

    let tmp0 = data[at(0)] + data[at(7)];
    let tmp7 = data[at(0)] - data[at(7)];
    let tmp1 = data[at(1)] + data[at(6)];
    let tmp6 = data[at(1)] - data[at(6)];
    let tmp2 = data[at(2)] + data[at(5)];
    let tmp5 = data[at(2)] - data[at(5)];
    let tmp3 = data[at(3)] + data[at(4)];
    let tmp4 = data[at(3)] - data[at(4)];

    // even part
    let tmp10 = tmp0 + tmp3;
    let tmp13 = tmp0 - tmp3;
    let tmp11 = tmp1 + tmp2;
    let tmp12 = tmp1 - tmp2;

    data[at(0)] = tmp10 + tmp11;
    data[at(4)] = tmp10 - tmp11;

    let z1 = (tmp12 + tmp13) * 0.707_106_77;
    data[at(2)] = tmp13 + z1;
    data[at(6)] = tmp13 - z1;

    // odd part
    let tmp10 = tmp4 + tmp5;
    let tmp11 = tmp5 + tmp6;
    let tmp12 = tmp6 + tmp7;

    let z5 = (tmp10 - tmp12) * 0.382_683_43;
    let z2 = 0.541_196_1 * tmp10 + z5;
    let z4 = 1.306_563 * tmp12 + z5;
    let z3 = tmp11 * 0.707_106_77;

    let z11 = tmp7 + z3;
    let z13 = tmp7 - z3;

    data[at(5)] = z13 + z2;
    data[at(3)] = z13 - z2;
    data[at(1)] = z11 + z4;
    data[at(7)] = z11 - z4;
}
