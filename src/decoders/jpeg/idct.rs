//! Dequantization and integer inverse DCT.
//!
//! This is the Loeffler, Ligtenberg and Moschytz factorization ("Practical Fast 1-D DCT
//! Algorithms with 11 Multiplications", ICASSP 1989) in fixed point: a row pass keeping
//! four extra fraction bits, then a column pass that drops them again.

const COS1: i64 = 4017; // cos(pi/16) * 4096
const SIN1: i64 = 799; // sin(pi/16) * 4096
const COS3: i64 = 3406; // cos(3*pi/16) * 4096
const SIN3: i64 = 2276; // sin(3*pi/16) * 4096
const COS6: i64 = 1567; // cos(6*pi/16) * 4096
const SIN6: i64 = 3784; // sin(6*pi/16) * 4096
const SQRT2: i64 = 5793; // sqrt(2) * 4096
const SQRT1D2: i64 = 2896; // sqrt(2) / 2 * 4096

/// Dequantizes a block of natural-order coefficients and transforms it into 64 samples.
///
/// The working buffer is 64-bit so that corrupt coefficients cannot overflow.
pub fn dequantize_idct(coefficients: &[i32], table: &[u16], out: &mut [u8; 64]) {
    let mut p = [0i64; 64];
    for i in 0..64 {
        p[i] = coefficients[i] as i64 * table[i] as i64;
    }

    for row in (0..64).step_by(8) {
        if p[row + 1..row + 8].iter().all(|&c| c == 0) {
            let t = (SQRT2 * p[row] + 512) >> 10;
            p[row..row + 8].fill(t);
            continue;
        }

        // stage 4
        let mut v0 = (SQRT2 * p[row] + 128) >> 8;
        let mut v1 = (SQRT2 * p[row + 4] + 128) >> 8;
        let mut v2 = p[row + 2];
        let mut v3 = p[row + 6];
        let mut v4 = (SQRT1D2 * (p[row + 1] - p[row + 7]) + 128) >> 8;
        let mut v7 = (SQRT1D2 * (p[row + 1] + p[row + 7]) + 128) >> 8;
        let mut v5 = p[row + 3] << 4;
        let mut v6 = p[row + 5] << 4;

        // stage 3
        let mut t = (v0 - v1 + 1) >> 1;
        v0 = (v0 + v1 + 1) >> 1;
        v1 = t;
        t = (v2 * SIN6 + v3 * COS6 + 128) >> 8;
        v2 = (v2 * COS6 - v3 * SIN6 + 128) >> 8;
        v3 = t;
        t = (v4 - v6 + 1) >> 1;
        v4 = (v4 + v6 + 1) >> 1;
        v6 = t;
        t = (v7 + v5 + 1) >> 1;
        v5 = (v7 - v5 + 1) >> 1;
        v7 = t;

        // stage 2
        t = (v0 - v3 + 1) >> 1;
        v0 = (v0 + v3 + 1) >> 1;
        v3 = t;
        t = (v1 - v2 + 1) >> 1;
        v1 = (v1 + v2 + 1) >> 1;
        v2 = t;
        t = (v4 * SIN3 + v7 * COS3 + 2048) >> 12;
        v4 = (v4 * COS3 - v7 * SIN3 + 2048) >> 12;
        v7 = t;
        t = (v5 * SIN1 + v6 * COS1 + 2048) >> 12;
        v5 = (v5 * COS1 - v6 * SIN1 + 2048) >> 12;
        v6 = t;

        // stage 1
        p[row] = v0 + v7;
        p[row + 7] = v0 - v7;
        p[row + 1] = v1 + v6;
        p[row + 6] = v1 - v6;
        p[row + 2] = v2 + v5;
        p[row + 5] = v2 - v5;
        p[row + 3] = v3 + v4;
        p[row + 4] = v3 - v4;
    }

    for col in 0..8 {
        if (1..8).all(|r| p[r * 8 + col] == 0) {
            let t = (SQRT2 * p[col] + 8192) >> 14;
            for r in 0..8 {
                p[r * 8 + col] = t;
            }
            continue;
        }

        // stage 4
        let mut v0 = (SQRT2 * p[col] + 2048) >> 12;
        let mut v1 = (SQRT2 * p[4 * 8 + col] + 2048) >> 12;
        let mut v2 = p[2 * 8 + col];
        let mut v3 = p[6 * 8 + col];
        let mut v4 = (SQRT1D2 * (p[8 + col] - p[7 * 8 + col]) + 2048) >> 12;
        let mut v7 = (SQRT1D2 * (p[8 + col] + p[7 * 8 + col]) + 2048) >> 12;
        let mut v5 = p[3 * 8 + col];
        let mut v6 = p[5 * 8 + col];

        // stage 3
        let mut t = (v0 - v1 + 1) >> 1;
        v0 = (v0 + v1 + 1) >> 1;
        v1 = t;
        t = (v2 * SIN6 + v3 * COS6 + 2048) >> 12;
        v2 = (v2 * COS6 - v3 * SIN6 + 2048) >> 12;
        v3 = t;
        t = (v4 - v6 + 1) >> 1;
        v4 = (v4 + v6 + 1) >> 1;
        v6 = t;
        t = (v7 + v5 + 1) >> 1;
        v5 = (v7 - v5 + 1) >> 1;
        v7 = t;

        // stage 2
        t = (v0 - v3 + 1) >> 1;
        v0 = (v0 + v3 + 1) >> 1;
        v3 = t;
        t = (v1 - v2 + 1) >> 1;
        v1 = (v1 + v2 + 1) >> 1;
        v2 = t;
        t = (v4 * SIN3 + v7 * COS3 + 2048) >> 12;
        v4 = (v4 * COS3 - v7 * SIN3 + 2048) >> 12;
        v7 = t;
        t = (v5 * SIN1 + v6 * COS1 + 2048) >> 12;
        v5 = (v5 * COS1 - v6 * SIN1 + 2048) >> 12;
        v6 = t;

        // stage 1
        p[col] = v0 + v7;
        p[7 * 8 + col] = v0 - v7;
        p[8 + col] = v1 + v6;
        p[6 * 8 + col] = v1 - v6;
        p[2 * 8 + col] = v2 + v5;
        p[5 * 8 + col] = v2 - v5;
        p[3 * 8 + col] = v3 + v4;
        p[4 * 8 + col] = v3 - v4;
    }

    for i in 0..64 {
        out[i] = (128 + ((p[i] + 8) >> 4)).clamp(0, 255) as u8;
    }
}
