/*! Stimulus generators for the experiment drivers.

Each generator returns `(time, samples)` in rational units; the caller
quantizes with [`crate::fixed_point::FixedPoint`] before building frames.
Amplitude and offset are chosen so a generated trace never saturates the
DUT's own fixed-point range: `amp = 0.95 * 2^(bitwidth-1) - 2`, with an
unsigned DUT biased up by `2^(bitwidth-1)` so it never goes negative.
*/
use rand::Rng;
use std::f64::consts::PI;

fn amplitude(bitwidth: u32) -> f64 {
    0.95 * 2f64.powi(bitwidth as i32 - 1) - 2.0
}

fn offset(bitwidth: u32, signed: bool) -> f64 {
    if signed {
        0.0
    } else {
        2f64.powi(bitwidth as i32 - 1)
    }
}

fn time_axis(n: usize, fs: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 / fs).collect()
}

/// Generate `n` samples of a cosine at `freq` Hz sampled at `fs` Hz.
pub fn sinusoid(freq: f64, fs: f64, n: usize, bitwidth: u32, signed: bool) -> (Vec<f64>, Vec<f64>) {
    let amp = amplitude(bitwidth);
    let off = offset(bitwidth, signed);
    let t = time_axis(n, fs);
    let y = t
        .iter()
        .map(|&ti| off + amp * (2.0 * PI * freq * ti).cos())
        .collect();
    (t, y)
}

/// Generate `n` samples of a triangle wave at `freq` Hz.
pub fn triangle(freq: f64, fs: f64, n: usize, bitwidth: u32, signed: bool) -> (Vec<f64>, Vec<f64>) {
    let amp = amplitude(bitwidth);
    let off = offset(bitwidth, signed);
    let t = time_axis(n, fs);
    let y = t
        .iter()
        .map(|&ti| {
            let phase = (ti * freq).rem_euclid(1.0);
            let tri = 2.0 * (2.0 * (phase - (phase + 0.5).floor()).abs()) - 1.0;
            off + amp * tri
        })
        .collect();
    (t, y)
}

/// Generate `n` samples of a rectangle (square) wave at `freq` Hz: the
/// sign of the equivalent sinusoid.
pub fn rectangle(freq: f64, fs: f64, n: usize, bitwidth: u32, signed: bool) -> (Vec<f64>, Vec<f64>) {
    let amp = amplitude(bitwidth);
    let off = offset(bitwidth, signed);
    let t = time_axis(n, fs);
    let y = t
        .iter()
        .map(|&ti| {
            let s = (2.0 * PI * freq * ti).sin();
            off + amp * s.signum()
        })
        .collect();
    (t, y)
}

/// Generate `n` zero-mean Gaussian samples with standard deviation
/// `sigma`, rounded and saturated to `[-2^(bw-1), 2^(bw-1)-1]` (or
/// `[0, 2^bw-1]` unsigned) the way the device's integer field would hold
/// them. Uses a Box-Muller transform over `rand`'s uniform generator;
/// the crate carries no separate distribution dependency.
pub fn noise(sigma: f64, n: usize, bitwidth: u32, signed: bool) -> Vec<i32> {
    let (lo, hi) = if signed {
        (-(1i64 << (bitwidth - 1)), (1i64 << (bitwidth - 1)) - 1)
    } else {
        (0i64, (1i64 << bitwidth) - 1)
    };
    let mut rng = rand::rng();
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let u1: f64 = rng.random_range(f64::EPSILON..1.0);
        let u2: f64 = rng.random_range(0.0..1.0);
        let r = (-2.0 * u1.ln()).sqrt();
        let z0 = r * (2.0 * PI * u2).cos();
        let z1 = r * (2.0 * PI * u2).sin();
        for z in [z0, z1] {
            if out.len() == n {
                break;
            }
            let v = (z * sigma).round() as i64;
            out.push(v.clamp(lo, hi) as i32);
        }
    }
    out
}
