/*! Reference digital filter design and frequency response, and the
gain/phase extraction the Bode driver needs to compare a trace against
it.

This is the "external collaborator" the top-level design treats as a
pure function from configuration to frequency response; the bundled
implementation covers closed-form Butterworth and allpass designs up to
order 2, plus windowed-sinc FIR, which is everything the accelerator
family under test actually exercises. Higher orders, and other analog
prototypes (Chebyshev-I/II, elliptic, Bessel) need parameters — ripple,
stopband attenuation — this module has no field for, and belong in a
real design crate rather than a hand-derived approximation; they're the
documented extension point: swap in another [`FilterDesign`] backed by
one.
*/
use std::f64::consts::PI;

/// Passband shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    LowPass,
    HighPass,
    BandPass,
    BandStop,
    AllPass,
}

/// Analog prototype family. Only [`DesignKind::Butterworth`] and
/// [`ResponseType::AllPass`] are implemented in closed form here; others
/// are accepted by the type but rejected by [`ClosedFormFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesignKind {
    Butterworth,
    Chebyshev1,
    Chebyshev2,
    Elliptic,
    Bessel,
}

/// Filter realization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Iir,
    Fir,
}

/// A filter design request.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub order: usize,
    pub fs: f64,
    /// One corner for low/high/all-pass, two for band-pass/band-stop.
    pub corners: Vec<f64>,
    pub response_type: ResponseType,
    pub design: DesignKind,
    pub topology: Topology,
}

/// `{gain_db, phase_deg}` at one frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreqPoint {
    pub gain_db: f64,
    pub phase_deg: f64,
}

/// Difference-equation coefficients: `a[0]*y[n] = sum(b*x) - sum(a[1..]*y)`.
#[derive(Debug, Clone)]
pub struct Coefficients {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

impl Coefficients {
    fn fir(b: Vec<f64>) -> Self {
        Self { b, a: vec![1.0] }
    }

    /// Evaluate `H(e^{jw})` at each of `freqs` (Hz) and return gain/phase.
    pub fn freq_response(&self, freqs: &[f64], fs: f64) -> Vec<FreqPoint> {
        freqs
            .iter()
            .map(|&f| {
                let w = 2.0 * PI * f / fs;
                let num = poly_eval_unit_circle(&self.b, w);
                let den = poly_eval_unit_circle(&self.a, w);
                let h = num / den;
                FreqPoint {
                    gain_db: 20.0 * h.norm().log10(),
                    phase_deg: h.arg().to_degrees(),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Complex64 {
    re: f64,
    im: f64,
}

impl Complex64 {
    fn norm(&self) -> f64 {
        (self.re * self.re + self.im * self.im).sqrt()
    }
    fn arg(&self) -> f64 {
        self.im.atan2(self.re)
    }
}

impl std::ops::Div for Complex64 {
    type Output = Complex64;
    fn div(self, rhs: Complex64) -> Complex64 {
        let denom = rhs.re * rhs.re + rhs.im * rhs.im;
        Complex64 {
            re: (self.re * rhs.re + self.im * rhs.im) / denom,
            im: (self.im * rhs.re - self.re * rhs.im) / denom,
        }
    }
}

fn poly_eval_unit_circle(coeffs: &[f64], w: f64) -> Complex64 {
    // sum_k coeffs[k] * e^{-j w k}
    let mut acc = Complex64 { re: 0.0, im: 0.0 };
    for (k, &c) in coeffs.iter().enumerate() {
        let theta = -w * k as f64;
        acc.re += c * theta.cos();
        acc.im += c * theta.sin();
    }
    acc
}

/// A source of filter coefficients from a [`FilterSpec`].
pub trait FilterDesign {
    /// Errors with a description when the requested combination isn't
    /// implemented, rather than silently approximating it.
    fn coefficients(&self, spec: &FilterSpec) -> Result<Coefficients, String>;
}

/// Closed-form Butterworth/allpass IIR up to order 2, and windowed-sinc
/// FIR at any order.
pub struct ClosedFormFilter;

impl FilterDesign for ClosedFormFilter {
    fn coefficients(&self, spec: &FilterSpec) -> Result<Coefficients, String> {
        match spec.topology {
            Topology::Fir => fir_windowed_sinc(spec),
            Topology::Iir => iir_bilinear(spec),
        }
    }
}

fn fir_windowed_sinc(spec: &FilterSpec) -> Result<Coefficients, String> {
    if spec.corners.len() != 1 {
        return Err("FIR reference design only supports one corner".into());
    }
    let fc = spec.corners[0] / spec.fs;
    let n = spec.order;
    let m = n as f64;
    let mut taps = Vec::with_capacity(n + 1);
    for i in 0..=n {
        let k = i as f64 - m / 2.0;
        let sinc = if k.abs() < 1e-12 {
            2.0 * fc
        } else {
            (2.0 * PI * fc * k).sin() / (PI * k)
        };
        let window = 0.54 - 0.46 * (2.0 * PI * i as f64 / m).cos();
        taps.push(sinc * window);
    }
    if spec.response_type == ResponseType::HighPass {
        let sum: f64 = taps.iter().sum();
        for (i, t) in taps.iter_mut().enumerate() {
            let spectral_invert = if i == n / 2 { 1.0 - sum } else { -*t };
            *t = spectral_invert;
        }
    }
    Ok(Coefficients::fir(taps))
}

fn iir_bilinear(spec: &FilterSpec) -> Result<Coefficients, String> {
    if spec.design != DesignKind::Butterworth && spec.response_type != ResponseType::AllPass {
        return Err(format!(
            "{:?} design not implemented by the bundled reference; order {}",
            spec.design, spec.order
        ));
    }
    if spec.order > 2 {
        return Err(format!(
            "order {} exceeds the bundled closed-form reference's limit of 2",
            spec.order
        ));
    }
    match (spec.response_type, spec.order) {
        (ResponseType::LowPass, 1) => Ok(first_order_lowpass(spec.corners[0], spec.fs)),
        (ResponseType::HighPass, 1) => Ok(first_order_highpass(spec.corners[0], spec.fs)),
        (ResponseType::LowPass, 2) => Ok(second_order_butterworth(spec.corners[0], spec.fs, false)),
        (ResponseType::HighPass, 2) => Ok(second_order_butterworth(spec.corners[0], spec.fs, true)),
        (ResponseType::AllPass, 1) => Ok(first_order_allpass(spec.corners[0], spec.fs)),
        (ResponseType::AllPass, 2) => Ok(second_order_allpass(spec.corners[0], spec.fs)),
        (rt, order) => Err(format!(
            "{rt:?} order {order} not implemented by the bundled reference"
        )),
    }
}

fn first_order_lowpass(fc: f64, fs: f64) -> Coefficients {
    let wc = (PI * fc / fs).tan();
    let a0 = 1.0 + wc;
    Coefficients {
        b: vec![wc / a0, wc / a0],
        a: vec![1.0, (wc - 1.0) / a0],
    }
}

fn first_order_highpass(fc: f64, fs: f64) -> Coefficients {
    let wc = (PI * fc / fs).tan();
    let a0 = 1.0 + wc;
    Coefficients {
        b: vec![1.0 / a0, -1.0 / a0],
        a: vec![1.0, (wc - 1.0) / a0],
    }
}

fn first_order_allpass(fc: f64, fs: f64) -> Coefficients {
    let wc = (PI * fc / fs).tan();
    let alpha = (wc - 1.0) / (wc + 1.0);
    Coefficients {
        b: vec![alpha, 1.0],
        a: vec![1.0, alpha],
    }
}

fn second_order_butterworth(fc: f64, fs: f64, highpass: bool) -> Coefficients {
    let wc = (PI * fc / fs).tan();
    let k = wc * wc;
    let sqrt2 = std::f64::consts::SQRT_2;
    let a0 = k + sqrt2 * wc + 1.0;
    if highpass {
        Coefficients {
            b: vec![1.0 / a0, -2.0 / a0, 1.0 / a0],
            a: vec![1.0, (2.0 * (k - 1.0)) / a0, (k - sqrt2 * wc + 1.0) / a0],
        }
    } else {
        Coefficients {
            b: vec![k / a0, 2.0 * k / a0, k / a0],
            a: vec![1.0, (2.0 * (k - 1.0)) / a0, (k - sqrt2 * wc + 1.0) / a0],
        }
    }
}

fn second_order_allpass(fc: f64, fs: f64) -> Coefficients {
    let wc = (PI * fc / fs).tan();
    let a1 = -2.0 * (wc * wc - 1.0) / (wc * wc + wc + 1.0);
    let a2 = (wc * wc - wc + 1.0) / (wc * wc + wc + 1.0);
    Coefficients {
        b: vec![a2, a1, 1.0],
        a: vec![1.0, a1, a2],
    }
}

/// Find local-maximum indices in `trace`, rejecting candidates closer
/// together than `min_spacing` samples — the device period divided by
/// two, so a trace can't register twice within one half-cycle.
pub fn find_peaks(trace: &[f64], min_spacing: usize) -> Vec<usize> {
    let mut peaks = Vec::new();
    let mut last = None;
    for i in 1..trace.len().saturating_sub(1) {
        if trace[i] > trace[i - 1] && trace[i] >= trace[i + 1] {
            if let Some(prev) = last {
                if i - prev < min_spacing {
                    continue;
                }
            }
            peaks.push(i);
            last = Some(i);
        }
    }
    peaks
}

/// Extract `(gain_db, phase_deg)` by comparing recorded input/output
/// traces at frequency `f` sampled at `fs`: locate peaks in both (min
/// spacing = half the DUT period in samples), average their index
/// offset into a group delay, then `phase = 360 * delay * f / fs` and
/// `gain_db = 20*log10(peak-to-peak(out) / peak-to-peak(in))`.
pub fn extract_gain_phase(input: &[f64], output: &[f64], f: f64, fs: f64) -> (f64, f64) {
    let period_samples = (fs / f).round().max(1.0) as usize;
    let min_spacing = (period_samples / 2).max(1);
    let in_peaks = find_peaks(input, min_spacing);
    let out_peaks = find_peaks(output, min_spacing);
    let pairs = in_peaks.len().min(out_peaks.len());
    let delay = if pairs == 0 {
        0.0
    } else {
        (0..pairs)
            .map(|i| out_peaks[i] as f64 - in_peaks[i] as f64)
            .sum::<f64>()
            / pairs as f64
    };
    let phase_deg = 360.0 * delay * f / fs;
    let in_pp = peak_to_peak(input);
    let out_pp = peak_to_peak(output);
    let gain_db = 20.0 * (out_pp / in_pp).log10();
    (gain_db, phase_deg)
}

fn peak_to_peak(trace: &[f64]) -> f64 {
    let max = trace.iter().cloned().fold(f64::MIN, f64::max);
    let min = trace.iter().cloned().fold(f64::MAX, f64::min);
    max - min
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_order_lowpass_is_unity_gain_at_dc() {
        let c = first_order_lowpass(100.0, 10_000.0);
        let resp = c.freq_response(&[0.0], 10_000.0);
        assert!((resp[0].gain_db).abs() < 1e-6);
    }

    #[test]
    fn second_order_butterworth_corner_is_minus_three_db() {
        let c = second_order_butterworth(1000.0, 48_000.0, false);
        let resp = c.freq_response(&[1000.0], 48_000.0);
        assert!((resp[0].gain_db - (-3.0)).abs() < 0.5);
    }

    #[test]
    fn closed_form_filter_rejects_high_order() {
        let design = ClosedFormFilter;
        let spec = FilterSpec {
            order: 4,
            fs: 48_000.0,
            corners: vec![1000.0],
            response_type: ResponseType::LowPass,
            design: DesignKind::Butterworth,
            topology: Topology::Iir,
        };
        assert!(design.coefficients(&spec).is_err());
    }

    #[test]
    fn closed_form_filter_rejects_non_butterworth() {
        let design = ClosedFormFilter;
        let spec = FilterSpec {
            order: 2,
            fs: 48_000.0,
            corners: vec![1000.0],
            response_type: ResponseType::LowPass,
            design: DesignKind::Chebyshev1,
            topology: Topology::Iir,
        };
        assert!(design.coefficients(&spec).is_err());
    }

    #[test]
    fn fir_lowpass_has_requested_length() {
        let design = ClosedFormFilter;
        let spec = FilterSpec {
            order: 20,
            fs: 1000.0,
            corners: vec![100.0],
            response_type: ResponseType::LowPass,
            design: DesignKind::Butterworth,
            topology: Topology::Fir,
        };
        let c = design.coefficients(&spec).unwrap();
        assert_eq!(c.b.len(), 21);
    }

    #[test]
    fn extract_gain_phase_zero_delay_is_zero_phase() {
        let fs = 1000.0;
        let f = 50.0;
        let n = 400;
        let trace: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * f * i as f64 / fs).sin())
            .collect();
        let (gain, phase) = extract_gain_phase(&trace, &trace, f, fs);
        assert!(gain.abs() < 1e-6);
        assert!(phase.abs() < 5.0);
    }
}
