//! Butterworth band-pass design and forward-backward (zero-phase) filtering
//! over cascaded second-order sections.

use realfft::num_complex::Complex64;
use std::f64::consts::PI;

/// Imaginary parts below this are treated as real poles when pairing.
const REAL_POLE_TOL: f64 = 1e-10;

/// One second-order section in transposed direct form II, `a[0] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    /// DC gain `sum(b) / sum(a)`.
    fn dc_gain(&self) -> f64 {
        let den: f64 = self.a.iter().sum();
        if den.abs() < f64::EPSILON {
            return 0.0;
        }
        self.b.iter().sum::<f64>() / den
    }

    /// Steady-state delay line for a unit step input.
    fn step_state(&self) -> [f64; 2] {
        let g = self.dc_gain();
        let z1 = self.b[2] - self.a[2] * g;
        let z0 = self.b[1] - self.a[1] * g + z1;
        [z0, z1]
    }

    fn run(&self, data: &mut [f64], mut state: [f64; 2]) {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        for x in data.iter_mut() {
            let input = *x;
            let y = b0 * input + state[0];
            state[0] = b1 * input - a1 * y + state[1];
            state[1] = b2 * input - a2 * y;
            *x = y;
        }
    }
}

/// Cascade of second-order sections.
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    pub sections: Vec<Biquad>,
}

impl SosFilter {
    /// Digital Butterworth band-pass of the given prototype order.
    ///
    /// `low` and `high` are normalized to Nyquist and must satisfy
    /// `0 < low < high < 1`. The resulting filter has order `2 * order`.
    pub fn butter_bandpass(order: usize, low: f64, high: f64) -> Self {
        let order = order.max(1);
        // Pre-warp at fs = 2 so normalized frequencies map directly.
        let fs = 2.0;
        let fs2 = 2.0 * fs;
        let wl = fs2 * (PI * low / fs).tan();
        let wh = fs2 * (PI * high / fs).tan();
        let bw = wh - wl;
        let w0_sq = wl * wh;

        let mut analog_poles = Vec::with_capacity(2 * order);
        for i in 0..order {
            let m = -(order as f64) + 1.0 + 2.0 * i as f64;
            let proto = -Complex64::from_polar(1.0, PI * m / (2.0 * order as f64));
            let scaled = proto * (bw / 2.0);
            let root = (scaled * scaled - w0_sq).sqrt();
            analog_poles.push(scaled + root);
            analog_poles.push(scaled - root);
        }

        // Bilinear transform: band-pass zeros at s = 0 land on z = 1, the
        // zeros at infinity land on z = -1.
        let mut denom = Complex64::new(1.0, 0.0);
        let digital_poles: Vec<Complex64> = analog_poles
            .iter()
            .map(|&p| {
                denom *= fs2 - p;
                (fs2 + p) / (fs2 - p)
            })
            .collect();
        let gain = bw.powi(order as i32) * (fs2.powi(order as i32) / denom).re;

        let mut sections = pair_poles(&digital_poles)
            .into_iter()
            .map(|a| Biquad {
                b: [1.0, 0.0, -1.0],
                a,
            })
            .collect::<Vec<_>>();
        if let Some(first) = sections.first_mut() {
            for coeff in first.b.iter_mut() {
                *coeff *= gain;
            }
        }
        Self { sections }
    }

    /// Edge padding used by [`SosFilter::filtfilt`] for long inputs.
    pub fn default_padlen(&self) -> usize {
        let trailing_zero_b = self.sections.iter().filter(|s| s.b[2] == 0.0).count();
        let trailing_zero_a = self.sections.iter().filter(|s| s.a[2] == 0.0).count();
        let ntaps = 2 * self.sections.len() + 1 - trailing_zero_b.min(trailing_zero_a);
        3 * ntaps
    }

    /// Single forward pass starting from the step steady state scaled by `x0`.
    fn forward(&self, data: &mut [f64]) {
        let Some(&x0) = data.first() else {
            return;
        };
        let mut scale = x0;
        for section in &self.sections {
            let [z0, z1] = section.step_state();
            section.run(data, [z0 * scale, z1 * scale]);
            scale *= section.dc_gain();
        }
    }

    /// Zero-phase filtering with odd extension at both ends. The padding is
    /// shortened to `len - 1` for inputs too short for the default.
    pub fn filtfilt(&self, data: &[f64]) -> Vec<f64> {
        let n = data.len();
        if n == 0 {
            return Vec::new();
        }
        let padlen = self.default_padlen().min(n - 1);
        let mut ext = odd_extend(data, padlen);
        self.forward(&mut ext);
        ext.reverse();
        self.forward(&mut ext);
        ext.reverse();
        ext[padlen..padlen + n].to_vec()
    }
}

fn odd_extend(data: &[f64], padlen: usize) -> Vec<f64> {
    let n = data.len();
    let first = data[0];
    let last = data[n - 1];
    let mut ext = Vec::with_capacity(n + 2 * padlen);
    for i in (1..=padlen).rev() {
        ext.push(2.0 * first - data[i]);
    }
    ext.extend_from_slice(data);
    for i in 1..=padlen {
        ext.push(2.0 * last - data[n - 1 - i]);
    }
    ext
}

/// Group poles into denominators: conjugate pairs first, then real poles two
/// at a time.
fn pair_poles(poles: &[Complex64]) -> Vec<[f64; 3]> {
    let mut out = Vec::with_capacity(poles.len() / 2 + 1);
    let mut reals = Vec::new();
    for p in poles {
        if p.im.abs() <= REAL_POLE_TOL {
            reals.push(p.re);
        } else if p.im > 0.0 {
            out.push([1.0, -2.0 * p.re, p.norm_sqr()]);
        }
    }
    reals.sort_by(|a, b| a.total_cmp(b));
    for pair in reals.chunks(2) {
        match pair {
            [r1, r2] => out.push([1.0, -(r1 + r2), r1 * r2]),
            [r] => out.push([1.0, -r, 0.0]),
            _ => {}
        }
    }
    out
}
