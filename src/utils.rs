#[doc(hidden)]
#[macro_export]
macro_rules! assert_eq_float {
    ($a:expr, $b:expr) => {
        $crate::assert_eq_float!($a, $b, 0.00001);
    };
    ($a:expr, $b:expr, $eps:expr) => {
        assert!(($a - $b).abs() < $eps, "{} != {} (eps = {})", $a, $b, $eps);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! assert_eq_float_slice {
    ($a:expr, $b:expr) => {
        $crate::assert_eq_float_slice!($a, $b, 0.00001);
    };
    ($a:expr, $b:expr, $eps:expr) => {
        let a = $a;
        let b = $b;

        assert_eq!(a.len(), b.len());
        for (a, b) in std::iter::zip(a, b) {
            $crate::assert_eq_float!(a, b, $eps);
        }
    };
}

/// Sum of unit-amplitude sines, scaled by `amplitude / tones.len()`.
#[cfg(test)]
pub(crate) fn tones(freqs: &[f64], amplitude: f64, seconds: f64, sample_rate: u32) -> Vec<f64> {
    let len = (seconds * sample_rate as f64).round() as usize;
    let scale = amplitude / freqs.len().max(1) as f64;
    (0..len)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            freqs.iter().map(|f| f64::sin(2.0 * std::f64::consts::PI * f * t)).sum::<f64>() * scale
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn to_s16(samples: &[f64]) -> Vec<i16> {
    samples.iter().map(|&s| (s * i16::MAX as f64).round() as i16).collect()
}
