//! Three-Band Additive Equalizer
//!
//! Each band isolates part of the spectrum with a Butterworth design, filters
//! the buffer forward and backward (zero phase) and adds the isolated signal
//! back onto the dry buffer scaled by the band gain. A gain of +1.0 doubles the
//! band, -1.0 removes it.
//!
//! Low/high-pass coefficients follow the RBJ Audio EQ Cookbook via the
//! `biquad` crate. With Q = 1/sqrt(2) the cookbook low/high-pass is exactly the
//! bilinear-transformed 2nd-order Butterworth. The speech band is a 2nd-order
//! Butterworth band-pass (two sections) designed from the analog prototype.

use std::f64::consts::PI;

use biquad::{Coefficients, ToHertz, Type, Q_BUTTERWORTH_F32};
use num_complex::Complex64;

use crate::error::DspError;

/// Bass band low-pass cutoff (Hz)
pub const BASS_CUTOFF_HZ: f32 = 250.0;

/// Treble band high-pass cutoff (Hz)
pub const TREBLE_CUTOFF_HZ: f32 = 4000.0;

/// Speech band edges (Hz)
pub const SPEECH_BAND_HZ: (f32, f32) = (1000.0, 3000.0);

/// Bands with |gain| at or below this are skipped entirely
pub const GAIN_THRESHOLD: f32 = 0.01;

/// The three gesture-controlled EQ bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Bass,
    Treble,
    Speech,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Bass, Band::Treble, Band::Speech];

    pub fn name(self) -> &'static str {
        match self {
            Band::Bass => "bass",
            Band::Treble => "treble",
            Band::Speech => "speech",
        }
    }

    fn index(self) -> usize {
        match self {
            Band::Bass => 0,
            Band::Treble => 1,
            Band::Speech => 2,
        }
    }
}

/// Per-band blend gains, each in [-2.0, 2.0]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EqGains {
    pub bass: f32,
    pub treble: f32,
    pub speech: f32,
}

impl EqGains {
    pub fn new(bass: f32, treble: f32, speech: f32) -> Self {
        Self { bass, treble, speech }
    }

    pub fn gain(&self, band: Band) -> f32 {
        match band {
            Band::Bass => self.bass,
            Band::Treble => self.treble,
            Band::Speech => self.speech,
        }
    }

    /// True when every band is below the activation threshold
    pub fn is_flat(&self) -> bool {
        Band::ALL
            .iter()
            .all(|&band| self.gain(band).abs() <= GAIN_THRESHOLD)
    }
}

/// One normalized second-order section (a0 == 1)
#[derive(Debug, Clone, Copy)]
struct Section {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Section {
    fn design(filter: Type<f32>, cutoff: f32, sample_rate: f32) -> Result<Self, DspError> {
        let nyquist = sample_rate / 2.0;
        if cutoff >= nyquist {
            return Err(DspError::CutoffAboveNyquist { cutoff, nyquist });
        }

        let coeffs: Coefficients<f32> =
            Coefficients::<f32>::from_params(filter, sample_rate.hz(), cutoff.hz(), Q_BUTTERWORTH_F32)
                .map_err(|_| DspError::InvalidCoefficients {
                    frequency: cutoff,
                    sample_rate,
                })?;

        let section = Self {
            b0: coeffs.b0,
            b1: coeffs.b1,
            b2: coeffs.b2,
            a1: coeffs.a1,
            a2: coeffs.a2,
        };

        let finite = [section.b0, section.b1, section.b2, section.a1, section.a2]
            .iter()
            .all(|c| c.is_finite());
        if !finite {
            return Err(DspError::InvalidCoefficients {
                frequency: cutoff,
                sample_rate,
            });
        }

        Ok(section)
    }

    /// Butterworth band-pass between `low` and `high` as two sections
    ///
    /// The 2nd-order analog prototype is shifted to a band-pass around the
    /// prewarped geometric centre, then each conjugate pole pair goes through
    /// the bilinear transform. Both sections get their zeros at DC and Nyquist
    /// and unit gain at the centre, so the cascade peaks at exactly 1.0.
    fn band_pass(low: f32, high: f32, sample_rate: f32) -> Result<[Self; 2], DspError> {
        let nyquist = sample_rate / 2.0;
        if high >= nyquist {
            return Err(DspError::CutoffAboveNyquist { cutoff: high, nyquist });
        }
        if !(low > 0.0 && low < high) {
            return Err(DspError::InvalidCoefficients {
                frequency: low,
                sample_rate,
            });
        }

        let fs = sample_rate as f64;
        let warp = |f: f32| 2.0 * fs * (PI * f as f64 / fs).tan();
        let (w1, w2) = (warp(low), warp(high));
        let w0 = (w1 * w2).sqrt();
        let bandwidth = w2 - w1;

        // Upper prototype pole; its conjugate yields the conjugate partners
        let prototype = Complex64::from_polar(1.0, 3.0 * PI / 4.0) * bandwidth;
        let root = (prototype * prototype - Complex64::new(4.0 * w0 * w0, 0.0)).sqrt();
        let analog = [(prototype + root) * 0.5, (prototype - root) * 0.5];

        let centre = 2.0 * (w0 / (2.0 * fs)).atan();
        let e1 = Complex64::from_polar(1.0, -centre);
        let e2 = e1 * e1;
        let one = Complex64::new(1.0, 0.0);

        let mut sections = [Self {
            b0: 0.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }; 2];

        for (section, s) in sections.iter_mut().zip(analog) {
            let k = s / (2.0 * fs);
            let z = (one + k) / (one - k);
            let a1 = -2.0 * z.re;
            let a2 = z.norm_sqr();

            let response = (one - e2) / (one + e1 * a1 + e2 * a2);
            let gain = 1.0 / response.norm();

            *section = Self {
                b0: gain as f32,
                b1: 0.0,
                b2: -gain as f32,
                a1: a1 as f32,
                a2: a2 as f32,
            };

            let stable = a2 < 1.0;
            let finite = [section.b0, section.a1, section.a2].iter().all(|c| c.is_finite());
            if !(stable && finite) {
                return Err(DspError::InvalidCoefficients {
                    frequency: low,
                    sample_rate,
                });
            }
        }

        Ok(sections)
    }

    /// Output level for a constant unit input
    fn dc_gain(&self) -> f32 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Transposed direct form II state after settling on a constant unit input
    fn steady_state(&self) -> (f32, f32) {
        let y = self.dc_gain();
        let s2 = self.b2 - self.a2 * y;
        let s1 = self.b1 - self.a1 * y + s2;
        (s1, s2)
    }

    /// Filter `data` in place, forwards or backwards, starting from the
    /// steady state for an input level of `initial`.
    fn run(&self, data: &mut [f32], initial: f32, reverse: bool) {
        let (zi1, zi2) = self.steady_state();
        let mut s1 = zi1 * initial;
        let mut s2 = zi2 * initial;

        let mut step = |x: &mut f32| {
            let input = *x;
            let y = self.b0 * input + s1;
            s1 = self.b1 * input - self.a1 * y + s2;
            s2 = self.b2 * input - self.a2 * y;
            *x = y;
        };

        if reverse {
            data.iter_mut().rev().for_each(&mut step);
        } else {
            data.iter_mut().for_each(&mut step);
        }
    }
}

/// Cascade of sections implementing one band-isolation filter
#[derive(Debug, Clone)]
struct BandFilter {
    sections: Vec<Section>,
}

impl BandFilter {
    fn design(band: Band, sample_rate: f32) -> Result<Self, DspError> {
        let sections = match band {
            Band::Bass => vec![Section::design(Type::LowPass, BASS_CUTOFF_HZ, sample_rate)?],
            Band::Treble => vec![Section::design(Type::HighPass, TREBLE_CUTOFF_HZ, sample_rate)?],
            Band::Speech => {
                let (low, high) = SPEECH_BAND_HZ;
                Section::band_pass(low, high, sample_rate)?.to_vec()
            }
        };
        Ok(Self { sections })
    }

    /// Edge padding: three times the length of the combined coefficient vectors
    fn padding(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Zero-phase filter `input` into `output` using `work` as padded scratch
    ///
    /// Odd reflection at both ends plus steady-state initial conditions keep
    /// the edges free of start-up transients.
    fn filtfilt(&self, input: &[f32], work: &mut Vec<f32>, output: &mut [f32]) -> Result<(), DspError> {
        let n = input.len();
        let pad = self.padding();
        if n <= pad {
            return Err(DspError::BufferTooShort { padding: pad, got: n });
        }
        debug_assert_eq!(output.len(), n);

        let first = input[0];
        let last = input[n - 1];

        work.clear();
        work.extend((1..=pad).rev().map(|i| 2.0 * first - input[i]));
        work.extend_from_slice(input);
        work.extend((1..=pad).map(|i| 2.0 * last - input[n - 1 - i]));

        // Forward pass: each section starts settled on the level it will see
        let mut level = work[0];
        for section in &self.sections {
            section.run(work, level, false);
            level *= section.dc_gain();
        }

        // Backward pass seeded from the forward result's tail
        let mut level = work[work.len() - 1];
        for section in &self.sections {
            section.run(work, level, true);
            level *= section.dc_gain();
        }

        output.copy_from_slice(&work[pad..pad + n]);
        Ok(())
    }
}

/// The gesture EQ: bass, treble and speech bands blended additively
///
/// Filter designs are computed once per sample rate. A band whose design is
/// invalid for that rate stays disabled for the lifetime of the bank.
#[derive(Clone)]
pub struct FilterBank {
    sample_rate: f32,
    bands: [Result<BandFilter, DspError>; 3],
    // Scratch reused between calls; only grows when a longer buffer arrives
    dry: Vec<f32>,
    isolated: Vec<f32>,
    work: Vec<f32>,
}

impl FilterBank {
    /// Design all bands for `sample_rate`
    ///
    /// Only a non-positive sample rate is an error here; per-band problems
    /// disable that band and are reported by [`FilterBank::disabled_bands`].
    pub fn new(sample_rate: f32) -> Result<Self, DspError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }

        let bands = Band::ALL.map(|band| BandFilter::design(band, sample_rate));

        Ok(Self {
            sample_rate,
            bands,
            dry: Vec::new(),
            isolated: Vec::new(),
            work: Vec::new(),
        })
    }

    /// Pre-size scratch buffers so callbacks up to `max_frames` never allocate
    pub fn reserve(&mut self, max_frames: usize) {
        let padded = max_frames + 2 * self.max_padding();
        self.dry.reserve(max_frames.saturating_sub(self.dry.len()));
        self.isolated.reserve(max_frames.saturating_sub(self.isolated.len()));
        self.work.reserve(padded.saturating_sub(self.work.len()));
    }

    /// Largest edge padding among the enabled bands
    fn max_padding(&self) -> usize {
        self.bands
            .iter()
            .filter_map(|design| design.as_ref().ok())
            .map(BandFilter::padding)
            .max()
            .unwrap_or(0)
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn is_band_enabled(&self, band: Band) -> bool {
        self.bands[band.index()].is_ok()
    }

    /// Bands disabled at design time, with the reason
    pub fn disabled_bands(&self) -> impl Iterator<Item = (Band, &DspError)> + '_ {
        Band::ALL
            .iter()
            .zip(self.bands.iter())
            .filter_map(|(&band, design)| design.as_ref().err().map(|err| (band, err)))
    }

    /// Shortest buffer every enabled band can filter
    pub fn min_frames(&self) -> usize {
        match self.max_padding() {
            0 => 0,
            padding => padding + 1,
        }
    }

    /// Zero-phase isolate one band of `input` into `output`
    pub fn isolate(&mut self, band: Band, input: &[f32], output: &mut [f32]) -> Result<(), DspError> {
        match &self.bands[band.index()] {
            Ok(filter) => filter.filtfilt(input, &mut self.work, output),
            Err(err) => Err(err.clone()),
        }
    }

    /// Apply the EQ to `buffer` in place
    ///
    /// Every band reads the dry input, so band order does not matter. Bands
    /// that are below threshold, disabled, or cannot filter a buffer this
    /// short leave the buffer untouched.
    ///
    /// # Real-time Safety
    /// No allocations once [`FilterBank::reserve`] covered the buffer length.
    pub fn apply_eq(&mut self, buffer: &mut [f32], gains: EqGains) {
        if gains.is_flat() {
            return;
        }

        let n = buffer.len();
        self.dry.clear();
        self.dry.extend_from_slice(buffer);
        self.isolated.resize(n, 0.0);

        for band in Band::ALL {
            let gain = gains.gain(band);
            if gain.abs() <= GAIN_THRESHOLD {
                continue;
            }

            let Ok(filter) = &self.bands[band.index()] else {
                continue;
            };

            if filter
                .filtfilt(&self.dry, &mut self.work, &mut self.isolated[..n])
                .is_err()
            {
                continue;
            }

            for (out, isolated) in buffer.iter_mut().zip(self.isolated.iter()) {
                *out += isolated * gain;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin() * amplitude)
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_flat_gains_are_identity() {
        let mut bank = FilterBank::new(48000.0).unwrap();
        let input = sine(440.0, 48000.0, 512, 0.5);
        let mut buffer = input.clone();

        bank.apply_eq(&mut buffer, EqGains::default());
        assert_eq!(buffer, input);

        // At or below the threshold still counts as flat
        bank.apply_eq(&mut buffer, EqGains::new(0.01, -0.01, 0.005));
        assert_eq!(buffer, input);
    }

    #[test]
    fn test_invalid_sample_rate() {
        assert!(matches!(FilterBank::new(0.0), Err(DspError::InvalidSampleRate(_))));
        assert!(matches!(FilterBank::new(-44100.0), Err(DspError::InvalidSampleRate(_))));
        assert!(FilterBank::new(f32::NAN).is_err());
    }

    #[test]
    fn test_all_bands_valid_at_common_rates() {
        for rate in [22050.0, 44100.0, 48000.0, 96000.0] {
            let bank = FilterBank::new(rate).unwrap();
            assert_eq!(bank.disabled_bands().count(), 0, "rate {}", rate);
        }
    }

    #[test]
    fn test_low_rate_disables_bands() {
        // Nyquist 4000Hz: treble cutoff sits exactly on it, speech still fits
        let bank = FilterBank::new(8000.0).unwrap();
        assert!(bank.is_band_enabled(Band::Bass));
        assert!(!bank.is_band_enabled(Band::Treble));
        assert!(bank.is_band_enabled(Band::Speech));

        // Nyquist 2000Hz: speech upper edge is out of range too
        let bank = FilterBank::new(4000.0).unwrap();
        let disabled: Vec<Band> = bank.disabled_bands().map(|(band, _)| band).collect();
        assert_eq!(disabled, vec![Band::Treble, Band::Speech]);
        for (_, err) in bank.disabled_bands() {
            assert!(matches!(err, DspError::CutoffAboveNyquist { .. }));
        }
    }

    #[test]
    fn test_disabled_band_leaves_buffer_untouched() {
        let mut bank = FilterBank::new(8000.0).unwrap();
        let input = sine(3500.0, 8000.0, 256, 0.5);
        let mut buffer = input.clone();

        bank.apply_eq(&mut buffer, EqGains::new(0.0, 2.0, 0.0));
        assert_eq!(buffer, input);
    }

    #[test]
    fn test_bass_boost_raises_low_frequencies() {
        let mut bank = FilterBank::new(48000.0).unwrap();
        let input = sine(100.0, 48000.0, 4800, 0.25);
        let mut buffer = input.clone();

        bank.apply_eq(&mut buffer, EqGains::new(1.0, 0.0, 0.0));

        // 100Hz is well inside the pass band: boost of +1.0 roughly doubles it
        let ratio = rms(&buffer) / rms(&input);
        assert!(ratio > 1.8 && ratio < 2.1, "ratio {}", ratio);
    }

    #[test]
    fn test_bass_band_ignores_high_frequencies() {
        let mut bank = FilterBank::new(48000.0).unwrap();
        let input = sine(8000.0, 48000.0, 4800, 0.25);
        let mut buffer = input.clone();

        bank.apply_eq(&mut buffer, EqGains::new(2.0, 0.0, 0.0));

        let ratio = rms(&buffer) / rms(&input);
        assert!((ratio - 1.0).abs() < 0.02, "ratio {}", ratio);
    }

    #[test]
    fn test_treble_cut_removes_high_frequencies() {
        let mut bank = FilterBank::new(48000.0).unwrap();
        let input = sine(12000.0, 48000.0, 4800, 0.25);
        let mut buffer = input.clone();

        bank.apply_eq(&mut buffer, EqGains::new(0.0, -1.0, 0.0));

        assert!(rms(&buffer) < rms(&input) * 0.1);
    }

    #[test]
    fn test_speech_band_is_butterworth() {
        let mut bank = FilterBank::new(48000.0).unwrap();
        let mut isolated = vec![0.0; 4800];

        // Zero-phase amplitude is |H|^2: 1.0 at the geometric centre, 0.5
        // (-3dB per pass) at both band edges
        for (freq, expected) in [(1732.05, 1.0), (1000.0, 0.5), (3000.0, 0.5)] {
            let input = sine(freq, 48000.0, 4800, 0.25);
            bank.isolate(Band::Speech, &input, &mut isolated).unwrap();

            let ratio = rms(&isolated[1200..3600]) / rms(&input[1200..3600]);
            assert!((ratio - expected).abs() < 0.03, "{}Hz ratio {}", freq, ratio);
        }

        let low = sine(100.0, 48000.0, 4800, 0.25);
        bank.isolate(Band::Speech, &low, &mut isolated).unwrap();
        assert!(rms(&isolated[1200..3600]) < rms(&low) * 0.05);
    }

    #[test]
    fn test_speech_boost_doubles_centre() {
        let mut bank = FilterBank::new(48000.0).unwrap();
        let input = sine(1732.05, 48000.0, 4800, 0.25);
        let mut buffer = input.clone();

        bank.apply_eq(&mut buffer, EqGains::new(0.0, 0.0, 1.0));

        let ratio = rms(&buffer[1200..3600]) / rms(&input[1200..3600]);
        assert!((ratio - 2.0).abs() < 0.05, "ratio {}", ratio);
    }

    #[test]
    fn test_speech_sections_designed_from_prototype() {
        let [first, second] = Section::band_pass(1000.0, 3000.0, 48000.0).unwrap();
        for section in [first, second] {
            assert_eq!(section.b1, 0.0);
            assert_eq!(section.b2, -section.b0);
            assert!(section.a2 < 1.0);
            assert_eq!(section.dc_gain(), 0.0);
        }

        assert!(matches!(
            Section::band_pass(1000.0, 3000.0, 4000.0),
            Err(DspError::CutoffAboveNyquist { .. })
        ));
        assert!(Section::band_pass(3000.0, 1000.0, 48000.0).is_err());
    }

    #[test]
    fn test_padding_follows_band_design() {
        let bank = FilterBank::new(48000.0).unwrap();
        assert_eq!(bank.max_padding(), 15);

        // Only the single-section bass band survives at 4kHz
        let bank = FilterBank::new(4000.0).unwrap();
        assert_eq!(bank.max_padding(), 9);
        assert_eq!(bank.min_frames(), 10);
    }

    #[test]
    fn test_zero_phase_has_no_lag() {
        let mut bank = FilterBank::new(48000.0).unwrap();
        let input = sine(50.0, 48000.0, 4800, 0.5);
        let mut isolated = vec![0.0; input.len()];

        bank.isolate(Band::Bass, &input, &mut isolated).unwrap();

        // A forward-only low-pass would shift the waveform; zero-phase keeps
        // the pass band aligned with the input.
        let mid = input.len() / 2;
        for i in mid..mid + 100 {
            assert!((isolated[i] - input[i]).abs() < 0.02, "sample {}", i);
        }
    }

    #[test]
    fn test_dc_passes_low_band_unchanged() {
        let mut bank = FilterBank::new(44100.0).unwrap();
        let input = vec![0.3_f32; 256];
        let mut isolated = vec![0.0; 256];

        bank.isolate(Band::Bass, &input, &mut isolated).unwrap();
        for sample in &isolated {
            assert!((sample - 0.3).abs() < 1e-3);
        }

        bank.isolate(Band::Treble, &input, &mut isolated).unwrap();
        for sample in &isolated {
            assert!(sample.abs() < 1e-3);
        }
    }

    #[test]
    fn test_band_order_does_not_matter() {
        let mut bank = FilterBank::new(48000.0).unwrap();
        let input: Vec<f32> = (0..1024)
            .map(|i| ((i as f32 * 0.05).sin() + (i as f32 * 0.7).sin()) * 0.3)
            .collect();

        let mut combined = input.clone();
        bank.apply_eq(&mut combined, EqGains::new(0.5, -0.7, 1.2));

        // Sum each correction separately from the same dry input
        let mut expected = input.clone();
        for gains in [
            EqGains::new(0.0, 0.0, 1.2),
            EqGains::new(0.0, -0.7, 0.0),
            EqGains::new(0.5, 0.0, 0.0),
        ] {
            let mut single = input.clone();
            bank.apply_eq(&mut single, gains);
            for ((e, s), x) in expected.iter_mut().zip(&single).zip(&input) {
                *e += s - x;
            }
        }

        for (a, b) in combined.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_short_buffer_is_skipped() {
        let mut bank = FilterBank::new(48000.0).unwrap();
        assert_eq!(bank.min_frames(), 16);

        let input = vec![0.1, 0.2, 0.3, 0.4];
        let mut buffer = input.clone();
        bank.apply_eq(&mut buffer, EqGains::new(2.0, 2.0, 2.0));
        assert_eq!(buffer, input);

        let mut out = vec![0.0; 4];
        assert!(matches!(
            bank.isolate(Band::Bass, &input, &mut out),
            Err(DspError::BufferTooShort { padding: 9, got: 4 })
        ));
    }

    #[test]
    fn test_output_length_preserved() {
        let mut bank = FilterBank::new(48000.0).unwrap();
        bank.reserve(1024);
        for len in [16, 64, 256, 1000] {
            let mut buffer = vec![0.25; len];
            bank.apply_eq(&mut buffer, EqGains::new(1.0, 1.0, 1.0));
            assert_eq!(buffer.len(), len);
            assert!(buffer.iter().all(|s| s.is_finite()));
        }
    }
}
