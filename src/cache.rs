//! Bounded-staleness detection cache with temporal mask decay.
//!
//! The expensive model runs only every Nth frame; the cache keeps the last
//! result alive in between and fades the mask a little on every render tick
//! so the overlay degrades smoothly instead of flickering.

use std::time::{Duration, Instant};

use crate::detect::{BoxDetection, Detections};
use crate::mask::Mask;

/// Intensities at or below this peak are treated as fully faded; further
/// ticks are no-ops on a zeroed buffer.
pub const FADE_FLOOR: f32 = 0.5;

/// Decaying frame-resolution copy of the last segmentation mask.
///
/// Intensities are 0..255 but stored as `f32` so that repeated decay follows
/// `initial * decay^k` exactly instead of accumulating truncation error.
#[derive(Clone, Debug)]
pub struct CachedMask {
    width: u32,
    height: u32,
    intensities: Vec<f32>,
    peak: f32,
}

impl CachedMask {
    /// Fresh full-intensity copy of a mask, resized to frame resolution.
    pub fn from_mask(mask: &Mask, frame_width: u32, frame_height: u32) -> Self {
        let resized = mask.resize_to(frame_width, frame_height);
        let intensities = resized.to_intensities();
        let peak = intensities.iter().cloned().fold(0.0f32, f32::max);
        Self {
            width: frame_width,
            height: frame_height,
            intensities,
            peak,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn intensities(&self) -> &[f32] {
        &self.intensities
    }

    pub fn intensity(&self, x: u32, y: u32) -> f32 {
        self.intensities[(y * self.width + x) as usize]
    }

    /// Highest intensity currently stored.
    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// True once decay has driven the whole mask to (effectively) zero.
    pub fn is_faded(&self) -> bool {
        self.peak <= FADE_FLOOR
    }

    fn decay(&mut self, factor: f32) {
        if self.is_faded() {
            return;
        }
        let mut peak = 0.0f32;
        for v in &mut self.intensities {
            *v = (*v * factor).max(0.0);
            peak = peak.max(*v);
        }
        if peak <= FADE_FLOOR {
            self.intensities.fill(0.0);
            peak = 0.0;
        }
        self.peak = peak;
    }
}

/// Most recent detection result, decoupling render rate from inference rate.
///
/// Single-threaded: owned and driven by the render loop only.
pub struct DetectionCache {
    mask: Option<CachedMask>,
    boxes: Vec<BoxDetection>,
    last_detection: Option<Instant>,
    decay: f32,
}

impl DetectionCache {
    pub fn new(decay: f32) -> Self {
        Self {
            mask: None,
            boxes: Vec::new(),
            last_detection: None,
            decay,
        }
    }

    /// Absorb a fresh detection result.
    ///
    /// A result carrying a mask replaces the stored mask with a fresh
    /// full-intensity copy; a result without one leaves the previous mask
    /// decaying. Boxes are always replaced. Returns true when the mask was
    /// refreshed, so the caller can skip the decay tick for this frame and
    /// render the new mask at full intensity.
    pub fn update(&mut self, detections: &Detections, frame_width: u32, frame_height: u32) -> bool {
        self.boxes = detections.boxes.clone();
        self.last_detection = Some(Instant::now());
        match &detections.mask {
            Some(mask) => {
                self.mask = Some(CachedMask::from_mask(mask, frame_width, frame_height));
                true
            }
            None => false,
        }
    }

    /// Apply one decay step to the stored mask.
    pub fn tick(&mut self) {
        if let Some(mask) = &mut self.mask {
            mask.decay(self.decay);
        }
    }

    /// The current (possibly decayed) mask, if any survives.
    pub fn current(&self) -> Option<&CachedMask> {
        self.mask.as_ref().filter(|m| !m.is_faded())
    }

    pub fn boxes(&self) -> &[BoxDetection] {
        &self.boxes
    }

    /// Time since the last detector run, whatever its outcome.
    pub fn staleness(&self) -> Option<Duration> {
        self.last_detection.map(|t| t.elapsed())
    }

    /// Drop the stored mask (mask-postprocessing failure path).
    pub fn clear_mask(&mut self) {
        self.mask = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detections;

    fn full_mask_detections() -> Detections {
        Detections {
            boxes: Vec::new(),
            mask: Some(Mask::filled(4, 4, 1.0).unwrap()),
        }
    }

    #[test]
    fn empty_until_first_detection() {
        let mut cache = DetectionCache::new(0.9);
        assert!(cache.current().is_none());
        assert!(cache.staleness().is_none());
        cache.tick();
        assert!(cache.current().is_none());
    }

    #[test]
    fn update_resets_to_full_intensity() {
        let mut cache = DetectionCache::new(0.9);
        let fresh = cache.update(&full_mask_detections(), 8, 8);
        assert!(fresh);
        let mask = cache.current().unwrap();
        assert_eq!(mask.width(), 8);
        assert!((mask.peak() - 255.0).abs() < 1e-3);
    }

    #[test]
    fn intensity_after_k_ticks_is_initial_times_decay_pow_k() {
        let decay = 0.9f32;
        let mut cache = DetectionCache::new(decay);
        cache.update(&full_mask_detections(), 4, 4);

        let mut expected = 255.0f32;
        for _ in 0..4 {
            cache.tick();
            expected *= decay;
        }
        let mask = cache.current().unwrap();
        assert!((mask.intensity(2, 2) - expected).abs() < 1e-3);
        // 255 * 0.9^4 lands near 167.
        assert!((expected - 167.3).abs() < 0.1);
    }

    #[test]
    fn intensities_never_increase_between_updates() {
        let mut cache = DetectionCache::new(0.94);
        cache.update(&full_mask_detections(), 4, 4);
        let mut prev = cache.current().unwrap().intensity(0, 0);
        for _ in 0..50 {
            cache.tick();
            let Some(mask) = cache.current() else { break };
            let v = mask.intensity(0, 0);
            assert!(v <= prev);
            prev = v;
        }
    }

    #[test]
    fn fades_to_zero_and_stays_there() {
        let mut cache = DetectionCache::new(0.5);
        cache.update(&full_mask_detections(), 4, 4);
        // 255 * 0.5^10 < FADE_FLOOR
        for _ in 0..10 {
            cache.tick();
        }
        assert!(cache.current().is_none());
        // Further ticks are no-ops on the faded mask.
        cache.tick();
        assert!(cache.current().is_none());
    }

    #[test]
    fn update_without_mask_keeps_previous_mask_decaying() {
        let mut cache = DetectionCache::new(0.9);
        cache.update(&full_mask_detections(), 4, 4);
        cache.tick();
        let before = cache.current().unwrap().intensity(0, 0);

        let fresh = cache.update(&Detections::default(), 4, 4);
        assert!(!fresh);
        let after = cache.current().unwrap().intensity(0, 0);
        assert_eq!(before, after);
    }

    #[test]
    fn clear_mask_drops_mask_only() {
        let mut cache = DetectionCache::new(0.9);
        let mut dets = full_mask_detections();
        dets.boxes.push(BoxDetection {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
            label: "road_boundary".to_string(),
            confidence: 0.9,
        });
        cache.update(&dets, 4, 4);
        cache.clear_mask();
        assert!(cache.current().is_none());
        assert_eq!(cache.boxes().len(), 1);
        assert!(cache.staleness().is_some());
    }
}
