use std::time::Instant;

use crate::config::RevealSettings;

use super::labels::LabelSet;
use super::params::{ShaderParams, TextureSlot};
use super::tween::{Stagger, Tween, TweenStep};

/// Outcome of sampling the reveal timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealStep {
    Running,
    /// The progress ramp landed on this sample; label words may still be
    /// rising.
    Settled,
}

/// One-shot first-paint timeline: label words rise in while `progress` ramps
/// from blank to image 0.
#[derive(Debug)]
pub struct Reveal {
    words: Option<Stagger>,
    words_done: bool,
    progress: Tween,
}

impl Reveal {
    /// Stages the timeline and binds blank → image 0.
    pub fn begin(
        settings: &RevealSettings,
        labels: &mut LabelSet,
        params: &mut ShaderParams,
        now: Instant,
    ) -> Self {
        let count = labels.word_count(0);
        labels.unhide(0);
        let words = (count > 0).then(|| {
            Stagger::new(
                count,
                1.0,
                0.0,
                settings.label_duration,
                settings.label_stagger,
                settings.label_easing,
                now,
            )
        });
        let progress = Tween::new(
            0.0,
            1.0,
            settings.progress_duration,
            settings.progress_easing,
            now,
        )
        .with_delay(settings.progress_delay);

        params.bind(TextureSlot::Blank, TextureSlot::Image(0));
        params.reset_progress(0.0);
        params.reveal_active = true;
        tracing::info!(words = count, "reveal_start");
        Self {
            words,
            words_done: false,
            progress,
        }
    }

    pub fn sample(
        &mut self,
        now: Instant,
        labels: &mut LabelSet,
        params: &mut ShaderParams,
    ) -> RevealStep {
        if let Some(words) = self.words.as_mut() {
            let (offsets, done) = words.poll(now);
            labels.set_offsets(0, &offsets);
            self.words_done = done;
        }
        match self.progress.poll(now) {
            TweenStep::Running(value) => {
                params.raise_progress(value);
                RevealStep::Running
            }
            TweenStep::Settled(value) | TweenStep::Finished(value) => {
                params.raise_progress(value);
                RevealStep::Settled
            }
        }
    }

    /// Commits a settled reveal. Returns the label rise when its words have
    /// not all landed yet; the caption keeps its current offsets.
    pub fn complete(self, labels: &mut LabelSet, params: &mut ShaderParams) -> Option<Stagger> {
        let rise = self.words.filter(|_| !self.words_done);
        let offsets = labels.get(0).map(|label| label.offsets.clone());
        Self::finish(labels, params);
        if let (Some(_), Some(offsets)) = (rise.as_ref(), offsets) {
            labels.set_offsets(0, &offsets);
        }
        rise
    }

    /// Leaves image 0 bound to both slots with the label in place.
    pub fn finish(labels: &mut LabelSet, params: &mut ShaderParams) {
        params.bind(TextureSlot::Image(0), TextureSlot::Image(0));
        params.reset_progress(0.0);
        params.reveal_active = false;
        labels.show_only(0);
        tracing::info!("reveal_complete");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::carousel::tween::Easing;

    fn settings() -> RevealSettings {
        RevealSettings {
            enabled: true,
            label_duration: Duration::from_millis(300),
            label_stagger: Duration::from_millis(20),
            label_easing: Easing::Linear,
            progress_delay: Duration::from_millis(20),
            progress_duration: Duration::from_millis(200),
            progress_easing: Easing::ExpoInOut,
        }
    }

    #[test]
    fn reveal_settles_with_the_progress_ramp() {
        let start = Instant::now();
        let mut labels = LabelSet::new(&["a b c".to_owned(), "d".to_owned()]);
        let mut params = ShaderParams::default();
        let mut reveal = Reveal::begin(&settings(), &mut labels, &mut params, start);
        assert_eq!(params.texture_a, TextureSlot::Blank);
        assert_eq!(params.texture_b, TextureSlot::Image(0));
        assert!(params.reveal_active);
        assert!(labels.get(0).unwrap().visible);

        assert_eq!(
            reveal.sample(start + Duration::from_millis(10), &mut labels, &mut params),
            RevealStep::Running
        );
        assert_eq!(params.progress, 0.0);

        // progress is done at 220ms, the third word only at 340ms
        assert_eq!(
            reveal.sample(start + Duration::from_millis(250), &mut labels, &mut params),
            RevealStep::Settled
        );
        assert_eq!(params.progress, 1.0);
        let rising = labels.get(0).unwrap().offsets.clone();
        assert!(rising[2] > 0.0);

        let mut rise = reveal.complete(&mut labels, &mut params).unwrap();
        assert_eq!(params.texture_a, TextureSlot::Image(0));
        assert_eq!(params.texture_b, TextureSlot::Image(0));
        assert_eq!(params.progress, 0.0);
        assert!(!params.reveal_active);
        assert_eq!(labels.get(0).unwrap().offsets, rising);
        assert_eq!(labels.visible().count(), 1);

        let (offsets, done) = rise.poll(start + Duration::from_millis(340));
        assert!(done);
        assert_eq!(offsets, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn landed_words_need_no_rise() {
        let start = Instant::now();
        let mut labels = LabelSet::new(&["a".to_owned()]);
        let mut params = ShaderParams::default();
        let slow_progress = RevealSettings {
            progress_duration: Duration::from_millis(500),
            ..settings()
        };
        let mut reveal = Reveal::begin(&slow_progress, &mut labels, &mut params, start);
        assert_eq!(
            reveal.sample(start + Duration::from_millis(600), &mut labels, &mut params),
            RevealStep::Settled
        );
        assert!(reveal.complete(&mut labels, &mut params).is_none());
        assert_eq!(labels.get(0).unwrap().offsets, vec![0.0]);
    }

    #[test]
    fn reveal_without_labels_follows_progress() {
        let start = Instant::now();
        let mut labels = LabelSet::default();
        let mut params = ShaderParams::default();
        let mut reveal = Reveal::begin(&settings(), &mut labels, &mut params, start);
        assert_eq!(
            reveal.sample(start + Duration::from_millis(220), &mut labels, &mut params),
            RevealStep::Settled
        );
    }
}
