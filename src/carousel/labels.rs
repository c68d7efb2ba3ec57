/// Fraction of the ramp over which word starts are spread during a swap.
const SWAP_SPREAD: f32 = 0.3;

/// Per-image caption split into word segments.
///
/// Offsets are in line-box heights: `1.0` sits hidden below the line, `0.0` in
/// place, `-1.0` hidden above.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelState {
    pub words: Vec<String>,
    pub offsets: Vec<f32>,
    pub visible: bool,
}

impl LabelState {
    pub fn new(text: &str) -> Self {
        let words: Vec<String> = text.split_whitespace().map(str::to_owned).collect();
        let offsets = vec![1.0; words.len()];
        Self {
            words,
            offsets,
            visible: false,
        }
    }

    fn fill(&mut self, offset: f32) {
        self.offsets.iter_mut().for_each(|o| *o = offset);
    }
}

/// Captions for every image; empty when none are configured.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelSet {
    labels: Vec<LabelState>,
}

impl LabelSet {
    pub fn new(texts: &[String]) -> Self {
        Self {
            labels: texts.iter().map(|t| LabelState::new(t)).collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&LabelState> {
        self.labels.get(index)
    }

    pub fn visible(&self) -> impl Iterator<Item = (usize, &LabelState)> {
        self.labels.iter().enumerate().filter(|(_, l)| l.visible)
    }

    pub fn word_count(&self, index: usize) -> usize {
        self.labels.get(index).map_or(0, |l| l.words.len())
    }

    /// Shows `index` with its words parked below the line.
    pub fn unhide(&mut self, index: usize) {
        if let Some(label) = self.labels.get_mut(index) {
            label.visible = true;
            label.fill(1.0);
        }
    }

    /// Shows only `index`, fully in place.
    pub fn show_only(&mut self, index: usize) {
        for (i, label) in self.labels.iter_mut().enumerate() {
            label.visible = i == index;
            label.fill(if i == index { 0.0 } else { 1.0 });
        }
    }

    pub fn set_offsets(&mut self, index: usize, offsets: &[f32]) {
        if let Some(label) = self.labels.get_mut(index) {
            for (slot, value) in label.offsets.iter_mut().zip(offsets) {
                *slot = *value;
            }
        }
    }

    /// Drives the outgoing label up and out while the incoming one rises in.
    pub fn swap(&mut self, outgoing: usize, incoming: usize, progress: f32) {
        if outgoing == incoming {
            return;
        }
        for (index, base) in [(outgoing, 0.0), (incoming, 1.0)] {
            let Some(label) = self.labels.get_mut(index) else {
                continue;
            };
            label.visible = true;
            let count = label.offsets.len();
            for (k, offset) in label.offsets.iter_mut().enumerate() {
                *offset = base - word_phase(progress, k, count);
            }
        }
    }
}

/// Local ramp position of word `k` of `count` at overall `progress`.
fn word_phase(progress: f32, k: usize, count: usize) -> f32 {
    let progress = progress.clamp(0.0, 1.0);
    let start = if count > 1 {
        SWAP_SPREAD * k as f32 / (count - 1) as f32
    } else {
        0.0
    };
    ((progress - start) / (1.0 - SWAP_SPREAD)).clamp(0.0, 1.0)
}
