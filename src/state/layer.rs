// src/state/layer.rs
//
// Per-layer rhythm input and per-layer playback memory.

use std::collections::VecDeque;

use crate::event::LAYER_COUNT;

/// Declarative input for one rhythm layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerConfig<N> {
    /// Pulses per cycle. 0 or 1 silences the layer.
    pub divisor: u32,

    /// Note payload per pulse. Shorter arrays wrap around.
    pub notes: Vec<N>,
}

impl<N> LayerConfig<N> {
    pub fn new(divisor: u32, notes: Vec<N>) -> Self {
        Self { divisor, notes }
    }

    pub fn silent() -> Self {
        Self {
            divisor: 0,
            notes: Vec::new(),
        }
    }
}

/// A note the scheduler handed to the voice system.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayedNote<N> {
    pub tick: i64,
    pub note_index: usize,
    pub note: N,
}

/// Recently scheduled notes per layer.
///
/// Scheduled notes may lie in the future (up to one lookahead window).
/// After [`prune`](Self::prune) each queue holds at most one note at or
/// before the current tick, at its front, followed by pending ones.
#[derive(Debug, Clone)]
pub struct PlayHistory<N> {
    layers: [VecDeque<PlayedNote<N>>; LAYER_COUNT],
}

impl<N> Default for PlayHistory<N> {
    fn default() -> Self {
        Self {
            layers: std::array::from_fn(|_| VecDeque::new()),
        }
    }
}

impl<N> PlayHistory<N> {
    /// Insert a note, keeping each layer ordered by tick.
    pub fn record(&mut self, layer: usize, played: PlayedNote<N>) {
        if let Some(queue) = self.layers.get_mut(layer) {
            let pos = queue.partition_point(|p| p.tick <= played.tick);
            queue.insert(pos, played);
        }
    }

    /// Drop notes superseded by a later note that has already started.
    pub fn prune(&mut self, current_tick: i64) {
        for queue in &mut self.layers {
            while queue.len() >= 2 && queue[1].tick <= current_tick {
                queue.pop_front();
            }
        }
    }

    /// Most recent note start at or before `current_tick` on `layer`.
    pub fn last_started(&self, layer: usize, current_tick: i64) -> Option<&PlayedNote<N>> {
        self.layers
            .get(layer)?
            .iter()
            .take_while(|played| played.tick <= current_tick)
            .last()
    }

    /// The layer whose last note started most recently, and that note.
    ///
    /// Ties go to the lower layer index.
    pub fn latest_started(&self, current_tick: i64) -> Option<(usize, &PlayedNote<N>)> {
        let mut latest: Option<(usize, &PlayedNote<N>)> = None;
        for layer in 0..LAYER_COUNT {
            if let Some(played) = self.last_started(layer, current_tick) {
                match latest {
                    Some((_, best)) if best.tick >= played.tick => {}
                    _ => latest = Some((layer, played)),
                }
            }
        }
        latest
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(VecDeque::is_empty)
    }

    pub fn clear(&mut self) {
        for queue in &mut self.layers {
            queue.clear();
        }
    }
}

/// A held note sustaining a layer across a retune.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeVoice<N> {
    pub note: N,

    /// Absolute tick at which the next real note takes over
    pub release_tick: i64,

    /// Device time the hold started
    pub started_at: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn played(tick: i64) -> PlayedNote<u32> {
        PlayedNote {
            tick,
            note_index: 0,
            note: tick as u32,
        }
    }

    #[test]
    fn test_prune_keeps_latest_started() {
        let mut history = PlayHistory::default();
        for tick in [0, 100, 200, 300] {
            history.record(0, played(tick));
        }

        history.prune(250);
        assert_eq!(history.last_started(0, 250).map(|p| p.tick), Some(200));
        assert_eq!(history.layers[0].len(), 2);
    }

    #[test]
    fn test_record_out_of_order() {
        let mut history = PlayHistory::default();
        for tick in [300, 0, 200, 100] {
            history.record(0, played(tick));
        }
        let ticks: Vec<i64> = history.layers[0].iter().map(|p| p.tick).collect();
        assert_eq!(ticks, vec![0, 100, 200, 300]);
    }

    #[test]
    fn test_future_notes_are_not_latest() {
        let mut history = PlayHistory::default();
        history.record(1, played(500));
        assert!(history.latest_started(100).is_none());
        assert!(!history.is_empty());
    }

    #[test]
    fn test_latest_across_layers() {
        let mut history = PlayHistory::default();
        history.record(0, played(100));
        history.record(2, played(180));
        history.record(3, played(180));
        history.record(1, played(900));
        history.record(1, played(150));

        let (layer, note) = history.latest_started(200).expect("history");
        assert_eq!(layer, 2);
        assert_eq!(note.tick, 180);
    }
}
