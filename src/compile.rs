// src/compile.rs
//
// Compiles per-layer rhythm configuration into cycle-relative event lists.
//
// This is the bridge between the rhythm generator's declarative layer
// values (pulse counts + note arrays) and the scheduler's timeline.
// Every change is a full recompile; lists are never patched in place.

use std::sync::Arc;

use crate::event::{LAYER_COUNT, LayerEvent};
use crate::state::LayerConfig;

/// Compiled event lists for all layers, valid for one `cycle_ticks`.
///
/// Each list is an immutable `Arc<[_]>`. A recompile produces new lists,
/// so anything still holding the old ones keeps a consistent view.
#[derive(Debug, Clone)]
pub struct CompiledLayers<N> {
    cycle_ticks: i64,
    divisors: [u32; LAYER_COUNT],
    layers: [Arc<[LayerEvent<N>]>; LAYER_COUNT],
}

impl<N> CompiledLayers<N> {
    /// No events on any layer.
    pub fn empty(cycle_ticks: i64) -> Self {
        Self {
            cycle_ticks: cycle_ticks.max(1),
            divisors: [0; LAYER_COUNT],
            layers: std::array::from_fn(|_| Arc::from(Vec::new())),
        }
    }

    #[inline]
    pub fn cycle_ticks(&self) -> i64 {
        self.cycle_ticks
    }

    #[inline]
    pub fn divisor(&self, layer: usize) -> u32 {
        self.divisors.get(layer).copied().unwrap_or(0)
    }

    /// Events of one layer, in note order. Empty for unknown layers.
    pub fn layer(&self, layer: usize) -> &[LayerEvent<N>] {
        self.layers.get(layer).map(|l| &l[..]).unwrap_or(&[])
    }

    /// Shared handle to one layer's list.
    pub fn layer_arc(&self, layer: usize) -> Option<Arc<[LayerEvent<N>]>> {
        self.layers.get(layer).cloned()
    }

    pub fn is_silent(&self, layer: usize) -> bool {
        self.layer(layer).is_empty()
    }

    /// Smallest absolute tick at or after `abs_tick` at which `layer`
    /// starts a note, if the layer has any.
    pub fn next_start_from(&self, layer: usize, abs_tick: i64) -> Option<i64> {
        let cycle = self.cycle_ticks;
        let cycle_base = abs_tick - abs_tick.rem_euclid(cycle);

        self.layer(layer)
            .iter()
            .map(|event| {
                let candidate = cycle_base + event.start_tick;
                if candidate >= abs_tick {
                    candidate
                } else {
                    candidate + cycle
                }
            })
            .min()
    }
}

/// Compile all layers for a cycle of `cycle_ticks`.
///
/// Layers beyond [`LAYER_COUNT`] are ignored; missing layers are silent.
pub fn compile<N: Clone>(cycle_ticks: i64, layers: &[LayerConfig<N>]) -> CompiledLayers<N> {
    let cycle_ticks = cycle_ticks.max(1);

    if layers.len() > LAYER_COUNT {
        log::warn!(
            "{} layers supplied, only the first {} are scheduled",
            layers.len(),
            LAYER_COUNT
        );
    }

    let divisors = std::array::from_fn(|i| layers.get(i).map(|l| l.divisor).unwrap_or(0));
    let compiled = std::array::from_fn(|i| match layers.get(i) {
        Some(config) => compile_layer(cycle_ticks, config.divisor, &config.notes),
        None => Arc::from(Vec::new()),
    });

    CompiledLayers {
        cycle_ticks,
        divisors,
        layers: compiled,
    }
}

/// Compile a single layer.
///
/// A divisor of 0 or 1, or an empty note array, yields a silent layer.
/// When `notes` is shorter than `divisor` the note index wraps around.
pub fn compile_layer<N: Clone>(cycle_ticks: i64, divisor: u32, notes: &[N]) -> Arc<[LayerEvent<N>]> {
    if divisor <= 1 || notes.is_empty() {
        return Arc::from(Vec::new());
    }

    let cycle_ticks = cycle_ticks.max(1);
    let ticks_per_note = cycle_ticks as f64 / divisor as f64;
    let duration_ticks = (ticks_per_note.round() as i64).max(1);

    if notes.len() < divisor as usize {
        log::debug!(
            "layer has {} notes for {} pulses, wrapping note index",
            notes.len(),
            divisor
        );
    }

    let events: Vec<LayerEvent<N>> = (0..divisor as usize)
        .map(|note_index| LayerEvent {
            start_tick: ((note_index as f64 * ticks_per_note).round() as i64)
                .rem_euclid(cycle_ticks),
            duration_ticks,
            note_index,
            note: notes[note_index % notes.len()].clone(),
        })
        .collect();

    Arc::from(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(divisor: u32, notes: &[f64]) -> LayerConfig<f64> {
        LayerConfig::new(divisor, notes.to_vec())
    }

    #[test]
    fn test_compile_even_divisor() {
        let compiled = compile(4000, &[layer(4, &[1.0, 2.0, 3.0, 4.0])]);
        let starts: Vec<i64> = compiled.layer(0).iter().map(|e| e.start_tick).collect();

        assert_eq!(starts, vec![0, 1000, 2000, 3000]);
        assert!(compiled.layer(0).iter().all(|e| e.duration_ticks == 1000));
        assert_eq!(compiled.layer(0)[2].note, 3.0);
    }

    #[test]
    fn test_compile_silent_layers() {
        let compiled = compile(
            4000,
            &[layer(1, &[1.0]), layer(0, &[1.0]), layer(5, &[]), layer(3, &[1.0])],
        );

        assert!(compiled.is_silent(0));
        assert!(compiled.is_silent(1));
        assert!(compiled.is_silent(2));
        assert!(!compiled.is_silent(3));
    }

    #[test]
    fn test_note_index_wraps() {
        let compiled = compile(600, &[layer(6, &[10.0, 20.0])]);
        let notes: Vec<f64> = compiled.layer(0).iter().map(|e| e.note).collect();
        assert_eq!(notes, vec![10.0, 20.0, 10.0, 20.0, 10.0, 20.0]);
    }

    #[test]
    fn test_compile_is_deterministic() {
        let layers = [
            layer(7, &[1.0, 2.0, 3.0]),
            layer(5, &[4.0]),
            layer(3, &[5.0, 6.0]),
            layer(2, &[7.0]),
        ];
        let a = compile(3333, &layers);
        let b = compile(3333, &layers);

        for i in 0..LAYER_COUNT {
            assert_eq!(a.layer(i), b.layer(i));
        }
    }

    #[test]
    fn test_extreme_divisor_does_not_panic() {
        let compiled = compile(3, &[layer(10, &[1.0])]);
        assert_eq!(compiled.layer(0).len(), 10);
        assert!(compiled.layer(0).iter().all(|e| e.start_tick < 3));
        assert!(compiled.layer(0).iter().all(|e| e.duration_ticks >= 1));
    }

    #[test]
    fn test_next_start_from_wraps() {
        let compiled = compile(4000, &[layer(4, &[1.0])]);

        assert_eq!(compiled.next_start_from(0, 0), Some(0));
        assert_eq!(compiled.next_start_from(0, 1), Some(1000));
        assert_eq!(compiled.next_start_from(0, 3500), Some(4000));
        assert_eq!(compiled.next_start_from(0, 8999), Some(9000));
        assert_eq!(compiled.next_start_from(0, -100), Some(0));
        assert_eq!(compiled.next_start_from(1, 10), None);
    }
}
