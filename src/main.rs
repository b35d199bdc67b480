// src/main.rs
//
// Transport sanity run: simulates a host timer against a virtual clock and
// prints what the voice system would be asked to play.

use collider::{
    LayerConfig, RecordingSink, Transport, TransportConfig, VoiceCommand,
};

const CYCLE_SECONDS: f64 = 4.0;
const POLL_INTERVAL: f64 = 0.025;

fn print_commands(sink: &mut RecordingSink<f64>) {
    for cmd in sink.drain() {
        match cmd {
            VoiceCommand::Trigger {
                layer,
                note_index,
                note,
                start_time,
                tick,
                ..
            } => println!(
                "  layer {} note {} ({:.1}) @ {:.3}s (tick {})",
                layer, note_index, note, start_time, tick
            ),
            VoiceCommand::BridgeStart {
                layer,
                note,
                release_time,
                ..
            } => println!(
                "  layer {} bridge {:.1} held until {:.3}s",
                layer, note, release_time
            ),
            VoiceCommand::BridgeRelease { layer, time } => {
                println!("  layer {} bridge released @ {:.3}s", layer, time)
            }
        }
    }
}

fn main() {
    let config = TransportConfig {
        lookahead_seconds: 0.2,
        ..TransportConfig::default()
    };

    let mut transport = Transport::new(config, CYCLE_SECONDS, RecordingSink::new());
    transport.set_layers(vec![
        LayerConfig::new(4, vec![220.0, 275.0, 330.0, 440.0]),
        LayerConfig::new(3, vec![165.0, 247.5]),
        LayerConfig::silent(),
        LayerConfig::new(5, vec![110.0]),
    ]);

    println!("Starting transport sanity run…");
    transport.start(0.0, 0.0);

    let mut now = 0.0;
    let mut retuned = false;

    while now <= CYCLE_SECONDS + 0.2 {
        if !retuned && now >= 2.5 {
            println!("--- retune to 6s cycle @ {:.3}s ---", now);
            transport.change_cycle_duration(6.0, now);
            retuned = true;
        }

        match transport.poll(now) {
            Ok(Some(report)) if report.triggered > 0 => {
                println!(
                    "pass @ {:.3}s window [{}, {}) -> {} notes",
                    now, report.window_start, report.window_end, report.triggered
                );
            }
            Ok(_) => {}
            Err(e) => {
                println!("pass failed: {}", e);
                break;
            }
        }
        print_commands(transport.voices_mut());

        now += POLL_INTERVAL;
    }

    transport.stop(now);
    print_commands(transport.voices_mut());

    let readback = transport.readback(now);
    println!(
        "Sanity run completed (tempo {}, cycle {}s, {} dropped).",
        readback.tempo, readback.cycle_seconds, readback.dropped_triggers
    );
}
