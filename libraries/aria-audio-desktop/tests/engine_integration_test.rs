//! Engine integration tests. These need a real output device, so every
//! test bails out quietly when the host has none (e.g. headless CI).

use aria_audio_desktop::{PlaybackEngine, ResamplingQuality};
use aria_core::{CanonicalBuffer, RenderObserver};

fn engine_or_skip() -> Option<PlaybackEngine> {
    match PlaybackEngine::new() {
        Ok(engine) => Some(engine),
        Err(e) => {
            eprintln!("skipping: no output device ({e})");
            None
        }
    }
}

#[test]
fn engine_accepts_scheduled_buffers() {
    let Some(engine) = engine_or_skip() else {
        return;
    };

    // A short burst of silence at an arbitrary rate; the engine converts
    // to the device rate internally.
    for _ in 0..4 {
        engine
            .schedule(CanonicalBuffer::silence(2, 4096, 44100))
            .expect("schedule");
    }
    engine.finish_track().expect("finish");
    engine.stop();
}

#[test]
fn volume_and_pan_are_validated() {
    let Some(engine) = engine_or_skip() else {
        return;
    };

    engine.set_volume(0.7).expect("valid volume");
    assert!((engine.volume() - 0.7).abs() < 1e-6);
    assert!(engine.set_volume(1.5).is_err());
    assert!(engine.set_volume(-0.1).is_err());

    engine.set_pan(-0.25).expect("valid pan");
    assert!((engine.pan() - -0.25).abs() < 1e-6);
    assert!(engine.set_pan(2.0).is_err());
}

#[test]
fn pause_and_resume_round_trip() {
    let Some(engine) = engine_or_skip() else {
        return;
    };

    assert!(!engine.is_paused());
    engine.pause();
    assert!(engine.is_paused());
    engine.resume();
    assert!(!engine.is_paused());
}

#[test]
fn graph_survives_device_reselection() {
    let Some(engine) = engine_or_skip() else {
        return;
    };

    use aria_audio::effects::{UnitKind, UnitState};

    engine.with_graph(|g| {
        g.toggle_unit(UnitKind::Eq);
    });

    // Re-select the default device; the stream is rebuilt but the graph
    // keeps its topology and unit states.
    engine.set_output_device(None).expect("set device");
    std::thread::sleep(std::time::Duration::from_millis(200));

    let state = engine.with_graph(|g| g.unit_state(UnitKind::Eq));
    assert_eq!(state, UnitState::Active);
}

#[test]
fn observer_registration_without_stream_is_a_no_op() {
    struct Nop;
    impl RenderObserver for Nop {
        fn rendered(&mut self, _: usize, _: &[Vec<f32>]) {}
        fn device_changed(&mut self, _: usize, _: u32) {}
        fn sample_rate_changed(&mut self, _: u32) {}
    }

    // Even with a device present the stream takes a moment to come up;
    // without one this must not panic either way.
    if let Ok(mut engine) = PlaybackEngine::new() {
        engine.register_render_observer(Box::new(Nop));
        engine.remove_render_observer();
    }
}

#[test]
fn resampling_quality_is_adjustable() {
    let Some(mut engine) = engine_or_skip() else {
        return;
    };

    assert_eq!(engine.resampling_quality(), ResamplingQuality::High);
    engine.set_resampling_quality(ResamplingQuality::Fast);
    assert_eq!(engine.resampling_quality(), ResamplingQuality::Fast);
}
