//! Decode → resample → mix pipeline tests on generated WAV clips

mod helpers;

use helpers::audio_generator::generate_sine_wav;
use lull_ap::audio::decoder::{decode_clip, OUTPUT_CHANNELS};
use lull_ap::audio::{AudioEngine, ChannelPlayer, ClipEngine, LoadRequest, LoopMixer};
use lull_ap::error::Error;
use std::sync::Arc;
use tempfile::TempDir;

fn clip_root() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("rain")).unwrap();
    dir
}

#[test]
fn test_decode_mono_wav_to_stereo() {
    let dir = clip_root();
    let path = dir.path().join("rain").join("light.wav");
    generate_sine_wav(&path, 44_100, 1, 500, 440.0, 0.5).unwrap();

    let clip = decode_clip(&path).unwrap();
    assert_eq!(clip.sample_rate, 44_100);
    assert_eq!(clip.frames(), 22_050);
    assert_eq!(clip.samples.len(), 22_050 * OUTPUT_CHANNELS as usize);
    assert!((clip.duration_secs() - 0.5).abs() < 1e-3);

    // Both output channels carry the mono signal
    for frame in clip.samples.chunks(2).take(100) {
        assert_eq!(frame[0], frame[1]);
    }
    let peak = clip.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak > 0.45 && peak <= 0.51, "peak {}", peak);
}

#[tokio::test]
async fn test_engine_resamples_to_mixer_rate() {
    let dir = clip_root();
    generate_sine_wav(dir.path().join("rain").join("heavy.wav"), 48_000, 2, 1000, 220.0, 0.5)
        .unwrap();

    let mixer = Arc::new(LoopMixer::new(44_100));
    let engine = ClipEngine::new(dir.path(), Arc::clone(&mixer));
    let player = engine.load(&LoadRequest::new("rain", "heavy")).await.unwrap();

    let seconds = player.duration().as_secs_f64();
    assert!((seconds - 1.0).abs() < 0.02, "loop length {}", seconds);
    assert!(!player.is_playing());
    assert_eq!(mixer.voice_count(), 1);
}

#[tokio::test]
async fn test_loaded_clip_renders_through_mixer() {
    let dir = clip_root();
    generate_sine_wav(dir.path().join("rain").join("light.wav"), 44_100, 2, 250, 440.0, 0.8)
        .unwrap();

    let mixer = Arc::new(LoopMixer::new(44_100));
    let engine = ClipEngine::new(dir.path(), Arc::clone(&mixer));
    let player = engine.load(&LoadRequest::new("rain", "light")).await.unwrap();

    let mut block = vec![0.0f32; 1024 * OUTPUT_CHANNELS as usize];
    assert_eq!(mixer.render(&mut block), 0.0, "paused voice is silent");

    player.set_volume(0.5);
    player.start().unwrap();
    let peak = mixer.render(&mut block);
    assert!(peak > 0.3 && peak <= 0.41, "peak {}", peak);

    // Render past the clip end: the loop keeps producing audio
    for _ in 0..20 {
        mixer.render(&mut block);
    }
    assert!(mixer.render(&mut block) > 0.3);
    assert!(player.is_playing());
}

#[tokio::test]
async fn test_clip_cache_shares_decoded_samples() {
    let dir = clip_root();
    let path = dir.path().join("rain").join("light.wav");
    generate_sine_wav(&path, 44_100, 2, 100, 440.0, 0.5).unwrap();

    let mixer = Arc::new(LoopMixer::new(44_100));
    let engine = ClipEngine::new(dir.path(), Arc::clone(&mixer));
    let first = engine.load(&LoadRequest::new("rain", "light")).await.unwrap();

    // The second load never touches the file again
    std::fs::remove_file(&path).unwrap();
    let second = engine.load(&LoadRequest::new("rain", "light")).await.unwrap();
    assert_eq!(mixer.voice_count(), 2);
    assert_eq!(first.duration(), second.duration());
}

#[tokio::test]
async fn test_invalidated_engine_rejects_start() {
    let dir = clip_root();
    generate_sine_wav(dir.path().join("rain").join("light.wav"), 44_100, 2, 100, 440.0, 0.5)
        .unwrap();

    let mixer = Arc::new(LoopMixer::new(44_100));
    let engine = ClipEngine::new(dir.path(), Arc::clone(&mixer));
    let player = engine.load(&LoadRequest::new("rain", "light")).await.unwrap();
    player.start().unwrap();

    mixer.invalidate();
    assert!(!player.is_playing());
    let err = player.start().unwrap_err();
    assert!(matches!(err, Error::EngineInvalidated(_)));
    assert!(err.is_transient());

    // A fresh load after invalidation works again
    let fresh = engine.load(&LoadRequest::new("rain", "light")).await.unwrap();
    fresh.start().unwrap();
    assert!(fresh.is_playing());
}

#[tokio::test]
async fn test_corrupt_clip_is_decode_error() {
    let dir = clip_root();
    std::fs::write(dir.path().join("rain").join("light.wav"), b"not a wav file at all").unwrap();

    let engine = ClipEngine::new(dir.path(), Arc::new(LoopMixer::new(44_100)));
    let err = match engine.load(&LoadRequest::new("rain", "light")).await {
        Err(e) => e,
        Ok(_) => panic!("corrupt clip should not load"),
    };
    assert!(matches!(err, Error::Decode(_)));
}
