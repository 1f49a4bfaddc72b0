use dspu::playback::{CrossfadeType, LoopMode, Playback, PlaybackSettings};
use dspu::sample::Sample;

#[test]
fn direct_loop_plays_indefinitely_until_stopped() {
    let mut s = Sample::new(1, 48000, 200);
    s.set_length(200).unwrap();
    for (i, x) in s.channel_mut(0).iter_mut().enumerate() {
        *x = (i as f32 / 200.0) - 0.5;
    }

    let mut pb = Playback::new();
    let settings = PlaybackSettings {
        start: 0,
        loop_mode: LoopMode::Direct,
        loop_start: 20,
        loop_end: 180,
        crossfade_len: 8,
        crossfade_type: CrossfadeType::EqualPower,
        ..Default::default()
    };
    pb.start_playback(s, 0, settings).unwrap();

    let mut buf = vec![0.0f32; 64];
    let mut total = 0u64;
    for _ in 0..20 {
        let n = pb.process_playback(&mut buf, 64).unwrap();
        total += n as u64;
        assert!(buf[..n].iter().all(|x| x.is_finite()));
    }
    // a direct loop never finishes on its own
    assert!(total > 0);

    pb.stop();
    let mut finished = false;
    for _ in 0..50 {
        let n = pb.process_playback(&mut buf, 64).unwrap();
        if n == 0 {
            finished = true;
            break;
        }
    }
    assert!(finished, "stop() should eventually drain through the tail");
}
