use std::sync::Arc;

use cadence_animation_core::{
    parse_anim_resource_json, AnimJob, AnimResource, AnimSequencer, Config, EnqueueMode,
    InlineDispatcher, JobCfg, JobList, JobPhase, PlayClipJob, SequencerError, ThreadPoolDispatcher,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn load(name: &str) -> Arc<AnimResource> {
    let json = cadence_test_fixtures::resources::json(name).expect("load resource fixture");
    Arc::new(parse_anim_resource_json(&json).expect("parse resource fixture"))
}

fn play(res: &AnimResource, clip: &str, cfg: JobCfg) -> PlayClipJob {
    PlayClipJob::new(res, clip, cfg).expect("clip exists")
}

fn forever(res: &AnimResource, clip: &str, cfg: JobCfg) -> PlayClipJob {
    play(res, clip, cfg).with_loop_count(0.0)
}

#[test]
fn append_behind_infinite_job_is_rejected() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(forever(&res, "walk", JobCfg::default()))
        .unwrap();
    seq.update_time(0).unwrap();
    assert!(seq.job(a).unwrap().state().is_infinite());

    let b = seq
        .enqueue_anim_job(play(
            &res,
            "idle",
            JobCfg {
                enqueue_mode: EnqueueMode::Append,
                ..JobCfg::default()
            },
        ))
        .unwrap();
    let err = seq.update_time(100).unwrap_err();
    assert_eq!(
        err,
        SequencerError::TrackBlockedByInfiniteJob {
            track: 0,
            blocking: a
        }
    );
    // The offending job was released, the blocking job is untouched.
    assert!(seq.job(b).is_none());
    assert_eq!(seq.job_list_of(b), None);
    assert_eq!(seq.job_list_of(a), Some(JobList::Active));
    assert!(seq.job(a).unwrap().state().is_infinite());
}

#[test]
fn intercept_stops_infinite_job_and_starts_at_its_stop_time() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(forever(
            &res,
            "walk",
            JobCfg {
                fade_out: 30,
                ..JobCfg::default()
            },
        ))
        .unwrap();
    seq.update_time(0).unwrap();

    let b = seq
        .enqueue_anim_job(play(
            &res,
            "idle",
            JobCfg {
                fade_in: 30,
                ..JobCfg::default()
            },
        ))
        .unwrap();
    seq.update_time(100).unwrap();

    let a_state = seq.job(a).unwrap().state();
    assert_eq!(a_state.absolute_stop_time(), Some(100));
    assert_eq!(a_state.absolute_end_time(), Some(130));
    assert_eq!(a_state.phase(100), JobPhase::Stopping);
    assert_eq!(seq.job(b).unwrap().state().absolute_start_time(), 100);

    // Fade-out of A overlaps fade-in of B.
    seq.update_time(115).unwrap();
    assert!(seq.job(a).unwrap().state().is_playing(115));
    assert_eq!(seq.job(b).unwrap().state().phase(115), JobPhase::Active);

    seq.update_time(130).unwrap();
    assert!(seq.job(a).is_none());
    assert_eq!(seq.jobs_by_track(0), vec![b]);
}

#[test]
fn append_waits_for_predecessor_stop_time() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(
            play(
                &res,
                "walk",
                JobCfg {
                    fade_out: 20,
                    ..JobCfg::default()
                },
            )
            .with_loop_count(2.0),
        )
        .unwrap();
    let b = seq
        .enqueue_anim_job(play(
            &res,
            "idle",
            JobCfg {
                enqueue_mode: EnqueueMode::Append,
                ..JobCfg::default()
            },
        ))
        .unwrap();
    seq.update_time(0).unwrap();

    assert_eq!(seq.job(a).unwrap().state().duration(), 200);
    assert_eq!(seq.job(b).unwrap().state().absolute_start_time(), 180);
    assert_eq!(seq.job(b).unwrap().state().phase(179), JobPhase::Pending);
    assert_eq!(seq.jobs_by_track(0), vec![a, b]);
}

#[test]
fn higher_tracks_sort_after_lower_ones() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let hi = seq
        .enqueue_anim_job(forever(&res, "walk", JobCfg { track: 2, ..JobCfg::default() }))
        .unwrap();
    let lo = seq
        .enqueue_anim_job(forever(&res, "idle", JobCfg { track: 0, ..JobCfg::default() }))
        .unwrap();
    let mid = seq
        .enqueue_anim_job(forever(&res, "nod", JobCfg { track: 1, ..JobCfg::default() }))
        .unwrap();
    seq.update_time(0).unwrap();

    let order: Vec<_> = seq.jobs().map(|(id, _)| id).collect();
    assert_eq!(order, vec![lo, mid, hi]);
    // Different tracks do not intercept each other.
    assert!(seq.jobs().all(|(_, j)| j.state().is_infinite()));
}

#[test]
fn ignore_if_same_clip_active_drops_duplicate() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(forever(&res, "walk", JobCfg::default()))
        .unwrap();
    seq.update_time(0).unwrap();

    let ignore = JobCfg {
        enqueue_mode: EnqueueMode::IgnoreIfSameClipActive,
        ..JobCfg::default()
    };
    let dup = seq
        .enqueue_anim_job(forever(&res, "walk", ignore.clone()))
        .unwrap();
    seq.update_time(10).unwrap();
    assert!(seq.job(dup).is_none());
    assert_eq!(seq.jobs_by_name("walk"), vec![a]);
    assert!(seq.job(a).unwrap().state().is_infinite());

    // A different clip behaves like Intercept.
    let other = seq.enqueue_anim_job(play(&res, "idle", ignore)).unwrap();
    seq.update_time(20).unwrap();
    assert!(seq.job(a).is_none());
    assert_eq!(seq.jobs_by_track(0), vec![other]);
}

#[test]
fn ignore_if_same_tag_active_drops_duplicate() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let tagged = |mode| JobCfg {
        enqueue_mode: mode,
        exclusive_tag: Some(7),
        fade_out: 10,
        ..JobCfg::default()
    };
    let a = seq
        .enqueue_anim_job(forever(&res, "walk", tagged(EnqueueMode::Intercept)))
        .unwrap();
    seq.update_time(0).unwrap();

    let b = seq
        .enqueue_anim_job(play(&res, "idle", tagged(EnqueueMode::IgnoreIfSameExclTagActive)))
        .unwrap();
    seq.update_time(5).unwrap();
    assert!(seq.job(b).is_none());
    assert!(seq.job(a).is_some());

    // Once A is stopping, the tag no longer blocks.
    seq.stop_job(a).unwrap();
    seq.update_time(6).unwrap();
    let c = seq
        .enqueue_anim_job(play(&res, "idle", tagged(EnqueueMode::IgnoreIfSameExclTagActive)))
        .unwrap();
    seq.update_time(8).unwrap();
    assert!(seq.job(c).is_some());
    assert_eq!(seq.job(c).unwrap().state().absolute_start_time(), 8);
}

#[test]
fn stop_track_with_fade_goes_through_stopping_list() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(forever(
            &res,
            "walk",
            JobCfg {
                track: 1,
                fade_out: 50,
                ..JobCfg::default()
            },
        ))
        .unwrap();
    seq.update_time(0).unwrap();

    seq.stop_track(1, true);
    assert_eq!(seq.job_list_of(a), Some(JobList::Stopping));
    seq.stop_track(1, true);

    seq.update_time(10).unwrap();
    assert_eq!(seq.job_list_of(a), Some(JobList::Active));
    assert_eq!(seq.job(a).unwrap().state().absolute_end_time(), Some(60));

    seq.update_time(59).unwrap();
    assert!(seq.job(a).is_some());
    seq.update_time(60).unwrap();
    assert!(seq.job(a).is_none());
}

#[test]
fn stop_without_fade_discards_immediately() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(forever(&res, "walk", JobCfg::default()))
        .unwrap();
    let other = seq
        .enqueue_anim_job(forever(&res, "idle", JobCfg { track: 3, ..JobCfg::default() }))
        .unwrap();
    seq.update_time(0).unwrap();
    let queued = seq
        .enqueue_anim_job(forever(&res, "nod", JobCfg::default()))
        .unwrap();
    assert_eq!(seq.job_list_of(queued), Some(JobList::Queued));

    seq.stop_track(0, false);
    assert!(seq.job(a).is_none());
    assert!(seq.job(queued).is_none());
    assert_eq!(seq.job_list_of(other), Some(JobList::Active));

    seq.stop_all_tracks(false);
    assert_eq!(seq.num_jobs(), 0);
}

#[test]
fn stop_request_on_pending_job_discards_it() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(forever(
            &res,
            "walk",
            JobCfg {
                start_time: 100,
                ..JobCfg::default()
            },
        ))
        .unwrap();
    seq.update_time(0).unwrap();
    assert_eq!(seq.job(a).unwrap().state().phase(0), JobPhase::Pending);

    seq.stop_all_tracks(true);
    seq.update_time(10).unwrap();
    assert!(seq.job(a).is_none());
}

#[test]
fn discard_and_stop_unknown_jobs_fail() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(forever(&res, "walk", JobCfg::default()))
        .unwrap();
    seq.discard_job(a).unwrap();
    assert_eq!(seq.discard_job(a), Err(SequencerError::JobNotFound(a)));
    assert_eq!(seq.stop_job(a), Err(SequencerError::JobNotFound(a)));
}

#[test]
fn queue_capacity_is_enforced() {
    let res = load("locomotion");
    let cfg = Config {
        max_queued_jobs: 2,
        ..Config::default()
    };
    let mut seq = AnimSequencer::new(res.clone(), cfg);
    for _ in 0..2 {
        seq.enqueue_anim_job(play(&res, "walk", JobCfg::default()))
            .unwrap();
    }
    let err = seq
        .enqueue_anim_job(play(&res, "walk", JobCfg::default()))
        .unwrap_err();
    assert_eq!(err, SequencerError::QueueFull { capacity: 2 });

    seq.update_time(0).unwrap();
    assert!(seq
        .enqueue_anim_job(play(&res, "walk", JobCfg::default()))
        .is_ok());
}

#[test]
fn nothing_playing_means_no_evaluation() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    seq.update_time(0).unwrap();
    assert!(!seq.start_async_evaluation(&InlineDispatcher));
    assert!(seq.evaluation_handle().is_none());
}

#[test]
fn single_job_samples_directly_into_result() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    seq.enqueue_anim_job(forever(
        &res,
        "walk",
        JobCfg {
            blend_weight: 0.25,
            ..JobCfg::default()
        },
    ))
    .unwrap();
    seq.update_time(0).unwrap();
    seq.update_time(50).unwrap();

    assert!(seq.start_async_evaluation(&InlineDispatcher));
    assert!(seq.evaluation_handle().unwrap().is_finished());
    let result = seq.result();
    let pose = result.lock();
    approx(pose.sample(0).unwrap()[0], 5.0, 1e-5);
    assert_eq!(pose.counts(), &[1, 1, 1]);
}

#[test]
fn two_tracks_mix_with_upper_weight() {
    let res = load("ramp");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    seq.enqueue_anim_job(forever(
        &res,
        "ramp",
        JobCfg {
            blend_weight: 0.3,
            ..JobCfg::default()
        },
    ))
    .unwrap();
    seq.enqueue_anim_job(forever(
        &res,
        "ramp_down",
        JobCfg {
            track: 1,
            blend_weight: 0.7,
            ..JobCfg::default()
        },
    ))
    .unwrap();
    seq.update_time(0).unwrap();
    seq.update_time(12).unwrap();

    assert!(seq.start_async_evaluation(&InlineDispatcher));
    let pose = seq.result();
    let pose = pose.lock();
    // lerp(0.5, 2.5, 0.7)
    approx(pose.sample(0).unwrap()[0], 1.9, 1e-5);
    assert_eq!(pose.count(0), 2);
}

#[test]
fn fade_in_weight_and_inactive_curve_pass_through() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    seq.enqueue_anim_job(forever(&res, "idle", JobCfg::default()))
        .unwrap();
    seq.enqueue_anim_job(forever(
        &res,
        "walk",
        JobCfg {
            track: 1,
            fade_in: 100,
            ..JobCfg::default()
        },
    ))
    .unwrap();
    seq.update_time(0).unwrap();
    seq.update_time(50).unwrap();

    assert!(seq.start_async_evaluation(&InlineDispatcher));
    let pose = seq.result();
    let pose = pose.lock();
    // Translation: idle holds 0, walk is at 5 with half weight.
    approx(pose.sample(0).unwrap()[0], 2.5, 1e-5);
    // Rotation: idle's curve is inactive, so walk's sample passes through.
    let half = std::f32::consts::PI / 8.0;
    approx(pose.sample(1).unwrap()[3], half.cos(), 1e-5);
    assert_eq!(pose.count(1), 1);
}

#[test]
fn play_rate_scales_duration_and_sample_time() {
    let res = load("ramp");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(play(
            &res,
            "ramp",
            JobCfg {
                time_factor: 2.0,
                ..JobCfg::default()
            },
        ))
        .unwrap();
    seq.update_time(0).unwrap();
    assert_eq!(seq.job(a).unwrap().state().duration(), 36);

    seq.update_time(6).unwrap();
    assert_eq!(seq.job(a).unwrap().state().sample_time(), 12);
    assert!(seq.start_async_evaluation(&InlineDispatcher));
    approx(seq.result().lock().sample(0).unwrap()[0], 0.5, 1e-6);

    seq.update_time(36).unwrap();
    assert!(seq.job(a).is_none());
}

#[test]
fn infinite_job_keeps_playing_at_double_rate() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(forever(
            &res,
            "walk",
            JobCfg {
                time_factor: 2.0,
                ..JobCfg::default()
            },
        ))
        .unwrap();
    for frame in 0..10 {
        seq.update_time(frame * 16).unwrap();
    }
    let state = seq.job(a).expect("infinite job still arranged").state();
    assert!(state.is_infinite());
    assert_eq!(state.sample_time(), 9 * 16 * 2);
    assert!(seq.start_async_evaluation(&InlineDispatcher));
}

#[test]
fn slow_play_rate_advances_with_one_tick_frames() {
    let res = load("ramp");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(forever(
            &res,
            "ramp",
            JobCfg {
                time_factor: 0.3,
                ..JobCfg::default()
            },
        ))
        .unwrap();
    for t in 0..=100 {
        seq.update_time(t).unwrap();
    }
    assert_eq!(seq.job(a).unwrap().state().sample_time(), 30);
    assert!(seq.start_async_evaluation(&InlineDispatcher));
    seq.wait_for_evaluation();
    approx(seq.result().lock().sample(0).unwrap()[0], 1.25, 1e-6);
}

#[test]
fn finite_job_at_slow_rate_samples_its_whole_clip() {
    let res = load("ramp");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(play(
            &res,
            "ramp",
            JobCfg {
                time_factor: 0.7,
                ..JobCfg::default()
            },
        ))
        .unwrap();
    seq.update_time(0).unwrap();
    // 72 / 0.7 = 102.86
    assert_eq!(seq.job(a).unwrap().state().duration(), 103);

    let mut t = 0;
    while t + 16 < 103 {
        t += 16;
        seq.update_time(t).unwrap();
    }
    seq.update_time(102).unwrap();
    assert_eq!(seq.job(a).unwrap().state().sample_time(), 71);
}

#[test]
fn pause_freezes_sample_time_until_resumed() {
    let res = load("ramp");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(forever(&res, "ramp", JobCfg::default()))
        .unwrap();
    seq.update_time(0).unwrap();
    seq.update_time(10).unwrap();
    seq.pause_track(0, true);
    seq.update_time(30).unwrap();
    assert_eq!(seq.job(a).unwrap().state().sample_time(), 10);

    seq.pause_all_tracks(false);
    seq.update_time(35).unwrap();
    assert_eq!(seq.job(a).unwrap().state().sample_time(), 15);

    seq.set_time(40);
    assert_eq!(seq.job(a).unwrap().state().sample_time(), 40);
}

#[test]
fn thread_pool_dispatch_matches_inline() {
    let res = load("locomotion");
    let pool = ThreadPoolDispatcher::new(2).expect("build pool");

    let mut results = Vec::new();
    for threaded in [false, true] {
        let mut seq = AnimSequencer::new(res.clone(), Config::default());
        seq.enqueue_anim_job(forever(&res, "idle", JobCfg::default()))
            .unwrap();
        seq.enqueue_anim_job(forever(
            &res,
            "walk",
            JobCfg {
                track: 1,
                fade_in: 40,
                ..JobCfg::default()
            },
        ))
        .unwrap();
        seq.update_time(0).unwrap();
        seq.update_time(30).unwrap();
        if threaded {
            assert!(seq.start_async_evaluation(&pool));
            seq.wait_for_evaluation();
        } else {
            assert!(seq.start_async_evaluation(&InlineDispatcher));
        }
        let pose = seq.result().lock().clone();
        results.push(pose);
    }
    assert_eq!(results[0], results[1]);
}

#[test]
fn frame_dump_reports_every_arranged_job() {
    let _ = env_logger::builder().is_test(true).try_init();
    let res = load("locomotion");
    let cfg = Config {
        frame_dump: true,
        ..Config::default()
    };
    let mut seq = AnimSequencer::new(res.clone(), cfg);
    seq.enqueue_anim_job(forever(&res, "walk", JobCfg::default()))
        .unwrap();
    seq.enqueue_anim_job(play(
        &res,
        "nod",
        JobCfg {
            name: "nod-once".into(),
            track: 1,
            fade_in: 10,
            ..JobCfg::default()
        },
    ))
    .unwrap();
    seq.update_time(0).unwrap();

    let dump = seq.frame_dump(5);
    assert_eq!(dump.len(), 2);
    assert_eq!(dump[0].name, "walk");
    assert_eq!(dump[0].end, None);
    assert_eq!(dump[1].name, "nod-once");
    assert_eq!(dump[1].end, Some(50));
    approx(dump[1].weight, 0.5, 1e-6);
    assert_eq!(dump[1].phase, JobPhase::Active);
}

#[test]
fn unknown_clip_is_a_resource_error() {
    let res = load("locomotion");
    let err = PlayClipJob::new(&res, "run", JobCfg::default()).unwrap_err();
    assert_eq!(err.to_string(), "Clip not found: run");
}

#[test]
fn jobs_are_released_on_removal() {
    let res = load("locomotion");
    let mut seq = AnimSequencer::new(res.clone(), Config::default());
    let a = seq
        .enqueue_anim_job(play(&res, "nod", JobCfg::default()))
        .unwrap();
    assert!(seq.job(a).unwrap().state().is_attached());
    seq.update_time(0).unwrap();
    seq.update_time(50).unwrap();
    assert!(seq.job(a).is_none());
    // The resource is shared only by the sequencer again.
    assert_eq!(Arc::strong_count(&res), 2);
}
