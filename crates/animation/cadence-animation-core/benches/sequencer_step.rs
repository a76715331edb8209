//! Benchmarks for interval search and a full sequencer frame.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use cadence_animation_core::{
    find_next_interval, parse_anim_resource_json, AnimResource, AnimSequencer, Config,
    InlineDispatcher, Interval, JobCfg, PlayClipJob,
};

fn uniform_intervals(count: usize, len: i64) -> Vec<Interval> {
    (0..count as i64)
        .map(|i| Interval {
            start: i * len,
            end: (i + 1) * len,
            key0: 0,
            key1: 0,
        })
        .collect()
}

fn bench_interval_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_next_interval");

    for count in [8usize, 64, 512] {
        let ivs = uniform_intervals(count, 33);
        let end = count as i64 * 33;

        // Frame-to-frame walk: the hint is almost always right.
        group.bench_with_input(BenchmarkId::new("hinted", count), &count, |b, _| {
            b.iter(|| {
                let mut hint = 0;
                let mut t = 0;
                while t < end {
                    hint = find_next_interval(black_box(&ivs), t, hint);
                    t += 16;
                }
                hint
            });
        });

        // Cold lookups: every call scans from the start.
        group.bench_with_input(BenchmarkId::new("cold", count), &count, |b, _| {
            b.iter(|| find_next_interval(black_box(&ivs), black_box(end - 1), 0));
        });
    }
    group.finish();
}

fn load_locomotion() -> Arc<AnimResource> {
    let json = cadence_test_fixtures::resources::json("locomotion").expect("load locomotion fixture");
    Arc::new(parse_anim_resource_json(&json).expect("parse locomotion fixture"))
}

fn bench_sequencer_frame(c: &mut Criterion) {
    let res = load_locomotion();
    let mut group = c.benchmark_group("sequencer_frame");

    for tracks in [1i32, 4, 16] {
        let mut seq = AnimSequencer::new(res.clone(), Config::default());
        for track in 0..tracks {
            let clip = if track % 2 == 0 { "walk" } else { "idle" };
            let job = PlayClipJob::new(
                &res,
                clip,
                JobCfg {
                    track,
                    blend_weight: 0.5,
                    ..JobCfg::default()
                },
            )
            .expect("clip exists")
            .with_loop_count(0.0);
            seq.enqueue_anim_job(job).expect("enqueue");
        }

        let mut now = 0;
        group.bench_with_input(BenchmarkId::from_parameter(tracks), &tracks, |b, _| {
            b.iter(|| {
                now += 16;
                seq.update_time(now).expect("update");
                seq.start_async_evaluation(black_box(&InlineDispatcher))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_interval_search, bench_sequencer_frame);
criterion_main!(benches);
