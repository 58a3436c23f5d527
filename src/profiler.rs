// src/profiler.rs
//
// Windowed frame profiler. Accumulates per-phase times and the traversal
// counters, prints one summary line every ~500 ms and resets the window.

use std::time::{Duration, Instant};

use crate::render::RenderStats;

pub struct FrameProf {
    pub frame: u64,
    last_print: Instant,
    print_every: Duration,

    n_frames: u64,
    t_prepare: f64,
    t_query: f64,
    t_upload: f64,
    t_present: f64,

    n_count: u64,
    n_oct: u64,
    n_quad: u64,

    max_frame_ms: f64,
}

impl FrameProf {
    pub fn new() -> Self {
        Self {
            frame: 0,
            last_print: Instant::now(),
            print_every: Duration::from_millis(500),
            n_frames: 0,
            t_prepare: 0.0,
            t_query: 0.0,
            t_upload: 0.0,
            t_present: 0.0,
            n_count: 0,
            n_oct: 0,
            n_quad: 0,
            max_frame_ms: 0.0,
        }
    }

    #[inline]
    pub fn mark_ms(t0: Instant) -> f64 {
        t0.elapsed().as_secs_f64() * 1000.0
    }

    #[inline]
    pub fn upload(&mut self, ms: f64) {
        self.t_upload += ms;
    }

    #[inline]
    pub fn present(&mut self, ms: f64) {
        self.t_present += ms;
    }

    pub fn add_render(&mut self, stats: &RenderStats) {
        self.t_prepare += stats.prepare_ms;
        self.t_query += stats.query_ms;
        self.n_count += stats.count;
        self.n_oct += stats.count_oct;
        self.n_quad += stats.count_quad;
    }

    pub fn end_frame(&mut self, frame_ms: f64) {
        self.frame += 1;
        self.n_frames += 1;
        self.max_frame_ms = self.max_frame_ms.max(frame_ms);

        if self.last_print.elapsed() >= self.print_every {
            let nf = self.n_frames.max(1) as f64;
            let avg = |x: f64| x / nf;

            println!(
                concat!(
                    "[prof] frames={} avg_frame={:.2}ms max_frame={:.2}ms | ",
                    "prepare={:.2} query={:.2} upload={:.2} present={:.2} | ",
                    "count={:.0} oct={:.0} quad={:.0}"
                ),
                self.frame,
                avg(self.t_prepare + self.t_query + self.t_upload + self.t_present),
                self.max_frame_ms,
                avg(self.t_prepare),
                avg(self.t_query),
                avg(self.t_upload),
                avg(self.t_present),
                self.n_count as f64 / nf,
                self.n_oct as f64 / nf,
                self.n_quad as f64 / nf,
            );

            self.last_print = Instant::now();
            self.n_frames = 0;
            self.t_prepare = 0.0;
            self.t_query = 0.0;
            self.t_upload = 0.0;
            self.t_present = 0.0;
            self.n_count = 0;
            self.n_oct = 0;
            self.n_quad = 0;
            self.max_frame_ms = 0.0;
        }
    }
}

impl Default for FrameProf {
    fn default() -> Self {
        Self::new()
    }
}
