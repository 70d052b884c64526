#![allow(missing_docs)]
#![cfg(feature = "loom")]

use loom::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};
use std::sync::Arc;
use tfg::{Config, ExecutionError, FlowBuilder, ParallelExecutor, WorkUnit};

/// Spawns one loom thread per unit and joins them all.
#[derive(Debug)]
struct LoomExecutor;

impl ParallelExecutor for LoomExecutor {
    fn run(&self, units: Vec<WorkUnit>) -> Result<(), ExecutionError> {
        let handles: Vec<_> = units.into_iter().map(thread::spawn).collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    }
}

#[derive(Clone)]
struct Counts(Arc<Vec<AtomicUsize>>);

impl Counts {
    fn new(n: usize) -> Self {
        Self(Arc::new((0..n).map(|_| AtomicUsize::new(0)).collect()))
    }

    fn hit(&self, idx: usize) {
        self.0[idx].fetch_add(1, Ordering::Relaxed);
    }

    fn assert_each_once(&self) {
        for count in self.0.iter() {
            assert_eq!(count.load(Ordering::Relaxed), 1);
        }
    }
}

#[test]
fn loom_diamond_correctness_and_single_exec() {
    loom::model(|| {
        // Graph:
        //   A(u8)   B(u16)
        //      \    /
        //      C(u32)
        //        |
        //      D(u64)
        // Values: A=1, B=10, C adds 100, D adds 1000.
        let counts = Counts::new(4);
        let mut flow = FlowBuilder::with_config(Config::parallel(LoomExecutor));

        let c = counts.clone();
        flow.add_step(move || {
            c.hit(0);
            1u8
        });
        let c = counts.clone();
        flow.add_step(move || {
            c.hit(1);
            10u16
        });
        let c = counts.clone();
        flow.add_step(move |a: u8, b: u16| {
            c.hit(2);
            u32::from(a) + u32::from(b) + 100
        });
        let c = counts.clone();
        flow.add_step(move |x: u32| {
            c.hit(3);
            u64::from(x) + 1000
        });

        let (c_out, d_out): (u32, u64) = flow.run(()).expect("pipeline must succeed");
        assert_eq!(c_out, 111);
        assert_eq!(d_out, 1111);
        counts.assert_each_once();
    });
}

#[test]
fn loom_three_parents_visibility_and_single_exec() {
    loom::model(|| {
        // Graph:
        //   A(u8)   B(u16)   C(u32)
        //       \     |     /
        //          D(u64)
        // Values: A=1, B=2, C=4, D adds 8.
        let counts = Counts::new(4);
        let mut flow = FlowBuilder::with_config(Config::parallel(LoomExecutor));

        let c = counts.clone();
        flow.add_step(move || {
            c.hit(0);
            1u8
        });
        let c = counts.clone();
        flow.add_step(move || {
            c.hit(1);
            2u16
        });
        let c = counts.clone();
        flow.add_step(move || {
            c.hit(2);
            4u32
        });
        let c = counts.clone();
        flow.add_step(move |a: u8, b: u16, x: u32| {
            c.hit(3);
            u64::from(a) + u64::from(b) + u64::from(x) + 8
        });

        let (d_out,): (u64,) = flow.run(()).expect("pipeline must succeed");
        assert_eq!(d_out, 15);
        counts.assert_each_once();
    });
}

#[test]
fn loom_tuple_slot_shared_by_two_consumers() {
    loom::model(|| {
        // Graph:
        //      A(u8, u16)
        //       /      \
        //   B(u32)    C(u64)
        let counts = Counts::new(3);
        let mut flow = FlowBuilder::with_config(Config::parallel(LoomExecutor));

        let c = counts.clone();
        flow.add_packed_step(move || {
            c.hit(0);
            (1u8, 10u16)
        })
        .unwrap();
        let c = counts.clone();
        flow.add_step(move |a: u8| {
            c.hit(1);
            u32::from(a) + 100
        });
        let c = counts.clone();
        flow.add_step(move |b: u16| {
            c.hit(2);
            u64::from(b) + 1000
        });

        let (b_out, c_out): (u32, u64) = flow.run(()).expect("pipeline must succeed");
        assert_eq!(b_out, 101);
        assert_eq!(c_out, 1010);
        counts.assert_each_once();
    });
}
