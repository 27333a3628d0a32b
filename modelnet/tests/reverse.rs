//! Reverse-computation correctness: driving a batch of events forward and replaying their
//! reverse handlers newest-first must restore every LP's state and random-stream position.

mod common;

use common::TorusGrid;
use proptest::prelude::*;
use rstest::rstest;

fn inject_mixed_traffic(grid: &mut TorusGrid) {
    grid.send_message(&[0, 0], &[2, 2], 1024, &[0xCA, 0xFE], &[0x01]);
    grid.send_message(&[3, 3], &[0, 1], 200, &[], &[]);
    grid.send_message(&[2, 2], &[2, 2], 64, &[], &[]);
    grid.send_pull(&[1, 0], &[2, 3], 8, 1024, &[0xAB; 4]);
}

fn assert_reverse_restores(seed: u64, batch: usize) {
    let mut grid = TorusGrid::build(&[4, 4], seed);
    inject_mixed_traffic(&mut grid);

    let before = grid.snapshot();
    let processed = grid.run(batch).unwrap();
    assert!(processed > 0, "no events to exercise");

    grid.reverse_all().unwrap();
    let after = grid.snapshot();
    assert!(before == after, "seed {seed}: reverse of {processed} events diverged");
}

#[rstest]
#[case(1, 10)]
#[case(7, 50)]
#[case(42, 100)]
#[case(0xDEAD, 100)]
#[case(1337, 1000)]
fn reverse_restores_the_pre_forward_state(#[case] seed: u64, #[case] batch: usize) {
    assert_reverse_restores(seed, batch);
}

#[test]
fn reverse_after_a_complete_run_restores_the_initial_state() {
    let mut grid = TorusGrid::build(&[4, 4], 5);
    inject_mixed_traffic(&mut grid);

    let before = grid.snapshot();
    grid.run_to_completion().unwrap();
    grid.reverse_all().unwrap();

    assert!(before == grid.snapshot(), "full-run reverse diverged");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn reverse_is_identity_for_any_seed_and_batch(seed in any::<u64>(), batch in 1usize..160) {
        assert_reverse_restores(seed, batch);
    }
}
