//! End-to-end traffic scenarios on small torus grids, driven through the full
//! base-LP/scheduler/fabric stack.

mod common;

use common::TorusGrid;
use warpnet_modelnet::SimulationError;

#[test]
fn message_crosses_a_2d_torus() {
    let mut grid = TorusGrid::build(&[4, 4], 0xA11CE);
    grid.send_message(&[0, 0], &[2, 2], 1024, &[], &[]);
    grid.run_to_completion().unwrap();

    // 1024 bytes over 512-byte packets: two packets, each four hops (two per dimension)
    let dest = grid.torus_lp(grid.node_gid(&[2, 2]));
    assert_eq!(dest.totals().finished_packets, 2);
    assert_eq!(dest.totals().total_hops, 8);

    let recv = dest.stats().get("request").unwrap();
    assert_eq!(recv.recv_count, 2);
    assert_eq!(recv.recv_bytes, 1024);

    let source = grid.torus_lp(grid.node_gid(&[0, 0]));
    let sent = source.stats().get("request").unwrap();
    assert_eq!(sent.send_count, 2);
    assert_eq!(sent.send_bytes, 1024);

    // all credits returned: every buffer drained back to zero
    grid.assert_buffers_in_bounds(0);

    for base in grid.lps.values_mut() {
        base.finalize();
    }
    grid.net.report_stats();
}

#[test]
fn buffers_stay_within_capacity_throughout_the_run() {
    let mut grid = TorusGrid::build(&[4, 4], 77);
    grid.send_message(&[0, 0], &[2, 2], 1024, &[], &[]);
    grid.send_message(&[3, 1], &[1, 3], 640, &[], &[]);

    while grid.step().unwrap() {
        grid.assert_buffers_in_bounds(8);
    }
}

#[test]
fn self_send_stays_local() {
    let mut grid = TorusGrid::build(&[4, 4], 0xB0B);
    // snapshot the untouched grid so bystander nodes can be compared afterwards
    let fresh = grid.snapshot();
    grid.send_message(&[1, 1], &[1, 1], 64, &[], &[]);
    grid.run_to_completion().unwrap();

    let node = grid.torus_lp(grid.node_gid(&[1, 1]));
    assert_eq!(node.totals().finished_packets, 1);
    assert_eq!(node.stats().get("request").unwrap().recv_count, 1);
    // routing still ran: the single hop is the node itself
    assert_eq!(node.totals().total_hops, 1);

    // zero non-local link use: every other node is byte-identical to its initial state
    let after = grid.snapshot();
    for coords in [[0, 0], [0, 1], [2, 2], [3, 3], [2, 1]] {
        let gid = grid.node_gid(&coords);
        assert!(
            fresh.node_state(gid) == after.node_state(gid),
            "node {coords:?} was touched by a self-send"
        );
    }
}

#[test]
fn remote_payload_is_delivered_at_the_final_destination() {
    let mut grid = TorusGrid::build(&[4, 4], 99);
    grid.send_message(&[0, 0], &[2, 2], 300, &[0xCA, 0xFE], &[0x10]);
    grid.run_to_completion().unwrap();

    let dest_server = grid.server_gid(&[2, 2]);
    let source_server = grid.server_gid(&[0, 0]);
    assert!(
        grid.delivered
            .iter()
            .any(|delivery| delivery.dest == dest_server && delivery.bytes == vec![0xCA, 0xFE])
    );
    // the self event lands back at the sender
    assert!(
        grid.delivered
            .iter()
            .any(|delivery| delivery.dest == source_server && delivery.bytes == vec![0x10])
    );
    assert_eq!(grid.delivered.len(), 2);
}

#[test]
fn empty_payloads_terminate_silently_after_stats() {
    let mut grid = TorusGrid::build(&[4, 4], 3);
    grid.send_message(&[0, 0], &[2, 2], 128, &[], &[]);
    grid.run_to_completion().unwrap();

    assert!(grid.delivered.is_empty());
    let dest = grid.torus_lp(grid.node_gid(&[2, 2]));
    assert_eq!(dest.stats().get("request").unwrap().recv_count, 1);
}

#[test]
fn pull_request_triggers_a_reply_of_pull_size() {
    // the reply bursts 32 chunks onto one link before any credit returns
    let mut grid = TorusGrid::build_with(&[4, 4], 0xF00D, |config| {
        config.with("PARAMS", "buffer_size", "64")
    });
    // 8-byte request; the destination answers with 4096 bytes carrying the remote payload
    grid.send_pull(&[0, 0], &[1, 1], 8, 4096, &[0xAB; 4]);
    grid.run_to_completion().unwrap();

    let requester_nic = grid.torus_lp(grid.node_gid(&[0, 0]));
    let responder_nic = grid.torus_lp(grid.node_gid(&[1, 1]));

    // the request arrived as one packet, the reply as 4096 / 512 packets
    assert_eq!(responder_nic.totals().finished_packets, 1);
    assert_eq!(requester_nic.totals().finished_packets, 8);
    assert_eq!(requester_nic.stats().get("pull").unwrap().recv_bytes, 4096);

    // the remote payload rides the reply back to the original sender
    let requester = grid.server_gid(&[0, 0]);
    assert_eq!(
        grid.delivered,
        vec![common::Delivery { dest: requester, bytes: vec![0xAB; 4] }]
    );
}

#[test]
fn scheduler_loop_runs_one_sched_next_at_a_time() {
    let mut grid = TorusGrid::build(&[2, 2], 21);
    let nic = grid.node_gid(&[0, 0]);
    grid.send_message(&[0, 0], &[1, 1], 64, &[], &[]);
    grid.send_message(&[0, 0], &[1, 1], 64, &[], &[]);
    grid.send_message(&[0, 0], &[1, 0], 64, &[], &[]);

    let mut saw_loop_running = false;
    while grid.step().unwrap() {
        // invariant: in_sched_loop equals the number of SCHED_NEXT events in flight
        for gid in grid.lps.keys().copied().collect::<Vec<_>>() {
            let in_loop = grid.lps[&gid].in_sched_loop();
            assert_eq!(grid.pending_sched_next(gid), usize::from(in_loop));
        }
        saw_loop_running |= grid.lps[&nic].in_sched_loop();
    }

    assert!(saw_loop_running);
    assert!(!grid.lps[&nic].in_sched_loop());
    assert!(grid.lps[&nic].scheduler().is_empty());
}

#[test]
fn sustained_injection_overflows_an_undersized_buffer() {
    // two chunk slots per link cannot absorb a four-chunk packet burst
    let mut grid =
        TorusGrid::build_with(&[4, 4], 1, |config| config.with("PARAMS", "buffer_size", "2"));
    grid.send_message(&[0, 0], &[2, 0], 512, &[], &[]);

    let result: Result<usize, SimulationError> = grid.run(100_000);
    match result {
        Err(SimulationError::BufferOverflow { gid, dim, occupancy, capacity, .. }) => {
            assert_eq!(gid, grid.node_gid(&[0, 0]));
            assert_eq!(dim, 0);
            assert_eq!(occupancy, 2);
            assert_eq!(capacity, 2);
        },
        other => panic!("expected a buffer overflow, got {other:?}"),
    }
}
