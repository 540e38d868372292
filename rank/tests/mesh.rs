use std::num::NonZeroUsize;

use comms::msg::{Msg, Payload};
use rank::{Fabric, Layout, LocalFabric, Rank, RankErr, TcpFabric, run_mesh};
use tokio::net::TcpListener;
use wavefront::{FarmConfig, Partition, SquareMtx, sequential};

fn farm(workers: usize) -> FarmConfig {
    FarmConfig::new(NonZeroUsize::new(workers).unwrap())
}

fn reference(len: usize) -> SquareMtx {
    let mut mtx = SquareMtx::new(len);
    sequential::compute(&mut mtx);
    mtx
}

fn assert_close(got: &SquareMtx, expected: &SquareMtx) {
    assert_eq!(got.len(), expected.len());

    for (i, (a, b)) in got.as_slice().iter().zip(expected.as_slice()).enumerate() {
        let tolerance = 1e-9 * b.abs().max(f64::MIN_POSITIVE);
        assert!((a - b).abs() <= tolerance, "cell {i}: {a} != {b}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn root_matches_the_sequential_matrix() {
    for (len, ranks) in [(1, 1), (2, 2), (8, 4), (9, 3), (10, 5), (13, 6), (16, 7), (20, 8), (5, 4)] {
        let mtx = run_mesh(Layout::new(len, ranks), farm(2)).await.unwrap();

        assert_eq!(mtx.origin(), 0);
        assert_close(&mtx, &reference(len));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_rank_is_a_plain_farm() {
    let mtx = run_mesh(Layout::new(12, 1), farm(3)).await.unwrap();
    assert_eq!(mtx, reference(12));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn too_many_ranks_are_clamped() {
    let mtx = run_mesh(Layout::new(3, 16), farm(1)).await.unwrap();
    assert_close(&mtx, &reference(3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn local_policy_does_not_change_the_root() {
    let cfg = farm(3).with_partition(Partition::Dynamic);
    let mtx = run_mesh(Layout::new(31, 4), cfg).await.unwrap();

    assert_close(&mtx, &reference(31));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn branch_rejects_a_misplaced_block() {
    let layout = Layout::new(8, 2);
    let mut mesh = LocalFabric::mesh(2);
    let (leaf, branch) = (mesh.pop().unwrap(), mesh.pop().unwrap());

    let running = tokio::spawn(Rank::new(layout, farm(1), branch).unwrap().run());

    // Rank 1 owns rows 4..8, it claims 3..7 instead.
    let block = SquareMtx::with_origin(4, 3, 8);
    let mut tx = leaf.open(0).await.unwrap();
    tx.send(&Msg::Data(Payload::Block {
        round: 1,
        origin: 3,
        len: 4,
        cells: block.as_slice(),
    }))
    .await
    .unwrap();

    let err = running.await.unwrap().unwrap_err();
    assert!(matches!(err, RankErr::BlockMismatch { from: 1, .. }), "{err}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn branch_surfaces_a_peer_failure() {
    let layout = Layout::new(6, 2);
    let mut mesh = LocalFabric::mesh(2);
    let (leaf, branch) = (mesh.pop().unwrap(), mesh.pop().unwrap());

    let running = tokio::spawn(Rank::new(layout, farm(1), branch).unwrap().run());

    let mut tx = leaf.open(0).await.unwrap();
    tx.send(&Msg::Err("out of memory".into())).await.unwrap();

    let err = running.await.unwrap().unwrap_err();
    assert!(matches!(err, RankErr::PeerFailed { peer: 1, .. }), "{err}");
}

#[test]
fn rank_outside_the_layout_is_refused() {
    let mesh = LocalFabric::mesh(4);
    let layout = Layout::new(8, 2);

    assert!(matches!(
        Rank::new(layout, farm(1), mesh[3].clone()),
        Err(RankErr::UnknownRank { rank: 3, ranks: 2 })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_ranks_merge_over_tcp() {
    let root_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_port = root_listener.local_addr().unwrap().port();
    let leaf_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

    let layout = Layout::new(10, 2);
    let root = TcpFabric::from_listener(0, root_listener, "127.0.0.1", base_port);
    let leaf = TcpFabric::from_listener(1, leaf_listener, "127.0.0.1", base_port);

    let root = tokio::spawn(Rank::new(layout, farm(2), root).unwrap().run());
    let leaf = tokio::spawn(Rank::new(layout, farm(2), leaf).unwrap().run());

    assert!(leaf.await.unwrap().unwrap().is_none());
    let mtx = root.await.unwrap().unwrap().unwrap();
    assert_close(&mtx, &reference(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn three_ranks_merge_over_tcp_whatever_the_arrival_order() {
    let root_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_port = root_listener.local_addr().unwrap().port();
    let first_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let second_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

    // Rank 0 absorbs rank 1 and then rank 2.
    let layout = Layout::new(12, 3);
    let root = TcpFabric::from_listener(0, root_listener, "127.0.0.1", base_port);
    let first = TcpFabric::from_listener(1, first_listener, "127.0.0.1", base_port);
    let second = TcpFabric::from_listener(2, second_listener, "127.0.0.1", base_port);

    let root = tokio::spawn(Rank::new(layout, farm(2), root).unwrap().run());

    // Rank 2 is done before rank 1 even starts, the root has to park its link.
    let second = tokio::spawn(Rank::new(layout, farm(2), second).unwrap().run());
    assert!(second.await.unwrap().unwrap().is_none());

    let first = tokio::spawn(Rank::new(layout, farm(2), first).unwrap().run());
    assert!(first.await.unwrap().unwrap().is_none());

    let mtx = root.await.unwrap().unwrap().unwrap();
    assert_close(&mtx, &reference(12));
}
