//! Bloom-filter set operations over shared filters.

mod common;

use common::{make_peers, result_shares, result_shares_at, run_until_complete, Dealer};

/// Shares each filter position; `result[peer][position]`.
fn share_filter(dealer: &mut Dealer, filter: &[u64], peers: usize) -> Vec<Vec<u64>> {
    let mut shares = vec![Vec::with_capacity(filter.len()); peers];
    for &position in filter {
        for (peer, share) in dealer.share(position).into_iter().enumerate() {
            shares[peer].push(share);
        }
    }
    shares
}

fn reveal(
    peers: &[primeshare_core::Primitives],
    dealer: &Dealer,
    id: usize,
    positions: usize,
) -> Vec<u64> {
    (0..positions)
        .map(|index| dealer.reconstruct(&result_shares_at(peers, id, index)))
        .collect()
}

/// Three peers submit counting filters; the threshold union with T = 2
/// reveals exactly the positions whose summed counters reach 2.
#[test]
fn threshold_union_of_three_counting_filters() {
    let (p, m, t) = (67, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 20);
    let filters = [
        vec![2u64, 0, 0, 1, 0, 3, 0, 0],
        vec![0u64, 1, 0, 1, 0, 2, 0, 0],
        vec![1u64, 0, 0, 0, 0, 0, 1, 0],
    ];
    let shared: Vec<Vec<Vec<u64>>> = filters
        .iter()
        .map(|f| share_filter(&mut dealer, f, m))
        .collect();

    for (i, peer) in peers.iter().enumerate() {
        let mine: Vec<Vec<u64>> = shared.iter().map(|f| f[i].clone()).collect();
        peer.initialize(0, 1);
        peer.bf_threshold_union(0, mine, 2, false).unwrap();
    }
    run_until_complete(&peers);

    assert_eq!(reveal(&peers, &dealer, 0, 8), vec![1, 0, 0, 1, 0, 1, 0, 0]);
}

#[test]
fn union_and_intersection_of_bit_filters() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 21);
    let filters = [
        vec![1u64, 0, 1, 0],
        vec![0u64, 0, 1, 1],
        vec![1u64, 0, 1, 0],
    ];
    let shared: Vec<Vec<Vec<u64>>> = filters
        .iter()
        .map(|f| share_filter(&mut dealer, f, m))
        .collect();

    for (i, peer) in peers.iter().enumerate() {
        let mine: Vec<Vec<u64>> = shared.iter().map(|f| f[i].clone()).collect();
        peer.initialize(0, 2);
        peer.bf_union(0, mine.clone(), false).unwrap();
        peer.bf_intersection(1, mine, false).unwrap();
    }
    run_until_complete(&peers);

    assert_eq!(reveal(&peers, &dealer, 0, 4), vec![1, 0, 1, 1]);
    assert_eq!(reveal(&peers, &dealer, 1, 4), vec![0, 0, 1, 0]);
}

#[test]
fn counting_union_and_intersection() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 22);
    let filters = [vec![2u64, 0, 3], vec![1u64, 4, 3], vec![5u64, 1, 3]];
    let shared: Vec<Vec<Vec<u64>>> = filters
        .iter()
        .map(|f| share_filter(&mut dealer, f, m))
        .collect();

    for (i, peer) in peers.iter().enumerate() {
        let mine: Vec<Vec<u64>> = shared.iter().map(|f| f[i].clone()).collect();
        peer.initialize(0, 2);
        peer.bf_union(0, mine.clone(), true).unwrap();
        peer.bf_intersection(1, mine, true).unwrap();
    }
    run_until_complete(&peers);

    assert_eq!(reveal(&peers, &dealer, 0, 3), vec![8, 5, 9]);
    assert_eq!(reveal(&peers, &dealer, 1, 3), vec![1, 0, 3]);
}

#[test]
fn cardinality_is_the_position_sum() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 23);
    let shared = share_filter(&mut dealer, &[2, 0, 0, 1], m);

    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 1);
        peer.bf_cardinality(0, &shared[i]).unwrap();
    }
    run_until_complete(&peers);

    assert_eq!(dealer.reconstruct(&result_shares(&peers, 0)), 3);
}

#[test]
fn weighted_intersection_with_thresholds() {
    let (p, m, t) = (67, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 24);
    let keys = [vec![1u64, 1, 0], vec![1u64, 0, 1]];
    let weights = [vec![3u64, 1, 2], vec![2u64, 5, 0]];
    let shared_keys: Vec<Vec<Vec<u64>>> = keys
        .iter()
        .map(|f| share_filter(&mut dealer, f, m))
        .collect();
    let shared_weights: Vec<Vec<Vec<u64>>> = weights
        .iter()
        .map(|f| share_filter(&mut dealer, f, m))
        .collect();

    for (i, peer) in peers.iter().enumerate() {
        let my_keys: Vec<Vec<u64>> = shared_keys.iter().map(|f| f[i].clone()).collect();
        let my_weights: Vec<Vec<u64>> = shared_weights.iter().map(|f| f[i].clone()).collect();
        peer.initialize(0, 1);
        // keys present in both filters, accumulated weight at least 4
        peer.bf_weighted_intersection(0, my_keys, my_weights, 2, 4, true)
            .unwrap();
    }
    run_until_complete(&peers);

    // key sums [2,1,1] pass the key threshold only at position 0; weight
    // sums [5,6,2] pass at positions 0 and 1
    assert_eq!(reveal(&peers, &dealer, 0, 3), vec![5, 0, 0]);
}
