//! Protocol-level tests of the operation catalogue: an in-process mesh of
//! privacy peers runs the scheduled operations to completion, exchanging
//! pooled share vectors exactly like the protocol driver does.

mod common;

use common::{make_peers, result_shares, result_shares_at, run_until_complete, Dealer};
use primeshare_core::field::FIELD_SIZE_PRIME_31BITS;
use primeshare_core::{BitwiseOperands, Gf, Knowledge, FAILURE_SENTINEL};

#[test]
fn multiply_and_reconstruct() {
    let (p, m, t) = (FIELD_SIZE_PRIME_31BITS, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 1);
    let a = dealer.share(123_456);
    let b = dealer.share(654_321);

    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 1);
        peer.multiply(0, &[a[i], b[i]]).unwrap();
    }
    run_until_complete(&peers);

    let product = dealer.reconstruct(&result_shares(&peers, 0));
    assert_eq!(product, Gf::new(p).mul(123_456, 654_321));
}

#[test]
fn multiply_in_a_63_bit_field() {
    let p = primeshare_core::field::FIELD_SIZE_PRIME_63BITS;
    let (m, t) = (3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 2);
    let (x, y) = (p - 2, p - 3);
    let a = dealer.share(x);
    let b = dealer.share(y);

    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 1);
        peer.multiply(0, &[a[i], b[i]]).unwrap();
    }
    run_until_complete(&peers);

    let product = dealer.reconstruct(&result_shares(&peers, 0));
    assert_eq!(product, Gf::new(p).mul(x, y));
}

/// Three privacy peers compare three inputs pairwise; only the first two
/// are equal.
#[test]
fn equality_of_three_inputs() {
    let (p, m, t) = (FIELD_SIZE_PRIME_31BITS, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 3);
    let a = dealer.share(123_456);
    let b = dealer.share(123_456);
    let c = dealer.share(654_321);

    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 3);
        peer.equal(0, &[a[i], b[i]]).unwrap();
        peer.equal(1, &[a[i], c[i]]).unwrap();
        peer.equal(2, &[b[i], c[i]]).unwrap();
    }
    run_until_complete(&peers);

    // reconstruct the three verdicts in a follow-up set
    let verdicts: Vec<Vec<u64>> = (0..3).map(|id| result_shares(&peers, id)).collect();
    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 3);
        for (id, verdict) in verdicts.iter().enumerate() {
            peer.reconstruct(id, &[verdict[i]]).unwrap();
        }
    }
    run_until_complete(&peers);

    assert_eq!(result_shares(&peers, 0), vec![1; 3]);
    assert_eq!(result_shares(&peers, 1), vec![0; 3]);
    assert_eq!(result_shares(&peers, 2), vec![0; 3]);
}

#[test]
fn power_of_a_share() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 4);
    let x = dealer.share(7);

    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 2);
        peer.power(0, &[x[i], 5]).unwrap();
        peer.power(1, &[x[i], 1]).unwrap();
    }
    run_until_complete(&peers);

    let gf = Gf::new(p);
    assert_eq!(dealer.reconstruct(&result_shares(&peers, 0)), gf.pow(7, 5));
    assert_eq!(dealer.reconstruct(&result_shares(&peers, 1)), 7);
}

#[test]
fn product_of_five_factors() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 5);
    let factors: Vec<Vec<u64>> = [2u64, 3, 4, 5, 6].iter().map(|&f| dealer.share(f)).collect();

    for (i, peer) in peers.iter().enumerate() {
        let mine: Vec<u64> = factors.iter().map(|f| f[i]).collect();
        peer.initialize(0, 1);
        peer.product(0, &mine).unwrap();
    }
    run_until_complete(&peers);

    assert_eq!(dealer.reconstruct(&result_shares(&peers, 0)), 720);
}

#[test]
fn small_interval_membership() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 6);
    let inside = dealer.share(5);
    let outside = dealer.share(20);

    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 3);
        peer.small_interval_test(0, &[inside[i], 3, 10]).unwrap();
        peer.small_interval_test(1, &[outside[i], 3, 10]).unwrap();
        peer.small_interval_test(2, &[inside[i], 5, 5]).unwrap();
    }
    run_until_complete(&peers);

    assert_eq!(dealer.reconstruct(&result_shares(&peers, 0)), 1);
    assert_eq!(dealer.reconstruct(&result_shares(&peers, 1)), 0);
    assert_eq!(dealer.reconstruct(&result_shares(&peers, 2)), 1);
}

#[test]
fn linear_prefix_or_of_bits() {
    let (p, m, t) = (67, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 7);
    // 7 bits for p = 67
    let bits = [0u64, 0, 1, 0, 1, 1, 0];
    let shared: Vec<Vec<u64>> = bits.iter().map(|&b| dealer.share(b)).collect();

    for (i, peer) in peers.iter().enumerate() {
        let mine: Vec<u64> = shared.iter().map(|b| b[i]).collect();
        peer.initialize(0, 1);
        peer.linear_prefix_or(0, &mine).unwrap();
    }
    run_until_complete(&peers);

    let expected = [0u64, 0, 1, 1, 1, 1, 1];
    for (index, &want) in expected.iter().enumerate() {
        let shares = result_shares_at(&peers, 0, index);
        assert_eq!(dealer.reconstruct(&shares), want, "prefix bit {index}");
    }
}

#[test]
fn bitwise_less_than_variants() {
    let (p, m, t) = (67u64, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 8);
    let gf = Gf::new(p);
    let (a, b) = (13u64, 29u64);
    let a_shared: Vec<Vec<u64>> = gf.bits(a).iter().map(|&bit| dealer.share(bit)).collect();
    let b_shared: Vec<Vec<u64>> = gf.bits(b).iter().map(|&bit| dealer.share(bit)).collect();

    for (i, peer) in peers.iter().enumerate() {
        let a_mine: Vec<u64> = a_shared.iter().map(|s| s[i]).collect();
        let b_mine: Vec<u64> = b_shared.iter().map(|s| s[i]).collect();
        peer.initialize(0, 4);
        peer.bitwise_less_than(0, BitwiseOperands::BothShared, &a_mine, &b_mine)
            .unwrap();
        peer.bitwise_less_than(1, BitwiseOperands::BothShared, &b_mine, &a_mine)
            .unwrap();
        peer.bitwise_less_than(2, BitwiseOperands::PublicLeft, &gf.bits(a), &b_mine)
            .unwrap();
        peer.bitwise_less_than(3, BitwiseOperands::PublicRight, &b_mine, &gf.bits(p))
            .unwrap();
    }
    run_until_complete(&peers);

    assert_eq!(dealer.reconstruct(&result_shares(&peers, 0)), 1); // 13 < 29
    assert_eq!(dealer.reconstruct(&result_shares(&peers, 1)), 0); // 29 < 13
    assert_eq!(dealer.reconstruct(&result_shares(&peers, 2)), 1); // public 13 < [29]
    assert_eq!(dealer.reconstruct(&result_shares(&peers, 3)), 1); // [29] < public 67
}

#[test]
fn least_significant_bit_with_supplied_randomness() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 9);
    let even = dealer.share(10);
    let odd = dealer.share(13);

    // generate the two bitwise-shared random numbers up front
    for peer in peers.iter() {
        peer.initialize(0, 1);
        peer.batch_generate_bitwise_random_numbers(0, 2).unwrap();
    }
    run_until_complete(&peers);
    let bits_count = Gf::new(p).bit_len();
    let random_bits: Vec<Vec<u64>> = peers.iter().map(|p| p.result(0).unwrap()).collect();

    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 2);
        let mut data = vec![even[i]];
        data.extend_from_slice(&random_bits[i][..bits_count]);
        peer.least_significant_bit(0, &data).unwrap();
        let mut data = vec![odd[i]];
        data.extend_from_slice(&random_bits[i][bits_count..2 * bits_count]);
        peer.least_significant_bit(1, &data).unwrap();
    }
    run_until_complete(&peers);

    assert_eq!(dealer.reconstruct(&result_shares(&peers, 0)), 0);
    assert_eq!(dealer.reconstruct(&result_shares(&peers, 1)), 1);
}

#[test]
fn less_than_with_and_without_knowledge() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 10);
    let a = dealer.share(5);
    let b = dealer.share(8);

    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 3);
        peer.less_than(
            0,
            a[i],
            b[i],
            Knowledge::Unknown,
            Knowledge::Unknown,
            Knowledge::Unknown,
            None,
        )
        .unwrap();
        peer.less_than(
            1,
            b[i],
            a[i],
            Knowledge::Unknown,
            Knowledge::Unknown,
            Knowledge::Unknown,
            None,
        )
        .unwrap();
        // both operands are known to be small
        peer.less_than(
            2,
            a[i],
            b[i],
            Knowledge::BelowHalf,
            Knowledge::BelowHalf,
            Knowledge::Unknown,
            None,
        )
        .unwrap();
    }
    run_until_complete(&peers);

    assert_eq!(dealer.reconstruct(&result_shares(&peers, 0)), 1);
    assert_eq!(dealer.reconstruct(&result_shares(&peers, 1)), 0);
    assert_eq!(dealer.reconstruct(&result_shares(&peers, 2)), 1);
}

/// Repeated comparisons on the same secret reuse the cached [x < p/2]
/// predicate: after the first less-than the cache holds one entry and the
/// remaining comparisons skip that LSB sub-computation.
#[test]
fn less_than_reuses_cached_predicate() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 11);
    let five = dealer.share(5);
    let others: Vec<Vec<u64>> = (1..=10).map(|k| dealer.share(k)).collect();

    // first comparison fills the cache under the key "five"
    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 1);
        peer.less_than_cached(
            0,
            five[i],
            others[0][i],
            Knowledge::Unknown,
            Knowledge::Unknown,
            Knowledge::Unknown,
            None,
            Some("five".to_owned()),
            None,
            None,
        )
        .unwrap();
        assert_eq!(peer.pending_random_numbers(), 3);
    }
    run_until_complete(&peers);
    for peer in &peers {
        assert_eq!(peer.predicate_cache_len(), 1);
    }

    // the remaining nine comparisons only need two random numbers each
    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 9);
        for (id, other) in others.iter().enumerate().skip(1) {
            peer.less_than_cached(
                id - 1,
                five[i],
                other[i],
                Knowledge::Unknown,
                Knowledge::Unknown,
                Knowledge::Unknown,
                None,
                Some("five".to_owned()),
                None,
                None,
            )
            .unwrap();
        }
        assert_eq!(peer.pending_random_numbers(), 18);
    }
    run_until_complete(&peers);

    for (k, id) in (2..=10u64).zip(0..) {
        let got = dealer.reconstruct(&result_shares(&peers, id));
        assert_eq!(got, u64::from(5 < k), "5 < {k}");
    }
    for peer in &peers {
        assert_eq!(peer.predicate_cache_len(), 1);
    }
}

#[test]
fn minimum_round_optimised_and_sequential() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 12);
    let values: Vec<Vec<u64>> = [30u64, 7, 19].iter().map(|&v| dealer.share(v)).collect();

    for (i, peer) in peers.iter().enumerate() {
        let mine: Vec<u64> = values.iter().map(|v| v[i]).collect();
        peer.initialize(0, 2);
        peer.min(0, &mine, Knowledge::BelowHalf, true).unwrap();
        peer.min(1, &mine, Knowledge::BelowHalf, false).unwrap();
    }
    run_until_complete(&peers);

    assert_eq!(dealer.reconstruct(&result_shares(&peers, 0)), 7);
    assert_eq!(dealer.reconstruct(&result_shares(&peers, 1)), 7);
}

#[test]
fn array_operations() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 13);
    let left: Vec<Vec<u64>> = [1u64, 2, 3].iter().map(|&v| dealer.share(v)).collect();
    let right: Vec<Vec<u64>> = [4u64, 5, 6].iter().map(|&v| dealer.share(v)).collect();
    let third: Vec<Vec<u64>> = [2u64, 2, 2].iter().map(|&v| dealer.share(v)).collect();
    let base: Vec<Vec<u64>> = [2u64, 3].iter().map(|&v| dealer.share(v)).collect();
    let cmp_a: Vec<Vec<u64>> = [5u64, 6, 7].iter().map(|&v| dealer.share(v)).collect();
    let cmp_b: Vec<Vec<u64>> = [5u64, 9, 7].iter().map(|&v| dealer.share(v)).collect();

    let column = |shared: &[Vec<u64>], i: usize| -> Vec<u64> {
        shared.iter().map(|s| s[i]).collect()
    };

    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 5);
        peer.array_mult(0, &column(&left, i), &column(&right, i))
            .unwrap();
        peer.array_product(
            1,
            vec![column(&left, i), column(&right, i), column(&third, i)],
            true,
        )
        .unwrap();
        peer.array_product(
            2,
            vec![column(&left, i), column(&right, i), column(&third, i)],
            false,
        )
        .unwrap();
        peer.array_power(3, &column(&base, i), 3).unwrap();
        peer.array_equal(4, &column(&cmp_a, i), &column(&cmp_b, i))
            .unwrap();
    }
    run_until_complete(&peers);

    let expect = |id: usize, want: &[u64]| {
        for (index, &w) in want.iter().enumerate() {
            let shares = result_shares_at(&peers, id, index);
            assert_eq!(dealer.reconstruct(&shares), w, "operation {id}[{index}]");
        }
    };
    expect(0, &[4, 10, 18]);
    expect(1, &[8, 20, 36]);
    expect(2, &[8, 20, 36]);
    expect(3, &[8, 27]);
    expect(4, &[1, 0, 1]);
}

#[test]
fn synchronization_agrees_on_responsive_peers() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let locals = [
        vec![1u64, 1, 0, 1],
        vec![1u64, 0, 1, 1],
        vec![1u64, 1, 1, 0],
    ];

    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 1);
        peer.synchronize(0, &locals[i]).unwrap();
    }
    run_until_complete(&peers);

    // the AND is public and identical on every peer
    for peer in &peers {
        assert_eq!(peer.result(0).unwrap(), vec![1, 0, 0, 0]);
    }
}

#[test]
fn generated_random_number_is_consistently_shared() {
    let (p, m, t) = (1009, 5, 2);
    let peers = make_peers(p, m, t as i64);

    for peer in peers.iter() {
        peer.initialize(0, 1);
        peer.generate_random_number(0).unwrap();
    }
    run_until_complete(&peers);

    let shares = result_shares(&peers, 0);
    let dealer = Dealer::new(p, m, t, 0);
    let value = dealer.reconstruct(&shares);
    assert!(value < p);
    // any t+1 subset recovers the same value
    let mut subset = shares.clone();
    subset[0] = primeshare_core::MISSING_SHARE;
    subset[3] = primeshare_core::MISSING_SHARE;
    assert_eq!(dealer.sharing.interpolate(&subset, false).unwrap(), value);
}

/// Reconstructed random bits are 0 or 1; failures carry the sentinel and
/// appear rarely.
#[test]
fn random_bits_are_bits() {
    let (p, m, t) = (41, 3, 1);
    let peers = make_peers(p, m, t as i64);
    const COUNT: usize = 100;

    for peer in peers.iter() {
        peer.initialize(0, COUNT);
        for id in 0..COUNT {
            peer.generate_random_bit(id).unwrap();
        }
    }
    run_until_complete(&peers);

    let mut bit_shares = Vec::new();
    let mut failures = 0;
    for id in 0..COUNT {
        let shares = result_shares(&peers, id);
        if shares.iter().all(|&s| s == FAILURE_SENTINEL) {
            failures += 1;
        } else {
            bit_shares.push(shares);
        }
    }
    // expected failure count is COUNT/p ~ 2.4
    assert!(failures < 20, "implausibly many failures: {failures}");

    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, bit_shares.len());
        for (id, shares) in bit_shares.iter().enumerate() {
            peer.reconstruct(id, &[shares[i]]).unwrap();
        }
    }
    run_until_complete(&peers);

    let mut seen = [0usize; 2];
    for id in 0..bit_shares.len() {
        let bits = result_shares(&peers, id);
        assert!(bits.iter().all(|&b| b == bits[0]));
        assert!(bits[0] <= 1, "not a bit: {}", bits[0]);
        seen[bits[0] as usize] += 1;
    }
    // both outcomes should occur in ~100 draws
    assert!(seen[0] > 0 && seen[1] > 0, "degenerate bits: {seen:?}");
}

/// Requesting 8 bitwise-shared random numbers at p = 41 yields exactly
/// 8 * 6 bit shares that combine to values in [0, p).
#[test]
fn batch_generation_meets_demand() {
    let (p, m, t) = (41, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let gf = Gf::new(p);
    let bits_count = gf.bit_len();
    assert_eq!(bits_count, 6);

    for peer in peers.iter() {
        peer.initialize(0, 1);
        peer.batch_generate_bitwise_random_numbers(0, 8).unwrap();
    }
    run_until_complete(&peers);

    let lengths: Vec<usize> = peers.iter().map(|p| p.result(0).unwrap().len()).collect();
    assert!(lengths.iter().all(|&l| l == lengths[0]));
    assert!(lengths[0] >= 8 * bits_count, "demand not met: {}", lengths[0]);

    // reveal the first 8 numbers bit by bit and check they are field
    // elements
    let number_count = 8;
    let total_bits = number_count * bits_count;
    for peer in peers.iter() {
        let mine = peer.result(0).unwrap();
        peer.initialize(0, total_bits);
        for id in 0..total_bits {
            peer.reconstruct(id, &[mine[id]]).unwrap();
        }
    }
    run_until_complete(&peers);

    for number in 0..number_count {
        let mut bits = Vec::with_capacity(bits_count);
        for index in 0..bits_count {
            let values = result_shares(&peers, number * bits_count + index);
            assert!(values.iter().all(|&v| v == values[0]));
            assert!(values[0] <= 1);
            bits.push(values[0]);
        }
        let value = gf.number_from_bits(&bits);
        assert!(value < p, "bitwise random number {value} outside the field");
    }
}

#[test]
fn snapshot_stack_restores_the_outer_set() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 14);
    let a = dealer.share(21);
    let b = dealer.share(2);

    // schedule an outer multiplication but do not run it yet
    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 1);
        peer.multiply(0, &[a[i], b[i]]).unwrap();
    }
    let outer_set = peers[0].current_set_number();

    // run a nested reconstruction while the outer set is parked
    for (i, peer) in peers.iter().enumerate() {
        peer.push_operations();
        peer.initialize(0, 1);
        peer.reconstruct(0, &[a[i]]).unwrap();
    }
    run_until_complete(&peers);
    assert_eq!(result_shares(&peers, 0), vec![21; 3]);
    for peer in peers.iter() {
        peer.pop_operations();
    }

    // the outer set is back, unharmed, and runs to the correct result
    assert_eq!(peers[0].current_set_number(), outer_set);
    assert!(!peers[0].are_operations_completed());
    run_until_complete(&peers);
    assert_eq!(dealer.reconstruct(&result_shares(&peers, 0)), 42);
}

#[test]
fn reconstruction_tolerates_a_crashed_peer() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let mut dealer = Dealer::new(p, m, t, 15);
    let secret = dealer.share(77);

    for (i, peer) in peers.iter().enumerate() {
        peer.initialize(0, 1);
        peer.reconstruct(0, &[secret[i]]).unwrap();
    }
    for peer in peers.iter() {
        peer.process_received_data().unwrap();
    }
    // peer 2 crashed after the local step: its messages never arrive
    for i in 0..3 {
        for j in 0..3 {
            if i != j {
                if i == 2 {
                    peers[j].set_received_data(2, None);
                } else {
                    let data = peers[i].get_data_to_send(j);
                    peers[j].set_received_data(i, Some(&data));
                }
            }
        }
    }
    for peer in peers.iter().take(2) {
        peer.process_received_data().unwrap();
    }
    assert_eq!(peers[0].result(0).unwrap(), vec![77]);
    assert_eq!(peers[1].result(0).unwrap(), vec![77]);
}

#[test]
fn scheduling_rejects_malformed_arguments() {
    let (p, m, t) = (1009, 3, 1);
    let peers = make_peers(p, m, t as i64);
    let peer = &peers[0];
    peer.initialize(0, 2);

    assert!(peer.reconstruct(0, &[1, 2]).is_err());
    assert!(peer.multiply(0, &[1]).is_err());
    assert!(peer.power(0, &[1, 0]).is_err());
    assert!(peer.product(0, &[5]).is_err());
    assert!(peer.small_interval_test(0, &[1, 9, 3]).is_err());
    assert!(peer.small_interval_test(0, &[1, 3, p]).is_err());
    assert!(peer.array_mult(0, &[1, 2], &[1]).is_err());
    assert!(peer.min(0, &[1], Knowledge::Unknown, true).is_err());
    assert!(peer.bf_cardinality(0, &[]).is_err());
    // ids beyond the set size never enqueue
    assert!(peer.multiply(2, &[1, 2]).is_err());
    // nothing was scheduled by any of the rejected calls
    assert_eq!(peer.pending_random_numbers(), 0);
    assert!(!peer.are_operations_completed());
}
