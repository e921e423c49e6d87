//! Chunked migration tests through a simulated host.

mod common;

use common::{MockSlow, Sim};
use tiermem_common::{AccessOp, MemRequest, PageAddr, TierConfig};
use tiermem_engine::{BackendRequest, SwapDir};

fn swap_config(max_fast_pages: usize) -> TierConfig {
    TierConfig {
        max_fast_pages,
        page_shift: 8,
        chunk_shift: 6,
        threshold: 0,
        model_swaps: true,
        ..Default::default()
    }
}

#[test]
fn test_requests_wait_for_all_chunks() {
    let mut sim = Sim::new(swap_config(2)).unwrap();
    let reqs: Vec<_> = (0..4)
        .map(|id| MemRequest::read(id, 0x100 + id * 8))
        .collect();
    for req in &reqs {
        sim.issue(req.clone());
    }

    let page = sim.mem.page(PageAddr(1)).unwrap();
    assert_eq!(page.swap_dir, SwapDir::SlowToFast);
    assert_eq!(page.swaps_out, 4);
    let stats = sim.mem.stats();
    assert_eq!(stats.waiting_requests, 4);
    assert_eq!(stats.counters.swap_delays, 4);

    while sim.busy() {
        sim.step();
        if sim.mem.stats().waiting_requests > 0 {
            assert!(sim.completed.is_empty(), "request released mid-migration");
            assert!(sim.fast_chunk_done < 4);
        }
    }

    assert_eq!(sim.slow_chunk_done, 4);
    assert_eq!(sim.fast_chunk_done, 4);
    assert_eq!(sim.completed, reqs);
    assert_eq!(sim.mem.page(PageAddr(1)).unwrap().swap_dir, SwapDir::Stable);

    // Only chunk reads went to the slow tier
    let issued = &sim.mem.backend().issued;
    assert_eq!(issued.len(), 4);
    assert!(issued.iter().all(|r| r.is_chunk() && r.op() == AccessOp::Read));
}

#[test]
fn test_chunks_cover_the_page() {
    let mut sim = Sim::new(swap_config(2)).unwrap();
    sim.issue(MemRequest::write(1, 0x3ff));
    sim.settle();

    let mut addrs: Vec<_> = sim.mem.backend().issued.iter().map(|r| r.addr()).collect();
    addrs.sort_unstable();
    assert_eq!(addrs, vec![0x300, 0x340, 0x380, 0x3c0]);
    assert!(sim.mem.backend().issued.iter().all(|r| r.size() == 64));
}

#[test]
fn test_evicted_page_drains_to_slow_after_migration() {
    let mut sim = Sim::new(swap_config(1)).unwrap();
    sim.issue(MemRequest::read(1, 0x100));
    sim.settle();
    assert!(sim.mem.page(PageAddr(1)).unwrap().in_fast);

    // B displaces A; A's next request waits for A to leave the fast tier
    sim.issue(MemRequest::read(2, 0x200));
    assert_eq!(sim.mem.page(PageAddr(1)).unwrap().swap_dir, SwapDir::FastToSlow);
    sim.issue(MemRequest::read(3, 0x110));
    assert_eq!(sim.mem.stats().counters.fast_swaps, 1);
    sim.settle();

    let issued = &sim.mem.backend().issued;
    let host_at = issued
        .iter()
        .position(|r| *r == BackendRequest::Host(MemRequest::read(3, 0x110)))
        .unwrap();
    let last_write_of_a = issued
        .iter()
        .rposition(|r| r.is_chunk() && r.op() == AccessOp::Write && r.addr() >> 8 == 1)
        .unwrap();
    assert!(host_at > last_write_of_a);

    let writes_of_a = issued
        .iter()
        .filter(|r| r.is_chunk() && r.op() == AccessOp::Write && r.addr() >> 8 == 1)
        .count();
    assert_eq!(writes_of_a, 4);

    assert!(sim.completed.contains(&MemRequest::read(2, 0x200)));
    assert!(sim.completed.contains(&MemRequest::read(3, 0x110)));
    assert_eq!(sim.mem.page(PageAddr(1)).unwrap().swap_dir, SwapDir::Stable);
    assert!(!sim.mem.page(PageAddr(1)).unwrap().in_fast);
}

#[test]
fn test_all_residents_migrating_counts_cant_swap() {
    let mut sim = Sim::new(swap_config(1)).unwrap();
    sim.issue(MemRequest::read(1, 0x100));
    // Page 1 is still migrating in: page 2 cannot displace it
    sim.issue(MemRequest::read(2, 0x200));

    let stats = sim.mem.stats();
    assert_eq!(stats.counters.cant_swap, 1);
    assert_eq!(stats.counters.fast_swaps, 0);
    assert!(!sim.mem.page(PageAddr(2)).unwrap().in_fast);
    assert!(
        sim.mem
            .backend()
            .issued
            .contains(&BackendRequest::Host(MemRequest::read(2, 0x200)))
    );
    sim.settle();
    assert_eq!(sim.completed.len(), 2);
}

#[test]
fn test_migration_survives_slow_backlog() {
    // One request in flight at a time forces chunks through the slow queue
    let mut sim = Sim::with_backend(swap_config(4), MockSlow::new(5, 1)).unwrap();
    for id in 0..3u64 {
        sim.issue(MemRequest::read(id, id << 8));
    }
    // The third promotion is refused while the slow queue is backlogged
    assert_eq!(sim.mem.stats().slow_queue_depth, 8);
    assert!(!sim.mem.page(PageAddr(2)).unwrap().in_fast);
    sim.settle();

    assert_eq!(sim.completed.len(), 3);
    assert_eq!(sim.slow_chunk_done, 8);
    assert_eq!(sim.mem.stats().pages_in_fast, 2);
}

#[test]
fn test_backpressure_disabled_admits_under_backlog() {
    let config = TierConfig {
        slow_backpressure: false,
        ..swap_config(4)
    };
    let mut sim = Sim::with_backend(config, MockSlow::new(5, 1)).unwrap();
    for id in 0..3u64 {
        sim.issue(MemRequest::read(id, id << 8));
    }
    sim.settle();

    assert_eq!(sim.completed.len(), 3);
    assert_eq!(sim.slow_chunk_done, 12);
    assert_eq!(sim.mem.stats().pages_in_fast, 3);
}
