use std::collections::HashMap;
use std::fs;

use rand::seq::SliceRandom;
use rand::Rng;
use stagger::{Companion, CompanionConfig, WalkId};
use tempfile::tempdir;

const SOURCES: usize = 4;
const SUBMITTERS: usize = 8;
const EVENTS_PER_SUBMITTER: usize = 500;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn outstanding_never_exceeds_the_configured_maximum() {
    let config = CompanionConfig {
        max_outstanding: 2,
        drain_threshold: 32,
        ..CompanionConfig::default()
    };
    let max = config.max_outstanding;
    let companion = Companion::new(config);
    companion.register_sources(&[1000]).unwrap();

    let mut submitters = Vec::new();
    for _ in 0..SUBMITTERS {
        let handle = companion.clone();
        submitters.push(tokio::spawn(async move {
            for round in 0..50u32 {
                let walks = vec![WalkId::encode(0, round); 64];
                let vertices = vec![2000 + round; 64];
                handle.process_batch(walks, vertices).await;
            }
        }));
    }

    let watcher = {
        let handle = companion.clone();
        tokio::spawn(async move {
            let mut peak = 0;
            for _ in 0..1000 {
                peak = peak.max(handle.outstanding());
                tokio::task::yield_now().await;
            }
            peak
        })
    };

    for submitter in submitters {
        submitter.await.unwrap();
    }
    let peak = watcher.await.unwrap();
    assert!(peak <= max, "outstanding peaked at {peak}, max is {max}");

    let dir = tempdir().unwrap();
    companion.export_top(dir.path().join("out.tsv")).await.unwrap();
    let total: u64 = companion.top(0, 100).iter().map(|entry| entry.count).sum();
    assert_eq!(total, (SUBMITTERS * 50 * 64) as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_batches_match_sequential_counts() {
    let seeds: Vec<u32> = (0..SOURCES as u32).map(|i| i * 1000).collect();
    let config = CompanionConfig {
        drain_threshold: 16,
        max_outstanding: 4,
        ..CompanionConfig::default()
    };
    let companion = Companion::new(config);
    companion.register_sources(&seeds).unwrap();

    // Fixed vertex pool of eight per source keeps every count inside the
    // exported top-10, so the file shows the complete distribution.
    let mut rng = rand::thread_rng();
    let mut expected: HashMap<(usize, u32), u64> = HashMap::new();
    let mut events: Vec<(WalkId, u32)> = Vec::new();
    for _ in 0..SUBMITTERS * EVENTS_PER_SUBMITTER {
        let source = rng.gen_range(0..SOURCES);
        let vertex = seeds[source] + 1 + rng.gen_range(0..8u32);
        events.push((WalkId::encode(source as u32, 0), vertex));
        *expected.entry((source, vertex)).or_insert(0) += 1;
    }
    events.shuffle(&mut rng);

    let mut submitters = Vec::new();
    for chunk in events.chunks(EVENTS_PER_SUBMITTER) {
        let handle = companion.clone();
        let chunk = chunk.to_vec();
        submitters.push(tokio::spawn(async move {
            // Uneven sub-batches so drains interleave mid-batch.
            for batch in chunk.chunks(37) {
                let (walks, vertices): (Vec<WalkId>, Vec<u32>) = batch.iter().copied().unzip();
                handle.process_batch(walks, vertices).await;
            }
        }));
    }
    for submitter in submitters {
        submitter.await.unwrap();
    }

    let dir = tempdir().unwrap();
    let path = dir.path().join("out.tsv");
    companion.export_top(&path).await.unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let mut observed: HashMap<(usize, u32), u64> = HashMap::new();
    for (source, line) in contents.lines().enumerate() {
        for field in line.split('\t').skip(2).filter(|field| !field.is_empty()) {
            let (vertex, count) = field.split_once(',').unwrap();
            observed.insert((source, vertex.parse().unwrap()), count.parse().unwrap());
        }
    }
    assert_eq!(observed, expected);
}
