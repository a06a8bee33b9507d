//! # Quizmaster Search
//!
//! The busy-beaver half of the system: probe the space of mazes for the
//! longest shortest path. Three strategies share one pruning-and-solve
//! pipeline:
//!
//! - [`exhaustive_search`] enumerates every k-subset of the candidate ports
//!   for k in a configured range, in lexicographic order. Complete within
//!   its budget, and the only strategy that can claim optimality.
//! - [`random_search`] samples candidate subsets with a seeded PRNG until
//!   cancelled or an iteration budget runs out.
//! - [`topdown_search`] starts from the fully connected candidate maze and
//!   walks the deletion lattice. Deleting a port can never shorten the
//!   shortest path, so the walk climbs toward longer paths; priority
//!   stacks bucketed by current length give a cheap best-first order, and
//!   a seen-set over normalized port vectors collapses symmetric twins.
//!
//! Candidate ports exclude normal-block self-loops (they can never lie on
//! a path). A maze the solver rejects scores zero; a search that never
//! sees a positive score returns `None`, which is a normal result.
//!
//! The random and top-down loops poll a latched Ctrl-C flag between
//! iterations and return their best-so-far when interrupted.

use crate::filters;
use crate::maze::{MAX_NTERM, Maze};
use crate::solver::Solver;
use crate::state::State;
use once_cell::sync::Lazy;
use rand::{Rng, SeedableRng};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Number of priority-stack buckets in the top-down search.
pub const P_MAX: usize = 1000;

/// Shared knobs of the three strategies.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub nterm: usize,
    /// Smallest number of active ports to try.
    pub min_aport: usize,
    /// Largest number of active ports to try; `None` means all candidates.
    pub max_aport: Option<usize>,
    /// Stop as soon as a maze of at least this length is found; 0 = never.
    pub max_len: usize,
    /// PRNG seed for the random strategy.
    pub seed: u64,
    /// Iteration budget for the random strategy; 0 = run until cancelled.
    pub max_iter: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            nterm: 2,
            min_aport: 0,
            max_aport: None,
            max_len: 0,
            seed: 42,
            max_iter: 0,
        }
    }
}

/// The winner of a search: the maze, its shortest-path length, and the
/// path itself. The caller owns all three.
#[derive(Clone, Debug)]
pub struct Best {
    pub maze: Maze,
    pub length: usize,
    pub path: Vec<State>,
}

static CANCELLED: Lazy<Arc<AtomicBool>> = Lazy::new(|| Arc::new(AtomicBool::new(false)));
static CTRL_C_INSTALLED: Lazy<AtomicBool> = Lazy::new(|| AtomicBool::new(false));

/// Installs the Ctrl-C handler once per process. The handler only latches
/// a flag; the search loops poll it between iterations, so cancellation
/// takes effect at the next loop boundary.
fn install_cancel_handler() {
    if !CTRL_C_INSTALLED.swap(true, Ordering::SeqCst) {
        let flag = CANCELLED.clone();
        let _ = ctrlc::set_handler(move || {
            eprintln!("interrupt received, finishing with best so far");
            flag.store(true, Ordering::SeqCst);
        });
    }
}

#[inline]
fn cancelled() -> bool {
    CANCELLED.load(Ordering::SeqCst)
}

/// Un-latches a leftover cancellation before a new search begins.
fn reset_cancelled() {
    CANCELLED.store(false, Ordering::SeqCst);
}

fn best_len(best: &Option<Best>) -> usize {
    best.as_ref().map_or(0, |b| b.length)
}

/// A maze space without both the start and goal terminal, or beyond the
/// abstract filter's word width, holds no solvable maze; every search
/// treats such a configuration as sterile.
fn usable_nterm(nterm: usize) -> bool {
    (2..=MAX_NTERM).contains(&nterm)
}

/// Records a strictly better maze, logging it. The path is recomputed in
/// full here; the search hot paths only ever ask for lengths.
fn update_best(best: &mut Option<Best>, m: &Maze, length: usize, solver: &dyn Solver, tag: &str) {
    let path = solver
        .solve_path(m)
        .expect("best maze must re-solve to a path");
    debug_assert_eq!(path.len() - 1, length);
    eprintln!("[{}] new best: length {}", tag, length);
    eprintln!("[{}]   {}", tag, m);
    *best = Some(Best {
        maze: m.clone(),
        length,
        path,
    });
}

/// Advances `comb` to the next k-subset of `0..n` in lexicographic order.
fn next_combination(comb: &mut [usize], n: usize) -> bool {
    let k = comb.len();
    let mut i = k;
    while i > 0 {
        i -= 1;
        if comb[i] < n - (k - i) {
            comb[i] += 1;
            for j in i + 1..k {
                comb[j] = comb[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

/// Exhaustive combination search over active-port counts
/// `min_aport..=max_aport`.
pub fn exhaustive_search(cfg: &SearchConfig, solver: &dyn Solver) -> Option<Best> {
    if !usable_nterm(cfg.nterm) {
        return None;
    }
    let mut m = Maze::new(cfg.nterm);
    let candidates = filters::candidate_ports(&m);
    let c = candidates.len();
    let k_max = cfg.max_aport.unwrap_or(c).min(c);

    let mut best: Option<Best> = None;
    let (mut evaluated, mut solved) = (0u64, 0u64);
    let (mut pruned_norm, mut pruned_abstract) = (0u64, 0u64);

    'outer: for k in cfg.min_aport..=k_max {
        let mut comb: Vec<usize> = (0..k).collect();
        loop {
            m.clear();
            for &ci in &comb {
                m.set_port(candidates[ci], true);
            }
            evaluated += 1;
            if evaluated % 10_000 == 0 {
                eprintln!(
                    "[exhaustive] k={} evaluated={} solved={} pruned_abstract={} pruned_norm={} best={}",
                    k,
                    evaluated,
                    solved,
                    pruned_abstract,
                    pruned_norm,
                    best_len(&best)
                );
            }
            // A non-canonical maze is skipped; its canonical twin gets its
            // own slot in the enumeration.
            if !filters::is_normalized(&m) {
                pruned_norm += 1;
            } else if !filters::abstract_reachable(&m) {
                pruned_abstract += 1;
            } else {
                solved += 1;
                if let Some(len) = solver.solve_len(&m) {
                    if best_len(&best) < len {
                        update_best(&mut best, &m, len, solver, "exhaustive");
                        if cfg.max_len > 0 && len >= cfg.max_len {
                            break 'outer;
                        }
                    }
                }
            }
            if !next_combination(&mut comb, c) {
                break;
            }
        }
    }
    eprintln!(
        "[exhaustive] done: evaluated={} solved={} pruned_abstract={} pruned_norm={} best={}",
        evaluated,
        solved,
        pruned_abstract,
        pruned_norm,
        best_len(&best)
    );
    best
}

/// Random sampling search: each iteration activates a uniformly sized
/// subset of distinct candidates and scores it. Runs until cancelled, the
/// iteration budget runs out, or the length cap is reached.
pub fn random_search(cfg: &SearchConfig, solver: &dyn Solver) -> Option<Best> {
    if !usable_nterm(cfg.nterm) {
        return None;
    }
    install_cancel_handler();
    reset_cancelled();
    let mut rng = ChaCha20Rng::seed_from_u64(cfg.seed);
    let mut m = Maze::new(cfg.nterm);
    let mut candidates = filters::candidate_ports(&m);
    let c = candidates.len();
    let k_max = cfg.max_aport.unwrap_or(c).min(c);
    let k_min = cfg.min_aport.min(k_max);

    let mut best: Option<Best> = None;
    let mut iter = 0u64;
    while !cancelled() && (cfg.max_iter == 0 || iter < cfg.max_iter) {
        iter += 1;
        let k = rng.random_range(k_min..=k_max);
        m.clear();
        let (chosen, _) = candidates.partial_shuffle(&mut rng, k);
        for &i in chosen.iter() {
            m.set_port(i, true);
        }
        if !filters::abstract_reachable(&m) {
            continue;
        }
        if let Some(len) = solver.solve_len(&m) {
            if best_len(&best) < len {
                update_best(&mut best, &m, len, solver, "random");
                if cfg.max_len > 0 && len >= cfg.max_len {
                    break;
                }
            }
        }
        if iter % 10_000 == 0 {
            eprintln!("[random] iter={} best={}", iter, best_len(&best));
        }
    }
    best
}

/// Hash table of flat port vectors, open addressing with linear probing.
///
/// Slot hashes double as occupancy markers: 0 means empty, so the hash
/// function pins the low bit to 1. Keys are compared only on hash hits.
struct SeenSet {
    hashes: Vec<u64>,
    keys: Vec<Vec<u8>>,
    count: usize,
}

impl SeenSet {
    fn new() -> Self {
        Self {
            hashes: vec![0; 1024],
            keys: vec![Vec::new(); 1024],
            count: 0,
        }
    }

    /// Word-wise xorshift-multiply over the key bytes, 8 at a time with a
    /// per-byte tail.
    fn hash(key: &[u8]) -> u64 {
        let mut h: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut chunks = key.chunks_exact(8);
        for c in chunks.by_ref() {
            h ^= u64::from_le_bytes(c.try_into().unwrap());
            h ^= h >> 29;
            h = h.wrapping_mul(0xbf58_476d_1ce4_e5b9);
        }
        for &b in chunks.remainder() {
            h ^= b as u64;
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
        h | 1
    }

    fn contains(&self, key: &[u8]) -> bool {
        let mask = self.hashes.len() as u64 - 1;
        let h = Self::hash(key);
        let mut i = h & mask;
        loop {
            if self.hashes[i as usize] == 0 {
                return false;
            }
            if self.hashes[i as usize] == h && self.keys[i as usize] == key {
                return true;
            }
            i = (i + 1) & mask;
        }
    }

    fn insert(&mut self, key: Vec<u8>) {
        if (self.count + 1) * 2 > self.hashes.len() {
            self.grow();
        }
        let mask = self.hashes.len() as u64 - 1;
        let h = Self::hash(&key);
        let mut i = h & mask;
        while self.hashes[i as usize] != 0 {
            i = (i + 1) & mask;
        }
        self.hashes[i as usize] = h;
        self.keys[i as usize] = key;
        self.count += 1;
    }

    fn grow(&mut self) {
        let new_len = self.hashes.len() * 2;
        let mask = new_len as u64 - 1;
        let mut hashes = vec![0u64; new_len];
        let mut keys = vec![Vec::new(); new_len];
        for (h, k) in self.hashes.iter().zip(self.keys.drain(..)) {
            if *h == 0 {
                continue;
            }
            let mut i = h & mask;
            while hashes[i as usize] != 0 {
                i = (i + 1) & mask;
            }
            hashes[i as usize] = *h;
            keys[i as usize] = k;
        }
        self.hashes = hashes;
        self.keys = keys;
    }
}

/// Top-down port-deletion search.
///
/// Every maze in the lattice is kept as its normalized flat byte vector.
/// Stacks are indexed by the parent's shortest-path length, so children of
/// long-path mazes are explored first; popping always takes the highest
/// non-empty bucket. The warm start is sound because deletion is
/// monotone: a child's shortest path is at least its parent's.
pub fn topdown_search(cfg: &SearchConfig, solver: &dyn Solver) -> Option<Best> {
    if !usable_nterm(cfg.nterm) {
        return None;
    }
    install_cancel_handler();
    reset_cancelled();
    let mut m = Maze::new(cfg.nterm);
    let candidates = filters::candidate_ports(&m);
    for &i in &candidates {
        m.set_port(i, true);
    }
    filters::normalize(&mut m);

    let mut seen = SeenSet::new();
    let mut stacks: Vec<Vec<Vec<u8>>> = vec![Vec::new(); P_MAX];
    let root = m.to_bytes();
    seen.insert(root.clone());
    stacks[1].push(root);

    let mut best: Option<Best> = None;
    let mut scratch = Maze::new(cfg.nterm);
    let mut pops = 0u64;
    'outer: while !cancelled() {
        let Some(h) = (0..P_MAX).rev().find(|&i| !stacks[i].is_empty()) else {
            break;
        };
        let d = stacks[h].pop().unwrap();
        m.load_bytes(&d);
        pops += 1;
        if pops % 1_000 == 0 {
            let queued: usize = stacks.iter().map(Vec::len).sum();
            eprintln!(
                "[topdown] pops={} queued={} seen={} best={}",
                pops,
                queued,
                seen.count,
                best_len(&best)
            );
        }
        let Some(len) = solver.solve_len_from(&m, h) else {
            continue;
        };
        if best_len(&best) < len {
            update_best(&mut best, &m, len, solver, "topdown");
            if cfg.max_len > 0 && len >= cfg.max_len {
                break 'outer;
            }
        }
        for pos in 0..d.len() {
            if d[pos] == 0 {
                continue;
            }
            scratch.load_bytes(&d);
            scratch.set_port(pos, false);
            filters::normalize(&mut scratch);
            let key = scratch.to_bytes();
            if seen.contains(&key) || !filters::abstract_reachable(&scratch) {
                continue;
            }
            seen.insert(key.clone());
            stacks[len.min(P_MAX - 1)].push(key);
        }
    }
    eprintln!(
        "[topdown] done: pops={} seen={} best={}",
        pops,
        seen.count,
        best_len(&best)
    );
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Iddfs;
    use crate::state::{GOAL, START};

    fn solver() -> Iddfs {
        Iddfs { max_depth: 30 }
    }

    #[test]
    fn next_combination_walks_lexicographically() {
        let mut comb = vec![0, 1];
        let mut all = vec![comb.clone()];
        while next_combination(&mut comb, 4) {
            all.push(comb.clone());
        }
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3],
            ]
        );
        let mut empty: Vec<usize> = vec![];
        assert!(!next_combination(&mut empty, 4));
    }

    #[test]
    fn seen_set_dedups_and_grows() {
        let mut seen = SeenSet::new();
        let keys: Vec<Vec<u8>> = (0..2000u32).map(|i| i.to_le_bytes().to_vec()).collect();
        for k in &keys {
            assert!(!seen.contains(k));
            seen.insert(k.clone());
            assert!(seen.contains(k));
        }
        assert_eq!(seen.count, keys.len());
        for k in &keys {
            assert!(seen.contains(k));
        }
    }

    /// A maze space without both the start and goal terminal is sterile;
    /// every strategy reports it as such rather than trusting the caller.
    #[test]
    fn searches_are_sterile_below_two_terminals() {
        for nterm in [0, 1] {
            let cfg = SearchConfig {
                nterm,
                max_iter: 10,
                ..SearchConfig::default()
            };
            assert!(exhaustive_search(&cfg, &solver()).is_none());
            assert!(random_search(&cfg, &solver()).is_none());
            assert!(topdown_search(&cfg, &solver()).is_none());
        }
    }

    #[test]
    fn exhaustive_single_port_best_is_the_direct_door() {
        let cfg = SearchConfig {
            nterm: 2,
            min_aport: 1,
            max_aport: Some(1),
            ..SearchConfig::default()
        };
        let best = exhaustive_search(&cfg, &solver()).unwrap();
        assert_eq!(best.length, 1);
        assert_eq!(best.path, vec![START, GOAL]);
        // The earliest single-port winner in flat order is W0->W1.
        let expect = Maze::parse(2, "normal: W0->W1; nx: (none); ny: (none)").unwrap();
        assert_eq!(best.maze, expect);
    }

    #[test]
    fn exhaustive_small_case_finds_normalized_best() {
        let cfg = SearchConfig {
            nterm: 2,
            min_aport: 0,
            max_aport: Some(4),
            ..SearchConfig::default()
        };
        let best = exhaustive_search(&cfg, &solver()).unwrap();
        assert!(best.length >= 1);
        assert!(filters::is_normalized(&best.maze));
        assert_eq!(best.path.len(), best.length + 1);
        assert_eq!(best.path[0], START);
        assert_eq!(*best.path.last().unwrap(), GOAL);
    }

    #[test]
    fn exhaustive_respects_length_cap() {
        let cfg = SearchConfig {
            nterm: 2,
            min_aport: 0,
            max_aport: Some(4),
            max_len: 1,
            ..SearchConfig::default()
        };
        let best = exhaustive_search(&cfg, &solver()).unwrap();
        assert_eq!(best.length, 1);
    }

    #[test]
    fn random_search_finds_something() {
        let cfg = SearchConfig {
            nterm: 2,
            min_aport: 1,
            max_aport: Some(6),
            seed: 7,
            max_iter: 2_000,
            ..SearchConfig::default()
        };
        let best = random_search(&cfg, &solver()).unwrap();
        assert!(best.length >= 1);
        assert_eq!(best.path.len(), best.length + 1);
    }

    #[test]
    fn random_search_is_seed_deterministic() {
        let cfg = SearchConfig {
            nterm: 2,
            min_aport: 1,
            max_aport: Some(4),
            seed: 11,
            max_iter: 500,
            ..SearchConfig::default()
        };
        let a = random_search(&cfg, &solver());
        let b = random_search(&cfg, &solver());
        match (a, b) {
            (Some(a), Some(b)) => {
                assert_eq!(a.length, b.length);
                assert_eq!(a.maze, b.maze);
            }
            (None, None) => {}
            _ => panic!("seeded runs disagreed"),
        }
    }

    /// The premise of the top-down walk: deleting an active port never
    /// shortens the shortest path (it may lengthen it or cut the goal
    /// off entirely).
    #[test]
    fn deletion_is_monotone() {
        let mut rng = ChaCha20Rng::seed_from_u64(17);
        let mut m = Maze::new(2);
        let mut candidates = filters::candidate_ports(&m);
        let iddfs = solver();
        let mut checked = 0;
        for round in 0..60 {
            m.clear();
            candidates.shuffle(&mut rng);
            let k = 2 + round % 5;
            for &i in candidates.iter().take(k) {
                m.set_port(i, true);
            }
            let Some(len) = iddfs.solve_len(&m) else {
                continue;
            };
            for &i in candidates.iter().take(k) {
                let mut child = m.clone();
                child.set_port(i, false);
                if let Some(child_len) = iddfs.solve_len(&child) {
                    assert!(child_len >= len, "deletion shortened {}", m);
                }
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn topdown_climbs_past_the_trivial_door() {
        let cfg = SearchConfig {
            nterm: 2,
            max_len: 2,
            ..SearchConfig::default()
        };
        let best = topdown_search(&cfg, &solver()).unwrap();
        assert!(best.length >= 2);
        assert!(filters::is_normalized(&best.maze));
        assert_eq!(best.path.len(), best.length + 1);
        assert_eq!(best.path[0], START);
        assert_eq!(*best.path.last().unwrap(), GOAL);
    }
}
