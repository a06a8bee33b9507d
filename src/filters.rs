//! # Pruning Filters and Canonical Normalization
//!
//! The quizmaster pipeline rejects candidate mazes as early as possible:
//!
//! 1. Self-loop ports (`T -> T` inside one normal block) can never appear
//!    on a path, so they are excluded from the candidate set up front.
//! 2. [`abstract_reachable`] collapses the maze to a 2*nterm-node graph of
//!    terminal classes and checks goal-class reachability. Position is
//!    erased, so a positive answer proves nothing, but a negative one
//!    proves the maze has no path; the filter is reject-only.
//! 3. [`normalize`] maps a maze to the canonical representative of its
//!    index-permutation equivalence class, letting searches deduplicate
//!    symmetric twins. E/W indices 0 and 1 name the start and goal and are
//!    pinned; every other E/W index and all N/S indices are relabeled in
//!    first-appearance order.

use crate::maze::{Maze, TDir};

/// Whether a flat port index names a normal-block self-loop.
pub fn is_self_loop(m: &Maze, idx: usize) -> bool {
    let n4 = 4 * m.nterm();
    idx < m.normal_nports() && idx / n4 == idx % n4
}

/// Flat indices of every port that could appear on some path: the whole
/// table minus normal-block self-loops.
pub fn candidate_ports(m: &Maze) -> Vec<usize> {
    (0..m.total_nports())
        .filter(|&i| !is_self_loop(m, i))
        .collect()
}

/// Terminal-class node: E/W classes are `0..n`, N/S classes are `n..2n`.
#[inline]
fn class(n: usize, dir: TDir, idx: usize) -> usize {
    if dir.is_ew() { idx } else { n + idx }
}

/// Necessary condition for goal reachability: in the directed graph of
/// terminal classes induced by the active ports, the goal class (E/W index
/// 1) must be reachable from the start class (E/W index 0).
///
/// Runs a bitmask BFS in a single 64-bit word, which is what caps
/// supported nterm at 32.
pub fn abstract_reachable(m: &Maze) -> bool {
    let n = m.nterm();
    // Without both the start and goal class nothing is reachable.
    if n < 2 {
        return false;
    }
    let mut adj = vec![0u64; 2 * n];
    for sd in TDir::ALL {
        for si in 0..n {
            for dd in TDir::ALL {
                for di in 0..n {
                    if m.normal_port(sd, si, dd, di) {
                        adj[class(n, sd, si)] |= 1 << class(n, dd, di);
                    }
                }
            }
        }
    }
    for si in 0..n {
        for di in 0..n {
            if di != si {
                if m.nx_port(si, di) {
                    adj[si] |= 1 << di;
                }
                if m.ny_port(si, di) {
                    adj[n + si] |= 1 << (n + di);
                }
            }
        }
    }

    let mut reach: u64 = 1 << 0;
    loop {
        let mut next = reach;
        let mut bits = reach;
        while bits != 0 {
            next |= adj[bits.trailing_zeros() as usize];
            bits &= bits - 1;
        }
        if next == reach {
            return reach & (1 << 1) != 0;
        }
        reach = next;
    }
}

fn assign(map: &mut [Option<usize>], next: &mut usize, idx: usize) {
    if map[idx].is_none() {
        map[idx] = Some(*next);
        *next += 1;
    }
}

/// Rewrites the maze in place to the canonical representative of its
/// equivalence class under E/W and N/S index permutations.
///
/// The representative is a fixpoint of first-appearance relabeling. One
/// relabeling pass is not a projection (renaming indices reorders the
/// ports in slot order, which can change the next pass's first-appearance
/// order), so the pass is iterated until the key repeats; a limit cycle is
/// broken by taking its smallest byte key. In practice trajectories reach
/// their cycle within a handful of passes.
pub fn normalize(m: &mut Maze) {
    let mut seen: Vec<Vec<u8>> = vec![m.to_bytes()];
    loop {
        relabel_pass(m);
        let key = m.to_bytes();
        if let Some(pos) = seen.iter().position(|k| *k == key) {
            let min = seen[pos..].iter().min().unwrap();
            m.load_bytes(min);
            return;
        }
        seen.push(key);
    }
}

/// One first-appearance relabeling pass: scanning normal, then nx, then ny
/// ports in slot order (source before destination within a port), each
/// newly seen index gets the next counter value of its class; unused
/// indices are filled in afterwards so the permutations are total.
fn relabel_pass(m: &mut Maze) {
    let n = m.nterm();
    let mut ew_map: Vec<Option<usize>> = vec![None; n];
    let mut ns_map: Vec<Option<usize>> = vec![None; n];
    // Pin the start and goal indices where they exist.
    for i in 0..n.min(2) {
        ew_map[i] = Some(i);
    }
    let mut next_ew = n.min(2);
    let mut next_ns = 0;

    for sd in TDir::ALL {
        for si in 0..n {
            for dd in TDir::ALL {
                for di in 0..n {
                    if m.normal_port(sd, si, dd, di) {
                        for (d, i) in [(sd, si), (dd, di)] {
                            if d.is_ew() {
                                assign(&mut ew_map, &mut next_ew, i);
                            } else {
                                assign(&mut ns_map, &mut next_ns, i);
                            }
                        }
                    }
                }
            }
        }
    }
    for si in 0..n {
        for di in 0..n {
            if di != si && m.nx_port(si, di) {
                assign(&mut ew_map, &mut next_ew, si);
                assign(&mut ew_map, &mut next_ew, di);
            }
        }
    }
    for si in 0..n {
        for di in 0..n {
            if di != si && m.ny_port(si, di) {
                assign(&mut ns_map, &mut next_ns, si);
                assign(&mut ns_map, &mut next_ns, di);
            }
        }
    }
    for i in 0..n {
        assign(&mut ew_map, &mut next_ew, i);
        assign(&mut ns_map, &mut next_ns, i);
    }
    let map = |d: TDir, i: usize| -> usize {
        if d.is_ew() {
            ew_map[i].unwrap()
        } else {
            ns_map[i].unwrap()
        }
    };

    let old = m.clone();
    m.clear();
    for sd in TDir::ALL {
        for si in 0..n {
            for dd in TDir::ALL {
                for di in 0..n {
                    if old.normal_port(sd, si, dd, di) {
                        m.set_normal_port(sd, map(sd, si), dd, map(dd, di), true);
                    }
                }
            }
        }
    }
    for si in 0..n {
        for di in 0..n {
            if di != si {
                if old.nx_port(si, di) {
                    m.set_nx_port(map(TDir::E, si), map(TDir::E, di), true);
                }
                if old.ny_port(si, di) {
                    m.set_ny_port(map(TDir::N, si), map(TDir::N, di), true);
                }
            }
        }
    }
}

/// Whether the maze already is its own canonical representative.
pub fn is_normalized(m: &Maze) -> bool {
    let mut c = m.clone();
    normalize(&mut c);
    c == *m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{Iddfs, Solver};
    use rand::SeedableRng;
    use rand::seq::SliceRandom;

    #[test]
    fn self_loop_arithmetic() {
        let m = Maze::new(3);
        let n4 = 12;
        for t in 0..n4 {
            assert!(is_self_loop(&m, t * n4 + t));
        }
        assert!(!is_self_loop(&m, 0 * n4 + 1));
        // Edge tables cannot hold self-loops.
        for idx in m.normal_nports()..m.total_nports() {
            assert!(!is_self_loop(&m, idx));
        }
        let candidates = candidate_ports(&m);
        assert_eq!(candidates.len(), m.total_nports() - n4);
    }

    #[test]
    fn abstract_reachability_examples() {
        let m = Maze::parse(2, "normal: (none); nx: E0->E1; ny: (none)").unwrap();
        assert!(abstract_reachable(&m));

        // Start class can reach the N classes but never class 1.
        let m = Maze::parse(2, "normal: E0->N0; nx: (none); ny: (none)").unwrap();
        assert!(!abstract_reachable(&m));

        // Two hops through an N class.
        let m = Maze::parse(2, "normal: E0->N0, S0->W1; nx: (none); ny: (none)").unwrap();
        assert!(abstract_reachable(&m));

        // W and E fold into the same class.
        let m = Maze::parse(2, "normal: W0->S1, N1->E1; nx: (none); ny: (none)").unwrap();
        assert!(abstract_reachable(&m));

        assert!(!abstract_reachable(&Maze::new(2)));
    }

    /// A false abstract answer must imply an unsolvable maze (the filter
    /// is reject-only sound).
    #[test]
    fn abstract_false_implies_no_path() {
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(11);
        let mut m = Maze::new(3);
        let mut candidates = candidate_ports(&m);
        let iddfs = Iddfs { max_depth: 40 };
        for round in 0..120 {
            m.clear();
            candidates.shuffle(&mut rng);
            for &i in candidates.iter().take(1 + round % 6) {
                m.set_port(i, true);
            }
            if !abstract_reachable(&m) {
                assert_eq!(iddfs.solve_len(&m), None, "maze {}", m);
            }
        }
    }

    #[test]
    fn normalization_collapses_ns_twins() {
        let mut a = Maze::parse(3, "normal: (none); nx: (none); ny: N0->N1").unwrap();
        let mut b = Maze::parse(3, "normal: (none); nx: (none); ny: N1->N2").unwrap();
        let iddfs = Iddfs { max_depth: 20 };
        assert_eq!(iddfs.solve_len(&a), iddfs.solve_len(&b));
        normalize(&mut a);
        normalize(&mut b);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "normal: (none); nx: (none); ny: N0->N1");
    }

    #[test]
    fn normalization_pins_ew_indices_0_and_1() {
        // First appearance renames E3 to E2 (then E2 to E3); E1 is pinned.
        let mut m = Maze::parse(4, "normal: (none); nx: E3->E2, E1->E3; ny: (none)").unwrap();
        normalize(&mut m);
        assert_eq!(m.to_string(), "normal: (none); nx: E1->E2, E2->E3; ny: (none)");
    }

    #[test]
    fn normalization_survives_relabeling_reorder() {
        // A single relabeling pass of this maze is not a fixpoint (the
        // renamed ports scan in a different order); normalize must still
        // land on a stable representative.
        let mut m = Maze::parse(
            5,
            "normal: E0->S2, W1->E4, N0->E1, N2->W0, N2->S3, S0->E1; nx: (none); ny: N3->N1, N4->N0",
        )
        .unwrap();
        normalize(&mut m);
        assert!(is_normalized(&m));
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(5);
        for nterm in [2usize, 3, 5] {
            let mut m = Maze::new(nterm);
            for _ in 0..20 {
                m.randomize(&mut rng);
                normalize(&mut m);
                let mut again = m.clone();
                normalize(&mut again);
                assert_eq!(m, again);
                assert!(is_normalized(&m));
            }
        }
    }

    #[test]
    fn is_normalized_matches_definition() {
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(6);
        let mut m = Maze::new(3);
        for _ in 0..30 {
            m.randomize(&mut rng);
            let mut c = m.clone();
            normalize(&mut c);
            assert_eq!(is_normalized(&m), c == m);
        }
    }

    /// Relabeling terminal indices cannot change the shortest path length.
    #[test]
    fn normalization_preserves_solve_length() {
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(9);
        let mut m = Maze::new(3);
        let mut candidates = candidate_ports(&m);
        let iddfs = Iddfs { max_depth: 40 };
        for round in 0..80 {
            m.clear();
            candidates.shuffle(&mut rng);
            for &i in candidates.iter().take(2 + round % 5) {
                m.set_port(i, true);
            }
            let before = iddfs.solve_len(&m);
            let mut norm = m.clone();
            normalize(&mut norm);
            assert_eq!(before, iddfs.solve_len(&norm), "maze {}", m);
        }
    }
}
