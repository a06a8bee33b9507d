//! # Shortest-Path Solvers
//!
//! Two strategies with one contract: given a maze, report the shortest
//! start-to-goal path length in port traversals, or `None` when the goal is
//! unreachable. The canonical state space is infinite (x and y are
//! unbounded), which shapes the two designs:
//!
//! - [`Bfs`] is the classic frontier search with parent links. Simple and
//!   fast on mazes whose reachable set is small, but it does not terminate
//!   when the goal is unreachable and the reachable set is infinite.
//! - [`Iddfs`] is iterative deepening with a per-iteration transposition
//!   table and a depth ceiling. It trades repeated work for bounded memory
//!   and guaranteed termination, and is the default everywhere the
//!   quizmaster probes unknown mazes.
//!
//! Both sit behind the [`Solver`] trait so search strategies can pick per
//! workload.

use crate::maze::Maze;
use crate::state::{self, GOAL, START, State};
use std::mem;

/// Default IDDFS depth ceiling. A maze whose true shortest path exceeds the
/// ceiling is reported as having no path.
pub const DEFAULT_MAX_DEPTH: usize = 200;

/// A shortest-path strategy over the canonical state graph.
pub trait Solver {
    /// Shortest path length, or `None` if the goal is unreachable.
    fn solve_len(&self, m: &Maze) -> Option<usize> {
        self.solve_len_from(m, 0)
    }

    /// Like [`Solver::solve_len`], with a caller-supplied lower bound on the
    /// answer. Implementations may use the bound to skip provably empty
    /// work; passing a bound above the true length is a contract violation.
    fn solve_len_from(&self, m: &Maze, lower: usize) -> Option<usize>;

    /// Full shortest path from start to goal, including both endpoints.
    fn solve_path(&self, m: &Maze) -> Option<Vec<State>>;
}

/// Fixed-seed FNV-1a over the four state fields.
#[inline]
fn state_hash(s: State) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut h = OFFSET;
    for v in [
        s.x as u32 as u64,
        s.y as u32 as u64,
        s.dir as u64,
        s.idx as u64,
    ] {
        h ^= v;
        h = h.wrapping_mul(PRIME);
    }
    h
}

/// Open-addressing state set with per-state payload and insertion order.
///
/// Entries are appended to a dense array; the hash table (power-of-two
/// capacity, linear probing) maps states to entry indices. The dense array
/// doubles as the BFS frontier (insertion order is discovery order) and as
/// the transposition-table store.
struct StateTable<T> {
    entries: Vec<(State, T)>,
    slots: Vec<i32>,
}

impl<T> StateTable<T> {
    fn new() -> Self {
        Self {
            entries: Vec::with_capacity(4096),
            slots: vec![-1; 8192],
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.slots.fill(-1);
    }

    fn find(&self, s: State) -> Option<usize> {
        let mask = self.slots.len() as u64 - 1;
        let mut h = state_hash(s) & mask;
        loop {
            match self.slots[h as usize] {
                -1 => return None,
                i if self.entries[i as usize].0 == s => return Some(i as usize),
                _ => h = (h + 1) & mask,
            }
        }
    }

    /// Inserts a state known to be absent; returns its entry index.
    fn insert(&mut self, s: State, payload: T) -> usize {
        if (self.entries.len() + 1) * 2 > self.slots.len() {
            self.grow();
        }
        let idx = self.entries.len();
        self.entries.push((s, payload));
        let mask = self.slots.len() as u64 - 1;
        let mut h = state_hash(s) & mask;
        while self.slots[h as usize] != -1 {
            h = (h + 1) & mask;
        }
        self.slots[h as usize] = idx as i32;
        idx
    }

    fn grow(&mut self) {
        let new_len = self.slots.len() * 2;
        let mask = new_len as u64 - 1;
        let mut slots = vec![-1i32; new_len];
        for (i, (s, _)) in self.entries.iter().enumerate() {
            let mut h = state_hash(*s) & mask;
            while slots[h as usize] != -1 {
                h = (h + 1) & mask;
            }
            slots[h as usize] = i as i32;
        }
        self.slots = slots;
    }
}

/// Breadth-first search with parent-chain path reconstruction.
///
/// Termination caveat: on a maze with an infinite reachable set and no
/// goal-reaching path this search never returns. Quizmaster strategies
/// default to [`Iddfs`] for that reason.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bfs;

impl Bfs {
    /// Runs the search; on success returns the visited table and the goal's
    /// entry index.
    fn run(&self, m: &Maze) -> Option<(StateTable<i32>, usize)> {
        // The goal terminal needs index 1 to exist.
        if m.nterm() < 2 {
            return None;
        }
        let mut vis: StateTable<i32> = StateTable::new();
        let mut nbrs = Vec::with_capacity(state::max_fanout(m.nterm()));
        vis.insert(START, -1);
        let mut head = 0;
        while head < vis.len() {
            let cur = vis.entries[head].0;
            state::neighbors(m, cur, &mut nbrs);
            for &t in &nbrs {
                if vis.find(t).is_some() {
                    continue;
                }
                let ti = vis.insert(t, head as i32);
                if t == GOAL {
                    return Some((vis, ti));
                }
            }
            head += 1;
        }
        None
    }

    fn reconstruct(vis: &StateTable<i32>, goal_idx: usize) -> Vec<State> {
        let mut path = Vec::new();
        let mut i = goal_idx as i32;
        while i >= 0 {
            let (s, parent) = vis.entries[i as usize];
            path.push(s);
            i = parent;
        }
        path.reverse();
        path
    }
}

impl Solver for Bfs {
    fn solve_len_from(&self, m: &Maze, _lower: usize) -> Option<usize> {
        let (vis, goal_idx) = self.run(m)?;
        Some(Self::reconstruct(&vis, goal_idx).len() - 1)
    }

    fn solve_path(&self, m: &Maze) -> Option<Vec<State>> {
        let (vis, goal_idx) = self.run(m)?;
        Some(Self::reconstruct(&vis, goal_idx))
    }
}

/// Iterative-deepening DFS with a transposition table.
#[derive(Clone, Copy, Debug)]
pub struct Iddfs {
    /// Depth ceiling; iteration stops here and reports no path.
    pub max_depth: usize,
}

impl Default for Iddfs {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

struct DfsCtx<'a> {
    m: &'a Maze,
    /// State -> shallowest depth reached this iteration.
    tt: StateTable<u32>,
    /// Current recursion path; on a hit it is the answer.
    stack: Vec<State>,
    /// Per-depth successor buffers, reused across the whole solve.
    pool: Vec<Vec<State>>,
    limit: usize,
}

impl DfsCtx<'_> {
    /// Transposition-table admission: admit a state reached at `depth` iff
    /// it is new or was only seen deeper; record the better depth either
    /// way.
    fn admit(&mut self, s: State, depth: u32) -> bool {
        match self.tt.find(s) {
            None => {
                self.tt.insert(s, depth);
                true
            }
            Some(i) if self.tt.entries[i].1 > depth => {
                self.tt.entries[i].1 = depth;
                true
            }
            Some(_) => false,
        }
    }

    fn dfs(&mut self, s: State, depth: usize) -> bool {
        if s == GOAL {
            return true;
        }
        if depth == self.limit {
            return false;
        }
        let mut nbrs = mem::take(&mut self.pool[depth]);
        state::neighbors(self.m, s, &mut nbrs);
        let mut found = false;
        for &t in &nbrs {
            if self.admit(t, depth as u32 + 1) {
                self.stack.push(t);
                if self.dfs(t, depth + 1) {
                    found = true;
                    break;
                }
                self.stack.pop();
            }
        }
        self.pool[depth] = nbrs;
        found
    }
}

impl Iddfs {
    /// Runs depth-limited iterations from `lower` up to the ceiling.
    ///
    /// The transposition table lives for exactly one iteration: a deeper
    /// limit changes which paths are admissible, so nothing carries over
    /// except the start seed. When an iteration fails to reach any state it
    /// had not reached before, the reachable space is exhausted and the
    /// search stops early.
    fn search(&self, m: &Maze, lower: usize) -> Option<Vec<State>> {
        // The goal terminal needs index 1 to exist.
        if m.nterm() < 2 {
            return None;
        }
        let fanout = state::max_fanout(m.nterm());
        let mut ctx = DfsCtx {
            m,
            tt: StateTable::new(),
            stack: Vec::with_capacity(self.max_depth + 1),
            pool: vec![Vec::with_capacity(fanout); self.max_depth + 1],
            limit: 0,
        };
        let mut prev_count = None;
        for limit in lower..=self.max_depth {
            ctx.tt.clear();
            ctx.tt.insert(START, 0);
            ctx.stack.clear();
            ctx.stack.push(START);
            ctx.limit = limit;
            if ctx.dfs(START, 0) {
                return Some(ctx.stack);
            }
            let count = ctx.tt.len();
            if prev_count == Some(count) {
                return None;
            }
            prev_count = Some(count);
        }
        None
    }
}

impl Solver for Iddfs {
    fn solve_len_from(&self, m: &Maze, lower: usize) -> Option<usize> {
        self.search(m, lower).map(|path| path.len() - 1)
    }

    fn solve_path(&self, m: &Maze) -> Option<Vec<State>> {
        self.search(m, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters;
    use crate::state::Dir;
    use itertools::Itertools;
    use rand::SeedableRng;
    use rand::seq::SliceRandom;

    fn both() -> (Bfs, Iddfs) {
        (Bfs, Iddfs::default())
    }

    #[test]
    fn empty_maze_has_no_path() {
        let m = Maze::new(2);
        let (bfs, iddfs) = both();
        assert_eq!(bfs.solve_len(&m), None);
        assert_eq!(iddfs.solve_len(&m), None);
    }

    /// With fewer than two terminal indices the goal terminal does not
    /// exist; both solvers report no path instead of failing.
    #[test]
    fn nterm_below_two_has_no_path() {
        let (bfs, iddfs) = both();
        for nterm in [0, 1] {
            let m = Maze::new(nterm);
            assert_eq!(bfs.solve_len(&m), None);
            assert_eq!(bfs.solve_path(&m), None);
            assert_eq!(iddfs.solve_len(&m), None);
            assert_eq!(iddfs.solve_path(&m), None);
            assert_eq!(iddfs.solve_len_from(&m, 5), None);
        }
    }

    #[test]
    fn trivial_nx_path() {
        let m = Maze::parse(2, "normal: (none); nx: E0->E1; ny: (none)").unwrap();
        let (bfs, iddfs) = both();
        assert_eq!(bfs.solve_len(&m), Some(1));
        assert_eq!(iddfs.solve_len(&m), Some(1));
        assert_eq!(bfs.solve_path(&m).unwrap(), vec![START, GOAL]);
        assert_eq!(iddfs.solve_path(&m).unwrap(), vec![START, GOAL]);
    }

    #[test]
    fn two_step_path_through_normal_block() {
        let m = Maze::parse(2, "normal: W0->E1, E1->W1; nx: (none); ny: (none)").unwrap();
        let (bfs, iddfs) = both();
        let mid = State {
            x: 1,
            y: 1,
            dir: Dir::E,
            idx: 1,
        };
        assert_eq!(bfs.solve_path(&m).unwrap(), vec![START, mid, GOAL]);
        assert_eq!(iddfs.solve_path(&m).unwrap(), vec![START, mid, GOAL]);
    }

    #[test]
    fn unreachable_goal_is_none_for_both() {
        // E0->N0 never fires: the start state only exposes W-sources of
        // block (1,1) and the nx table, both empty.
        let m = Maze::parse(2, "normal: E0->N0; nx: (none); ny: (none)").unwrap();
        let (bfs, iddfs) = both();
        assert_eq!(bfs.solve_len(&m), None);
        assert_eq!(iddfs.solve_len(&m), None);
    }

    #[test]
    fn iddfs_exhausts_infinite_march_at_ceiling() {
        // W0->E0 marches east forever without ever reaching the goal.
        let m = Maze::parse(2, "normal: W0->E0; nx: (none); ny: (none)").unwrap();
        let iddfs = Iddfs { max_depth: 40 };
        assert_eq!(iddfs.solve_len(&m), None);
    }

    #[test]
    fn depth_ceiling_truncates() {
        let m = Maze::parse(2, "normal: W0->E1, E1->W1; nx: (none); ny: (none)").unwrap();
        assert_eq!(Iddfs { max_depth: 1 }.solve_len(&m), None);
        assert_eq!(Iddfs { max_depth: 2 }.solve_len(&m), Some(2));
    }

    #[test]
    fn warm_start_agrees_with_cold() {
        let m = Maze::parse(2, "normal: W0->E1, E1->W1; nx: (none); ny: (none)").unwrap();
        let iddfs = Iddfs::default();
        assert_eq!(iddfs.solve_len_from(&m, 0), Some(2));
        assert_eq!(iddfs.solve_len_from(&m, 1), Some(2));
        assert_eq!(iddfs.solve_len_from(&m, 2), Some(2));
    }

    /// Solvers must agree on every 2-port maze at nterm=2. IDDFS decides
    /// solvability first so that BFS only runs on goal-reaching mazes
    /// (where its termination is guaranteed).
    #[test]
    fn solvers_agree_on_all_two_port_mazes() {
        let mut m = Maze::new(2);
        let candidates = filters::candidate_ports(&m);
        let iddfs = Iddfs { max_depth: 30 };
        let mut solvable = 0;
        for pair in candidates.iter().combinations(2) {
            m.clear();
            for &&i in &pair {
                m.set_port(i, true);
            }
            if let Some(len) = iddfs.solve_len(&m) {
                solvable += 1;
                assert_eq!(Bfs.solve_len(&m), Some(len), "maze {}", m);
                assert_eq!(Bfs.solve_path(&m).unwrap().len(), len + 1);
                let path = iddfs.solve_path(&m).unwrap();
                assert_eq!(path.len(), len + 1);
                assert_eq!(path[0], START);
                assert_eq!(*path.last().unwrap(), GOAL);
            }
        }
        assert!(solvable > 0);
    }

    /// Random sparse mazes at nterm=3: solver agreement plus path
    /// invariants (endpoints, bounds, active edges).
    #[test]
    fn solvers_agree_on_random_sparse_mazes() {
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(2025);
        let mut m = Maze::new(3);
        let iddfs = Iddfs { max_depth: 40 };
        let mut candidates = filters::candidate_ports(&m);
        let mut solvable = 0;
        for round in 0..150 {
            let k = 1 + round % 7;
            m.clear();
            candidates.shuffle(&mut rng);
            for &i in candidates.iter().take(k) {
                m.set_port(i, true);
            }
            if let Some(len) = iddfs.solve_len(&m) {
                solvable += 1;
                assert_eq!(Bfs.solve_len(&m), Some(len), "maze {}", m);
                let path = iddfs.solve_path(&m).unwrap();
                assert_eq!(path.len(), len + 1);
                assert!(path.iter().all(|s| s.in_bounds()));
                let mut nbrs = Vec::new();
                for (a, b) in path.iter().tuple_windows() {
                    state::neighbors(&m, *a, &mut nbrs);
                    assert!(nbrs.contains(b), "no active edge {} -> {}", a, b);
                }
            }
        }
        assert!(solvable > 0);
    }
}
