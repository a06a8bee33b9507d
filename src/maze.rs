//! # Maze Store
//!
//! A repeated maze is fully described by the port tables of its three block
//! kinds: the shared `normal` block at (x>0, y>0), the `nx` west-edge block
//! at (x=0, y>0) and the `ny` south-edge block at (x>0, y=0). This module
//! owns those tables as contiguous byte arrays (one byte per port) and
//! provides typed and flat-index access, bulk load, randomization, and the
//! textual maze format used at every tool boundary.
//!
//! Port slot layout, with `n = nterm` and terminal number `t = dir*n + idx`:
//!
//! - normal: `(4n)^2` slots, slot = `src_t * 4n + dst_t`
//! - nx/ny: `n*(n-1)` slots each, slot = `si*(n-1) + (di if di<si else di-1)`
//!   (edge blocks have no self-loops, so the diagonal is squeezed out)
//!
//! The flat port index runs over `{normal || nx || ny}` in that order.

use anyhow::{Result, bail};
use rand::Rng;
use std::fmt;

/// Largest supported number of terminal indices per direction.
///
/// The abstract-reachability filter runs a bitmask BFS over the 2*nterm
/// terminal classes inside a single 64-bit word, which caps `nterm` at 32.
pub const MAX_NTERM: usize = 32;

/// Terminal direction within a block, in port-table order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TDir {
    E,
    W,
    N,
    S,
}

impl TDir {
    pub const ALL: [TDir; 4] = [TDir::E, TDir::W, TDir::N, TDir::S];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            TDir::E => 0,
            TDir::W => 1,
            TDir::N => 2,
            TDir::S => 3,
        }
    }

    /// Parses a direction letter, case-insensitively.
    pub fn parse(c: char) -> Option<TDir> {
        match c {
            'E' | 'e' => Some(TDir::E),
            'W' | 'w' => Some(TDir::W),
            'N' | 'n' => Some(TDir::N),
            'S' | 's' => Some(TDir::S),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TDir::E => "E",
            TDir::W => "W",
            TDir::N => "N",
            TDir::S => "S",
        }
    }

    /// Whether this direction belongs to the E/W terminal class.
    #[inline]
    pub fn is_ew(self) -> bool {
        matches!(self, TDir::E | TDir::W)
    }
}

impl fmt::Display for TDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Port tables of a repeated maze.
#[derive(Clone, PartialEq, Eq)]
pub struct Maze {
    nterm: usize,
    normal: Vec<u8>,
    nx: Vec<u8>,
    ny: Vec<u8>,
}

impl Maze {
    /// Creates a maze with all ports absent.
    ///
    /// Degenerate values (`nterm < 2`) are representable — they build empty
    /// edge tables, and the solvers report such mazes as having no path.
    /// Panics only when `nterm` exceeds `MAX_NTERM`.
    pub fn new(nterm: usize) -> Self {
        assert!(
            nterm <= MAX_NTERM,
            "nterm must be at most {}, got {}",
            MAX_NTERM,
            nterm
        );
        let n4 = 4 * nterm;
        let edge = nterm * nterm.saturating_sub(1);
        Self {
            nterm,
            normal: vec![0; n4 * n4],
            nx: vec![0; edge],
            ny: vec![0; edge],
        }
    }

    #[inline]
    pub fn nterm(&self) -> usize {
        self.nterm
    }

    /// Number of normal-block port slots, `(4n)^2`.
    #[inline]
    pub fn normal_nports(&self) -> usize {
        self.normal.len()
    }

    /// Number of port slots in one edge table, `n*(n-1)`.
    #[inline]
    pub fn edge_nports(&self) -> usize {
        self.nx.len()
    }

    /// Total number of port slots across all three tables.
    #[inline]
    pub fn total_nports(&self) -> usize {
        self.normal.len() + self.nx.len() + self.ny.len()
    }

    #[inline]
    fn normal_slot(&self, sd: TDir, si: usize, dd: TDir, di: usize) -> usize {
        let n = self.nterm;
        let n4 = 4 * n;
        (sd.index() * n + si) * n4 + dd.index() * n + di
    }

    #[inline]
    fn edge_slot(&self, si: usize, di: usize) -> usize {
        debug_assert!(si != di);
        si * (self.nterm - 1) + if di < si { di } else { di - 1 }
    }

    pub fn normal_port(&self, sd: TDir, si: usize, dd: TDir, di: usize) -> bool {
        self.normal[self.normal_slot(sd, si, dd, di)] != 0
    }

    pub fn set_normal_port(&mut self, sd: TDir, si: usize, dd: TDir, di: usize, val: bool) {
        let slot = self.normal_slot(sd, si, dd, di);
        self.normal[slot] = val as u8;
    }

    pub fn nx_port(&self, si: usize, di: usize) -> bool {
        self.nx[self.edge_slot(si, di)] != 0
    }

    pub fn set_nx_port(&mut self, si: usize, di: usize, val: bool) {
        let slot = self.edge_slot(si, di);
        self.nx[slot] = val as u8;
    }

    pub fn ny_port(&self, si: usize, di: usize) -> bool {
        self.ny[self.edge_slot(si, di)] != 0
    }

    pub fn set_ny_port(&mut self, si: usize, di: usize, val: bool) {
        let slot = self.edge_slot(si, di);
        self.ny[slot] = val as u8;
    }

    /// Reads a port through the flat `{normal || nx || ny}` index.
    pub fn port(&self, mut idx: usize) -> bool {
        if idx < self.normal.len() {
            return self.normal[idx] != 0;
        }
        idx -= self.normal.len();
        if idx < self.nx.len() {
            return self.nx[idx] != 0;
        }
        idx -= self.nx.len();
        self.ny[idx] != 0
    }

    /// Writes a port through the flat index.
    pub fn set_port(&mut self, mut idx: usize, val: bool) {
        let val = val as u8;
        if idx < self.normal.len() {
            self.normal[idx] = val;
            return;
        }
        idx -= self.normal.len();
        if idx < self.nx.len() {
            self.nx[idx] = val;
            return;
        }
        idx -= self.nx.len();
        self.ny[idx] = val;
    }

    pub fn flip_port(&mut self, idx: usize) {
        self.set_port(idx, !self.port(idx));
    }

    /// Clears all ports.
    pub fn clear(&mut self) {
        self.normal.fill(0);
        self.nx.fill(0);
        self.ny.fill(0);
    }

    /// Snapshot of the flat port vector; also the dedup key of this maze.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_nports());
        out.extend_from_slice(&self.normal);
        out.extend_from_slice(&self.nx);
        out.extend_from_slice(&self.ny);
        out
    }

    /// Bulk-loads the flat port vector produced by [`Maze::to_bytes`].
    pub fn load_bytes(&mut self, data: &[u8]) {
        assert_eq!(data.len(), self.total_nports());
        let (a, rest) = data.split_at(self.normal.len());
        let (b, c) = rest.split_at(self.nx.len());
        self.normal.copy_from_slice(a);
        self.nx.copy_from_slice(b);
        self.ny.copy_from_slice(c);
        for b in self
            .normal
            .iter_mut()
            .chain(self.nx.iter_mut())
            .chain(self.ny.iter_mut())
        {
            *b = (*b != 0) as u8;
        }
    }

    /// Sets every port independently with probability 1/2.
    pub fn randomize(&mut self, rng: &mut impl Rng) {
        for i in 0..self.total_nports() {
            self.set_port(i, rng.random::<bool>());
        }
    }
}

/// Detects `nterm` from a maze string: one more than the largest terminal
/// index mentioned, with a floor of 2.
pub fn detect_nterm(s: &str) -> usize {
    let mut max_idx = 0usize;
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if TDir::parse(c).is_none() {
            continue;
        }
        let mut idx = None;
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            idx = Some(idx.unwrap_or(0) * 10 + d as usize);
            chars.next();
        }
        if let Some(idx) = idx {
            max_idx = max_idx.max(idx);
        }
    }
    (max_idx + 1).max(2)
}

/// Cursor-based scanner for the maze grammar.
struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if let Some(r) = self.rest.strip_prefix(token) {
            self.rest = r;
            true
        } else {
            false
        }
    }

    fn eat_char(&mut self, c: char) -> bool {
        self.skip_ws();
        if let Some(r) = self.rest.strip_prefix(c) {
            self.rest = r;
            true
        } else {
            false
        }
    }

    /// Parses one `<dir><digits>` terminal, or `None` if the cursor is not
    /// looking at one.
    fn terminal(&mut self) -> Option<(TDir, usize)> {
        self.skip_ws();
        let mut chars = self.rest.char_indices();
        let (_, c) = chars.next()?;
        let dir = TDir::parse(c)?;
        let digits_start = c.len_utf8();
        let digits_end = self
            .rest
            .char_indices()
            .skip(1)
            .find(|&(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        if digits_end == digits_start {
            return None;
        }
        let idx: usize = self.rest[digits_start..digits_end].parse().ok()?;
        self.rest = &self.rest[digits_end..];
        Some((dir, idx))
    }

    /// Parses one `T -> T` port entry.
    fn entry(&mut self) -> Option<(TDir, usize, TDir, usize)> {
        let (sd, si) = self.terminal()?;
        self.skip_ws();
        let _ = self.eat_char('-');
        let _ = self.eat_char('>');
        let (dd, di) = self.terminal()?;
        Some((sd, si, dd, di))
    }
}

impl Maze {
    /// Parses the textual maze format.
    ///
    /// Parsing is tolerant: out-of-range indices and edge-section self-loops
    /// are dropped, unparseable tails of a section are skipped, and a missing
    /// section is treated as empty. The string is rejected only when no
    /// section header can be found at all.
    pub fn parse(nterm: usize, s: &str) -> Result<Maze> {
        if !(2..=MAX_NTERM).contains(&nterm) {
            bail!("nterm must be in 2..={}, got {}", MAX_NTERM, nterm);
        }
        let mut m = Maze::new(nterm);
        let mut any_section = false;
        let mut sc = Scanner::new(s);
        for section in ["normal:", "nx:", "ny:"] {
            // Sections appear in fixed order; skip ahead if one is absent.
            if !sc.eat(section) {
                continue;
            }
            any_section = true;
            if sc.eat("(none)") {
                if let Some(semi) = sc.rest.find(';') {
                    sc.rest = &sc.rest[semi + 1..];
                } else {
                    sc.rest = "";
                }
                continue;
            }
            while let Some((sd, si, dd, di)) = sc.entry() {
                if si < nterm && di < nterm {
                    match section {
                        "normal:" => m.set_normal_port(sd, si, dd, di, true),
                        // Edge entries: only the indices matter, and the
                        // squeezed table cannot hold a self-loop.
                        _ if si != di => {
                            if section == "nx:" {
                                m.set_nx_port(si, di, true);
                            } else {
                                m.set_ny_port(si, di, true);
                            }
                        }
                        _ => {}
                    }
                }
                if !sc.eat_char(',') {
                    break;
                }
            }
            // Drop whatever is left of this section.
            if let Some(semi) = sc.rest.find(';') {
                sc.rest = &sc.rest[semi + 1..];
            } else {
                sc.rest = "";
            }
        }
        if !any_section {
            bail!("no maze sections found in {:?}", s);
        }
        Ok(m)
    }
}

impl fmt::Display for Maze {
    /// Emits the canonical textual form: sections in fixed order, entries in
    /// source-major, destination-minor terminal order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.nterm;
        write!(f, "normal:")?;
        let mut first = true;
        for sd in TDir::ALL {
            for si in 0..n {
                for dd in TDir::ALL {
                    for di in 0..n {
                        if self.normal_port(sd, si, dd, di) {
                            let sep = if first { "" } else { "," };
                            write!(f, "{} {}{}->{}{}", sep, sd, si, dd, di)?;
                            first = false;
                        }
                    }
                }
            }
        }
        if first {
            write!(f, " (none)")?;
        }
        for (name, table, dir) in [("nx", &self.nx, TDir::E), ("ny", &self.ny, TDir::N)] {
            write!(f, "; {}:", name)?;
            let mut first = true;
            for si in 0..n {
                for di in 0..n {
                    if di != si && table[self.edge_slot(si, di)] != 0 {
                        let sep = if first { "" } else { "," };
                        write!(f, "{} {}{}->{}{}", sep, dir, si, dir, di)?;
                        first = false;
                    }
                }
            }
            if first {
                write!(f, " (none)")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Maze {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Maze(nterm={}, {})", self.nterm, self)
    }
}
