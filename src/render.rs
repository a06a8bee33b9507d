//! # Textual Renderers
//!
//! Human-readable views of mazes and paths. Everything here produces a
//! `String` for the CLI to print; no core logic depends on this module.

use crate::SetMinMax;
use crate::mat;
use crate::maze::{Maze, TDir};
use crate::state::{Dir, State};
use itertools::Itertools;
use std::fmt::Write;

/// Port matrix of the normal block (rows = sources, columns =
/// destinations, `*` = present) followed by the nx/ny port lists.
pub fn port_table(m: &Maze) -> String {
    let n = m.nterm();
    let mut out = String::new();
    writeln!(out, "Normal block port table ({} terminals):", 4 * n).unwrap();
    out.push_str("      ");
    for dd in TDir::ALL {
        for di in 0..n {
            write!(out, " {}{:<2}", dd, di).unwrap();
        }
    }
    out.push('\n');
    for sd in TDir::ALL {
        for si in 0..n {
            write!(out, "  {}{:<2} ", sd, si).unwrap();
            for dd in TDir::ALL {
                for di in 0..n {
                    let c = if m.normal_port(sd, si, dd, di) { '*' } else { '.' };
                    write!(out, "  {} ", c).unwrap();
                }
            }
            out.push('\n');
        }
    }
    for (name, dir) in [("nx", TDir::E), ("ny", TDir::N)] {
        write!(out, "{} block ports: ", name).unwrap();
        let ports = (0..n)
            .cartesian_product(0..n)
            .filter(|&(si, di)| si != di)
            .filter(|&(si, di)| match name {
                "nx" => m.nx_port(si, di),
                _ => m.ny_port(si, di),
            })
            .map(|(si, di)| format!("{}{}->{}{}", dir, si, dir, di))
            .join(", ");
        if ports.is_empty() {
            out.push_str("(none)");
        } else {
            out.push_str(&ports);
        }
        out.push('\n');
    }
    out
}

/// Arrow-joined path: `(0,1,E0) -> (1,1,N0) -> (0,1,E1)`.
pub fn path_line(path: &[State]) -> String {
    path.iter().join(" -> ")
}

/// Step numbers laid out on the (x, y) grid the path visits, highest y
/// first.
pub fn path_grid(path: &[State]) -> String {
    let Some(first) = path.first() else {
        return String::new();
    };
    let (mut min_x, mut max_x) = (first.x, first.x);
    let (mut min_y, mut max_y) = (first.y, first.y);
    for s in path {
        min_x.setmin(s.x);
        max_x.setmax(s.x);
        min_y.setmin(s.y);
        max_y.setmax(s.y);
    }
    let cols = (max_x - min_x + 1) as usize;
    let rows = (max_y - min_y + 1) as usize;

    let mut cells = mat![String::new(); rows; cols];
    for (step, s) in path.iter().enumerate() {
        let cell = &mut cells[(s.y - min_y) as usize][(s.x - min_x) as usize];
        if !cell.is_empty() {
            cell.push(',');
        }
        write!(cell, "{}", step).unwrap();
    }
    let mut col_w = vec![4usize; cols];
    for row in &cells {
        for (c, cell) in row.iter().enumerate() {
            col_w[c].setmax(cell.len() + 2);
        }
    }

    let mut out = String::from("Grid (step numbers at each position):\n");
    out.push_str("y\\x  ");
    for (c, &w) in col_w.iter().enumerate() {
        write!(out, "{:<w$}", min_x + c as i32).unwrap();
    }
    out.push('\n');
    for y in (min_y..=max_y).rev() {
        write!(out, "{:<4} ", y).unwrap();
        for (c, &w) in col_w.iter().enumerate() {
            let cell = &cells[(y - min_y) as usize][c];
            let text = if cell.is_empty() { "." } else { cell };
            write!(out, "{:<w$}", text).unwrap();
        }
        out.push('\n');
    }
    out
}

/// The block-local terminals a canonical state may play.
fn incident_terminals(s: State) -> [(i32, i32, TDir, usize); 2] {
    match s.dir {
        Dir::E => [
            (s.x, s.y, TDir::E, s.idx),
            (s.x + 1, s.y, TDir::W, s.idx),
        ],
        Dir::N => [
            (s.x, s.y, TDir::N, s.idx),
            (s.x, s.y + 1, TDir::S, s.idx),
        ],
    }
}

/// Looks up the block kind and port presence for a candidate transition.
fn port_at(
    m: &Maze,
    bx: i32,
    by: i32,
    sd: TDir,
    si: usize,
    dd: TDir,
    di: usize,
) -> Option<&'static str> {
    if bx > 0 && by > 0 {
        m.normal_port(sd, si, dd, di).then_some("normal")
    } else if bx == 0 && by > 0 {
        (sd == TDir::E && dd == TDir::E && si != di && m.nx_port(si, di)).then_some("nx")
    } else if bx > 0 && by == 0 {
        (sd == TDir::N && dd == TDir::N && si != di && m.ny_port(si, di)).then_some("ny")
    } else {
        None
    }
}

/// Per-step annotation: which block and port realizes each transition.
pub fn path_verbose(m: &Maze, path: &[State]) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    writeln!(out, "Path details ({} steps):", path.len() - 1).unwrap();
    for (step, (s1, s2)) in path.iter().tuple_windows().enumerate() {
        let mut found = false;
        'blocks: for (b1x, b1y, sd, si) in incident_terminals(*s1) {
            for (b2x, b2y, dd, di) in incident_terminals(*s2) {
                if (b1x, b1y) != (b2x, b2y) {
                    continue;
                }
                if let Some(kind) = port_at(m, b1x, b1y, sd, si, dd, di) {
                    writeln!(
                        out,
                        "  #{:<3} {} --[{}{}->{}{} @ {}({},{})]--> {}",
                        step, s1, sd, si, dd, di, kind, b1x, b1y, s2
                    )
                    .unwrap();
                    found = true;
                    break 'blocks;
                }
            }
        }
        if !found {
            writeln!(out, "  #{:<3} {} --> {}  [transition unknown]", step, s1, s2).unwrap();
        }
    }
    out
}
