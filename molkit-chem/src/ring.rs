//! Ring perception via the smallest set of smallest rings (SSSR).
//!
//! Candidate cycles come from shortest-path pairs around every bond (Horton);
//! the shortest linearly independent ones over GF(2) form the SSSR.

use std::collections::VecDeque;

use crate::molecule::Molecule;

/// Ring membership for the atoms and bonds of one molecule.
#[derive(Debug, Clone, Default)]
pub struct RingInfo {
    /// SSSR rings as atom-index cycles, smallest first.
    pub rings: Vec<Vec<usize>>,
    atom_rings: Vec<Vec<usize>>,
    bond_in_ring: Vec<bool>,
}

impl RingInfo {
    /// Perceive the rings of `mol`.
    pub fn new(mol: &Molecule) -> Self {
        let rings = find_sssr(mol);
        let mut atom_rings = vec![Vec::new(); mol.atom_count()];
        let mut bond_in_ring = vec![false; mol.bond_count()];
        for (ri, ring) in rings.iter().enumerate() {
            for (k, &a) in ring.iter().enumerate() {
                atom_rings[a].push(ri);
                let b = ring[(k + 1) % ring.len()];
                if let Some(bi) = mol.bond_index(a, b) {
                    bond_in_ring[bi] = true;
                }
            }
        }
        RingInfo {
            rings,
            atom_rings,
            bond_in_ring,
        }
    }

    pub fn num_rings(&self) -> usize {
        self.rings.len()
    }

    pub fn is_atom_in_ring(&self, atom: usize) -> bool {
        self.atom_rings.get(atom).is_some_and(|r| !r.is_empty())
    }

    /// Number of SSSR rings containing the atom.
    pub fn atom_ring_count(&self, atom: usize) -> usize {
        self.atom_rings.get(atom).map_or(0, Vec::len)
    }

    pub fn is_bond_in_ring(&self, bond: usize) -> bool {
        self.bond_in_ring.get(bond).copied().unwrap_or(false)
    }

    /// Whether the atoms share an SSSR ring.
    pub fn share_ring(&self, a: usize, b: usize) -> bool {
        match (self.atom_rings.get(a), self.atom_rings.get(b)) {
            (Some(ra), Some(rb)) => ra.iter().any(|r| rb.contains(r)),
            _ => false,
        }
    }

    /// Size of the smallest ring containing the atom, if any.
    pub fn smallest_ring_size(&self, atom: usize) -> Option<usize> {
        self.atom_rings
            .get(atom)?
            .iter()
            .map(|&ri| self.rings[ri].len())
            .min()
    }
}

/// Find the smallest set of smallest rings (SSSR) in a molecule.
///
/// Returns a vector of rings, where each ring is a vector of atom indices.
pub fn find_sssr(mol: &Molecule) -> Vec<Vec<usize>> {
    let n = mol.atom_count();
    if n == 0 || mol.bond_count() == 0 {
        return Vec::new();
    }

    // cyclomatic number = bonds - atoms + components
    let expected_rings =
        mol.bond_count() as isize - n as isize + count_components(mol) as isize;
    if expected_rings <= 0 {
        return Vec::new();
    }

    let ring_atoms = find_ring_atoms(mol);

    // Horton candidates: for every root and every bond (x, y), the cycle
    // root..x-y..root built from two shortest paths that meet only at the root.
    let mut candidates: Vec<Vec<usize>> = Vec::new();
    for root in (0..n).filter(|&a| ring_atoms[a]) {
        let parent = bfs_tree(mol, root, &ring_atoms);
        for bond in &mol.bonds {
            let (x, y) = (bond.atom1, bond.atom2);
            if !ring_atoms[x] || !ring_atoms[y] {
                continue;
            }
            let (Some(px), Some(py)) = (path_to_root(&parent, x, root), path_to_root(&parent, y, root)) else {
                continue;
            };
            // px = x..root, py = y..root; they may share only the root.
            if px[..px.len() - 1].iter().any(|a| py.contains(a)) {
                continue;
            }
            let mut ring: Vec<usize> = px.iter().rev().copied().collect();
            ring.extend(py[..py.len() - 1].iter());
            if ring.len() < 3 {
                continue;
            }
            normalize_ring(&mut ring);
            if !candidates.contains(&ring) {
                candidates.push(ring);
            }
        }
    }
    candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    // Keep rings whose bond sets are independent over GF(2).
    let mut basis: Vec<Vec<bool>> = Vec::new();
    let mut rings = Vec::new();
    for ring in candidates {
        if rings.len() as isize >= expected_rings {
            break;
        }
        let mut vec = vec![false; mol.bond_count()];
        for k in 0..ring.len() {
            if let Some(bi) = mol.bond_index(ring[k], ring[(k + 1) % ring.len()]) {
                vec[bi] = true;
            }
        }
        if is_independent(&basis, vec.clone()) {
            basis.push(vec);
            rings.push(ring);
        }
    }
    rings
}

/// Gaussian elimination over GF(2): is `v` outside the span of `basis`?
fn is_independent(basis: &[Vec<bool>], mut v: Vec<bool>) -> bool {
    // Reduce against a row-echelon copy of the basis.
    let mut rows: Vec<Vec<bool>> = Vec::with_capacity(basis.len());
    for b in basis {
        let mut b = b.clone();
        for r in &rows {
            if let Some(p) = r.iter().position(|&x| x) {
                if b[p] {
                    xor_into(&mut b, r);
                }
            }
        }
        if b.iter().any(|&x| x) {
            rows.push(b);
        }
    }
    for r in &rows {
        if let Some(p) = r.iter().position(|&x| x) {
            if v[p] {
                xor_into(&mut v, r);
            }
        }
    }
    v.iter().any(|&x| x)
}

fn xor_into(target: &mut [bool], src: &[bool]) {
    for (t, s) in target.iter_mut().zip(src) {
        *t ^= *s;
    }
}

fn count_components(mol: &Molecule) -> usize {
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut components = 0;

    for start in 0..n {
        if visited[start] {
            continue;
        }
        components += 1;
        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited[start] = true;
        while let Some(curr) = queue.pop_front() {
            for &(neighbor, _) in &mol.adjacency[curr] {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
    }

    components
}

/// Ring atoms survive iterative removal of degree ≤ 1 atoms.
fn find_ring_atoms(mol: &Molecule) -> Vec<bool> {
    let n = mol.atom_count();
    let mut degree: Vec<usize> = (0..n).map(|i| mol.degree(i)).collect();

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| degree[i] <= 1).collect();
    let mut removed = vec![false; n];
    while let Some(atom) = queue.pop_front() {
        if removed[atom] {
            continue;
        }
        removed[atom] = true;
        for &(neighbor, _) in &mol.adjacency[atom] {
            if !removed[neighbor] {
                degree[neighbor] -= 1;
                if degree[neighbor] <= 1 {
                    queue.push_back(neighbor);
                }
            }
        }
    }

    removed.iter().map(|&r| !r).collect()
}

/// BFS parent pointers from `root` over ring atoms; `usize::MAX` marks unreached.
fn bfs_tree(mol: &Molecule, root: usize, ring_atoms: &[bool]) -> Vec<usize> {
    let n = mol.atom_count();
    let mut parent = vec![usize::MAX; n];
    let mut queue = VecDeque::new();
    parent[root] = root;
    queue.push_back(root);

    while let Some(curr) = queue.pop_front() {
        for &(neighbor, _) in &mol.adjacency[curr] {
            if parent[neighbor] == usize::MAX && ring_atoms[neighbor] {
                parent[neighbor] = curr;
                queue.push_back(neighbor);
            }
        }
    }
    parent
}

/// Path `atom, parent(atom), ..., root` through a BFS tree.
fn path_to_root(parent: &[usize], atom: usize, root: usize) -> Option<Vec<usize>> {
    if parent[atom] == usize::MAX {
        return None;
    }
    let mut path = vec![atom];
    let mut node = atom;
    while node != root {
        node = parent[node];
        path.push(node);
    }
    Some(path)
}

/// Rotate so the smallest index comes first, then pick the direction with
/// the smaller second element.
fn normalize_ring(ring: &mut [usize]) {
    let Some((min_pos, _)) = ring.iter().enumerate().min_by_key(|&(_, &v)| v) else {
        return;
    };
    ring.rotate_left(min_pos);
    let n = ring.len();
    if n > 2 && ring[n - 1] < ring[1] {
        ring[1..].reverse();
    }
}
