//! 3D coordinate embedding via distance geometry and ETKDG-style torsion
//! preferences.
//!
//! Generates 3D conformers from molecular connectivity using:
//! 1. Distance geometry (DG): bounds matrix → triangle smoothing → random
//!    distances → metric matrix eigendecomposition
//! 2. Refinement against the bounds, the chirality tags and the planarity
//!    of sp2 centres and double bonds
//! 3. ETKDG-style torsion angle preferences
//! 4. Optional force-field minimization
//!
//! Every random choice comes from a seeded xorshift generator, so the same
//! molecule and seed always give the same coordinates.

use log::debug;
use molkit_core::{MolkitError, Result};

use crate::conformer::Conformer;
use crate::element::covalent_radius;
use crate::forcefield::{self, ForceField, MinimizeConfig, MinimizeMethod};
use crate::linalg::{cross, dot, symmetric_eigen, Vec3};
use crate::molecule::{BondOrder, Molecule};
use crate::ring::RingInfo;
use crate::stereo::{signed_volume, StereoConstraints};
use crate::valence::{hybridization, Hybridization};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for 3D embedding.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmbedConfig {
    /// Random seed for reproducibility.
    pub random_seed: u64,
    /// Use ETKDG torsion angle preferences.
    pub use_torsion_prefs: bool,
    /// Force field for post-embedding optimization.
    pub force_field: Option<ForceField>,
    /// Max steps for force-field minimization (0 = skip).
    pub max_minimize_steps: usize,
    /// Iterations of bounds refinement after the eigendecomposition.
    pub refine_steps: usize,
    /// Fresh random starts tried before giving up on one conformer.
    pub max_attempts: usize,
    /// Drop candidates closer than this aligned RMSD (Å) to an accepted one
    /// in [`embed_multiple`].
    pub rmsd_threshold: Option<f64>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        EmbedConfig {
            random_seed: 42,
            use_torsion_prefs: true,
            force_field: Some(ForceField::Uff),
            max_minimize_steps: 200,
            refine_steps: 400,
            max_attempts: 10,
            rmsd_threshold: None,
        }
    }
}

/// Van der Waals radii for lower distance bounds between non-bonded atoms.
fn vdw_radius(atomic_number: u8) -> f64 {
    match atomic_number {
        1 => 1.20,
        6 => 1.70,
        7 => 1.55,
        8 => 1.52,
        9 => 1.47,
        15 => 1.80,
        16 => 1.80,
        17 => 1.75,
        35 => 1.85,
        53 => 1.98,
        _ => 1.70,
    }
}

// ---------------------------------------------------------------------------
// ETKDG torsion preferences
// ---------------------------------------------------------------------------

/// Preferred torsion angles (radians) by hybridization of atoms j and k.
fn preferred_torsions(is_sp2_j: bool, is_sp2_k: bool) -> &'static [f64] {
    use std::f64::consts::PI;
    match (is_sp2_j, is_sp2_k) {
        // sp3-sp3: gauche+, anti, gauche-
        (false, false) => &[PI / 3.0, PI, 5.0 * PI / 3.0],
        // anything conjugated: syn, anti
        _ => &[0.0, PI],
    }
}

fn is_sp2_atom(mol: &Molecule, idx: usize) -> bool {
    mol.atoms[idx].is_aromatic || hybridization(mol, idx) == Hybridization::Sp2
}

// ---------------------------------------------------------------------------
// Restraints
// ---------------------------------------------------------------------------

/// Everything refinement pulls the coordinates towards.
struct Restraints {
    lower: Vec<Vec<f64>>,
    upper: Vec<Vec<f64>>,
    stereo: StereoConstraints,
    /// A centre and three atoms that must stay coplanar with it.
    planes: Vec<(usize, [usize; 3])>,
}

impl Restraints {
    fn new(mol: &Molecule) -> Self {
        let stereo = StereoConstraints::from_molecule(mol);
        let (lower, upper) = build_bounds_matrix(mol, &stereo);
        let (lower, upper) = smooth_bounds(lower, upper, mol.atom_count());
        Restraints {
            lower,
            upper,
            stereo,
            planes: planar_groups(mol),
        }
    }
}

/// Trigonal sp2 centres with their three neighbours, and every
/// `i-j=k-l` quadruple across a double bond.
fn planar_groups(mol: &Molecule) -> Vec<(usize, [usize; 3])> {
    let mut planes = Vec::new();
    for j in 0..mol.atom_count() {
        if let [a, b, c] = mol.neighbors(j)[..] {
            if is_sp2_atom(mol, j) {
                planes.push((j, [a, b, c]));
            }
        }
    }
    for bond in mol.bonds.iter().filter(|b| b.order == BondOrder::Double) {
        let (j, k) = (bond.atom1, bond.atom2);
        for i in mol.neighbors(j).into_iter().filter(|&i| i != k) {
            for l in mol.neighbors(k).into_iter().filter(|&l| l != j && l != i) {
                planes.push((j, [i, k, l]));
            }
        }
    }
    planes
}

// ---------------------------------------------------------------------------
// Distance geometry embedding
// ---------------------------------------------------------------------------

/// Embed a single 3D conformer using distance geometry.
///
/// Retries with fresh random distances up to `config.max_attempts` times;
/// fails with [`MolkitError::Computation`] when no attempt reproduces the
/// molecule's tetrahedral and double-bond stereochemistry with finite
/// coordinates.
pub fn embed_molecule(mol: &Molecule, config: &EmbedConfig) -> Result<Conformer> {
    let n = mol.atom_count();
    if n == 0 {
        return Ok(Conformer::new(Vec::new()));
    }
    if n == 1 {
        return Ok(Conformer::new(vec![[0.0, 0.0, 0.0]]));
    }

    let restraints = Restraints::new(mol);
    let mut rng = SimpleRng::new(config.random_seed);

    for attempt in 0..config.max_attempts.max(1) {
        if let Some(conf) = embed_attempt(mol, &restraints, config, &mut rng) {
            debug!("embedded '{}' ({n} atoms) on attempt {}", mol.name, attempt + 1);
            return Ok(conf);
        }
    }
    Err(MolkitError::Computation(format!(
        "could not embed '{}' in {} attempts",
        mol.name,
        config.max_attempts.max(1)
    )))
}

fn embed_attempt(
    mol: &Molecule,
    restraints: &Restraints,
    config: &EmbedConfig,
    rng: &mut SimpleRng,
) -> Option<Conformer> {
    let n = mol.atom_count();
    let stereo = &restraints.stereo;
    let mut conf = Conformer::new(embed_from_bounds(&restraints.lower, &restraints.upper, n, rng)?);

    // a mirror image fixes every centre at once
    if 2 * stereo.wrong_centers(&conf.coords) > stereo.centers.len() {
        conf.mirror();
    }
    refine(&mut conf.coords, restraints, config.refine_steps);
    if stereo.violations(&conf.coords) > 0 {
        return None;
    }

    if config.use_torsion_prefs {
        apply_torsion_preferences(mol, &mut conf);
    }

    if let Some(field) = config.force_field.filter(|_| config.max_minimize_steps > 0) {
        let min_config = MinimizeConfig {
            max_steps: config.max_minimize_steps,
            gradient_threshold: 0.5,
            method: MinimizeMethod::ConjugateGradient,
        };
        match forcefield::minimize(mol, &conf, field, &min_config) {
            Ok(r) if stereo.violations(&r.conformer.coords) == 0 => conf = r.conformer,
            Ok(_) => debug!("{field} minimisation changed a stereo configuration; keeping the unminimised geometry"),
            Err(e) => debug!("{field} minimisation failed: {e}"),
        }
    }

    let finite = conf.coords.iter().all(|p| p.iter().all(|x| x.is_finite()));
    finite.then_some(conf)
}

/// Embed `count` conformers, varying the seed per trial.
///
/// Conformers come back in generation order. With `rmsd_threshold` set,
/// candidates too close to an accepted conformer are skipped.
pub fn embed_multiple(mol: &Molecule, count: usize, config: &EmbedConfig) -> Result<Vec<Conformer>> {
    if count == 0 {
        return Err(MolkitError::InvalidInput("conformer count must be at least 1".into()));
    }
    let mut accepted: Vec<Conformer> = Vec::with_capacity(count);
    let attempts = count * 3 + 5;

    for trial in 0..attempts {
        if accepted.len() >= count {
            break;
        }
        let trial_config = EmbedConfig {
            random_seed: config.random_seed.wrapping_add(trial as u64 * 97),
            ..config.clone()
        };
        let conf = match embed_molecule(mol, &trial_config) {
            Ok(c) => c,
            Err(e) => {
                debug!("conformer trial {trial} failed: {e}");
                continue;
            }
        };
        if let Some(threshold) = config.rmsd_threshold {
            let is_unique = accepted
                .iter()
                .all(|existing| existing.aligned_rmsd(&conf).map_or(true, |r| r > threshold));
            if !is_unique {
                continue;
            }
        }
        accepted.push(conf);
    }

    if accepted.len() < count {
        return Err(MolkitError::Computation(format!(
            "generated {} of {count} conformers for '{}'",
            accepted.len(),
            mol.name
        )));
    }
    Ok(accepted)
}

// ---------------------------------------------------------------------------
// Bounds matrix construction
// ---------------------------------------------------------------------------

fn bond_length(mol: &Molecule, a: usize, b: usize, order: BondOrder) -> f64 {
    let bo_adj = match order {
        BondOrder::Single => 0.0,
        BondOrder::Aromatic => -0.04,
        BondOrder::Double => -0.10,
        BondOrder::Triple => -0.16,
    };
    covalent_radius(mol.atoms[a].atomic_number) + covalent_radius(mol.atoms[b].atomic_number) + bo_adj
}

/// Ideal i-j-k angle: small rings force their interior angle, otherwise
/// the hybridization of j decides.
fn ideal_angle(mol: &Molecule, rings: &RingInfo, i: usize, j: usize, k: usize) -> f64 {
    let ring_size = rings
        .rings
        .iter()
        .filter(|r| r.contains(&i) && r.contains(&j) && r.contains(&k))
        .map(Vec::len)
        .min();
    match ring_size {
        Some(s) if s <= 5 => ((s as f64 - 2.0) * 180.0 / s as f64).to_radians(),
        Some(6) if mol.atoms[j].is_aromatic => 120f64.to_radians(),
        _ => hybridization(mol, j).bond_angle(),
    }
}

fn set_bounds(lower: &mut [Vec<f64>], upper: &mut [Vec<f64>], a: usize, b: usize, lo: f64, hi: f64) {
    lower[a][b] = lo;
    lower[b][a] = lo;
    upper[a][b] = hi;
    upper[b][a] = hi;
}

fn build_bounds_matrix(mol: &Molecule, stereo: &StereoConstraints) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let n = mol.atom_count();
    let rings = RingInfo::new(mol);
    let far = 2.0 * n as f64 + 5.0;
    let mut lower = vec![vec![0.0_f64; n]; n];
    let mut upper = vec![vec![far; n]; n];
    let mut length = vec![vec![0.0_f64; n]; n];

    // 1-2 distances: from covalent radii
    for bond in &mol.bonds {
        let (a1, a2) = (bond.atom1, bond.atom2);
        let d = bond_length(mol, a1, a2, bond.order);
        length[a1][a2] = d;
        length[a2][a1] = d;
        set_bounds(&mut lower, &mut upper, a1, a2, d - 0.01, d + 0.01);
    }

    // 1-3 distances: law of cosines over the ideal angle
    for j in 0..n {
        let neighbors = &mol.adjacency[j];
        for a in 0..neighbors.len() {
            for b in (a + 1)..neighbors.len() {
                let (i, k) = (neighbors[a].0, neighbors[b].0);
                if mol.bond_index(i, k).is_some() {
                    continue;
                }
                let angle = ideal_angle(mol, &rings, i, j, k);
                let (d_ij, d_jk) = (length[i][j], length[j][k]);
                let d13 = (d_ij * d_ij + d_jk * d_jk - 2.0 * d_ij * d_jk * angle.cos()).sqrt();
                set_bounds(&mut lower, &mut upper, i, k, d13 - 0.04, d13 + 0.04);
            }
        }
    }

    // 1-4 distances: between the cis and trans extremes, or pinned when the
    // torsion is fixed by a stereo double bond or a planar ring
    for (bi, bond) in mol.bonds.iter().enumerate() {
        let (j, k) = (bond.atom1, bond.atom2);
        let configured = stereo.double_bonds.iter().find(|d| d.joins(j, k));
        for &(i, _) in &mol.adjacency[j] {
            if i == k {
                continue;
            }
            for &(l, _) in &mol.adjacency[k] {
                if l == j || l == i || lower[i][l] > 0.0 {
                    continue;
                }
                let theta1 = ideal_angle(mol, &rings, i, j, k);
                let theta2 = ideal_angle(mol, &rings, j, k, l);
                let d_cis = torsion_distance(length[i][j], length[j][k], length[k][l], theta1, theta2, 0.0);
                let d_trans = torsion_distance(
                    length[i][j],
                    length[j][k],
                    length[k][l],
                    theta1,
                    theta2,
                    std::f64::consts::PI,
                );

                // around a planar ring bond, substituents on the same side of
                // the ring are cis
                let ring_bond = rings.is_bond_in_ring(bi);
                let ring_side = |x: usize, y: usize| {
                    rings.rings.iter().any(|r| r.contains(&x) && r.contains(&j) && r.contains(&k))
                        == rings.rings.iter().any(|r| r.contains(&y) && r.contains(&j) && r.contains(&k))
                };
                let planar_ring = || if ring_side(i, l) { d_cis } else { d_trans };
                let pinned = match (bond.order, configured) {
                    (BondOrder::Double, Some(d)) => Some(if d.is_cis(i, j, l) { d_cis } else { d_trans }),
                    (BondOrder::Double | BondOrder::Aromatic, None) if ring_bond => Some(planar_ring()),
                    _ => None,
                };
                match pinned {
                    Some(d) => set_bounds(&mut lower, &mut upper, i, l, d - 0.1, d + 0.1),
                    None => set_bounds(&mut lower, &mut upper, i, l, d_cis - 0.1, d_trans + 0.1),
                }
            }
        }
    }

    // Non-bonded lower bounds from vdW radii (for atoms with no other constraints)
    for i in 0..n {
        for j in (i + 1)..n {
            if lower[i][j] <= 0.0 {
                let vdw_sum = vdw_radius(mol.atoms[i].atomic_number) + vdw_radius(mol.atoms[j].atomic_number);
                lower[i][j] = vdw_sum * 0.7;
                lower[j][i] = lower[i][j];
            }
        }
    }

    (lower, upper)
}

/// i-l distance for bond lengths ij, jk, kl, angles at j and k, and torsion phi.
fn torsion_distance(d_ij: f64, d_jk: f64, d_kl: f64, theta1: f64, theta2: f64, phi: f64) -> f64 {
    let i = [d_ij * theta1.cos(), d_ij * theta1.sin(), 0.0];
    let l = [
        d_jk - d_kl * theta2.cos(),
        d_kl * theta2.sin() * phi.cos(),
        d_kl * theta2.sin() * phi.sin(),
    ];
    ((l[0] - i[0]).powi(2) + (l[1] - i[1]).powi(2) + (l[2] - i[2]).powi(2)).sqrt()
}

/// Floyd-Warshall triangle inequality smoothing.
fn smooth_bounds(
    mut lower: Vec<Vec<f64>>,
    mut upper: Vec<Vec<f64>>,
    n: usize,
) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    // Upper bounds: u[i][j] ≤ u[i][k] + u[k][j]
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                if i == j || i == k || j == k {
                    continue;
                }
                let sum = upper[i][k] + upper[k][j];
                if sum < upper[i][j] {
                    upper[i][j] = sum;
                }
            }
        }
    }

    // Lower bounds: l[i][j] ≥ l[i][k] - u[k][j]
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                if i == j || i == k || j == k {
                    continue;
                }
                let diff = lower[i][k] - upper[k][j];
                if diff > lower[i][j] {
                    lower[i][j] = diff;
                }
            }
        }
    }

    // Ensure lower ≤ upper
    for i in 0..n {
        for j in 0..n {
            if lower[i][j] > upper[i][j] {
                let avg = (lower[i][j] + upper[i][j]) / 2.0;
                lower[i][j] = avg;
                upper[i][j] = avg;
            }
            lower[i][j] = lower[i][j].max(0.0);
        }
    }

    (lower, upper)
}

/// Random distances within the bounds, turned into coordinates through the
/// centroid metric matrix. `None` when the matrix has no positive eigenvalue.
fn embed_from_bounds(lower: &[Vec<f64>], upper: &[Vec<f64>], n: usize, rng: &mut SimpleRng) -> Option<Vec<Vec3>> {
    let mut d2 = vec![vec![0.0_f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let lo = lower[i][j].max(0.001);
            let hi = upper[i][j].max(lo);
            let d = lo + rng.next_f64() * (hi - lo);
            d2[i][j] = d * d;
            d2[j][i] = d * d;
        }
    }

    // squared distance of each point from the centroid
    let nf = n as f64;
    let total: f64 = (0..n).flat_map(|i| ((i + 1)..n).map(move |j| (i, j))).map(|(i, j)| d2[i][j]).sum();
    let d0: Vec<f64> = (0..n)
        .map(|i| d2[i].iter().sum::<f64>() / nf - total / (nf * nf))
        .collect();
    let g: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| 0.5 * (d0[i] + d0[j] - d2[i][j])).collect())
        .collect();

    let (values, vectors) = symmetric_eigen(&g);
    if values.first().map_or(true, |&v| v <= 0.0) {
        return None;
    }
    let mut coords = vec![[0.0_f64; 3]; n];
    for dim in 0..3 {
        match values.get(dim) {
            Some(&lambda) if lambda > 1e-8 => {
                let s = lambda.sqrt();
                for i in 0..n {
                    coords[i][dim] = vectors[dim][i] * s;
                }
            }
            // flat direction: a little noise lets refinement leave the plane
            _ => {
                for c in coords.iter_mut() {
                    c[dim] = rng.next_f64() - 0.5;
                }
            }
        }
    }
    Some(coords)
}

// ---------------------------------------------------------------------------
// Refinement
// ---------------------------------------------------------------------------

const CHIRAL_VOLUME: f64 = 0.5;
const PLANAR_WEIGHT: f64 = 1.0;

/// Atoms moved by the volume over `n` around `center`, with the partial
/// derivative of the volume for each; the centre takes minus their sum.
fn volume_partials(coords: &[Vec3], center: usize, n: [usize; 3]) -> [(usize, Vec3); 3] {
    let c = coords[center];
    let v = |x: usize| [coords[x][0] - c[0], coords[x][1] - c[1], coords[x][2] - c[2]];
    let (va, vb, vd) = (v(n[0]), v(n[1]), v(n[2]));
    [(n[0], cross(vb, vd)), (n[1], cross(vd, va)), (n[2], cross(va, vb))]
}

fn add_volume_gradient(g: &mut [Vec3], coords: &[Vec3], center: usize, n: [usize; 3], factor: f64) {
    for (atom, p) in volume_partials(coords, center, n) {
        for k in 0..3 {
            g[atom][k] += factor * p[k];
            g[center][k] -= factor * p[k];
        }
    }
}

/// Bound violations, chirality violations and out-of-plane volumes, and
/// their gradient.
fn bounds_error(coords: &[Vec3], restraints: &Restraints, grad: Option<&mut Vec<Vec3>>) -> f64 {
    let (lower, upper) = (&restraints.lower, &restraints.upper);
    let n = coords.len();
    let mut err = 0.0;
    let mut g = grad;
    if let Some(g) = g.as_deref_mut() {
        g.iter_mut().for_each(|v| *v = [0.0; 3]);
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let diff = [
                coords[i][0] - coords[j][0],
                coords[i][1] - coords[j][1],
                coords[i][2] - coords[j][2],
            ];
            let r2 = dot(diff, diff);
            let (u2, l2) = (upper[i][j] * upper[i][j], lower[i][j] * lower[i][j]);
            // d(err)/d(r²)
            let de = if r2 > u2 && u2 > 0.0 {
                let t = r2 / u2 - 1.0;
                err += t * t;
                2.0 * t / u2
            } else if r2 < l2 {
                let t = 2.0 * l2 / (l2 + r2) - 1.0;
                err += t * t;
                2.0 * t * (-2.0 * l2 / ((l2 + r2) * (l2 + r2)))
            } else {
                continue;
            };
            if let Some(g) = g.as_deref_mut() {
                for d in 0..3 {
                    g[i][d] += de * 2.0 * diff[d];
                    g[j][d] -= de * 2.0 * diff[d];
                }
            }
        }
    }

    for s in &restraints.stereo.centers {
        let vol = s.sign * s.volume(coords);
        if vol >= CHIRAL_VOLUME {
            continue;
        }
        let t = CHIRAL_VOLUME - vol;
        err += t * t;
        if let Some(g) = g.as_deref_mut() {
            add_volume_gradient(g, coords, s.center, s.neighbors, -2.0 * t * s.sign);
        }
    }

    for &(center, around) in &restraints.planes {
        let vol = signed_volume(coords, center, around);
        err += PLANAR_WEIGHT * vol * vol;
        if let Some(g) = g.as_deref_mut() {
            add_volume_gradient(g, coords, center, around, 2.0 * PLANAR_WEIGHT * vol);
        }
    }
    err
}

/// Adaptive steepest descent on [`bounds_error`].
fn refine(coords: &mut Vec<Vec3>, restraints: &Restraints, steps: usize) {
    let n = coords.len();
    let mut grad = vec![[0.0; 3]; n];
    let mut step = 0.1;
    let mut err = bounds_error(coords, restraints, Some(&mut grad));

    for _ in 0..steps {
        if err < 1e-8 {
            break;
        }
        let gmax = grad.iter().map(|g| dot(*g, *g).sqrt()).fold(0.0, f64::max);
        if gmax < 1e-12 {
            break;
        }
        let alpha = step / gmax;
        let trial: Vec<Vec3> = coords
            .iter()
            .zip(&grad)
            .map(|(x, g)| [x[0] - alpha * g[0], x[1] - alpha * g[1], x[2] - alpha * g[2]])
            .collect();
        let trial_err = bounds_error(&trial, restraints, None);
        if trial_err < err {
            *coords = trial;
            err = bounds_error(coords, restraints, Some(&mut grad));
            step = (step * 1.2).min(0.5);
        } else {
            step *= 0.5;
            if step < 1e-6 {
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Torsion preferences
// ---------------------------------------------------------------------------

/// Apply ETKDG torsion angle preferences to rotatable bonds.
fn apply_torsion_preferences(mol: &Molecule, conf: &mut Conformer) {
    let rings = RingInfo::new(mol);

    for (bi, bond) in mol.bonds.iter().enumerate() {
        // Only rotatable acyclic single bonds between non-terminal atoms
        if bond.order != BondOrder::Single || rings.is_bond_in_ring(bi) {
            continue;
        }
        let (j, k) = (bond.atom1, bond.atom2);
        if mol.degree(j) < 2 || mol.degree(k) < 2 {
            continue;
        }

        let prefs = preferred_torsions(is_sp2_atom(mol, j), is_sp2_atom(mol, k));
        let atoms_beyond_k = find_atoms_beyond(mol, k, j);

        let i = mol.adjacency[j].iter().map(|&(a, _)| a).find(|&a| a != k);
        let l = mol.adjacency[k].iter().map(|&(a, _)| a).find(|&a| a != j);
        let (Some(i), Some(l)) = (i, l) else {
            continue;
        };

        let current = conf.dihedral(i, j, k, l);
        let nearest = prefs
            .iter()
            .copied()
            .min_by(|&a, &b| angle_diff(current, a).abs().total_cmp(&angle_diff(current, b).abs()))
            .unwrap_or(current);

        let rotation = angle_diff(current, nearest);
        if rotation.abs() > 0.05 {
            conf.rotate_about_bond(j, k, &atoms_beyond_k, rotation);
            // the rotation sense depends on the dihedral convention; undo a wrong guess
            if angle_diff(conf.dihedral(i, j, k, l), nearest).abs() > 1e-3 {
                conf.rotate_about_bond(j, k, &atoms_beyond_k, -2.0 * rotation);
            }
        }
    }
}

/// Find all atoms reachable from `start` without going through `exclude`.
fn find_atoms_beyond(mol: &Molecule, start: usize, exclude: usize) -> Vec<usize> {
    let mut visited = vec![false; mol.atom_count()];
    visited[exclude] = true;
    let mut stack = vec![start];
    let mut result = Vec::new();

    while let Some(atom) = stack.pop() {
        if visited[atom] {
            continue;
        }
        visited[atom] = true;
        result.push(atom);
        for &(nb, _) in &mol.adjacency[atom] {
            if !visited[nb] {
                stack.push(nb);
            }
        }
    }
    result
}

/// Signed difference `b - a` wrapped into `(-π, π]`.
fn angle_diff(a: f64, b: f64) -> f64 {
    use std::f64::consts::PI;
    let mut d = b - a;
    while d > PI {
        d -= 2.0 * PI;
    }
    while d <= -PI {
        d += 2.0 * PI;
    }
    d
}

// ---------------------------------------------------------------------------
// Simple RNG (xorshift64)
// ---------------------------------------------------------------------------

struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        SimpleRng {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrogens::add_hydrogens;
    use crate::smiles::parse_smiles;

    fn with_hydrogens(smiles: &str) -> Molecule {
        let mut mol = parse_smiles(smiles).unwrap();
        add_hydrogens(&mut mol);
        mol
    }

    fn fast() -> EmbedConfig {
        EmbedConfig {
            max_minimize_steps: 50,
            ..EmbedConfig::default()
        }
    }

    #[test]
    fn embed_ethane_bond_lengths() {
        let mol = with_hydrogens("CC");
        let conf = embed_molecule(&mol, &fast()).unwrap();
        assert_eq!(conf.len(), 8);
        let cc = conf.distance(0, 1);
        assert!(cc > 1.3 && cc < 1.8, "C-C distance = {cc}");
        for h in 2..8 {
            let parent = mol.neighbors(h)[0];
            let d = conf.distance(parent, h);
            assert!(d > 0.9 && d < 1.3, "C-H distance = {d}");
        }
    }

    #[test]
    fn embed_trivial_sizes() {
        let empty = Molecule::new(String::new(), vec![], vec![]);
        assert!(embed_molecule(&empty, &EmbedConfig::default()).unwrap().is_empty());
        let atom = parse_smiles("[Ar]").unwrap();
        assert_eq!(embed_molecule(&atom, &EmbedConfig::default()).unwrap().len(), 1);
    }

    #[test]
    fn embed_deterministic() {
        let mol = with_hydrogens("CCO");
        let config = EmbedConfig {
            random_seed: 123,
            ..fast()
        };
        let c1 = embed_molecule(&mol, &config).unwrap();
        let c2 = embed_molecule(&mol, &config).unwrap();
        assert_eq!(c1, c2);
        let other = embed_molecule(&mol, &EmbedConfig { random_seed: 124, ..config }).unwrap();
        assert_ne!(c1, other);
    }

    #[test]
    fn embed_without_forcefield() {
        let mol = with_hydrogens("CCO");
        let config = EmbedConfig {
            force_field: None,
            ..EmbedConfig::default()
        };
        let conf = embed_molecule(&mol, &config).unwrap();
        assert_eq!(conf.len(), mol.atom_count());
        assert!(conf.coords.iter().flatten().all(|x| x.is_finite()));
    }

    #[test]
    fn tetrahedral_tags_are_reproduced() {
        for smi in ["F[C@H](Cl)Br", "F[C@@H](Cl)Br", "C[C@@H](O)C(=O)O"] {
            let mol = with_hydrogens(smi);
            let stereo = StereoConstraints::from_molecule(&mol);
            assert_eq!(stereo.centers.len(), 1, "{smi}");
            let conf = embed_molecule(&mol, &fast()).unwrap();
            assert_eq!(stereo.violations(&conf.coords), 0, "{smi}");
        }
    }

    #[test]
    fn enantiomers_are_mirror_images() {
        let a = with_hydrogens("F[C@H](Cl)Br");
        let b = with_hydrogens("F[C@@H](Cl)Br");
        let ca = embed_molecule(&a, &fast()).unwrap();
        let cb = embed_molecule(&b, &fast()).unwrap();
        let s = StereoConstraints::from_molecule(&a).centers[0].clone();
        let va = s.volume(&ca.coords);
        let vb = s.volume(&cb.coords);
        assert!(va * vb < 0.0, "volumes {va} and {vb}");
    }

    #[test]
    fn double_bond_geometry_follows_directions() {
        let trans = with_hydrogens("F/C=C/F");
        let cis = with_hydrogens("F/C=C\\F");
        let trans_conf = embed_molecule(&trans, &fast()).unwrap();
        let cis_conf = embed_molecule(&cis, &fast()).unwrap();
        let d_trans = trans_conf.distance(0, 3);
        let d_cis = cis_conf.distance(0, 3);
        assert!(d_trans > 3.2, "trans F-F = {d_trans}");
        assert!(d_cis < 3.2, "cis F-F = {d_cis}");

        let phi_trans = angle_diff(trans_conf.dihedral(0, 1, 2, 3), std::f64::consts::PI).abs();
        let phi_cis = angle_diff(cis_conf.dihedral(0, 1, 2, 3), 0.0).abs();
        assert!(phi_trans < 30f64.to_radians(), "trans torsion off by {}", phi_trans.to_degrees());
        assert!(phi_cis < 30f64.to_radians(), "cis torsion off by {}", phi_cis.to_degrees());
    }

    #[test]
    fn cis_survives_force_field_polish() {
        for field in [ForceField::Uff, ForceField::Mmff94] {
            let mol = with_hydrogens("C/C=C\\C");
            let config = EmbedConfig {
                force_field: Some(field),
                ..EmbedConfig::default()
            };
            let conf = embed_molecule(&mol, &config).unwrap();
            assert_eq!(StereoConstraints::from_molecule(&mol).violations(&conf.coords), 0);
            let phi = angle_diff(conf.dihedral(0, 1, 2, 3), 0.0).abs();
            assert!(phi < 30f64.to_radians(), "{field}: torsion {}", phi.to_degrees());
        }
    }

    #[test]
    fn hydrogens_across_a_stereo_bond_are_pinned() {
        let mol = with_hydrogens("F/C=C\\F");
        let stereo = StereoConstraints::from_molecule(&mol);
        let (lower, upper) = build_bounds_matrix(&mol, &stereo);
        let h1 = mol.neighbors(1).into_iter().find(|&a| mol.atoms[a].is_hydrogen()).unwrap();
        let h2 = mol.neighbors(2).into_iter().find(|&a| mol.atoms[a].is_hydrogen()).unwrap();
        // cis fluorines put the hydrogens cis as well, and each F trans to the far H
        assert!(upper[h1][h2] - lower[h1][h2] < 0.25);
        assert!(upper[h1][h2] < 2.8);
        assert!(lower[0][h2] > 2.9);
    }

    #[test]
    fn planar_groups_cover_sp2_centres() {
        let mol = with_hydrogens("C=O");
        let planes = planar_groups(&mol);
        assert!(planes.iter().any(|&(c, _)| c == 0));
        let ethane = with_hydrogens("CC");
        assert!(planar_groups(&ethane).is_empty());
    }

    #[test]
    fn benzene_is_flat() {
        let mol = with_hydrogens("c1ccccc1");
        let conf = embed_molecule(&mol, &fast()).unwrap();
        for start in 0..6 {
            let ring: Vec<usize> = (0..4).map(|k| (start + k) % 6).collect();
            let phi = conf.dihedral(ring[0], ring[1], ring[2], ring[3]);
            let off_plane = angle_diff(phi, 0.0).abs();
            assert!(off_plane < 20f64.to_radians(), "ring torsion {}", phi.to_degrees());
        }
    }

    #[test]
    fn disconnected_fragments_stay_close() {
        let mol = parse_smiles("[Na+].[Cl-]").unwrap();
        let conf = embed_molecule(&mol, &fast()).unwrap();
        let d = conf.distance(0, 1);
        assert!(d.is_finite() && d < 20.0, "fragment distance {d}");
    }

    #[test]
    fn embed_multiple_conformers() {
        let mol = with_hydrogens("CCCC");
        let confs = embed_multiple(&mol, 3, &fast()).unwrap();
        assert_eq!(confs.len(), 3);
        assert!(confs.iter().all(|c| c.len() == mol.atom_count()));
        assert!(confs[0] != confs[1]);
        assert!(matches!(
            embed_multiple(&mol, 0, &fast()),
            Err(MolkitError::InvalidInput(_))
        ));
    }

    #[test]
    fn bounds_matrix_basic() {
        let mol = parse_smiles("CCC").unwrap();
        let (lower, upper) = build_bounds_matrix(&mol, &StereoConstraints::default());
        assert!(lower[0][1] > 1.4 && upper[0][1] < 1.6);
        // 1-3 distance for a tetrahedral angle with 1.52 Å bonds
        assert!(lower[0][2] > 2.3 && upper[0][2] < 2.6);
        for i in 0..3 {
            for j in 0..3 {
                assert!(lower[i][j] <= upper[i][j]);
            }
        }
    }

    #[test]
    fn torsion_distance_extremes() {
        let t = 109.47f64.to_radians();
        let cis = torsion_distance(1.5, 1.5, 1.5, t, t, 0.0);
        let trans = torsion_distance(1.5, 1.5, 1.5, t, t, std::f64::consts::PI);
        assert!(cis < trans);
        assert!((trans - 3.8).abs() < 0.1, "anti distance {trans}");
    }

    #[test]
    fn simple_rng_deterministic() {
        let mut rng1 = SimpleRng::new(42);
        let mut rng2 = SimpleRng::new(42);
        for _ in 0..10 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn simple_rng_range() {
        let mut rng = SimpleRng::new(12345);
        for _ in 0..100 {
            let f = rng.next_f64();
            assert!((0.0..1.0).contains(&f), "out of range: {f}");
        }
    }
}
