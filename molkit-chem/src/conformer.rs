//! 3D coordinate container for molecular conformers.
//!
//! Stores 3D coordinates separately from the graph so that
//! [`MolAtom`](crate::molecule::MolAtom) can stay `Eq`/`Hash`.

use molkit_core::{MolkitError, Result};

use crate::linalg::{cross, dot, norm, rodrigues, sub, Matrix3x3, Vec3};

/// A single 3D conformer: one set of xyz coordinates per atom.
#[derive(Debug, Clone, PartialEq)]
pub struct Conformer {
    /// `coords[i]` is `[x, y, z]` for atom `i`.
    pub coords: Vec<[f64; 3]>,
}

impl Conformer {
    pub fn new(coords: Vec<[f64; 3]>) -> Self {
        Conformer { coords }
    }

    /// Number of atoms.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Euclidean distance between two atoms.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        norm(sub(self.coords[i], self.coords[j]))
    }

    /// Bond angle in radians between atoms i-j-k (angle at j).
    pub fn angle(&self, i: usize, j: usize, k: usize) -> f64 {
        let v1 = sub(self.coords[i], self.coords[j]);
        let v2 = sub(self.coords[k], self.coords[j]);
        let n1 = norm(v1);
        let n2 = norm(v2);
        if n1 < 1e-12 || n2 < 1e-12 {
            return 0.0;
        }
        (dot(v1, v2) / (n1 * n2)).clamp(-1.0, 1.0).acos()
    }

    /// Dihedral (torsion) angle in radians for atoms i-j-k-l, in `[0, 2π)`.
    pub fn dihedral(&self, i: usize, j: usize, k: usize, l: usize) -> f64 {
        let b1 = sub(self.coords[j], self.coords[i]);
        let b2 = sub(self.coords[k], self.coords[j]);
        let b3 = sub(self.coords[l], self.coords[k]);
        let n1 = cross(b1, b2);
        let n2 = cross(b2, b3);
        let m1 = cross(n1, b2);
        let b2_norm = norm(b2);
        if norm(n2) < 1e-12 || b2_norm < 1e-12 {
            return 0.0;
        }
        let x = dot(n1, n2);
        let y = dot(m1, n2) / b2_norm;
        (-y).atan2(-x) + std::f64::consts::PI
    }

    /// Signed volume `(b-c)·((d-c)×(e-c))` spanned by three atoms around a centre `c`.
    pub fn signed_volume(&self, center: usize, b: usize, d: usize, e: usize) -> f64 {
        let c = self.coords[center];
        dot(
            sub(self.coords[b], c),
            cross(sub(self.coords[d], c), sub(self.coords[e], c)),
        )
    }

    /// Geometric centroid of all atoms.
    pub fn centroid(&self) -> [f64; 3] {
        centroid(&self.coords)
    }

    /// Plain RMSD against another conformer, with no superposition.
    pub fn rmsd(&self, other: &Conformer) -> Result<f64> {
        check_same_len(self, other)?;
        if self.coords.is_empty() {
            return Ok(0.0);
        }
        let sum: f64 = self
            .coords
            .iter()
            .zip(other.coords.iter())
            .map(|(a, b)| {
                let d = sub(*a, *b);
                dot(d, d)
            })
            .sum();
        Ok((sum / self.coords.len() as f64).sqrt())
    }

    /// RMSD after optimal rigid superposition of `other` onto `self` (Kabsch).
    ///
    /// Uses all atoms. Works for any atom count, including the degenerate
    /// collinear and coplanar cases.
    pub fn aligned_rmsd(&self, other: &Conformer) -> Result<f64> {
        check_same_len(self, other)?;
        kabsch_rmsd(&self.coords, &other.coords)
    }

    /// Rotate the atoms in `atoms_beyond_k` about the j→k bond axis by `angle` radians.
    pub fn rotate_about_bond(&mut self, j: usize, k: usize, atoms_beyond_k: &[usize], angle: f64) {
        let axis = sub(self.coords[k], self.coords[j]);
        let axis_len = norm(axis);
        if axis_len < 1e-12 || atoms_beyond_k.is_empty() {
            return;
        }
        let axis_unit = [axis[0] / axis_len, axis[1] / axis_len, axis[2] / axis_len];
        let origin = self.coords[k];
        let (sin_a, cos_a) = angle.sin_cos();

        for &atom in atoms_beyond_k {
            let p = sub(self.coords[atom], origin);
            let rotated = rodrigues(p, axis_unit, cos_a, sin_a);
            self.coords[atom] = [
                rotated[0] + origin[0],
                rotated[1] + origin[1],
                rotated[2] + origin[2],
            ];
        }
    }

    /// Mirror through the xy plane; inverts every stereocentre.
    pub fn mirror(&mut self) {
        for p in &mut self.coords {
            p[2] = -p[2];
        }
    }

    pub(crate) fn push(&mut self, p: [f64; 3]) {
        self.coords.push(p);
    }
}

fn check_same_len(a: &Conformer, b: &Conformer) -> Result<()> {
    if a.len() != b.len() {
        return Err(MolkitError::InvalidInput(format!(
            "conformers differ in atom count: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(())
}

fn centroid(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return [0.0; 3];
    }
    let n = points.len() as f64;
    let mut c = [0.0; 3];
    for p in points {
        c[0] += p[0];
        c[1] += p[1];
        c[2] += p[2];
    }
    [c[0] / n, c[1] / n, c[2] / n]
}

/// Minimum RMSD over proper rotations and translations of `mobile` onto `reference`.
///
/// With the cross-covariance `H` and singular values `s1 ≥ s2 ≥ s3`,
/// `n·RMSD² = E0 - 2(s1 + s2 + sign(det H)·s3)`.
pub(crate) fn kabsch_rmsd(reference: &[Vec3], mobile: &[Vec3]) -> Result<f64> {
    if reference.len() != mobile.len() {
        return Err(MolkitError::InvalidInput(format!(
            "point set sizes differ: {} vs {}",
            reference.len(),
            mobile.len()
        )));
    }
    let n = reference.len();
    if n == 0 {
        return Ok(0.0);
    }

    let c1 = centroid(reference);
    let c2 = centroid(mobile);

    let mut h = Matrix3x3::zeros();
    let mut e0 = 0.0;
    for (p, q) in mobile.iter().zip(reference) {
        let p = sub(*p, c2);
        let q = sub(*q, c1);
        e0 += dot(p, p) + dot(q, q);
        for a in 0..3 {
            for b in 0..3 {
                h.data[a][b] += p[a] * q[b];
            }
        }
    }

    let hth = h.transpose().multiply(&h);
    let (eigenvalues, _) = crate::linalg::symmetric_eigen(&hth.to_rows());
    let s: Vec<f64> = eigenvalues.iter().map(|&l| l.max(0.0).sqrt()).collect();
    let sign = if h.determinant() < 0.0 { -1.0 } else { 1.0 };

    let msd = (e0 - 2.0 * (s[0] + s[1] + sign * s[2])) / n as f64;
    Ok(msd.max(0.0).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn make_triangle() -> Conformer {
        Conformer::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
    }

    fn rotate_z(c: &Conformer, angle: f64, shift: [f64; 3]) -> Conformer {
        let (s, co) = angle.sin_cos();
        Conformer::new(
            c.coords
                .iter()
                .map(|p| {
                    [
                        co * p[0] - s * p[1] + shift[0],
                        s * p[0] + co * p[1] + shift[1],
                        p[2] + shift[2],
                    ]
                })
                .collect(),
        )
    }

    #[test]
    fn distance_and_angle() {
        let c = make_triangle();
        assert!((c.distance(0, 1) - 1.0).abs() < 1e-10);
        assert!((c.distance(1, 2) - 2.0_f64.sqrt()).abs() < 1e-10);
        assert!((c.angle(1, 0, 2) - PI / 2.0).abs() < 1e-10);
    }

    #[test]
    fn dihedral_cis_is_zero() {
        let c = Conformer::new(vec![
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
        ]);
        let d = c.dihedral(0, 1, 2, 3);
        assert!(d.abs() < 0.1 || (d - 2.0 * PI).abs() < 0.1, "got {d}");
    }

    #[test]
    fn centroid_basic() {
        let ctr = make_triangle().centroid();
        assert!((ctr[0] - 1.0 / 3.0).abs() < 1e-10);
        assert!((ctr[1] - 1.0 / 3.0).abs() < 1e-10);
        assert!(ctr[2].abs() < 1e-10);
    }

    #[test]
    fn plain_rmsd() {
        let c1 = Conformer::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let c2 = Conformer::new(vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        assert!((c1.rmsd(&c2).unwrap() - 0.5_f64.sqrt()).abs() < 1e-10);
        assert!(c1.rmsd(&Conformer::new(vec![[0.0; 3]])).is_err());
    }

    #[test]
    fn aligned_rmsd_ignores_rigid_motion() {
        let c = Conformer::new(vec![
            [0.0, 0.0, 0.0],
            [1.5, 0.0, 0.0],
            [2.0, 1.4, 0.0],
            [3.5, 1.4, 0.3],
            [4.0, 2.8, -0.5],
        ]);
        let moved = rotate_z(&c, 1.1, [3.0, -2.0, 5.0]);
        assert!(c.rmsd(&moved).unwrap() > 1.0);
        let r = c.aligned_rmsd(&moved).unwrap();
        assert!(r < 1e-6, "rmsd after superposition = {r}");
    }

    #[test]
    fn aligned_rmsd_does_not_reflect() {
        // A chiral tetrahedron and its mirror image cannot be superposed.
        let c = Conformer::new(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.5, 0.0],
            [0.0, 0.0, 2.0],
        ]);
        let mut m = c.clone();
        m.mirror();
        assert!(c.aligned_rmsd(&m).unwrap() > 0.1);
    }

    #[test]
    fn aligned_rmsd_degenerate_sizes() {
        let one = Conformer::new(vec![[1.0, 2.0, 3.0]]);
        let other = Conformer::new(vec![[-4.0, 0.0, 9.0]]);
        assert!(one.aligned_rmsd(&other).unwrap() < 1e-12);

        let a = Conformer::new(vec![[0.0; 3], [1.0, 0.0, 0.0]]);
        let b = Conformer::new(vec![[5.0, 5.0, 5.0], [5.0, 6.0, 5.0]]);
        assert!(a.aligned_rmsd(&b).unwrap() < 1e-6);

        // collinear, different spacing: 0.5 Å stretch split over both ends
        let c = Conformer::new(vec![[0.0; 3], [2.0, 0.0, 0.0]]);
        assert!((a.aligned_rmsd(&c).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rotate_about_bond_preserves_distances() {
        let mut c = Conformer::new(vec![
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0],
            [1.5, 0.0, 0.0],
            [1.5, 1.0, 0.0],
        ]);
        let before = c.distance(2, 3);
        c.rotate_about_bond(1, 2, &[3], PI);
        assert!((c.distance(2, 3) - before).abs() < 1e-10);
        let d = c.dihedral(0, 1, 2, 3);
        assert!((d - PI).abs() < 1e-6, "trans after half turn, got {d}");
    }

    #[test]
    fn mirror_flips_signed_volume() {
        let mut c = Conformer::new(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ]);
        let v = c.signed_volume(0, 1, 2, 3);
        c.mirror();
        assert!((c.signed_volume(0, 1, 2, 3) + v).abs() < 1e-12);
    }
}
