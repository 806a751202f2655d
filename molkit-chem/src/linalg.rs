//! Small dense linear algebra: 3-vectors, a 3x3 matrix and a Jacobi
//! eigen-solver for symmetric matrices.

pub(crate) type Vec3 = [f64; 3];

pub(crate) fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub(crate) fn scale(a: Vec3, s: f64) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

pub(crate) fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn norm(v: Vec3) -> f64 {
    dot(v, v).sqrt()
}

/// Unit vector along `v`, or `None` for a (near) zero vector.
pub(crate) fn normalize(v: Vec3) -> Option<Vec3> {
    let n = norm(v);
    if n < 1e-12 {
        None
    } else {
        Some(scale(v, 1.0 / n))
    }
}

/// Any unit vector perpendicular to `v` (assumed non-zero).
pub(crate) fn perpendicular(v: Vec3) -> Vec3 {
    let trial = if v[0].abs() < 0.9 { [1.0, 0.0, 0.0] } else { [0.0, 1.0, 0.0] };
    normalize(cross(v, trial)).unwrap_or([0.0, 0.0, 1.0])
}

/// Rodrigues' rotation of `v` about unit axis `k` by an angle given as (cos, sin).
pub(crate) fn rodrigues(v: Vec3, k: Vec3, cos_a: f64, sin_a: f64) -> Vec3 {
    let dot_kv = dot(k, v);
    let cross_kv = cross(k, v);
    [
        v[0] * cos_a + cross_kv[0] * sin_a + k[0] * dot_kv * (1.0 - cos_a),
        v[1] * cos_a + cross_kv[1] * sin_a + k[1] * dot_kv * (1.0 - cos_a),
        v[2] * cos_a + cross_kv[2] * sin_a + k[2] * dot_kv * (1.0 - cos_a),
    ]
}

/// A 3x3 matrix stored in row-major order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Matrix3x3 {
    pub data: [[f64; 3]; 3],
}

impl Matrix3x3 {
    pub fn zeros() -> Self {
        Self { data: [[0.0; 3]; 3] }
    }

    /// self * other
    pub fn multiply(&self, other: &Matrix3x3) -> Matrix3x3 {
        let mut result = Matrix3x3::zeros();
        for i in 0..3 {
            for j in 0..3 {
                result.data[i][j] = (0..3).map(|k| self.data[i][k] * other.data[k][j]).sum();
            }
        }
        result
    }

    pub fn transpose(&self) -> Matrix3x3 {
        let mut result = Matrix3x3::zeros();
        for i in 0..3 {
            for j in 0..3 {
                result.data[i][j] = self.data[j][i];
            }
        }
        result
    }

    pub fn determinant(&self) -> f64 {
        let d = &self.data;
        d[0][0] * (d[1][1] * d[2][2] - d[1][2] * d[2][1])
            - d[0][1] * (d[1][0] * d[2][2] - d[1][2] * d[2][0])
            + d[0][2] * (d[1][0] * d[2][1] - d[1][1] * d[2][0])
    }

    pub fn to_rows(self) -> Vec<Vec<f64>> {
        self.data.iter().map(|r| r.to_vec()).collect()
    }
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns `(eigenvalues, eigenvectors)` sorted by descending eigenvalue;
/// `eigenvectors[k]` is the unit eigenvector of `eigenvalues[k]`.
pub(crate) fn symmetric_eigen(matrix: &[Vec<f64>]) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = matrix.len();
    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut v = vec![vec![0.0; n]; n];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    let max_sweeps = 100;
    let tol = 1e-15;

    for _ in 0..max_sweeps {
        let off: f64 = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .map(|(i, j)| a[i][j] * a[i][j])
            .sum();
        if off < tol {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq.abs() < 1e-300 {
                    continue;
                }
                let app = a[p][p];
                let aqq = a[q][q];

                let theta = if (app - aqq).abs() < 1e-300 {
                    std::f64::consts::FRAC_PI_4
                } else {
                    0.5 * (2.0 * apq / (app - aqq)).atan()
                };
                let c = theta.cos();
                let s = theta.sin();

                // A' = G^T A G on rows/columns p and q
                for i in 0..n {
                    if i != p && i != q {
                        let aip = a[i][p];
                        let aiq = a[i][q];
                        a[i][p] = c * aip + s * aiq;
                        a[p][i] = a[i][p];
                        a[i][q] = -s * aip + c * aiq;
                        a[q][i] = a[i][q];
                    }
                }
                a[p][p] = c * c * app + 2.0 * c * s * apq + s * s * aqq;
                a[q][q] = s * s * app - 2.0 * c * s * apq + c * c * aqq;
                a[p][q] = 0.0;
                a[q][p] = 0.0;

                for row in v.iter_mut() {
                    let vip = row[p];
                    let viq = row[q];
                    row[p] = c * vip + s * viq;
                    row[q] = -s * vip + c * viq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&x, &y| a[y][y].total_cmp(&a[x][x]));
    let values = order.iter().map(|&k| a[k][k]).collect();
    let vectors = order
        .iter()
        .map(|&k| (0..n).map(|row| v[row][k]).collect())
        .collect();
    (values, vectors)
}
