use nalgebra::{Matrix3, Vector3};

/// Builds a cell matrix from row-major lattice vectors (one vector per row).
pub fn cell_from_array(cell: &[[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::new(
        cell[0][0], cell[0][1], cell[0][2],
        cell[1][0], cell[1][1], cell[1][2],
        cell[2][0], cell[2][1], cell[2][2],
    )
}

/// The inverse of [`cell_from_array`].
pub fn cell_to_array(cell: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [cell[(0, 0)], cell[(0, 1)], cell[(0, 2)]],
        [cell[(1, 0)], cell[(1, 1)], cell[(1, 2)]],
        [cell[(2, 0)], cell[(2, 1)], cell[(2, 2)]],
    ]
}

/// The i-th lattice vector (row) of the cell as a column vector.
pub fn lattice_vector(cell: &Matrix3<f64>, i: usize) -> Vector3<f64> {
    cell.row(i).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_array_round_trip_preserves_row_order() {
        let array = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let matrix = cell_from_array(&array);
        assert_eq!(cell_to_array(&matrix), array);
        assert_eq!(lattice_vector(&matrix, 1), Vector3::new(4.0, 5.0, 6.0));
    }
}
