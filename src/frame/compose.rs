//! Double-size frame composition
//!
//! Outputs wider than the render target are drawn in two half-width
//! passes. Each pass is copied row by row into its half of the final
//! buffer:
//!
//! ```text
//!  pass 1 (split 0)       pass 2 (split 1)          final
//! +----------+           +----------+      +----------+----------+
//! | row 0    |           | row 0    |  ->  | p1 row 0 | p2 row 0 |
//! | row 1    |           | row 1    |      | p1 row 1 | p2 row 1 |
//! +----------+           +----------+      +----------+----------+
//! ```

/// Bytes per packed RGB pixel
pub const BYTES_PER_PIXEL: usize = 3;

/// Copy one half-width pass into its half of `dst`
///
/// `src` is `width * height` pixels; `dst` is `2 * width * height`.
pub fn compose_split(dst: &mut [u8], src: &[u8], width: usize, height: usize, split: usize) {
    let row = width * BYTES_PER_PIXEL;
    for y in 0..height {
        let from = y * row;
        let to = y * row * 2 + split * row;
        if from + row > src.len() || to + row > dst.len() {
            break;
        }
        dst[to..to + row].copy_from_slice(&src[from..from + row]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_offsets_every_row() {
        let width = 100;
        let height = 4;
        let mut dst = vec![0u8; width * 2 * height * BYTES_PER_PIXEL];
        let left = vec![1u8; width * height * BYTES_PER_PIXEL];
        let right = vec![2u8; width * height * BYTES_PER_PIXEL];

        compose_split(&mut dst, &left, width, height, 0);
        compose_split(&mut dst, &right, width, height, 1);

        let row = width * 2 * BYTES_PER_PIXEL;
        for y in 0..height {
            let line = &dst[y * row..(y + 1) * row];
            // pixel columns 0..100 from pass 1, 100..200 from pass 2
            assert!(line[..100 * BYTES_PER_PIXEL].iter().all(|b| *b == 1));
            assert!(line[100 * BYTES_PER_PIXEL..].iter().all(|b| *b == 2));
        }
    }

    #[test]
    fn test_compose_keeps_row_content() {
        let width = 2;
        let height = 2;
        let src: Vec<u8> = (0..12).collect();
        let mut dst = vec![0u8; 24];
        compose_split(&mut dst, &src, width, height, 1);
        assert_eq!(&dst[6..12], &[0, 1, 2, 3, 4, 5]);
        assert_eq!(&dst[18..24], &[6, 7, 8, 9, 10, 11]);
        assert!(dst[..6].iter().all(|b| *b == 0));
    }
}
