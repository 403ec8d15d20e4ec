//! WorkDomain - Tiled N-D Index Range
//!
//! A rectangular index range of rank 1 to [`MAX_RANK`] with a tile shape per
//! dimension. Tiles are numbered row-major (last dimension fastest), and
//! elements inside a tile are numbered the same way. Edge tiles may hang
//! past the upper bound; [`WorkDomain::resolve`] rejects those positions
//! before any absolute index is formed.

use crate::error::{ReduceError, Result};

/// Highest supported rank
pub const MAX_RANK: usize = 6;

/// Innermost tile extent used when the caller leaves a tile dimension at 0
pub const DEFAULT_INNER_TILE: i64 = 32;

/// Immutable N-D iteration domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDomain {
    rank: usize,
    lower: [i64; MAX_RANK],
    upper: [i64; MAX_RANK],
    tile: [i64; MAX_RANK],
    tiles_per_dim: [u64; MAX_RANK],
    num_tiles: u64,
    tile_elements: usize,
    num_elements: u64,
}

impl WorkDomain {
    /// Create a domain over `[lower, upper)` with the given tile shape
    ///
    /// A tile extent of 0 picks a default: 1 in outer dimensions and
    /// `min(extent, DEFAULT_INNER_TILE)` in the innermost one.
    ///
    /// # Errors
    ///
    /// Returns `Err(ReduceError::InvalidDomain)` if the rank is outside
    /// `1..=MAX_RANK`, the slices differ in length, a bound is inverted, a
    /// tile is negative, or the element count overflows.
    pub fn new(lower: &[i64], upper: &[i64], tile: &[i64]) -> Result<Self> {
        let rank = lower.len();
        if rank == 0 || rank > MAX_RANK {
            return Err(ReduceError::InvalidDomain(format!(
                "rank {rank} outside 1..={MAX_RANK}"
            )));
        }
        if upper.len() != rank || tile.len() != rank {
            return Err(ReduceError::InvalidDomain(format!(
                "bounds and tiles must share one rank: lower {}, upper {}, tile {}",
                rank,
                upper.len(),
                tile.len()
            )));
        }

        let mut domain = Self {
            rank,
            lower: [0; MAX_RANK],
            upper: [0; MAX_RANK],
            tile: [1; MAX_RANK],
            tiles_per_dim: [1; MAX_RANK],
            num_tiles: 1,
            tile_elements: 1,
            num_elements: 1,
        };

        for d in 0..rank {
            let extent = upper[d].checked_sub(lower[d]).filter(|e| *e >= 0).ok_or_else(|| {
                ReduceError::InvalidDomain(format!(
                    "dimension {d}: upper {} below lower {}",
                    upper[d], lower[d]
                ))
            })?;
            if tile[d] < 0 {
                return Err(ReduceError::InvalidDomain(format!(
                    "dimension {d}: negative tile {}",
                    tile[d]
                )));
            }
            let t = match tile[d] {
                0 if d + 1 == rank => extent.clamp(1, DEFAULT_INNER_TILE),
                0 => 1,
                t => t,
            };

            domain.lower[d] = lower[d];
            domain.upper[d] = upper[d];
            domain.tile[d] = t;
            // extent >= 0 and t >= 1
            domain.tiles_per_dim[d] = extent.unsigned_abs().div_ceil(t.unsigned_abs());

            domain.num_tiles = domain
                .num_tiles
                .checked_mul(domain.tiles_per_dim[d])
                .ok_or_else(|| overflow("tile count"))?;
            domain.num_elements = domain
                .num_elements
                .checked_mul(extent.unsigned_abs())
                .ok_or_else(|| overflow("element count"))?;
            domain.tile_elements = usize::try_from(t)
                .ok()
                .and_then(|t| domain.tile_elements.checked_mul(t))
                .ok_or_else(|| overflow("tile size"))?;
        }

        Ok(domain)
    }

    /// Domain over `[0, extents)` with default tiles
    ///
    /// # Errors
    ///
    /// Same conditions as [`WorkDomain::new`].
    pub fn from_extents(extents: &[i64]) -> Result<Self> {
        let zeros = vec![0; extents.len()];
        Self::new(&zeros, extents, &zeros)
    }

    /// Number of dimensions
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// Inclusive lower bounds
    #[must_use]
    pub fn lower(&self) -> &[i64] {
        &self.lower[..self.rank]
    }

    /// Exclusive upper bounds
    #[must_use]
    pub fn upper(&self) -> &[i64] {
        &self.upper[..self.rank]
    }

    /// Tile extent per dimension (defaults resolved)
    #[must_use]
    pub fn tile(&self) -> &[i64] {
        &self.tile[..self.rank]
    }

    /// Tile count per dimension
    #[must_use]
    pub fn tiles_per_dim(&self) -> &[u64] {
        &self.tiles_per_dim[..self.rank]
    }

    /// Total tile count; 0 when any extent is empty
    #[must_use]
    pub const fn num_tiles(&self) -> u64 {
        self.num_tiles
    }

    /// Elements per (full) tile
    #[must_use]
    pub const fn tile_elements(&self) -> usize {
        self.tile_elements
    }

    /// Elements inside the bounds
    #[must_use]
    pub const fn num_elements(&self) -> u64 {
        self.num_elements
    }

    /// Position of the first element of tile `tile_id`, relative to `lower`
    ///
    /// Positions stay relative so an edge tile hanging past an upper bound
    /// near `i64::MAX` never forms an out-of-range absolute index.
    #[must_use]
    pub fn tile_start(&self, tile_id: u64) -> [u64; MAX_RANK] {
        let mut start = [0; MAX_RANK];
        let mut rest = tile_id;
        for d in (0..self.rank).rev() {
            let per_dim = self.tiles_per_dim[d].max(1);
            // (tiles_per_dim - 1) * tile < extent <= i64::MAX
            start[d] = (rest % per_dim) * self.tile[d].unsigned_abs();
            rest /= per_dim;
        }
        start
    }

    /// Offset of the `element`-th index inside any tile
    #[must_use]
    pub fn tile_offset(&self, element: usize) -> [u64; MAX_RANK] {
        let mut offset = [0; MAX_RANK];
        let mut rest = element;
        for d in (0..self.rank).rev() {
            // tile extents were checked to fit usize at construction
            let t = self.tile[d] as usize;
            offset[d] = (rest % t) as u64;
            rest /= t;
        }
        offset
    }

    /// Write the absolute index at `start + offset` into `index`
    ///
    /// Returns `false`, leaving `index` partly written, when the position
    /// lies past an upper bound.
    #[inline]
    #[must_use]
    pub fn resolve(
        &self,
        start: &[u64; MAX_RANK],
        offset: &[u64; MAX_RANK],
        index: &mut [i64; MAX_RANK],
    ) -> bool {
        for d in 0..self.rank {
            // both terms are below 2^63, so the sum fits u64
            let rel = start[d] + offset[d];
            if rel >= self.extent(d) {
                return false;
            }
            // rel < upper - lower
            index[d] = self.lower[d].wrapping_add_unsigned(rel);
        }
        true
    }

    fn extent(&self, d: usize) -> u64 {
        self.upper[d].abs_diff(self.lower[d])
    }

    /// Row-major flat position of `index` within the bounds
    #[must_use]
    pub fn flat_index(&self, index: &[i64]) -> i64 {
        index
            .iter()
            .zip(self.lower().iter().zip(self.upper()))
            .fold(0, |flat, (i, (l, u))| flat * (u - l) + (i - l))
    }
}

fn overflow(what: &str) -> ReduceError {
    ReduceError::InvalidDomain(format!("{what} overflows"))
}
