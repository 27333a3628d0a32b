use warpnet_core::{Gid, Mapping};

use super::{Coords, Direction, LP_TYPE_NAME, TorusLp, TorusParams};
use crate::SimulationError;

// COORDINATE PACKING
// ================================================================================================

impl TorusParams {
    /// Decodes a flat node index into a coordinate vector.
    pub(crate) fn coordinates_of(&self, flat: u64) -> Coords {
        let mut rem = flat;
        let mut coords = Coords::new();
        for dim in 0..self.n_dims {
            let len = u64::from(self.dim_length[dim]);
            coords.push((rem % len) as u32);
            rem /= len;
        }
        coords
    }

    /// Packs a coordinate vector back into a flat node index.
    pub(crate) fn flat_index(&self, coords: &[u32]) -> u64 {
        coords
            .iter()
            .zip(self.factor.iter())
            .map(|(coord, factor)| u64::from(*coord) * factor)
            .sum()
    }
}

// DIMENSION-ORDER ROUTING
// ================================================================================================

impl TorusLp {
    /// Returns the next hop toward `dest_lp`: the neighbor's global id and the (dimension,
    /// direction) of the link it sits on.
    ///
    /// Dimensions are corrected in index order. Within the first differing dimension the
    /// shorter ring direction wins; a straight-line distance beyond half the ring length wraps
    /// around. A destination coincident with this node routes to the node itself on dimension 0.
    pub(crate) fn route(
        &self,
        mapping: &dyn Mapping,
        dest_lp: Gid,
    ) -> Result<(Gid, usize, Direction), SimulationError> {
        let params = &self.shared.params;
        let info = mapping.lp_info(dest_lp)?;
        let dest = params.coordinates_of(u64::from(info.rep + info.offset));

        for dim in 0..params.n_dims {
            let diff = i64::from(self.coordinates[dim]) - i64::from(dest[dim]);
            if diff == 0 {
                continue;
            }
            let half = i64::from(params.half_length[dim]);
            let (neighbor, dir) = if diff > half {
                (self.neighbor_plus[dim], Direction::Plus)
            } else if diff < -half {
                (self.neighbor_minus[dim], Direction::Minus)
            } else if diff > 0 {
                (self.neighbor_minus[dim], Direction::Minus)
            } else {
                (self.neighbor_plus[dim], Direction::Plus)
            };
            let gid = mapping.lp_id(&self.group, LP_TYPE_NAME, neighbor, 0)?;
            return Ok((gid, dim, dir));
        }

        // already at the destination node: the first (and only) hop is to this node itself
        Ok((self.gid, 0, Direction::Minus))
    }
}
