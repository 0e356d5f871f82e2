//! District ↔ grid coordinate mapping.
//!
//! The city map is a `MAP_SIZE` × `MAP_SIZE` grid with one fixed cell per
//! district. Forward lookup places a district; reverse lookup routes a clicked
//! cell back to the district occupying it. Both directions read the same table.

use crate::game::errors::KingpinError;
use crate::game::types::{District, GridPosition};

pub const MAP_SIZE: u8 = 10;

const DISTRICT_POSITIONS: [(District, GridPosition); District::COUNT] = [
    (District::Financial, GridPosition::new(2, 2)),
    (District::TechHub, GridPosition::new(5, 2)),
    (District::BlackMarket, GridPosition::new(8, 8)),
    (District::Residential, GridPosition::new(3, 5)),
    (District::Industrial, GridPosition::new(6, 7)),
    (District::Docks, GridPosition::new(8, 1)),
    (District::Downtown, GridPosition::new(5, 5)),
    (District::Outskirts, GridPosition::new(1, 8)),
];

/// Grid cell of a district.
pub fn position_of(district: District) -> GridPosition {
    DISTRICT_POSITIONS[district.id() as usize].1
}

/// Forward lookup on a raw location id.
pub fn position_for_id(id: u32) -> Result<GridPosition, KingpinError> {
    District::from_id(id).map(position_of)
}

/// Reverse lookup: the district occupying `pos`, if any.
pub fn district_at(pos: GridPosition) -> Option<District> {
    DISTRICT_POSITIONS
        .iter()
        .find(|(_, p)| *p == pos)
        .map(|(d, _)| *d)
}

pub fn in_bounds(pos: GridPosition) -> bool {
    pos.x < MAP_SIZE && pos.y < MAP_SIZE
}

/// Resolve a clicked cell into a move target.
pub fn route_cell(pos: GridPosition) -> Result<District, KingpinError> {
    if !in_bounds(pos) {
        return Err(KingpinError::InvalidLocation(format!(
            "cell {} is outside the {}x{} map",
            pos, MAP_SIZE, MAP_SIZE
        )));
    }
    district_at(pos)
        .ok_or_else(|| KingpinError::InvalidLocation(format!("no district at cell {}", pos)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapCell {
    pub position: GridPosition,
    pub district: Option<District>,
    pub has_player: bool,
}

/// Full grid, row-major (`rows[y][x]`), with the player marker applied.
pub fn render_rows(player: Option<GridPosition>) -> Vec<Vec<MapCell>> {
    (0..MAP_SIZE)
        .map(|y| {
            (0..MAP_SIZE)
                .map(|x| {
                    let position = GridPosition::new(x, y);
                    MapCell {
                        position,
                        district: district_at(position),
                        has_player: player == Some(position),
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_location_round_trips() {
        for id in 0..District::COUNT as u32 {
            let pos = position_for_id(id).unwrap();
            assert_eq!(district_at(pos).map(|d| u32::from(d.id())), Some(id));
        }
    }

    #[test]
    fn table_cells_are_distinct_and_on_the_map() {
        let cells: HashSet<_> = DISTRICT_POSITIONS.iter().map(|(_, p)| *p).collect();
        assert_eq!(cells.len(), District::COUNT);
        assert!(cells.iter().all(|p| in_bounds(*p)));
        for (idx, (district, _)) in DISTRICT_POSITIONS.iter().enumerate() {
            assert_eq!(district.id() as usize, idx);
        }
    }

    #[test]
    fn unknown_ids_and_cells_are_rejected() {
        assert!(matches!(position_for_id(8), Err(KingpinError::InvalidLocation(_))));
        assert_eq!(district_at(GridPosition::new(0, 0)), None);
        assert!(route_cell(GridPosition::new(0, 0)).is_err());
        assert!(route_cell(GridPosition::new(10, 2)).is_err());
        assert_eq!(route_cell(GridPosition::new(8, 8)).unwrap(), District::BlackMarket);
    }

    #[test]
    fn render_marks_player_and_districts() {
        let rows = render_rows(Some(position_of(District::Docks)));
        assert_eq!(rows.len(), MAP_SIZE as usize);
        assert!(rows[1][8].has_player);
        assert_eq!(rows[1][8].district, Some(District::Docks));
        let marked = rows.iter().flatten().filter(|c| c.has_player).count();
        assert_eq!(marked, 1);
        let districts = rows.iter().flatten().filter(|c| c.district.is_some()).count();
        assert_eq!(districts, District::COUNT);
    }
}
