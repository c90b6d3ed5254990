use serde::{Deserialize, Serialize};

pub const TILES_IN_ROW: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRef {
    pub id: u32,
}

impl TileRef {
    /// Cell of this tile in the sprite atlas as `(column, row)`.
    pub fn atlas_cell(self) -> (u32, u32) {
        (self.id % TILES_IN_ROW, self.id / TILES_IN_ROW)
    }
}

pub type TileGrid = Vec<Vec<Option<TileRef>>>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameMap {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub ground: TileGrid,
    #[serde(default)]
    pub decal: TileGrid,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MapError {
    #[error("{layer} layer has {rows} rows, expected {expected}")]
    RowCount {
        layer: &'static str,
        rows: usize,
        expected: u32,
    },
    #[error("{layer} layer row {row} has {cols} columns, expected {expected}")]
    ColumnCount {
        layer: &'static str,
        row: usize,
        cols: usize,
        expected: u32,
    },
}

impl GameMap {
    pub fn is_loaded(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Fills in missing dimensions from the ground grid and checks that both
    /// layers agree with them. An empty decal layer is allowed.
    pub fn validated(mut self) -> Result<Self, MapError> {
        if self.height == 0 {
            self.height = self.ground.len() as u32;
        }
        if self.width == 0 {
            self.width = self.ground.first().map_or(0, |row| row.len() as u32);
        }

        check_layer("ground", &self.ground, self.width, self.height)?;
        if !self.decal.is_empty() {
            check_layer("decal", &self.decal, self.width, self.height)?;
        }

        Ok(self)
    }

    pub fn ground_at(&self, col: usize, row: usize) -> Option<TileRef> {
        self.ground.get(row)?.get(col).copied().flatten()
    }

    pub fn decal_at(&self, col: usize, row: usize) -> Option<TileRef> {
        self.decal.get(row)?.get(col).copied().flatten()
    }
}

fn check_layer(layer: &'static str, grid: &TileGrid, width: u32, height: u32) -> Result<(), MapError> {
    if grid.len() != height as usize {
        return Err(MapError::RowCount {
            layer,
            rows: grid.len(),
            expected: height,
        });
    }
    for (row, cols) in grid.iter().enumerate() {
        if cols.len() != width as usize {
            return Err(MapError::ColumnCount {
                layer,
                row,
                cols: cols.len(),
                expected: width,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(w: usize, h: usize) -> TileGrid {
        vec![vec![Some(TileRef { id: 1 }); w]; h]
    }

    #[test]
    fn dimensions_derived_from_ground() {
        let map = GameMap {
            ground: grid(4, 3),
            ..Default::default()
        }
        .validated()
        .unwrap();

        assert_eq!((map.width, map.height), (4, 3));
        assert!(map.is_loaded());
    }

    #[test]
    fn ragged_decal_rejected() {
        let mut decal = grid(4, 3);
        decal[1].pop();
        let err = GameMap {
            width: 4,
            height: 3,
            ground: grid(4, 3),
            decal,
        }
        .validated()
        .unwrap_err();

        assert_eq!(
            err,
            MapError::ColumnCount {
                layer: "decal",
                row: 1,
                cols: 3,
                expected: 4
            }
        );
    }

    #[test]
    fn null_cells_decode_as_empty() {
        let map: GameMap =
            serde_json::from_str(r#"{"width":2,"height":1,"ground":[[{"id":9},null]],"decal":[]}"#)
                .unwrap();
        assert_eq!(map.ground_at(0, 0), Some(TileRef { id: 9 }));
        assert_eq!(map.ground_at(1, 0), None);
        assert_eq!(TileRef { id: 9 }.atlas_cell(), (1, 1));
    }
}
