use glam::Vec2;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use snowfight::{GameState, InterpolationEngine, SantaColor};

/// World units per map tile.
pub const TILE_SIZE: f32 = 32.0;
/// World units covered by one terminal cell. Cells are about twice as tall as wide.
pub const CELL_SIZE: Vec2 = Vec2::new(8.0, 16.0);

const EMPTY: (char, Style) = (' ', Style::new());

pub fn viewport(area: Rect) -> Vec2 {
    Vec2::new(f32::from(area.width), f32::from(area.height)) * CELL_SIZE
}

/// Maps a terminal click to `(pointer, canvas)` in world units, relative to
/// the arena's top-left corner. `None` outside the arena.
pub fn pointer_in_arena(area: Rect, column: u16, row: u16) -> Option<(Vec2, Vec2)> {
    if !area.contains((column, row).into()) {
        return None;
    }
    let cell = Vec2::new(f32::from(column - area.x), f32::from(row - area.y));
    Some(((cell + 0.5) * CELL_SIZE, viewport(area)))
}

pub fn santa_color(color: SantaColor) -> Color {
    match color {
        SantaColor::Red => Color::Red,
        SantaColor::Green => Color::Green,
        SantaColor::Blue => Color::Blue,
        SantaColor::Yellow => Color::Yellow,
        SantaColor::Purple => Color::Magenta,
        SantaColor::Black => Color::DarkGray,
    }
}

struct Grid {
    cols: usize,
    rows: usize,
    origin: Vec2,
    cells: Vec<(char, Style)>,
}

impl Grid {
    fn new(area: Rect, origin: Vec2) -> Self {
        let cols = usize::from(area.width);
        let rows = usize::from(area.height);
        Self {
            cols,
            rows,
            origin,
            cells: vec![EMPTY; cols * rows],
        }
    }

    fn cell_of(&self, world: Vec2) -> Option<usize> {
        let rel = ((world - self.origin) / CELL_SIZE).floor();
        if rel.x < 0.0 || rel.y < 0.0 {
            return None;
        }
        let (col, row) = (rel.x as usize, rel.y as usize);
        (col < self.cols && row < self.rows).then_some(row * self.cols + col)
    }

    fn put(&mut self, world: Vec2, glyph: char, style: Style) {
        if let Some(i) = self.cell_of(world) {
            self.cells[i] = (glyph, style);
        }
    }

    fn into_lines(self) -> Vec<Line<'static>> {
        if self.cols == 0 {
            return Vec::new();
        }
        self.cells
            .chunks(self.cols)
            .map(|row| {
                Line::from(
                    row.iter()
                        .map(|&(glyph, style)| Span::styled(glyph.to_string(), style))
                        .collect::<Vec<_>>(),
                )
            })
            .collect()
    }
}

/// The arena as seen from the local player: tiles, snowballs, then players on top.
pub fn lines(state: &GameState, interpolation: &InterpolationEngine, area: Rect) -> Vec<Line<'static>> {
    let origin = interpolation.camera_origin(state, viewport(area));
    let mut grid = Grid::new(area, origin);

    let ground = Style::new().fg(Color::DarkGray);
    let decal = Style::new().fg(Color::Green);
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let world = origin + (Vec2::new(col as f32, row as f32) + 0.5) * CELL_SIZE;
            let tile = (world / TILE_SIZE).floor();
            if tile.x < 0.0 || tile.y < 0.0 {
                continue;
            }
            let (tx, ty) = (tile.x as usize, tile.y as usize);
            let cell = if state.map.decal_at(tx, ty).is_some() {
                ('*', decal)
            } else if state.map.ground_at(tx, ty).is_some() {
                ('.', ground)
            } else {
                continue;
            };
            grid.cells[row * grid.cols + col] = cell;
        }
    }

    let snowball = Style::new().fg(Color::White).add_modifier(Modifier::BOLD);
    for ball in &state.snowballs {
        let pos = interpolation.snowball(ball.id).unwrap_or(ball.position());
        grid.put(pos, 'o', snowball);
    }

    for player in &state.players {
        let pos = interpolation.player(&player.id).unwrap_or(player.position());
        let mut style = Style::new().fg(santa_color(player.santa_color));
        if player.id == state.player_id {
            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        }
        let glyph = if player.is_left { '◀' } else { '▶' };
        grid.put(pos, glyph, style);
    }

    grid.into_lines()
}
