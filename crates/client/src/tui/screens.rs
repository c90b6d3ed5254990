use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};

use snowfight::{ConnectionStatus, GameState, InterpolationEngine};

use super::arena;

/// Everything one frame needs.
pub struct View<'a> {
    pub room: &'a str,
    pub state: &'a GameState,
    pub interpolation: &'a InterpolationEngine,
    pub kill_feed_max: usize,
    pub banner: Option<&'a str>,
}

/// Draws the whole screen and returns the area the arena was drawn into.
pub fn render(frame: &mut Frame, view: &View) -> Rect {
    let area = frame.area();

    let block = Block::default()
        .title(" Snowfight ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(frame, chunks[0], view);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(32)])
        .split(chunks[1]);

    let arena_area = render_arena(frame, body[0], view);

    let sidebar = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(view.kill_feed_max as u16 + 2),
        ])
        .split(body[1]);
    render_scoreboard(frame, sidebar[0], view.state);
    render_kill_feed(frame, sidebar[1], view);

    render_help(frame, chunks[2]);

    if let Some(banner) = view.banner {
        render_banner(frame, area, banner);
    }

    arena_area
}

fn status_label(status: &ConnectionStatus) -> (String, Color) {
    match status {
        ConnectionStatus::Idle => ("idle".to_string(), Color::DarkGray),
        ConnectionStatus::Resolving => ("resolving room".to_string(), Color::Yellow),
        ConnectionStatus::Connecting => ("connecting".to_string(), Color::Yellow),
        ConnectionStatus::Ready => ("connected".to_string(), Color::Green),
        ConnectionStatus::Failed(reason) => (format!("failed: {}", reason), Color::Red),
        ConnectionStatus::Closed => ("closed".to_string(), Color::Red),
    }
}

fn render_header(frame: &mut Frame, area: Rect, view: &View) {
    let state = view.state;
    let (status, status_color) = status_label(&state.status);
    let label = Style::default().fg(Color::DarkGray);

    let mut spans = vec![
        Span::styled("Room: ", label),
        Span::raw(view.room.to_string()),
        Span::styled("  Status: ", label),
        Span::styled(status, Style::default().fg(status_color)),
        Span::styled("  Ping: ", label),
        Span::raw(format!("{} ms", state.latency)),
        Span::styled("  Time: ", label),
        Span::raw(format_remaining(state.remaining_secs())),
    ];

    if let Some(me) = state.local_player() {
        spans.push(Span::styled("  You: ", label));
        spans.push(Span::styled(
            format!("{} ({}/{})", me.nickname, me.kills, me.deaths),
            Style::default()
                .fg(arena::santa_color(me.santa_color))
                .add_modifier(Modifier::BOLD),
        ));
        if !me.can_fire {
            spans.push(Span::styled(" reloading", Style::default().fg(Color::DarkGray)));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_arena(frame: &mut Frame, area: Rect, view: &View) -> Rect {
    let block = Block::default()
        .title(" Arena ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if !view.state.is_ready && view.state.players.is_empty() {
        let waiting = Paragraph::new("Waiting for the server...")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(waiting, centered_rect(inner.width, 1, inner));
        return inner;
    }

    let lines = arena::lines(view.state, view.interpolation, inner);
    frame.render_widget(Paragraph::new(lines), inner);
    inner
}

fn render_scoreboard(frame: &mut Frame, area: Rect, state: &GameState) {
    let block = Block::default()
        .title(" Scores ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let mut items = vec![ListItem::new(Line::styled(
        format!("{:<20} {:>3} {:>3}", "Name", "K", "D"),
        Style::default().fg(Color::DarkGray),
    ))];
    items.extend(state.ranked_scores().into_iter().map(|score| {
        let mut style = Style::default().fg(arena::santa_color(score.santa_color));
        if score.player == state.player_id {
            style = style.add_modifier(Modifier::BOLD);
        }
        let name: String = score.nickname.chars().take(20).collect();
        ListItem::new(format!("{:<20} {:>3} {:>3}", name, score.kills, score.deaths)).style(style)
    }));

    frame.render_widget(List::new(items).block(block), area);
}

fn render_kill_feed(frame: &mut Frame, area: Rect, view: &View) {
    let block = Block::default()
        .title(" Kills ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let items: Vec<ListItem> = view
        .state
        .visible_kill_log(view.kill_feed_max)
        .iter()
        .map(|entry| {
            ListItem::new(Line::from(vec![
                Span::styled(entry.killer.clone(), Style::default().fg(Color::Yellow)),
                Span::raw(" hit "),
                Span::styled(entry.victim.clone(), Style::default().fg(Color::White)),
            ]))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new("WASD Move  Click Throw  Space Stop  Q Quit")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(help, area);
}

fn render_banner(frame: &mut Frame, area: Rect, text: &str) {
    let popup = centered_rect(48, 5, area);
    frame.render_widget(Clear, popup);

    let paragraph = Paragraph::new(vec![Line::from(""), Line::from(text.to_string())])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, popup);
}

fn format_remaining(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
