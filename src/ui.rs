use crate::client::{
    AppSnapshot,
    Screen,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use ratatui::{
    prelude::*,
    widgets::*,
};
use spectra::{
    game::{
        GameKind,
        GameView,
        PendingAction,
        Phase,
        RoundOutcome,
    },
    session::{
        self,
        DEFAULT_STAKE,
        format_stt,
        short_address,
    },
};
use std::io::stdout;
use unicode_width::UnicodeWidthStr;

pub type InputEventReceiver = EventStream;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Connect,
    Disconnect,
    SelectGame(GameKind),
    BackToLobby,
    Start(String),
    Pick(session::Color),
    ContinueRound,
    Claim,
    NewGame,
}

pub struct UiState {
    mode: Mode,
    screen: Screen,
    lobby_cursor: usize,
    palette_cursor: session::Color,
    game_active: bool,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            mode: Mode::Normal,
            screen: Screen::Connect,
            lobby_cursor: 0,
            palette_cursor: session::Color::Red,
            game_active: false,
            terminal: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    StakeModal(String),
    QuitModal,
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(Ok(event)) => Ok(event),
        Some(Err(err)) => Err(err.into()),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // Create a single persistent Terminal to preserve buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    state.screen = snap.screen;
    state.game_active = snap.game.as_ref().is_some_and(|g| g.active);
    // the stake prompt only makes sense while no session is running
    if state.game_active && matches!(state.mode, Mode::StakeModal(_)) {
        state.mode = Mode::Normal;
    }
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Maps a raw terminal event to an app action, updating modal and cursor
/// state on the way.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => key,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }

    match &mut state.mode {
        Mode::QuitModal => {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::StakeModal(input) => {
            return match key.code {
                KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                KeyCode::Enter => {
                    let stake = input.trim().to_string();
                    state.mode = Mode::Normal;
                    Some(UserEvent::Start(stake))
                }
                KeyCode::Backspace => {
                    input.pop();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => {
                    input.push(c);
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::Normal => {}
    }

    if key.code == KeyCode::Char('q') {
        state.mode = Mode::QuitModal;
        return Some(UserEvent::Redraw);
    }

    match state.screen {
        Screen::Connect => match key.code {
            KeyCode::Char('c') | KeyCode::Enter => Some(UserEvent::Connect),
            _ => None,
        },
        Screen::Lobby => match key.code {
            KeyCode::Left | KeyCode::Up | KeyCode::Char('h') | KeyCode::Char('k') => {
                state.lobby_cursor = state.lobby_cursor.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Right | KeyCode::Down | KeyCode::Char('l') | KeyCode::Char('j') => {
                state.lobby_cursor = (state.lobby_cursor + 1).min(GameKind::ALL.len() - 1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => GameKind::ALL
                .get(state.lobby_cursor)
                .map(|kind| UserEvent::SelectGame(*kind)),
            KeyCode::Char('1') => Some(UserEvent::SelectGame(GameKind::Survival)),
            KeyCode::Char('2') => Some(UserEvent::SelectGame(GameKind::Mystery)),
            KeyCode::Char('d') => Some(UserEvent::Disconnect),
            _ => None,
        },
        Screen::Game(_) => match key.code {
            KeyCode::Left | KeyCode::Char('h') => {
                state.palette_cursor = state.palette_cursor.prev();
                Some(UserEvent::Redraw)
            }
            KeyCode::Right | KeyCode::Char('l') => {
                state.palette_cursor = state.palette_cursor.next();
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter | KeyCode::Char(' ') => Some(UserEvent::Pick(state.palette_cursor)),
            KeyCode::Char(c @ '1'..='5') => {
                let color = session::Color::from_id(c as u8 - b'0')?;
                state.palette_cursor = color;
                Some(UserEvent::Pick(color))
            }
            KeyCode::Char('s') if !state.game_active => {
                state.mode = Mode::StakeModal(DEFAULT_STAKE.to_string());
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('n') => Some(UserEvent::ContinueRound),
            KeyCode::Char('c') => Some(UserEvent::Claim),
            KeyCode::Char('g') => Some(UserEvent::NewGame),
            KeyCode::Char('b') | KeyCode::Esc => Some(UserEvent::BackToLobby),
            KeyCode::Char('d') => Some(UserEvent::Disconnect),
            _ => None,
        },
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    // Clear the whole frame to avoid leftover fragments
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(12),   // screen body
            Constraint::Length(8), // status/errors + help
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    match (&snap.screen, &snap.game) {
        (Screen::Connect, _) => draw_connect(f, chunks[1], snap),
        (Screen::Lobby, _) => draw_lobby(f, state, chunks[1], snap),
        (Screen::Game(_), Some(view)) => draw_game(f, state, chunks[1], view),
        (Screen::Game(_), None) => {}
    }
    draw_bottom(f, chunks[2], snap);
    draw_modals(f, state);
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let account = snap
        .account
        .map(|a| short_address(&a))
        .unwrap_or_else(|| "not connected".to_string());
    let text = Line::from(vec![
        Span::styled("SPECTRA", Style::default().add_modifier(Modifier::BOLD).fg(Color::Magenta)),
        Span::raw("  One Mind vs the Spectrum  |  "),
        Span::raw(format!("{} ({})  |  {}", snap.network.name, snap.network.chain_id, account)),
    ]);
    let widget = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
    f.render_widget(widget, area);
}

fn draw_connect(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let net = &snap.network;
    let mut lines = vec![
        Line::from(format!("Network:  {} (chain id {})", net.name, net.chain_id)),
        Line::from(format!("Currency: {}", net.currency)),
        Line::from(format!("RPC:      {}", net.rpc_url)),
        Line::from(format!("Explorer: {}", net.explorer)),
        Line::from(format!("Wallet:   {}", snap.wallet_label)),
        Line::from(""),
        Line::styled(
            "Press c to connect your wallet",
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ];
    if let Some(err) = &snap.connect_error {
        lines.push(Line::from(""));
        lines.push(Line::styled(err.clone(), Style::default().fg(Color::Red)));
    }
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Connect Wallet"));
    f.render_widget(widget, area);
}

fn draw_lobby(f: &mut Frame, state: &UiState, area: Rect, snap: &AppSnapshot) {
    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    for (idx, kind) in GameKind::ALL.iter().enumerate() {
        let selected = idx == state.lobby_cursor;
        let lines = vec![
            Line::styled(kind.tagline(), Style::default().add_modifier(Modifier::ITALIC)),
            Line::from(""),
            Line::from(kind.description()),
            Line::from(""),
            Line::from(format!("Difficulty: {}   Risk: {}", kind.difficulty(), kind.risk())),
            Line::from(""),
            Line::styled(
                format!("Press {} or Enter to play", idx + 1),
                Style::default().fg(Color::DarkGray),
            ),
        ];
        let border = if selected {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let widget = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(format!("{} {}", idx + 1, kind.name())),
        );
        f.render_widget(widget, cards[idx]);
    }
    if snap.account.is_none() {
        let p = Paragraph::new("No account connected");
        f.render_widget(p, centered_rect(40, 20, area));
    }
}

fn draw_game(f: &mut Frame, state: &UiState, area: Rect, view: &GameView) {
    let progress_height = if view.progress.is_some() { 3 } else { 0 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),               // stat cards
            Constraint::Length(progress_height), // mystery progress
            Constraint::Length(5),               // palette
            Constraint::Min(3),                  // banner
        ])
        .split(area);

    draw_stats(f, rows[0], view);
    if let Some((solved, total)) = view.progress {
        draw_progress(f, rows[1], solved, total);
    }
    draw_palette(f, state, rows[2], view);
    draw_banner(f, rows[3], view);
}

fn draw_stats(f: &mut Frame, area: Rect, view: &GameView) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 5); 5])
        .split(area);
    let stake = view
        .stake
        .map(|s| format!("{} STT", format_stt(s)))
        .unwrap_or_else(|| "-".to_string());
    let score = view
        .score
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let account = view
        .player
        .map(|a| short_address(&a))
        .unwrap_or_else(|| "-".to_string());
    let cards = [
        ("Status", phase_label(view)),
        ("Stake", stake),
        ("Score", score),
        ("Potential Reward", format!("{} STT", format_stt(view.potential_reward))),
        ("Account", account),
    ];
    for (idx, (title, value)) in cards.into_iter().enumerate() {
        let widget = Paragraph::new(value)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(widget, cols[idx]);
    }
}

fn phase_label(view: &GameView) -> String {
    if let Some(pending) = view.pending {
        return match pending {
            PendingAction::Starting => "Starting...".to_string(),
            PendingAction::Acting(color) => format!("Choosing {}...", color.name()),
            PendingAction::Claiming => "Claiming...".to_string(),
        };
    }
    match view.phase {
        Phase::Disconnected => "Not connected",
        Phase::Idle => "Ready to start",
        Phase::Starting => "Starting...",
        Phase::Active => "Choose a color",
        Phase::RoundWon => "Round won",
        Phase::RoundLost => "Game over",
        Phase::Claimable => "Reward available",
    }
    .to_string()
}

fn draw_progress(f: &mut Frame, area: Rect, solved: u8, total: usize) {
    let ratio = if total == 0 {
        0.0
    } else {
        (f64::from(solved) / total as f64).min(1.0)
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Mystery Progress"))
        .gauge_style(Style::default().fg(Color::Magenta))
        .ratio(ratio)
        .label(format!("{solved}/{total}"));
    f.render_widget(gauge, area);
}

fn draw_palette(f: &mut Frame, state: &UiState, area: Rect, view: &GameView) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 5); 5])
        .split(area);
    let enabled = view.phase == Phase::Active && view.pending.is_none();
    for (idx, color) in session::Color::ALL.iter().enumerate() {
        let (r, g, b) = color.rgb();
        let swatch = Color::Rgb(r, g, b);
        let mut label = format!("{} {}", color.id(), color.name());
        if view.selection == Some(*color) {
            label.push_str(" ✓");
        }
        let inner_width = cols[idx].width.saturating_sub(2) as usize;
        let body = if enabled {
            Style::default().bg(swatch).fg(Color::Black)
        } else {
            Style::default().fg(swatch).add_modifier(Modifier::DIM)
        };
        let border = if state.palette_cursor == *color {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let widget = Paragraph::new(vec![
            Line::from(""),
            Line::from(center_label(&label, inner_width)),
        ])
        .style(body)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(border),
        );
        f.render_widget(widget, cols[idx]);
    }
}

fn draw_banner(f: &mut Frame, area: Rect, view: &GameView) {
    let (text, style) = if let Some(result) = &view.result {
        let color = match result.outcome {
            RoundOutcome::Won => Color::Green,
            RoundOutcome::Lost => Color::Red,
        };
        (result.message.clone(), Style::default().fg(color).add_modifier(Modifier::BOLD))
    } else if let Some(notice) = &view.notice {
        (notice.clone(), Style::default().fg(Color::Green))
    } else {
        (idle_hint(view), Style::default().fg(Color::DarkGray))
    };
    let mut lines = vec![Line::styled(text, style)];
    if let Some(at) = view.last_round_at {
        lines.push(Line::styled(
            format!("Last round: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let Some(err) = &view.error {
        lines.push(Line::styled(err.clone(), Style::default().fg(Color::Red)));
    }
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(view.kind.name()));
    f.render_widget(widget, area);
}

fn idle_hint(view: &GameView) -> String {
    match view.phase {
        Phase::Idle => "Press s to stake and start a game (minimum 0.01 STT)".to_string(),
        Phase::Active => "Pick a color: ←/→ and Enter, or 1-5".to_string(),
        Phase::Claimable => "Press c to claim your reward".to_string(),
        _ => String::new(),
    }
}

fn center_label(label: &str, width: usize) -> String {
    let used = UnicodeWidthStr::width(label);
    if used >= width {
        return label.to_string();
    }
    let left = (width - used) / 2;
    format!("{}{}", " ".repeat(left), label)
}

fn draw_bottom(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let status_widget = if snap.errors.is_empty() {
        let mut lines: Vec<Line> = Vec::new();
        if snap.status.trim().is_empty() {
            lines.push(Line::from("Ready"));
        } else {
            for line in snap.status.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let mut lines: Vec<Line> = vec![Line::from(snap.status.clone())];
        let visible = chunks[0].height.saturating_sub(3) as usize;
        let skip = snap.errors.len().saturating_sub(visible);
        for e in snap.errors.iter().skip(skip) {
            lines.push(Line::styled(e.clone(), Style::default().fg(Color::Red)));
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status / Errors"))
    };
    f.render_widget(status_widget, chunks[0]);

    let help = Paragraph::new(help_text(snap.screen))
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[1]);
}

fn help_text(screen: Screen) -> &'static str {
    match screen {
        Screen::Connect => "c connect wallet | q quit",
        Screen::Lobby => "←/→ select | Enter/1/2 play | d disconnect | q quit",
        Screen::Game(_) => {
            "s stake | ←/→ color | Enter pick | 1-5 pick | n next round | c claim | g new game | b lobby | d disconnect | q quit"
        }
    }
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match &state.mode {
        Mode::StakeModal(input) => {
            let area = centered_rect(40, 25, f.area());
            let block = Block::default().borders(Borders::ALL).title("Start Game");
            let p = Paragraph::new(format!(
                "Stake (STT): {input}\nMinimum 0.01\nEnter=start Esc=cancel digits/. to edit"
            ));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit Spectra? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crossterm::event::KeyEvent;

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn on_screen(screen: Screen) -> UiState {
        UiState {
            screen,
            ..UiState::default()
        }
    }

    #[test]
    fn interpret_event__connect_screen_maps_c_to_connect() {
        // given
        let mut state = UiState::default();

        // when
        let ev = interpret_event(&mut state, press(KeyCode::Char('c')));

        // then
        assert_eq!(ev, Some(UserEvent::Connect));
    }

    #[test]
    fn interpret_event__lobby_selects_game_by_number_and_cursor() {
        // given
        let mut state = on_screen(Screen::Lobby);

        // then
        assert_eq!(
            interpret_event(&mut state, press(KeyCode::Char('2'))),
            Some(UserEvent::SelectGame(GameKind::Mystery))
        );
        interpret_event(&mut state, press(KeyCode::Right));
        assert_eq!(
            interpret_event(&mut state, press(KeyCode::Enter)),
            Some(UserEvent::SelectGame(GameKind::Mystery))
        );
    }

    #[test]
    fn interpret_event__stake_modal_collects_amount() {
        // given
        let mut state = on_screen(Screen::Game(GameKind::Survival));

        // when
        interpret_event(&mut state, press(KeyCode::Char('s')));
        interpret_event(&mut state, press(KeyCode::Char('5')));
        let ev = interpret_event(&mut state, press(KeyCode::Enter));

        // then
        assert_eq!(ev, Some(UserEvent::Start("0.015".to_string())));
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn interpret_event__stake_modal_is_unavailable_during_active_game() {
        // given
        let mut state = on_screen(Screen::Game(GameKind::Survival));
        state.game_active = true;

        // when
        let ev = interpret_event(&mut state, press(KeyCode::Char('s')));

        // then
        assert_eq!(ev, None);
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn interpret_event__palette_cursor_wraps_and_picks() {
        // given
        let mut state = on_screen(Screen::Game(GameKind::Mystery));

        // when
        interpret_event(&mut state, press(KeyCode::Left));
        let ev = interpret_event(&mut state, press(KeyCode::Enter));

        // then
        assert_eq!(ev, Some(UserEvent::Pick(session::Color::Violet)));
        assert_eq!(
            interpret_event(&mut state, press(KeyCode::Char('3'))),
            Some(UserEvent::Pick(session::Color::Green))
        );
    }

    #[test]
    fn interpret_event__quit_requires_confirmation() {
        // given
        let mut state = on_screen(Screen::Lobby);

        // when
        let first = interpret_event(&mut state, press(KeyCode::Char('q')));
        let cancelled = interpret_event(&mut state, press(KeyCode::Char('n')));
        interpret_event(&mut state, press(KeyCode::Char('q')));
        let confirmed = interpret_event(&mut state, press(KeyCode::Char('y')));

        // then
        assert_eq!(first, Some(UserEvent::Redraw));
        assert_eq!(cancelled, Some(UserEvent::Redraw));
        assert_eq!(confirmed, Some(UserEvent::Quit));
    }

    #[test]
    fn center_label__pads_to_middle() {
        assert_eq!(center_label("Red", 9), "   Red");
        assert_eq!(center_label("Violet", 3), "Violet");
    }
}
