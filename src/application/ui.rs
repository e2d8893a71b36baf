use std::io;

use anyhow::Result;
use crossterm::cursor;
use crossterm::event::DisableBracketedPaste;
use crossterm::event::DisableMouseCapture;
use crossterm::event::EnableBracketedPaste;
use crossterm::event::EnableMouseCapture;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use ratatui::widgets::Scrollbar;
use ratatui::widgets::ScrollbarOrientation;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Action;
use crate::domain::models::AuthSession;
use crate::domain::models::ConnectionState;
use crate::domain::models::Event;
use crate::domain::models::Loading;
use crate::domain::models::TextArea;
use crate::domain::services::events::EventsService;
use crate::domain::services::AppState;
use crate::domain::services::ExitReason;
use crate::domain::services::SessionStore;

fn render_status_line<B: Backend>(frame: &mut Frame<B>, rect: Rect, app_state: &AppState) {
    let (label, style) = match app_state.connection {
        ConnectionState::Connected => ("Connected", Style::default().fg(Color::Green)),
        ConnectionState::Connecting => ("Connecting", Style::default().fg(Color::Yellow)),
        ConnectionState::Reconnecting => ("Reconnecting", Style::default().fg(Color::Yellow)),
        ConnectionState::Disconnected => ("Offline", Style::default().fg(Color::Red)),
    };

    let mut spans = vec![
        Span::styled(format!(" {label}"), style),
        Span::raw(format!(" | {}", Config::get(ConfigKey::CounterpartName))),
    ];

    if let Some(notice) = &app_state.status_notice {
        spans.push(Span::styled(
            format!(" | {notice}"),
            Style::default().fg(Color::Yellow),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), rect);
}

async fn start_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    app_state: &mut AppState,
    tx: mpsc::UnboundedSender<Action>,
    events: &mut EventsService,
) -> Result<()> {
    let mut textarea = TextArea::default();
    let loading = Loading::default();

    loop {
        terminal.draw(|frame| {
            let layout = Layout::default()
                .direction(Direction::Vertical)
                .constraints(vec![
                    Constraint::Min(1),
                    Constraint::Length(1),
                    Constraint::Max(4),
                ])
                .split(frame.size());

            if layout[0].width != app_state.last_known_width
                || layout[0].height != app_state.last_known_height
            {
                app_state.set_rect(layout[0]);
            }

            if app_state.waiting_for_history {
                loading.render(frame, layout[0]);
            } else {
                app_state
                    .bubble_list
                    .render(frame, layout[0], app_state.scroll.position);
                frame.render_stateful_widget(
                    Scrollbar::new(ScrollbarOrientation::VerticalRight),
                    layout[0].inner(&Margin {
                        vertical: 1,
                        horizontal: 0,
                    }),
                    &mut app_state.scroll.scrollbar_state,
                );
            }

            render_status_line(frame, layout[1], app_state);

            // The input stays usable while history loads and while the
            // stream is down. Sends queue up through the same path either
            // way.
            frame.render_widget(textarea.widget(), layout[2]);
        })?;

        match events.next().await? {
            Event::KeyboardCTRLC() => {
                app_state.exit_reason = Some(ExitReason::Quit);
            }
            Event::KeyboardCTRLR() => {
                app_state.retry_failed_sends(&tx)?;
            }
            Event::KeyboardEnter() => {
                let input_str = textarea.lines().join("\n");
                if input_str.trim().is_empty() {
                    continue;
                }

                textarea = TextArea::default();
                if !app_state.handle_slash_commands(&input_str, &tx)? {
                    app_state.send_message(&input_str, &tx)?;
                }
            }
            Event::KeyboardCharInput(input) => {
                textarea.input(input);
            }
            Event::KeyboardPaste(text) => {
                textarea.insert_str(&text);
            }
            Event::UIScrollDown() => {
                app_state.scroll.down();
            }
            Event::UIScrollUp() => {
                app_state.scroll.up();
            }
            Event::UIScrollPageDown() => {
                app_state.scroll.down_page();
            }
            Event::UIScrollPageUp() => {
                app_state.scroll.up_page();
            }
            Event::UITick() => {
                continue;
            }
            event => {
                app_state.handle_chat_event(event, &tx)?;
            }
        }

        if app_state.exit_reason.is_some() {
            break;
        }
    }

    return Ok(());
}

pub fn destruct_terminal_for_panic() {
    disable_raw_mode().unwrap();
    crossterm::execute!(
        io::stdout(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )
    .unwrap();
    crossterm::execute!(io::stdout(), cursor::Show).unwrap();
}

pub async fn start(
    session: &AuthSession,
    tx: mpsc::UnboundedSender<Action>,
    rx: mpsc::UnboundedReceiver<Event>,
    cancel_token: CancellationToken,
) -> Result<()> {
    let counterpart_id = Config::get(ConfigKey::Counterpart)
        .parse::<i64>()
        .unwrap_or_default();

    let mut app_state = AppState::new(session.user_id, counterpart_id);
    let mut events = EventsService::new(rx);

    // The view is empty until the first history response lands.
    tx.send(Action::LoadHistory())?;

    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    enable_raw_mode()?;
    crossterm::execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )?;
    let term_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(term_backend)?;

    start_loop(&mut terminal, &mut app_state, tx.clone(), &mut events).await?;

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;

    if app_state.exit_reason == Some(ExitReason::AuthExpired) {
        SessionStore::default().delete().await?;
        println!("Your session has expired. Sign in again with 'kibble login'.");
    }

    // Workers wind down only after the terminal is restored.
    cancel_token.cancel();

    return Ok(());
}
