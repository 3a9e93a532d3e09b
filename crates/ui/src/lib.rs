//! ratatui-based UI.

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{event, terminal};
use rand::SeedableRng as _;
use rand::rngs::StdRng;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, HighlightSpacing, List, ListItem, ListState, Paragraph, Row,
    Table, TableState, Wrap,
};
use twinshelf_application::{
    AppContext, FormField, Gate, PickPhase, PickStart, SessionState, SortColumn, SortState,
    ToastLevel,
};
use twinshelf_core::{Genre, ShelfId, TableTarget, Theme, tbr_label};
use twinshelf_remote::BookApi;
use unicode_width::UnicodeWidthStr;

mod worker;

use worker::RequestWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiExit {
    Quit,
    /// The API base URL changed; the caller rebuilds the client and restarts.
    Reconnect,
}

#[derive(Debug, Clone)]
pub struct UiOutcome {
    pub ctx: AppContext,
    pub exit: UiExit,
}

pub struct Ui {
    ctx: AppContext,
    worker: RequestWorker,
    rng: StdRng,
    login_panel: LoginPanel,
    search_panel: SearchPanel,
    settings_panel: SettingsPanel,
    picker_panel: PickerPanel,
}

impl Ui {
    pub fn new(mut ctx: AppContext, api: Box<dyn BookApi + Send>) -> anyhow::Result<Self> {
        ctx.settings.normalize();
        let worker = RequestWorker::spawn(api)?;
        Ok(Self {
            ctx,
            worker,
            rng: StdRng::from_entropy(),
            login_panel: LoginPanel::default(),
            search_panel: SearchPanel::default(),
            settings_panel: SettingsPanel::default(),
            picker_panel: PickerPanel::default(),
        })
    }

    pub fn run(&mut self) -> anyhow::Result<UiOutcome> {
        let mut terminal = setup_terminal()?;
        terminal.clear().ok();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.event_loop(&mut terminal)
        }));
        let restore_result = restore_terminal(&mut terminal);

        match (result, restore_result) {
            (Ok(Ok(outcome)), Ok(())) => Ok(outcome),
            (Ok(Ok(_)), Err(err)) => Err(err),
            (Ok(Err(err)), Ok(())) => Err(err),
            (Ok(_), Err(err)) => Err(err),
            (Err(panic), Ok(())) => Err(anyhow::anyhow!(panic_to_string(panic))),
            (Err(panic), Err(err)) => Err(anyhow::anyhow!(
                "{}\n(additionally failed to restore terminal: {err})",
                panic_to_string(panic)
            )),
        }
    }

    fn accent_color(&self) -> Color {
        match self.ctx.settings.theme {
            Theme::Light => Color::Blue,
            Theme::Dark => Color::Yellow,
        }
    }

    fn highlight_style(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(self.accent_color())
            .add_modifier(Modifier::BOLD)
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> anyhow::Result<UiOutcome> {
        let tick_rate = Duration::from_millis(250);
        let mut needs_redraw = true;

        loop {
            if self.pump(Instant::now())? {
                needs_redraw = true;
            }

            if needs_redraw {
                terminal.draw(|frame| self.draw(frame.area(), frame))?;
                needs_redraw = false;
            }

            let timeout = if self.ctx.picker.is_cycling() {
                self.ctx.settings.picker_step().min(tick_rate)
            } else {
                tick_rate
            };
            if !event::poll(timeout)? {
                continue;
            }

            match event::read()? {
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }

                    needs_redraw = true;
                    if let Some(exit) = self.handle_key(key, Instant::now())? {
                        return Ok(UiOutcome {
                            ctx: self.ctx.clone(),
                            exit,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    /// Applies finished requests, advances timers and hands queued requests
    /// to the worker. Returns `true` when the screen needs a redraw.
    fn pump(&mut self, now: Instant) -> anyhow::Result<bool> {
        let mut changed = false;
        while let Some(response) = self.worker.try_recv()? {
            self.ctx.apply_response(response, now);
            changed = true;
        }
        if self.ctx.tick(now) {
            changed = true;
        }
        self.flush_requests()?;
        Ok(changed)
    }

    fn flush_requests(&mut self) -> anyhow::Result<()> {
        for request in self.ctx.take_requests() {
            self.worker.send(request)?;
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> anyhow::Result<Option<UiExit>> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(Some(UiExit::Quit));
        }

        match self.ctx.session.gate() {
            Gate::Loading => Ok(match key.code {
                KeyCode::Esc => Some(UiExit::Quit),
                _ => None,
            }),
            Gate::Login => self.handle_login_key(key, now),
            Gate::Ready => {
                if self.ctx.delete_confirm.is_some() {
                    self.handle_delete_confirm_key(key)
                } else if self.ctx.update_form.is_some() {
                    self.handle_update_form_key(key, now)
                } else if self.ctx.add_form.open {
                    self.handle_add_form_key(key, now)
                } else if self.ctx.picker.open {
                    self.handle_picker_key(key, now)
                } else if self.settings_panel.open {
                    self.handle_settings_panel_key(key)
                } else if self.search_panel.open {
                    self.handle_search_panel_key(key)
                } else {
                    self.handle_main_key(key)
                }
            }
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent, now: Instant) -> anyhow::Result<Option<UiExit>> {
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && let KeyCode::Char('u') = key.code
        {
            self.login_panel.input.clear();
            return Ok(None);
        }

        match key.code {
            KeyCode::Esc => Ok(Some(UiExit::Quit)),
            KeyCode::Enter => {
                let token = std::mem::take(&mut self.login_panel.input);
                self.ctx.sign_in(&token, now);
                Ok(None)
            }
            KeyCode::Backspace => {
                self.login_panel.input.pop();
                Ok(None)
            }
            KeyCode::Char(ch) => {
                if !ch.is_control() {
                    self.login_panel.input.push(ch);
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn handle_main_key(&mut self, key: KeyEvent) -> anyhow::Result<Option<UiExit>> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return Ok(Some(UiExit::Quit)),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Left | KeyCode::Right => {
                self.ctx.switch_shelf();
            }
            KeyCode::Down | KeyCode::Char('j') => self.ctx.select_next(),
            KeyCode::Up | KeyCode::Char('k') => self.ctx.select_prev(),
            KeyCode::Char('/') => {
                self.search_panel.open = true;
                self.search_panel.selected = 0;
            }
            KeyCode::Char('c') => {
                self.ctx.search.clear();
                self.ctx.normalize_selection();
            }
            KeyCode::Char('a') => self.ctx.open_add_form(),
            KeyCode::Char('e') | KeyCode::Enter => self.ctx.open_update_form(),
            KeyCode::Char('d') | KeyCode::Delete => self.ctx.request_delete(),
            KeyCode::Char('r') => {
                self.ctx.open_picker();
                self.picker_panel.selected = PICKER_ROW_TABLE;
            }
            KeyCode::Char('1') => self.ctx.click_sort(SortColumn::Title),
            KeyCode::Char('2') => self.ctx.click_sort(SortColumn::Author),
            KeyCode::Char('3') => self.ctx.click_sort(SortColumn::Tbr),
            KeyCode::Char('g') => {
                let shelf = self.ctx.active;
                self.ctx.refetch(shelf);
            }
            KeyCode::Char('s') => {
                self.settings_panel.open = true;
                self.settings_panel.selected = 0;
                self.settings_panel.base_url_input = self.ctx.settings.api_base_url.clone();
                self.settings_panel.error = None;
            }
            KeyCode::Char('x') => self.ctx.notifications.dismiss_latest(),
            KeyCode::Char('L') => self.ctx.sign_out(),
            _ => {}
        }
        Ok(None)
    }

    fn search_text_mut(&mut self) -> Option<&mut String> {
        match self.search_panel.selected {
            SEARCH_ROW_TITLE => Some(&mut self.ctx.search.title),
            SEARCH_ROW_AUTHOR => Some(&mut self.ctx.search.author),
            _ => None,
        }
    }

    fn handle_search_panel_key(&mut self, key: KeyEvent) -> anyhow::Result<Option<UiExit>> {
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && let KeyCode::Char('u') = key.code
        {
            match self.search_text_mut() {
                Some(text) => text.clear(),
                None => self.ctx.search.genre = None,
            }
            self.ctx.normalize_selection();
            return Ok(None);
        }

        match key.code {
            KeyCode::Esc | KeyCode::Enter => {
                self.search_panel.open = false;
            }
            KeyCode::Up | KeyCode::BackTab => {
                self.search_panel.selected = self.search_panel.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Tab => {
                self.search_panel.selected =
                    (self.search_panel.selected + 1).min(SEARCH_ROW_COUNT - 1);
            }
            KeyCode::Left | KeyCode::Right => {
                if self.search_panel.selected == SEARCH_ROW_GENRE {
                    let forward = key.code == KeyCode::Right;
                    self.ctx.search.genre =
                        Genre::cycle_option(self.ctx.search.genre.as_ref(), forward);
                }
            }
            KeyCode::Backspace => {
                if let Some(text) = self.search_text_mut() {
                    text.pop();
                }
            }
            KeyCode::Char(ch) => {
                if ch.is_control() {
                    return Ok(None);
                }
                match self.search_text_mut() {
                    Some(text) => text.push(ch),
                    None if ch == ' ' => {
                        self.ctx.search.genre =
                            Genre::cycle_option(self.ctx.search.genre.as_ref(), true);
                    }
                    None => {}
                }
            }
            _ => return Ok(None),
        }
        self.ctx.normalize_selection();
        Ok(None)
    }

    fn handle_add_form_key(&mut self, key: KeyEvent, now: Instant) -> anyhow::Result<Option<UiExit>> {
        let form = &mut self.ctx.add_form;
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('n') => form.add_draft(),
                KeyCode::Char('u') => {
                    let field = form.field;
                    let draft = form.current_mut();
                    match field {
                        FormField::Title => draft.title.clear(),
                        FormField::Author => draft.author.clear(),
                        _ => {}
                    }
                }
                _ => {}
            }
            return Ok(None);
        }

        let field = form.field;
        match key.code {
            KeyCode::Esc => form.open = false,
            KeyCode::Enter => self.ctx.submit_add_form(now),
            KeyCode::Tab | KeyCode::Down => form.field = field.next(true),
            KeyCode::BackTab | KeyCode::Up => form.field = field.prev(true),
            KeyCode::PageUp => form.prev_draft(),
            KeyCode::PageDown => form.next_draft(),
            KeyCode::Left | KeyCode::Right => {
                if !field.is_text() {
                    form.current_mut().cycle(field, key.code == KeyCode::Right);
                }
            }
            KeyCode::Backspace => form.current_mut().backspace(field),
            KeyCode::Char(ch) => {
                if field.is_text() {
                    form.current_mut().input_char(field, ch);
                } else if ch == ' ' {
                    form.current_mut().cycle(field, true);
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn handle_update_form_key(
        &mut self,
        key: KeyEvent,
        now: Instant,
    ) -> anyhow::Result<Option<UiExit>> {
        match key.code {
            KeyCode::Esc => {
                self.ctx.update_form = None;
                return Ok(None);
            }
            KeyCode::Enter => {
                self.ctx.submit_update_form(now);
                return Ok(None);
            }
            _ => {}
        }

        let Some(form) = self.ctx.update_form.as_mut() else {
            return Ok(None);
        };
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && let KeyCode::Char('u') = key.code
        {
            match form.field {
                FormField::Title => form.title.clear(),
                FormField::Author => form.author.clear(),
                _ => {}
            }
            return Ok(None);
        }

        match key.code {
            KeyCode::Tab | KeyCode::Down => form.field = form.field.next(false),
            KeyCode::BackTab | KeyCode::Up => form.field = form.field.prev(false),
            KeyCode::Left | KeyCode::Right => form.cycle(key.code == KeyCode::Right),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(ch) => {
                if form.field.is_text() {
                    form.input_char(ch);
                } else if ch == ' ' {
                    form.cycle(true);
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn handle_delete_confirm_key(&mut self, key: KeyEvent) -> anyhow::Result<Option<UiExit>> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => self.ctx.confirm_delete(),
            KeyCode::Char('n') | KeyCode::Esc => self.ctx.cancel_delete(),
            _ => {}
        }
        Ok(None)
    }

    fn handle_picker_key(&mut self, key: KeyEvent, now: Instant) -> anyhow::Result<Option<UiExit>> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.ctx.close_picker(),
            KeyCode::Up | KeyCode::Down | KeyCode::Tab | KeyCode::BackTab => {
                self.picker_panel.selected = if self.picker_panel.selected == PICKER_ROW_TABLE {
                    PICKER_ROW_GENRE
                } else {
                    PICKER_ROW_TABLE
                };
            }
            KeyCode::Left | KeyCode::Right => {
                let forward = key.code == KeyCode::Right;
                if self.picker_panel.selected == PICKER_ROW_TABLE {
                    self.ctx.picker.cycle_table(forward);
                } else {
                    self.ctx.picker.cycle_genre(forward);
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                match self.ctx.start_pick(now, &mut self.rng) {
                    PickStart::Cycling { pool } => tracing::debug!(pool, "picker cycling"),
                    PickStart::NoEligible => tracing::debug!("picker found no eligible book"),
                    PickStart::Busy => {}
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn handle_settings_panel_key(&mut self, key: KeyEvent) -> anyhow::Result<Option<UiExit>> {
        let on_url_row = self.settings_panel.selected == SETTINGS_MENU_BASE_URL;
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && let KeyCode::Char('u') = key.code
        {
            if on_url_row {
                self.settings_panel.base_url_input.clear();
            }
            return Ok(None);
        }

        match key.code {
            KeyCode::Esc => {
                self.settings_panel.open = false;
                self.settings_panel.error = None;
                Ok(None)
            }
            KeyCode::Up => {
                self.settings_panel.selected = self.settings_panel.selected.saturating_sub(1);
                Ok(None)
            }
            KeyCode::Down => {
                self.settings_panel.selected = (self.settings_panel.selected + 1)
                    .min(SETTINGS_MENU_ITEM_COUNT.saturating_sub(1));
                Ok(None)
            }
            KeyCode::Left | KeyCode::Right => {
                let forward = key.code == KeyCode::Right;
                let mut settings = self.ctx.settings.clone();
                match self.settings_panel.selected {
                    SETTINGS_MENU_THEME => settings.cycle_theme(),
                    SETTINGS_MENU_PICKER_CYCLE => {
                        settings.picker_cycle_ms = step_ms(settings.picker_cycle_ms, 500, forward);
                    }
                    SETTINGS_MENU_TOAST => {
                        settings.toast_ms = step_ms(settings.toast_ms, 1_000, forward);
                    }
                    _ => return Ok(None),
                }
                self.ctx.apply_settings(settings);
                Ok(None)
            }
            KeyCode::Enter => match self.settings_panel.selected {
                SETTINGS_MENU_THEME => {
                    self.ctx.settings.cycle_theme();
                    Ok(None)
                }
                SETTINGS_MENU_BASE_URL => self.apply_base_url(),
                _ => Ok(None),
            },
            KeyCode::Backspace => {
                if on_url_row {
                    self.settings_panel.base_url_input.pop();
                }
                Ok(None)
            }
            KeyCode::Char(ch) => {
                if on_url_row && !ch.is_control() {
                    self.settings_panel.base_url_input.push(ch);
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn apply_base_url(&mut self) -> anyhow::Result<Option<UiExit>> {
        let input = self.settings_panel.base_url_input.trim().trim_end_matches('/');
        if input.is_empty() {
            self.settings_panel.error = Some("Enter a base URL".to_string());
            return Ok(None);
        }
        if !(input.starts_with("http://") || input.starts_with("https://")) {
            self.settings_panel.error = Some("The URL must start with http:// or https://".to_string());
            return Ok(None);
        }

        self.settings_panel.error = None;
        self.settings_panel.open = false;
        if input == self.ctx.settings.api_base_url {
            return Ok(None);
        }

        tracing::info!(url = input, "api base url changed");
        let mut settings = self.ctx.settings.clone();
        settings.api_base_url = input.to_string();
        self.ctx.apply_settings(settings);
        Ok(Some(UiExit::Reconnect))
    }

    fn draw(&mut self, area: Rect, frame: &mut ratatui::Frame) {
        frame.render_widget(Clear, area);
        match self.ctx.session.gate() {
            Gate::Loading => self.draw_loading(area, frame),
            Gate::Login => self.draw_login(area, frame),
            Gate::Ready => self.draw_main(area, frame),
        }
        self.draw_toast(area, frame);
    }

    fn draw_loading(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(40, 20, area);
        let block = Block::default().borders(Borders::ALL).title(Span::styled(
            "Twinshelf",
            Style::default().add_modifier(Modifier::BOLD),
        ));
        let text = Text::from(vec![
            Line::raw(""),
            Line::styled("Loading…", Style::default().fg(self.accent_color())),
            Line::raw(""),
            Line::styled("Esc to quit", Style::default().fg(Color::DarkGray)),
        ]);
        let paragraph = Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(paragraph, popup_area);
    }

    fn draw_login(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title(Span::styled(
            "Sign in",
            Style::default().add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let masked = "•".repeat(self.login_panel.input.chars().count());
        let mut lines = vec![
            Line::raw("Enter your API token to open the shelves."),
            Line::raw(""),
            Line::from(vec![
                Span::styled("Token: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(masked.clone()),
            ]),
            Line::raw(""),
        ];
        if let SessionState::Unauthenticated {
            reason: Some(reason),
        } = &self.ctx.session
        {
            lines.push(Line::styled(
                reason.clone(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
            lines.push(Line::raw(""));
        }
        lines.push(help_line(&[
            ("Enter", "sign in"),
            ("Ctrl+U", "clear"),
            ("Esc", "quit"),
        ]));

        let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let cursor_x = inner.x + ("Token: ".width() + masked.width()) as u16;
        if cursor_x < inner.right() && inner.height > 2 {
            frame.set_cursor_position((cursor_x, inner.y + 2));
        }
    }

    fn draw_main(&mut self, area: Rect, frame: &mut ratatui::Frame) {
        self.ctx.normalize_selection();

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(area);

        let title = Paragraph::new(Text::from(self.main_header_lines()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(title, layout[0]);

        let body_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(layout[1]);
        for shelf in ShelfId::ALL {
            self.draw_shelf(frame, body_layout[shelf.index()], shelf);
        }

        let footer = Paragraph::new(Text::from(self.main_footer_lines()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::TOP));
        frame.render_widget(footer, layout[2]);

        if self.search_panel.open {
            self.draw_search_panel(area, frame);
        }
        if self.settings_panel.open {
            self.draw_settings_panel(area, frame);
        }
        if self.ctx.picker.open {
            self.draw_picker(area, frame);
        }
        if self.ctx.add_form.open {
            self.draw_add_form(area, frame);
        }
        if self.ctx.update_form.is_some() {
            self.draw_update_form(area, frame);
        }
        if self.ctx.delete_confirm.is_some() {
            self.draw_delete_confirm(area, frame);
        }
    }

    fn main_header_lines(&self) -> Vec<Line<'static>> {
        let mut lines = vec![Line::from(vec![
            Span::styled("Twinshelf", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!(
                " · {} & {}",
                self.ctx.settings.first_owner, self.ctx.settings.second_owner
            )),
        ])];

        if let Some(summary) = self.ctx.search.summary() {
            lines.push(Line::from(vec![
                Span::styled("Filter: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(summary),
                Span::styled("  (c to clear)", Style::default().fg(Color::DarkGray)),
            ]));
        }
        lines
    }

    fn main_footer_lines(&self) -> Vec<Line<'static>> {
        vec![
            help_line(&[
                ("Tab", "shelf"),
                ("↑/↓", "move"),
                ("/", "search"),
                ("1/2/3", "sort title/author/TBR"),
                ("g", "refresh"),
            ]),
            help_line(&[
                ("a", "add"),
                ("e", "edit"),
                ("d", "delete"),
                ("r", "random pick"),
                ("s", "settings"),
                ("L", "sign out"),
                ("q", "quit"),
            ]),
        ]
    }

    fn draw_shelf(&self, frame: &mut ratatui::Frame, area: Rect, shelf: ShelfId) {
        let store = self.ctx.shelf(shelf);
        let visible = self.ctx.visible_books(shelf);
        let is_active = self.ctx.active == shelf;

        let mut title = format!(
            "{} · {} read / {} unread",
            self.ctx.settings.shelf_title(shelf),
            store.read_count(),
            store.unread_count()
        );
        if !self.ctx.search.is_empty() {
            title.push_str(&format!(" · {}/{} shown", visible.len(), store.books().len()));
        }
        if store.is_loading() {
            title.push_str(" · loading…");
        }
        let border_style = if is_active {
            Style::default().fg(self.accent_color())
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title);

        if visible.is_empty() {
            let message = if !store.has_loaded() && store.is_loading() {
                "Loading books…"
            } else if !store.has_loaded() {
                "Could not load books. Press g to retry."
            } else if store.books().is_empty() {
                "No books yet. Press a to add some."
            } else {
                "No matches. Press / to edit the search or c to clear it."
            };
            let paragraph = Paragraph::new(message)
                .block(block)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
            return;
        }

        let sort = store.sort();
        let header = Row::new(vec![
            Cell::from(sort_header(SortColumn::Title, sort)),
            Cell::from(sort_header(SortColumn::Author, sort)),
            Cell::from("Genre"),
            Cell::from(sort_header(SortColumn::Tbr, sort)),
        ])
        .style(Style::default().add_modifier(Modifier::BOLD));

        let rows = visible.iter().map(|book| {
            let status_style = if book.tbr {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            };
            Row::new(vec![
                Cell::from(book.title.clone()),
                Cell::from(book.author.clone()),
                Cell::from(book.genre.to_string()),
                Cell::from(Span::styled(tbr_label(book.tbr), status_style)),
            ])
        });

        let highlight = if is_active {
            self.highlight_style()
        } else {
            Style::default().add_modifier(Modifier::REVERSED)
        };
        let table = Table::new(
            rows,
            [
                Constraint::Percentage(36),
                Constraint::Percentage(26),
                Constraint::Percentage(20),
                Constraint::Percentage(18),
            ],
        )
        .header(header)
        .block(block)
        .row_highlight_style(highlight)
        .highlight_symbol("> ")
        .highlight_spacing(HighlightSpacing::Always);

        let mut state = TableState::default();
        state.select(self.ctx.selected_index(shelf));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_search_panel(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(60, 35, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title(Span::styled(
            "Search",
            Style::default().add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(2)])
            .split(inner);

        let search = &self.ctx.search;
        let genre = search
            .genre
            .as_ref()
            .map(|genre| genre.to_string())
            .unwrap_or_else(|| "any".to_string());
        let items = vec![
            labeled_item("Title: ", &search.title),
            labeled_item("Author: ", &search.author),
            labeled_item("Genre: ", &genre),
        ];
        let list = List::new(items)
            .highlight_style(self.highlight_style())
            .highlight_symbol("> ")
            .highlight_spacing(HighlightSpacing::Always);
        let mut state = ListState::default();
        state.select(Some(self.search_panel.selected.min(SEARCH_ROW_COUNT - 1)));
        frame.render_stateful_widget(list, sections[0], &mut state);

        let help = Paragraph::new(Text::from(vec![
            help_line(&[("↑/↓", "field"), ("←/→", "genre"), ("Ctrl+U", "clear")]),
            help_line(&[("Enter/Esc", "close")]),
        ]))
        .wrap(Wrap { trim: true });
        frame.render_widget(help, sections[1]);

        let text = match self.search_panel.selected {
            SEARCH_ROW_TITLE => Some(("Title: ", &search.title)),
            SEARCH_ROW_AUTHOR => Some(("Author: ", &search.author)),
            _ => None,
        };
        if let Some((label, value)) = text {
            place_cursor(frame, sections[0], self.search_panel.selected, label, value);
        }
    }

    fn draw_add_form(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(70, 55, area);
        frame.render_widget(Clear, popup_area);

        let form = &self.ctx.add_form;
        let title = format!(
            "Add books · {} of {}",
            form.current_index() + 1,
            form.drafts().len()
        );
        let block = Block::default().borders(Borders::ALL).title(Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(4)])
            .split(inner);

        let draft = form.current();
        let genre = draft
            .genre
            .as_ref()
            .map(|genre| genre.to_string())
            .unwrap_or_else(|| "(choose)".to_string());
        let table = draft
            .table
            .map(|target| self.ctx.settings.table_label(target).to_string())
            .unwrap_or_else(|| "(choose)".to_string());
        let fields = [
            FormField::Title,
            FormField::Author,
            FormField::Genre,
            FormField::Tbr,
            FormField::Table,
        ];
        let items = vec![
            labeled_item("Title: ", &draft.title),
            labeled_item("Author: ", &draft.author),
            labeled_item("Genre: ", &genre),
            labeled_item("Status: ", tbr_label(draft.tbr)),
            labeled_item("Table: ", &table),
        ];
        let selected = fields.iter().position(|f| *f == form.field).unwrap_or(0);
        let list = List::new(items)
            .highlight_style(self.highlight_style())
            .highlight_symbol("> ")
            .highlight_spacing(HighlightSpacing::Always);
        let mut state = ListState::default();
        state.select(Some(selected));
        frame.render_stateful_widget(list, sections[0], &mut state);

        let mut help_lines = vec![
            help_line(&[("Tab/↑↓", "field"), ("←/→", "change"), ("PgUp/PgDn", "book")]),
            help_line(&[("Ctrl+N", "another book"), ("Enter", "submit"), ("Esc", "close")]),
        ];
        if form.submitting {
            help_lines.push(Line::styled(
                "Submitting…",
                Style::default().fg(self.accent_color()),
            ));
        }
        frame.render_widget(
            Paragraph::new(Text::from(help_lines)).wrap(Wrap { trim: true }),
            sections[1],
        );

        match form.field {
            FormField::Title => place_cursor(frame, sections[0], 0, "Title: ", &draft.title),
            FormField::Author => place_cursor(frame, sections[0], 1, "Author: ", &draft.author),
            _ => {}
        }
    }

    fn draw_update_form(&self, area: Rect, frame: &mut ratatui::Frame) {
        let Some(form) = self.ctx.update_form.as_ref() else {
            return;
        };
        let popup_area = centered_rect(70, 45, area);
        frame.render_widget(Clear, popup_area);

        let title = format!("Edit book · {}", self.ctx.settings.shelf_title(form.shelf));
        let block = Block::default().borders(Borders::ALL).title(Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(inner);

        let genre = form.genre.to_string();
        let items = vec![
            labeled_item("Title: ", &form.title),
            labeled_item("Author: ", &form.author),
            labeled_item("Genre: ", &genre),
            labeled_item("Status: ", tbr_label(form.tbr)),
        ];
        let fields = [
            FormField::Title,
            FormField::Author,
            FormField::Genre,
            FormField::Tbr,
        ];
        let selected = fields.iter().position(|f| *f == form.field).unwrap_or(0);
        let list = List::new(items)
            .highlight_style(self.highlight_style())
            .highlight_symbol("> ")
            .highlight_spacing(HighlightSpacing::Always);
        let mut state = ListState::default();
        state.select(Some(selected));
        frame.render_stateful_widget(list, sections[0], &mut state);

        let mut help_lines = vec![help_line(&[
            ("Tab/↑↓", "field"),
            ("←/→", "change"),
            ("Enter", "save"),
            ("Esc", "cancel"),
        ])];
        if form.submitting {
            help_lines.push(Line::styled(
                "Saving…",
                Style::default().fg(self.accent_color()),
            ));
        }
        frame.render_widget(
            Paragraph::new(Text::from(help_lines)).wrap(Wrap { trim: true }),
            sections[1],
        );

        match form.field {
            FormField::Title => place_cursor(frame, sections[0], 0, "Title: ", &form.title),
            FormField::Author => place_cursor(frame, sections[0], 1, "Author: ", &form.author),
            _ => {}
        }
    }

    fn draw_delete_confirm(&self, area: Rect, frame: &mut ratatui::Frame) {
        let Some(confirm) = self.ctx.delete_confirm.as_ref() else {
            return;
        };
        let popup_area = centered_rect(50, 25, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(Span::styled(
                "Delete book",
                Style::default().add_modifier(Modifier::BOLD),
            ));
        let mut lines = vec![
            Line::raw(format!(
                "Remove \"{}\" from {}?",
                confirm.title,
                self.ctx.settings.shelf_title(confirm.shelf)
            )),
            Line::raw("This cannot be undone."),
            Line::raw(""),
        ];
        if confirm.submitting {
            lines.push(Line::styled(
                "Deleting…",
                Style::default().fg(self.accent_color()),
            ));
        } else {
            lines.push(help_line(&[("y/Enter", "delete"), ("n/Esc", "cancel")]));
        }
        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);
    }

    fn draw_picker(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(55, 45, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title(Span::styled(
            "Random pick",
            Style::default().add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(inner);

        let picker = &self.ctx.picker;
        let locked = picker.is_cycling();
        let table_row_selected = !locked && self.picker_panel.selected == PICKER_ROW_TABLE;
        let genre_row_selected = !locked && self.picker_panel.selected == PICKER_ROW_GENRE;
        let label_style = if locked {
            Style::default().add_modifier(Modifier::BOLD | Modifier::DIM)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };

        let mut table_spans = vec![Span::styled("Table: ", label_style)];
        for target in TableTarget::ALL {
            table_spans.push(option_chip(
                self.ctx.settings.table_label(target),
                picker.table() == target,
                table_row_selected,
            ));
            table_spans.push(Span::raw(" "));
        }
        let genre = picker
            .genre()
            .map(|genre| genre.to_string())
            .unwrap_or_else(|| "any".to_string());
        let genre_line = Line::from(vec![
            Span::styled("Genre: ", label_style),
            option_chip(&genre, true, genre_row_selected),
        ]);
        frame.render_widget(
            Paragraph::new(Text::from(vec![Line::from(table_spans), genre_line])),
            sections[0],
        );

        let status = match picker.phase() {
            PickPhase::Idle => vec![
                Line::raw(""),
                Line::raw("Press Enter to pick a random unread book."),
            ],
            PickPhase::NoEligible => vec![
                Line::raw(""),
                Line::styled(
                    "No eligible book.",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Line::raw("Try another table or genre."),
            ],
            PickPhase::Cycling(handle) => {
                let book = handle.current();
                vec![
                    Line::raw(""),
                    Line::styled(
                        book.title.clone(),
                        Style::default()
                            .fg(self.accent_color())
                            .add_modifier(Modifier::BOLD),
                    ),
                    Line::raw(format!("by {}", book.author)),
                    Line::raw(""),
                    Line::styled(
                        format!("choosing among {} books…", handle.pool_len()),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]
            }
            PickPhase::Settled(book) => vec![
                Line::raw(""),
                Line::raw("Your next read:"),
                Line::styled(
                    book.title.clone(),
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ),
                Line::raw(format!("by {} · {}", book.author, book.genre)),
            ],
        };
        frame.render_widget(
            Paragraph::new(Text::from(status))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            sections[1],
        );

        frame.render_widget(
            Paragraph::new(help_line(&[
                ("↑/↓", "row"),
                ("←/→", "change"),
                ("Enter", "pick"),
                ("Esc", "close"),
            ])),
            sections[2],
        );
    }

    fn draw_settings_panel(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title(Span::styled(
            "Settings",
            Style::default().add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(block.clone(), popup_area);

        let inner = block.inner(popup_area);
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(4)])
            .split(inner);

        let settings = &self.ctx.settings;
        let theme_row_selected = self.settings_panel.selected == SETTINGS_MENU_THEME;
        let items = vec![
            ListItem::new(Line::from(vec![
                Span::styled("Theme: ", Style::default().add_modifier(Modifier::BOLD)),
                option_chip("dark", settings.theme == Theme::Dark, theme_row_selected),
                Span::raw(" "),
                option_chip("light", settings.theme == Theme::Light, theme_row_selected),
            ])),
            labeled_item("API base URL: ", &self.settings_panel.base_url_input),
            labeled_item(
                "Picker cycle: ",
                &format!("{} ms", settings.picker_cycle_ms),
            ),
            labeled_item("Toast lifetime: ", &format!("{} ms", settings.toast_ms)),
        ];

        let list = List::new(items)
            .highlight_style(self.highlight_style())
            .highlight_symbol("> ")
            .highlight_spacing(HighlightSpacing::Always)
            .block(Block::default());

        let mut state = ListState::default();
        state.select(Some(
            self.settings_panel
                .selected
                .min(SETTINGS_MENU_ITEM_COUNT.saturating_sub(1)),
        ));
        frame.render_stateful_widget(list, sections[0], &mut state);

        let mut help_lines = vec![
            help_line(&[("↑/↓", "select"), ("←/→", "adjust"), ("Esc", "close")]),
            help_line(&[("Enter", "apply URL + reconnect"), ("Ctrl+U", "clear")]),
        ];
        if let Some(err) = &self.settings_panel.error {
            help_lines.push(Line::styled(
                err.clone(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
        }
        let help = Paragraph::new(Text::from(help_lines))
            .wrap(Wrap { trim: true })
            .alignment(Alignment::Left);
        frame.render_widget(help, sections[1]);

        if self.settings_panel.selected == SETTINGS_MENU_BASE_URL {
            place_cursor(
                frame,
                sections[0],
                SETTINGS_MENU_BASE_URL,
                "API base URL: ",
                &self.settings_panel.base_url_input,
            );
        }
    }

    fn draw_toast(&self, area: Rect, frame: &mut ratatui::Frame) {
        let Some(toast) = self.ctx.notifications.latest() else {
            return;
        };
        let width = area.width.min(50);
        let height = 5.min(area.height);
        let bottom = area.bottom().saturating_sub(3);
        let toast_area = Rect {
            x: area.right().saturating_sub(width),
            y: bottom.saturating_sub(height).max(area.y),
            width,
            height,
        };

        let color = match toast.level {
            ToastLevel::Success => Color::Green,
            ToastLevel::Error => Color::Red,
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(Span::styled(
                toast.title.clone(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ));
        let paragraph = Paragraph::new(toast.description.clone())
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(Clear, toast_area);
        frame.render_widget(paragraph, toast_area);
    }
}

#[derive(Debug, Clone, Default)]
struct LoginPanel {
    input: String,
}

#[derive(Debug, Clone, Default)]
struct SearchPanel {
    open: bool,
    selected: usize,
}

const SEARCH_ROW_TITLE: usize = 0;
const SEARCH_ROW_AUTHOR: usize = 1;
const SEARCH_ROW_GENRE: usize = 2;
const SEARCH_ROW_COUNT: usize = 3;

#[derive(Debug, Clone, Default)]
struct PickerPanel {
    selected: usize,
}

const PICKER_ROW_TABLE: usize = 0;
const PICKER_ROW_GENRE: usize = 1;

#[derive(Debug, Clone, Default)]
struct SettingsPanel {
    open: bool,
    selected: usize,
    base_url_input: String,
    error: Option<String>,
}

const SETTINGS_MENU_THEME: usize = 0;
const SETTINGS_MENU_BASE_URL: usize = 1;
const SETTINGS_MENU_PICKER_CYCLE: usize = 2;
const SETTINGS_MENU_TOAST: usize = 3;
const SETTINGS_MENU_ITEM_COUNT: usize = 4;

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    terminal::enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen).context("enter alt screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    terminal::disable_raw_mode().context("disable raw mode")?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("leave alt screen")?;
    terminal.show_cursor().context("show cursor")?;
    Ok(())
}

fn panic_to_string(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: (unknown payload)".to_string()
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn sort_indicator(sort: SortState, column: SortColumn) -> &'static str {
    match sort {
        SortState::Ascending(current) if current == column => "▲",
        SortState::Descending(current) if current == column => "▼",
        _ => "↕",
    }
}

fn sort_header(column: SortColumn, sort: SortState) -> String {
    format!("{} {}", column.label(), sort_indicator(sort, column))
}

/// Moves `value` by `step` in either direction; clamping is left to
/// `Settings::normalize`.
fn step_ms(value: u64, step: u64, forward: bool) -> u64 {
    if forward {
        value.saturating_add(step)
    } else {
        value.saturating_sub(step)
    }
}

fn help_line(pairs: &[(&str, &str)]) -> Line<'static> {
    let mut spans = Vec::with_capacity(pairs.len() * 2);
    for (idx, (key, action)) in pairs.iter().enumerate() {
        spans.push(Span::styled(
            key.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        let sep = if idx + 1 == pairs.len() { "" } else { "  " };
        spans.push(Span::raw(format!(" {action}{sep}")));
    }
    Line::from(spans)
}

fn labeled_item(label: &str, value: &str) -> ListItem<'static> {
    ListItem::new(Line::from(vec![
        Span::styled(label.to_string(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(value.to_string()),
    ]))
}

/// Puts the terminal cursor after `value` on list row `row` of `area`. Rows
/// are drawn with a two-column highlight gutter.
fn place_cursor(frame: &mut ratatui::Frame, area: Rect, row: usize, label: &str, value: &str) {
    let x = area.x as usize + 2 + label.width() + value.width();
    let y = area.y as usize + row;
    if x < area.right() as usize && y < area.bottom() as usize {
        frame.set_cursor_position((x as u16, y as u16));
    }
}

fn option_chip(label: &str, selected: bool, row_selected: bool) -> Span<'static> {
    let base = if selected && row_selected {
        Style::default().add_modifier(Modifier::REVERSED | Modifier::BOLD)
    } else if selected {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };

    Span::styled(label.to_string(), base)
}
