use crossterm::event::{KeyCode, KeyEvent};
use futures::FutureExt;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::{spawn_delete, FormView};
use crate::api::{Deal, DealStage, ServiceError};
use crate::forms::DealDraft;
use crate::pipeline::{DragState, PipelineBoard, StageMove};
use crate::query::{Query, QueryState};
use crate::routes::Route;
use crate::ui::components::{ConfirmPrompt, KeyResult};
use crate::ui::renderfns::{format_money, stage_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};

type MoveResult = Result<Deal, ServiceError>;

/// Kanban board of all deals.
///
/// `m` picks a card up, `h`/`l` carries it across stages and Enter drops it.
/// The card moves at once; a failed update puts it back where it was.
pub struct PipelineView {
  ctx: ViewContext,
  query: Query<Vec<Deal>>,
  board: PipelineBoard,
  column: usize,
  row: usize,
  moves: Vec<(StageMove, oneshot::Receiver<MoveResult>)>,
  confirm: ConfirmPrompt,
  deleting: Option<Deal>,
}

impl PipelineView {
  pub fn new(ctx: ViewContext) -> Self {
    let mut query = ctx.crm.query(ctx.crm.deals());
    query.fetch();
    // Cached deals, possibly stale, until the load settles
    let board = PipelineBoard::new(query.data().cloned().unwrap_or_default());

    Self {
      ctx,
      query,
      board,
      column: 0,
      row: 0,
      moves: Vec::new(),
      confirm: ConfirmPrompt::new(),
      deleting: None,
    }
  }

  fn stage(&self) -> DealStage {
    DealStage::ALL[self.column]
  }

  fn selected(&self) -> Option<&Deal> {
    self.board.column(self.stage()).get(self.row)
  }

  /// Regroup from a successful load only. While a refetch runs, or after
  /// one failed, the data predates the latest confirmed move.
  fn sync_board(&mut self) {
    if self.query.is_fetching() {
      return;
    }
    if let QueryState::Success(deals) = self.query.state() {
      self.board.set_deals(deals.as_ref().clone());
      self.clamp_row();
    }
  }

  fn clamp_row(&mut self) {
    let len = self.board.column(self.stage()).len();
    self.row = self.row.min(len.saturating_sub(1));
  }

  fn move_column(&mut self, forward: bool) {
    let count = DealStage::ALL.len();
    self.column = if forward {
      (self.column + 1).min(count - 1)
    } else {
      self.column.saturating_sub(1)
    };
    if self.board.dragging().is_none() {
      self.clamp_row();
    }
  }

  fn move_row(&mut self, forward: bool) {
    let len = self.board.column(self.stage()).len();
    if len == 0 {
      return;
    }
    self.row = if forward {
      (self.row + 1) % len
    } else {
      self.row.checked_sub(1).unwrap_or(len - 1)
    };
  }

  fn pick_up(&mut self) {
    let Some(deal) = self.selected() else {
      return;
    };
    let id = deal.id;
    if !self.board.begin_drag(id) && self.board.state(id).is_pending() {
      self
        .ctx
        .toasts
        .info("Move in progress", "Wait for the previous move of this deal to finish");
    }
  }

  /// Drop the dragged deal on the focused stage and start the remote update
  fn drop_here(&mut self) {
    let Some(mv) = self.board.drop_on(self.stage()) else {
      self.clamp_row();
      return;
    };

    if let Some((stage, index)) = self.board.position(mv.deal_id) {
      self.column = stage.index();
      self.row = index;
    }

    info!(deal = mv.deal_id, from = %mv.from, to = %mv.to, "moving deal");
    let crm = self.ctx.crm.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      // Ignore send errors - the board was closed
      let _ = tx.send(crm.update_deal_stage(mv.deal_id, mv.to).await);
    });
    self.moves.push((mv, rx));
  }

  /// Settle finished stage updates
  fn poll_moves(&mut self) {
    let mut settled = Vec::new();
    self.moves.retain_mut(|(mv, rx)| match rx.try_recv() {
      Ok(result) => {
        settled.push((*mv, result));
        false
      }
      Err(oneshot::error::TryRecvError::Empty) => true,
      Err(oneshot::error::TryRecvError::Closed) => {
        settled.push((*mv, Err(ServiceError::Transport("update was interrupted".into()))));
        false
      }
    });

    for (mv, result) in settled {
      match result {
        Ok(deal) => self.board.confirm(&mv, Some(deal)),
        Err(e) => {
          warn!(deal = mv.deal_id, error = %e, "stage move failed, rolling back");
          self.board.roll_back(&mv);
          let title = self
            .board
            .position(mv.deal_id)
            .and_then(|(stage, i)| self.board.column(stage).get(i))
            .map(|d| d.title.clone())
            .unwrap_or_default();
          self.ctx.toasts.error(
            "Failed to move deal",
            format!("{} stays in {}: {}", title, mv.from, e.message()),
          );
        }
      }
    }
    self.clamp_row();
  }

  fn card(&self, deal: &Deal, width: usize) -> ListItem<'static> {
    let (marker, marker_style) = match self.board.state(deal.id) {
      DragState::Dragging { .. } => ("◆ ", Style::default().fg(Color::Magenta)),
      DragState::OptimisticallyPlaced { .. } => ("… ", Style::default().fg(Color::Yellow)),
      DragState::Confirmed { .. } => ("✓ ", Style::default().fg(Color::Green)),
      DragState::RolledBack { .. } => ("↺ ", Style::default().fg(Color::Red)),
      DragState::Idle => ("", Style::default()),
    };
    let title_width = width.saturating_sub(marker.chars().count());

    let mut lines = vec![Line::from(vec![
      Span::styled(marker, marker_style),
      Span::styled(truncate(&deal.title, title_width), Style::default().fg(Color::White).bold()),
    ])];
    let mut detail = format_money(&self.ctx.currency, deal.value);
    if let Some(client) = &deal.client_name {
      detail = format!("{} · {}", detail, client);
    }
    lines.push(Line::from(Span::styled(
      truncate(&detail, width),
      Style::default().fg(Color::DarkGray),
    )));
    ListItem::new(lines)
  }

  fn render_board(&self, frame: &mut Frame, area: Rect) {
    let columns = Layout::horizontal([Constraint::Ratio(1, 6); 6]).split(area);
    let dragging = self.board.dragging();

    for (i, stage) in DealStage::ALL.into_iter().enumerate() {
      let deals = self.board.column(stage);
      let focused = i == self.column;
      let border = match (focused, dragging.is_some()) {
        (true, true) => Color::Magenta,
        (true, false) => Color::Yellow,
        _ => stage_color(stage),
      };
      let title = format!(" {} ({}) ", stage.label(), deals.len());
      let block = Block::default()
        .title(title)
        .title_bottom(
          Line::from(format!(" {} ", format_money(&self.ctx.currency, self.board.column_value(stage))))
            .centered(),
        )
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));

      let width = columns[i].width.saturating_sub(4) as usize;
      let items: Vec<ListItem> = deals.iter().map(|d| self.card(d, width)).collect();
      let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▌");

      let mut state = ListState::default();
      if focused && dragging.is_none() && !deals.is_empty() {
        state.select(Some(self.row));
      }
      frame.render_stateful_widget(list, columns[i], &mut state);
    }
  }
}

impl View for PipelineView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.confirm.handle_key(key) {
      KeyResult::Event(confirmed) => {
        if let Some(deal) = self.deleting.take().filter(|_| confirmed) {
          let crm = self.ctx.crm.clone();
          let id = deal.id;
          spawn_delete(
            &self.ctx.toasts,
            "Deal",
            deal.title,
            async move { crm.delete_deal(id).await }.boxed(),
          );
        }
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    let dragging = self.board.dragging().is_some();
    match key.code {
      KeyCode::Char('h') | KeyCode::Left => self.move_column(false),
      KeyCode::Char('l') | KeyCode::Right => self.move_column(true),
      KeyCode::Char('j') | KeyCode::Down if !dragging => self.move_row(true),
      KeyCode::Char('k') | KeyCode::Up if !dragging => self.move_row(false),
      KeyCode::Char('m') | KeyCode::Char(' ') => {
        if dragging {
          self.drop_here();
        } else {
          self.pick_up();
        }
      }
      KeyCode::Enter if dragging => self.drop_here(),
      KeyCode::Esc if dragging => {
        let picked = self.board.dragging();
        self.board.cancel_drag();
        if let Some((stage, index)) = picked.and_then(|id| self.board.position(id)) {
          self.column = stage.index();
          self.row = index;
        }
        self.clamp_row();
      }
      KeyCode::Enter | KeyCode::Char('e') if !dragging => {
        if let Some(deal) = self.selected() {
          return ViewAction::Push(Box::new(FormView::<DealDraft>::edit(
            self.ctx.clone(),
            deal.id,
            deal,
          )));
        }
      }
      KeyCode::Char('n') if !dragging => {
        if let Some(form) = self.new_form() {
          return ViewAction::Push(form);
        }
      }
      KeyCode::Char('d') if !dragging => {
        if let Some(deal) = self.selected().cloned() {
          self.confirm.ask(format!("Delete deal {}?", deal.title));
          self.deleting = Some(deal);
        }
      }
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let [status, board] = Layout::vertical([Constraint::Length(1), Constraint::Min(4)]).areas(area);

    let text = match (self.query.state(), self.board.dragging()) {
      (QueryState::Loading, _) => " Loading deals...".to_string(),
      (QueryState::Error(e), _) => format!(" Failed to load deals: {}. Press 'r' to retry.", e),
      (_, Some(_)) => format!(
        " Moving to {}: h/l choose stage, Enter drop, Esc cancel",
        self.stage()
      ),
      _ if self.board.is_empty() => " No deals yet. Press 'n' to add one.".to_string(),
      _ => {
        let summary = format!(
          " {} deals · {} open",
          self.board.len(),
          format_money(&self.ctx.currency, self.board.open_value())
        );
        match self.board.pending() {
          0 => summary,
          pending => format!("{} · {} move(s) saving...", summary, pending),
        }
      }
    };
    frame.render_widget(
      Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
      status,
    );

    self.render_board(frame, board);
    self.confirm.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Pipeline".to_string()
  }

  fn route(&self) -> Option<Route> {
    Some(Route::Pipeline)
  }

  fn tick(&mut self) {
    self.poll_moves();
    if self.query.poll() {
      self.sync_board();
    }
  }

  fn captures_input(&self) -> bool {
    self.confirm.is_active()
  }

  /// New deal starting in the focused stage
  fn new_form(&self) -> Option<Box<dyn View>> {
    let draft = DealDraft {
      stage: self.stage().label().to_string(),
      ..DealDraft::default()
    };
    Some(Box::new(FormView::create(self.ctx.clone(), draft)))
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    if self.board.dragging().is_some() {
      return vec![
        Shortcut::new("h/l", "stage"),
        Shortcut::new("Enter", "drop"),
        Shortcut::new("Esc", "cancel"),
      ];
    }
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("m", "move"),
      Shortcut::new("n", "new"),
      Shortcut::new("e", "edit"),
      Shortcut::new("d", "delete"),
      Shortcut::new("r", "refresh"),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::FakeCrm;
  use crate::api::CachedCrm;
  use crate::cache::QueryCache;
  use crate::config::DashboardConfig;
  use crate::toast::{ToastVariant, Toaster};
  use crossterm::event::KeyModifiers;
  use std::sync::Arc;
  use std::time::Duration;

  fn setup() -> (Arc<FakeCrm>, PipelineView, Toaster) {
    let fake = Arc::new(
      FakeCrm::new()
        .with_deal("Renewal", DealStage::Lead, 1000.0)
        .with_deal("Expansion", DealStage::Lead, 5000.0),
    );
    let (toaster, toasts) = Toaster::channel();
    let ctx = ViewContext {
      crm: CachedCrm::new(fake.clone(), QueryCache::default()),
      toasts,
      dashboard: DashboardConfig::default(),
      currency: "$".into(),
    };
    (fake, PipelineView::new(ctx), toaster)
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  async fn run_ticks(view: &mut PipelineView, n: usize) {
    for _ in 0..n {
      tokio::time::sleep(Duration::from_millis(5)).await;
      view.tick();
    }
  }

  fn titles(view: &PipelineView, stage: DealStage) -> Vec<String> {
    view.board.column(stage).iter().map(|d| d.title.clone()).collect()
  }

  #[tokio::test]
  async fn test_successful_move_sticks() {
    let (fake, mut view, _toaster) = setup();
    run_ticks(&mut view, 5).await;
    assert_eq!(titles(&view, DealStage::Lead).len(), 2);

    view.handle_key(key(KeyCode::Char('m')));
    view.handle_key(key(KeyCode::Char('l')));
    view.handle_key(key(KeyCode::Enter));
    // Applied before the service answered
    assert_eq!(titles(&view, DealStage::Qualified), vec!["Renewal"]);

    run_ticks(&mut view, 10).await;

    assert_eq!(fake.calls("update_deal_stage"), 1);
    assert_eq!(titles(&view, DealStage::Qualified), vec!["Renewal"]);
    assert_eq!(titles(&view, DealStage::Lead), vec!["Expansion"]);
    assert_eq!(view.board.pending(), 0);
  }

  #[tokio::test]
  async fn test_failed_move_rolls_back_and_toasts() {
    let (fake, mut view, mut toaster) = setup();
    run_ticks(&mut view, 5).await;
    fake.fail("update_deal_stage", ServiceError::Transport("offline".into()));

    view.handle_key(key(KeyCode::Char('m')));
    view.handle_key(key(KeyCode::Char('l')));
    view.handle_key(key(KeyCode::Char('l')));
    view.handle_key(key(KeyCode::Enter));
    assert_eq!(titles(&view, DealStage::Proposal), vec!["Renewal"]);

    run_ticks(&mut view, 10).await;

    assert_eq!(titles(&view, DealStage::Lead), vec!["Renewal", "Expansion"]);
    assert!(titles(&view, DealStage::Proposal).is_empty());

    toaster.tick();
    let toast = toaster.visible().last().unwrap();
    assert_eq!(toast.variant, ToastVariant::Destructive);
    assert_eq!(toast.title, "Failed to move deal");
  }

  #[tokio::test]
  async fn test_confirmed_move_survives_failed_refetch() {
    let (fake, mut view, mut toaster) = setup();
    run_ticks(&mut view, 5).await;
    fake.fail("list_deals", ServiceError::Transport("offline".into()));

    view.handle_key(key(KeyCode::Char('m')));
    view.handle_key(key(KeyCode::Char('l')));
    view.handle_key(key(KeyCode::Enter));
    run_ticks(&mut view, 10).await;

    assert_eq!(fake.calls("update_deal_stage"), 1);
    assert!(fake.calls("list_deals") >= 2);
    assert!(view.query.is_error());
    assert_eq!(titles(&view, DealStage::Qualified), vec!["Renewal"]);
    assert_eq!(titles(&view, DealStage::Lead), vec!["Expansion"]);
    assert_eq!(
      view.board.state(1),
      DragState::Confirmed {
        stage: DealStage::Qualified
      }
    );

    toaster.tick();
    assert!(toaster.is_empty());
  }

  #[tokio::test]
  async fn test_escape_cancels_drag_without_calling_service() {
    let (fake, mut view, _toaster) = setup();
    run_ticks(&mut view, 5).await;

    view.handle_key(key(KeyCode::Char('m')));
    view.handle_key(key(KeyCode::Char('l')));
    assert!(matches!(view.handle_key(key(KeyCode::Esc)), ViewAction::None));

    run_ticks(&mut view, 3).await;
    assert_eq!(fake.calls("update_deal_stage"), 0);
    assert_eq!(view.board.dragging(), None);
    assert_eq!(titles(&view, DealStage::Lead).len(), 2);
    assert_eq!(view.column, 0);
  }
}
