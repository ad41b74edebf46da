use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Bar, BarChart, BarGroup, List, ListItem, Paragraph};

use super::{panel, FormView};
use crate::api::{DashboardStats, Deal, PipelineStats};
use crate::forms::DealDraft;
use crate::query::{Query, QueryState};
use crate::routes::Route;
use crate::ui::renderfns::{format_money, stage_color, title_with_state, truncate};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};

/// Headline numbers, pipeline summary, recent deals and deals closing soon
pub struct DashboardView {
  ctx: ViewContext,
  stats: Query<DashboardStats>,
  pipeline: Query<PipelineStats>,
  recent: Query<Vec<Deal>>,
  closing: Query<Vec<Deal>>,
}

impl DashboardView {
  pub fn new(ctx: ViewContext) -> Self {
    let crm = &ctx.crm;
    let mut stats = crm.query(crm.dashboard_stats());
    let mut pipeline = crm.query(crm.pipeline_stats());
    let mut recent = crm.query(crm.recent_deals(ctx.dashboard.recent_deals_limit));
    let mut closing = crm.query(crm.deals_near_closing(ctx.dashboard.closing_limit));
    stats.fetch();
    pipeline.fetch();
    recent.fetch();
    closing.fetch();

    Self {
      ctx,
      stats,
      pipeline,
      recent,
      closing,
    }
  }

  fn money(&self, amount: f64) -> String {
    format_money(&self.ctx.currency, amount)
  }

  fn render_stats(&self, frame: &mut Frame, area: Rect) {
    let cards = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(area);
    let stats = self.stats.data();

    let placeholder = match self.stats.state() {
      QueryState::Error(_) => "error",
      _ => "…",
    };
    let show = |text: Option<String>| text.unwrap_or_else(|| placeholder.to_string());

    let entries = [
      ("Clients", show(stats.map(|s| s.total_clients.to_string())), Color::Cyan),
      ("Active projects", show(stats.map(|s| s.active_projects.to_string())), Color::Yellow),
      ("Open deals", show(stats.map(|s| s.open_deals.to_string())), Color::Blue),
      ("Pipeline value", show(stats.map(|s| self.money(s.pipeline_value))), Color::Green),
    ];

    for ((label, text, color), card) in entries.into_iter().zip(cards.iter()) {
      let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(text, Style::default().fg(color).bold())),
        Line::from(Span::styled(label, Style::default().fg(Color::DarkGray))),
      ])
      .alignment(Alignment::Center)
      .block(panel(String::new(), false));
      frame.render_widget(paragraph, *card);
    }
  }

  fn render_pipeline(&self, frame: &mut Frame, area: Rect) {
    let title = match (self.pipeline.state(), self.pipeline.data(), self.stats.data()) {
      (QueryState::Loading, _, _) => " Pipeline (loading...) ".to_string(),
      (QueryState::Error(e), _, _) => format!(" Pipeline (error: {}) ", e),
      (_, Some(p), Some(s)) => format!(
        " Pipeline  weighted {}  won this month {}  conversion {:.0}% ",
        self.money(p.weighted_value),
        self.money(s.won_this_month),
        s.conversion_rate * 100.0
      ),
      (_, Some(p), None) => format!(" Pipeline  weighted {} ", self.money(p.weighted_value)),
      _ => " Pipeline ".to_string(),
    };

    let bars: Vec<Bar> = self
      .pipeline
      .data()
      .map(|p| {
        p.stages
          .iter()
          .map(|s| {
            Bar::default()
              .label(Line::from(s.stage.label()))
              .value(s.count)
              .text_value(format!("{} · {}", s.count, self.money(s.value)))
              .style(Style::default().fg(stage_color(s.stage)))
          })
          .collect()
      })
      .unwrap_or_default();

    let bar_width = (area.width.saturating_sub(2) / bars.len().max(1) as u16)
      .saturating_sub(1)
      .max(1);
    let chart = BarChart::default()
      .block(panel(title, false))
      .data(BarGroup::default().bars(&bars))
      .bar_width(bar_width)
      .bar_gap(1);
    frame.render_widget(chart, area);
  }

  fn deal_items(&self, deals: &[Deal], with_close: bool) -> Vec<ListItem<'static>> {
    let today = Local::now().date_naive();
    deals
      .iter()
      .map(|deal| {
        let mut spans = vec![
          Span::styled(format!("{:<28}", truncate(&deal.title, 28)), Style::default().fg(Color::Cyan)),
          Span::raw(" "),
          Span::styled(
            format!("{:<12}", deal.stage.label()),
            Style::default().fg(stage_color(deal.stage)),
          ),
          Span::raw(format!("{:>12}", self.money(deal.value))),
        ];
        if with_close {
          if let Some(close) = deal.expected_close {
            let days = (close - today).num_days();
            let color = if days < 0 { Color::Red } else if days <= 7 { Color::Yellow } else { Color::Gray };
            spans.push(Span::styled(format!("  {}", close), Style::default().fg(color)));
          }
        } else if let Some(client) = &deal.client_name {
          spans.push(Span::styled(
            format!("  {}", truncate(client, 20)),
            Style::default().fg(Color::DarkGray),
          ));
        }
        ListItem::new(Line::from(spans))
      })
      .collect()
  }

  fn render_deals(&self, frame: &mut Frame, area: Rect, label: &str, query: &Query<Vec<Deal>>, with_close: bool) {
    let deals = query.data().map(Vec::as_slice).unwrap_or(&[]);
    let block = panel(title_with_state(label, query.state(), deals.len()), false);

    if deals.is_empty() && !query.is_loading() {
      let content = if query.is_error() { "Failed to load deals." } else { "No deals." };
      frame.render_widget(
        Paragraph::new(content)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        area,
      );
      return;
    }

    frame.render_widget(List::new(self.deal_items(deals, with_close)).block(block), area);
  }
}

impl View for DashboardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.stats.refetch();
        self.pipeline.refetch();
        self.recent.refetch();
        self.closing.refetch();
        ViewAction::None
      }
      KeyCode::Char('p') => ViewAction::Navigate(Route::Pipeline),
      KeyCode::Char('c') => ViewAction::Navigate(Route::Clients),
      KeyCode::Char('n') => self.new_form().map(ViewAction::Push).unwrap_or(ViewAction::None),
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let [cards, pipeline, lists] = Layout::vertical([
      Constraint::Length(4),
      Constraint::Length(10),
      Constraint::Min(4),
    ])
    .areas(area);
    let [recent, closing] =
      Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(lists);

    self.render_stats(frame, cards);
    self.render_pipeline(frame, pipeline);
    self.render_deals(frame, recent, "Recent Deals", &self.recent, false);
    self.render_deals(frame, closing, "Closing Soon", &self.closing, true);
  }

  fn breadcrumb_label(&self) -> String {
    "Dashboard".to_string()
  }

  fn route(&self) -> Option<Route> {
    Some(Route::Dashboard)
  }

  fn tick(&mut self) {
    self.stats.poll();
    self.pipeline.poll();
    self.recent.poll();
    self.closing.poll();
  }

  fn new_form(&self) -> Option<Box<dyn View>> {
    Some(Box::new(FormView::create(
      self.ctx.clone(),
      DealDraft::default(),
    )))
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("p", "pipeline"),
      Shortcut::new("c", "clients"),
      Shortcut::new("n", "new deal"),
      Shortcut::new("r", "refresh"),
    ]
  }
}
