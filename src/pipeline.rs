//! Kanban grouping of deals with optimistic stage moves.
//!
//! Moving a card is a small state machine per deal:
//!
//! ```text
//! Idle -> Dragging -> OptimisticallyPlaced -> Confirmed
//!                                          -> RolledBack
//! ```
//!
//! The board applies a drop to its grouping immediately and hands back a
//! [`StageMove`]. Whoever runs the remote update later feeds that move to
//! [`PipelineBoard::confirm`] or [`PipelineBoard::roll_back`].

use std::collections::HashMap;
use tracing::debug;

use crate::api::{Deal, DealStage, Id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
  #[default]
  Idle,
  /// Picked up, not dropped yet
  Dragging { from: DealStage },
  /// Shown in the new stage while the update is in flight
  OptimisticallyPlaced { from: DealStage, to: DealStage },
  Confirmed { stage: DealStage },
  RolledBack { stage: DealStage },
}

impl DragState {
  /// Waiting for the remote update
  pub fn is_pending(&self) -> bool {
    matches!(self, DragState::OptimisticallyPlaced { .. })
  }
}

/// A drop applied locally and not yet confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageMove {
  pub deal_id: Id,
  pub from: DealStage,
  /// Position in the origin column before the move
  pub from_index: usize,
  pub to: DealStage,
}

/// Deals grouped by stage, in board order.
#[derive(Debug, Clone)]
pub struct PipelineBoard {
  columns: Vec<Vec<Deal>>,
  states: HashMap<Id, DragState>,
  dragging: Option<Id>,
}

impl Default for PipelineBoard {
  fn default() -> Self {
    Self {
      columns: vec![Vec::new(); DealStage::ALL.len()],
      states: HashMap::new(),
      dragging: None,
    }
  }
}

impl PipelineBoard {
  pub fn new(deals: Vec<Deal>) -> Self {
    let mut board = Self::default();
    board.set_deals(deals);
    board
  }

  /// Regroup from fresh server data.
  ///
  /// Order inside a stage follows the input. Deals with a move in flight stay
  /// in their optimistic stage so a refetch cannot snap them back early.
  /// Settled states are cleared; the data now reflects them.
  pub fn set_deals(&mut self, deals: Vec<Deal>) {
    for column in &mut self.columns {
      column.clear();
    }
    self
      .states
      .retain(|id, state| state.is_pending() || (self.dragging == Some(*id)));

    let mut present = Vec::with_capacity(deals.len());
    for mut deal in deals {
      present.push(deal.id);
      match self.states.get(&deal.id).copied() {
        Some(DragState::OptimisticallyPlaced { to, .. }) => deal.stage = to,
        Some(DragState::Dragging { from }) if from != deal.stage => {
          // Moved elsewhere meanwhile; the pick-up no longer applies
          self.states.remove(&deal.id);
          self.dragging = None;
        }
        _ => {}
      }
      self.columns[deal.stage.index()].push(deal);
    }

    self.states.retain(|id, _| present.contains(id));
    if self.dragging.is_some_and(|id| !present.contains(&id)) {
      self.dragging = None;
    }
  }

  pub fn column(&self, stage: DealStage) -> &[Deal] {
    &self.columns[stage.index()]
  }

  /// Total value of the deals in a stage
  pub fn column_value(&self, stage: DealStage) -> f64 {
    self.column(stage).iter().map(|d| d.value).sum()
  }

  /// Value of the deals not yet won or lost
  pub fn open_value(&self) -> f64 {
    DealStage::ALL
      .into_iter()
      .filter(DealStage::is_open)
      .map(|stage| self.column_value(stage))
      .sum()
  }

  pub fn len(&self) -> usize {
    self.columns.iter().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Stage and position of a deal
  pub fn position(&self, id: Id) -> Option<(DealStage, usize)> {
    DealStage::ALL.into_iter().find_map(|stage| {
      self
        .column(stage)
        .iter()
        .position(|d| d.id == id)
        .map(|index| (stage, index))
    })
  }

  pub fn state(&self, id: Id) -> DragState {
    self.states.get(&id).copied().unwrap_or_default()
  }

  /// The deal currently picked up
  pub fn dragging(&self) -> Option<Id> {
    self.dragging
  }

  /// Number of moves waiting for the remote update
  pub fn pending(&self) -> usize {
    self.states.values().filter(|s| s.is_pending()).count()
  }

  /// Pick up a deal. Fails when another drag is active, the deal is unknown,
  /// or its previous move is still in flight.
  pub fn begin_drag(&mut self, id: Id) -> bool {
    if self.dragging.is_some() || self.state(id).is_pending() {
      return false;
    }
    let Some((from, _)) = self.position(id) else {
      return false;
    };
    self.dragging = Some(id);
    self.states.insert(id, DragState::Dragging { from });
    debug!(deal = id, %from, "drag started");
    true
  }

  /// Drop the dragged deal on a stage.
  ///
  /// The new grouping is applied immediately. Dropping on the origin stage
  /// simply ends the drag and returns `None`.
  pub fn drop_on(&mut self, to: DealStage) -> Option<StageMove> {
    let id = self.dragging.take()?;
    let Some(DragState::Dragging { from }) = self.states.get(&id).copied() else {
      return None;
    };

    if from == to {
      self.states.remove(&id);
      return None;
    }

    let Some(from_index) = self.column(from).iter().position(|d| d.id == id) else {
      self.states.remove(&id);
      return None;
    };
    let mut deal = self.columns[from.index()].remove(from_index);
    deal.stage = to;
    self.columns[to.index()].push(deal);
    self
      .states
      .insert(id, DragState::OptimisticallyPlaced { from, to });
    debug!(deal = id, %from, %to, "deal placed optimistically");

    Some(StageMove {
      deal_id: id,
      from,
      from_index,
      to,
    })
  }

  pub fn cancel_drag(&mut self) {
    if let Some(id) = self.dragging.take() {
      self.states.remove(&id);
    }
  }

  /// The remote update succeeded. `updated` replaces the local copy when
  /// the service returned the record.
  pub fn confirm(&mut self, mv: &StageMove, updated: Option<Deal>) {
    if !self.is_placed(mv) {
      return;
    }
    if let Some(updated) = updated {
      if let Some(slot) = self.columns[mv.to.index()]
        .iter_mut()
        .find(|d| d.id == mv.deal_id)
      {
        *slot = Deal {
          stage: mv.to,
          ..updated
        };
      }
    }
    self
      .states
      .insert(mv.deal_id, DragState::Confirmed { stage: mv.to });
  }

  /// The remote update failed: put the deal back where it was.
  pub fn roll_back(&mut self, mv: &StageMove) {
    if !self.is_placed(mv) {
      return;
    }
    let column = &mut self.columns[mv.to.index()];
    if let Some(index) = column.iter().position(|d| d.id == mv.deal_id) {
      let mut deal = column.remove(index);
      deal.stage = mv.from;
      let origin = &mut self.columns[mv.from.index()];
      let index = mv.from_index.min(origin.len());
      origin.insert(index, deal);
    }
    self
      .states
      .insert(mv.deal_id, DragState::RolledBack { stage: mv.from });
    debug!(deal = mv.deal_id, stage = %mv.from, "move rolled back");
  }

  fn is_placed(&self, mv: &StageMove) -> bool {
    self.state(mv.deal_id)
      == DragState::OptimisticallyPlaced {
        from: mv.from,
        to: mv.to,
      }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn deal(id: Id, stage: DealStage, value: f64) -> Deal {
    Deal {
      id,
      title: format!("Deal {}", id),
      client_id: None,
      client_name: None,
      value,
      stage,
      expected_close: None,
      probability: 50,
      updated_at: None,
    }
  }

  fn ids(board: &PipelineBoard, stage: DealStage) -> Vec<Id> {
    board.column(stage).iter().map(|d| d.id).collect()
  }

  fn sample() -> PipelineBoard {
    PipelineBoard::new(vec![
      deal(1, DealStage::Lead, 100.0),
      deal(2, DealStage::Proposal, 250.0),
      deal(3, DealStage::Lead, 50.0),
      deal(4, DealStage::Lead, 75.0),
    ])
  }

  #[test]
  fn test_grouping_keeps_service_order() {
    let board = sample();
    assert_eq!(ids(&board, DealStage::Lead), vec![1, 3, 4]);
    assert_eq!(ids(&board, DealStage::Proposal), vec![2]);
    assert!(board.column(DealStage::Won).is_empty());
    assert_eq!(board.column_value(DealStage::Lead), 225.0);
    assert_eq!(board.len(), 4);
  }

  #[test]
  fn test_open_value_skips_closed_stages() {
    let board = PipelineBoard::new(vec![
      deal(1, DealStage::Lead, 100.0),
      deal(2, DealStage::Negotiation, 250.0),
      deal(3, DealStage::Won, 1000.0),
      deal(4, DealStage::Lost, 40.0),
    ]);
    assert_eq!(board.open_value(), 350.0);
  }

  #[test]
  fn test_drop_applies_grouping_immediately() {
    let mut board = sample();
    assert!(board.begin_drag(3));
    assert_eq!(board.state(3), DragState::Dragging { from: DealStage::Lead });

    let mv = board.drop_on(DealStage::Negotiation).unwrap();
    assert_eq!(
      mv,
      StageMove {
        deal_id: 3,
        from: DealStage::Lead,
        from_index: 1,
        to: DealStage::Negotiation,
      }
    );
    assert_eq!(ids(&board, DealStage::Lead), vec![1, 4]);
    assert_eq!(ids(&board, DealStage::Negotiation), vec![3]);
    assert_eq!(board.column(DealStage::Negotiation)[0].stage, DealStage::Negotiation);
    assert!(board.state(3).is_pending());
    assert_eq!(board.dragging(), None);
    assert_eq!(board.pending(), 1);
  }

  #[test]
  fn test_roll_back_restores_exact_position() {
    let mut board = sample();
    board.begin_drag(3);
    let mv = board.drop_on(DealStage::Won).unwrap();

    board.roll_back(&mv);

    assert_eq!(ids(&board, DealStage::Lead), vec![1, 3, 4]);
    assert!(board.column(DealStage::Won).is_empty());
    assert_eq!(board.column(DealStage::Lead)[1].stage, DealStage::Lead);
    assert_eq!(
      board.state(3),
      DragState::RolledBack {
        stage: DealStage::Lead
      }
    );
  }

  #[test]
  fn test_confirm_keeps_new_grouping() {
    let mut board = sample();
    board.begin_drag(1);
    let mv = board.drop_on(DealStage::Qualified).unwrap();

    let mut server = deal(1, DealStage::Qualified, 100.0);
    server.probability = 80;
    board.confirm(&mv, Some(server));

    assert_eq!(ids(&board, DealStage::Qualified), vec![1]);
    assert_eq!(board.column(DealStage::Qualified)[0].probability, 80);
    assert_eq!(
      board.state(1),
      DragState::Confirmed {
        stage: DealStage::Qualified
      }
    );

    // A late rollback for a confirmed move is ignored
    board.roll_back(&mv);
    assert_eq!(ids(&board, DealStage::Qualified), vec![1]);
  }

  #[test]
  fn test_drop_on_origin_cancels() {
    let mut board = sample();
    board.begin_drag(2);
    assert_eq!(board.drop_on(DealStage::Proposal), None);
    assert_eq!(board.state(2), DragState::Idle);
    assert_eq!(ids(&board, DealStage::Proposal), vec![2]);
  }

  #[test]
  fn test_one_drag_at_a_time() {
    let mut board = sample();
    assert!(board.begin_drag(1));
    assert!(!board.begin_drag(2));
    board.cancel_drag();
    assert_eq!(board.state(1), DragState::Idle);
    assert!(board.begin_drag(2));
    assert!(!board.begin_drag(99));
  }

  #[test]
  fn test_pending_deal_cannot_be_dragged_again() {
    let mut board = sample();
    board.begin_drag(4);
    board.drop_on(DealStage::Lost).unwrap();
    assert!(!board.begin_drag(4));
    assert_eq!(board.dragging(), None);
  }

  #[test]
  fn test_refetch_keeps_pending_moves_and_clears_settled_ones() {
    let mut board = sample();
    board.begin_drag(1);
    let settled = board.drop_on(DealStage::Won).unwrap();
    board.confirm(&settled, None);
    board.begin_drag(3);
    board.drop_on(DealStage::Proposal).unwrap();

    // Server already knows about deal 1, not yet about deal 3
    board.set_deals(vec![
      deal(1, DealStage::Won, 100.0),
      deal(2, DealStage::Proposal, 250.0),
      deal(3, DealStage::Lead, 50.0),
      deal(4, DealStage::Lead, 75.0),
    ]);

    assert_eq!(ids(&board, DealStage::Won), vec![1]);
    assert_eq!(ids(&board, DealStage::Proposal), vec![2, 3]);
    assert_eq!(ids(&board, DealStage::Lead), vec![4]);
    assert_eq!(board.state(1), DragState::Idle);
    assert!(board.state(3).is_pending());
  }

  #[test]
  fn test_drop_of_card_missing_from_origin_clears_drag() {
    let mut board = sample();
    assert!(board.begin_drag(4));
    board.columns[DealStage::Lead.index()].retain(|d| d.id != 4);

    assert_eq!(board.drop_on(DealStage::Won), None);
    assert_eq!(board.state(4), DragState::Idle);
    assert_eq!(board.dragging(), None);
    assert!(board.begin_drag(1));
  }

  #[test]
  fn test_refetch_drops_vanished_drag() {
    let mut board = sample();
    board.begin_drag(2);
    board.set_deals(vec![deal(1, DealStage::Lead, 100.0)]);
    assert_eq!(board.dragging(), None);
    assert_eq!(board.drop_on(DealStage::Won), None);
  }
}
