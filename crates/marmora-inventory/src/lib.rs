use marmora_core::StockMoveKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stock position for one product, derived by replaying its stock moves in
/// order. Valuation is moving average cost.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockPosition {
    pub quantity_on_hand: Decimal,
    pub average_cost: Decimal,
}

impl StockPosition {
    pub fn apply(&mut self, kind: StockMoveKind, quantity: Decimal, price_per_unit: Decimal) {
        if kind.is_inbound() {
            self.receive(quantity, price_per_unit);
        } else {
            self.issue(quantity);
        }
    }

    pub fn receive(&mut self, quantity: Decimal, unit_cost: Decimal) {
        let current_value = self.quantity_on_hand * self.average_cost;
        let incoming_value = quantity * unit_cost;
        let new_qty = self.quantity_on_hand + quantity;

        if new_qty.is_zero() {
            self.average_cost = Decimal::ZERO;
            self.quantity_on_hand = Decimal::ZERO;
            return;
        }

        self.average_cost = (current_value + incoming_value) / new_qty;
        self.quantity_on_hand = new_qty;
    }

    pub fn issue(&mut self, quantity: Decimal) -> Decimal {
        let cost_of_goods = quantity * self.average_cost;
        self.quantity_on_hand -= quantity;
        cost_of_goods
    }

    pub fn stock_value(&self) -> Decimal {
        self.quantity_on_hand * self.average_cost
    }
}

/// Replays a full move history into a position.
pub fn replay<I>(moves: I) -> StockPosition
where
    I: IntoIterator<Item = (StockMoveKind, Decimal, Decimal)>,
{
    let mut position = StockPosition::default();
    for (kind, quantity, price_per_unit) in moves {
        position.apply(kind, quantity, price_per_unit);
    }
    position
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn receive_blends_average_cost() {
        let mut position = StockPosition::default();
        position.receive(dec!(10), dec!(100));
        position.receive(dec!(10), dec!(200));
        assert_eq!(position.quantity_on_hand, dec!(20));
        assert_eq!(position.average_cost, dec!(150));
        assert_eq!(position.stock_value(), dec!(3000));
    }

    #[test]
    fn issue_reduces_quantity_at_average_cost() {
        let mut position = StockPosition::default();
        position.receive(dec!(20), dec!(150));
        let cogs = position.issue(dec!(5));
        assert_eq!(cogs, dec!(750));
        assert_eq!(position.quantity_on_hand, dec!(15));
        assert_eq!(position.average_cost, dec!(150));
    }

    #[test]
    fn replay_honors_move_kinds() {
        let position = replay([
            (StockMoveKind::Purchase, dec!(50), dec!(80)),
            (StockMoveKind::Sale, dec!(20), dec!(120)),
            (StockMoveKind::AdjustmentOut, dec!(5), dec!(0)),
            (StockMoveKind::AdjustmentIn, dec!(10), dec!(80)),
        ]);
        assert_eq!(position.quantity_on_hand, dec!(35));
        assert_eq!(position.average_cost, dec!(80));
    }

    #[test]
    fn zero_quantity_resets_average_cost() {
        let mut position = StockPosition::default();
        position.receive(dec!(4), dec!(25));
        position.receive(dec!(-4), dec!(25));
        assert_eq!(position.quantity_on_hand, Decimal::ZERO);
        assert_eq!(position.average_cost, Decimal::ZERO);
    }
}
