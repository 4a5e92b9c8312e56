//! Bill/ledger grouping: turns a flat, time-ordered sequence of signed
//! ledger rows into per-bill summaries and a running-balance statement.
//!
//! Amounts arrive pre-signed from the data source (sales and charges
//! positive, payments, payouts, and discounts negative). The transform is a
//! pure single pass: it never fails, and missing amounts coerce to zero.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerRowKind {
    Sale,
    Payment,
    Payout,
    Charge,
    Discount,
    Executive,
}

impl LedgerRowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerRowKind::Sale => "SALE",
            LedgerRowKind::Payment => "PAYMENT",
            LedgerRowKind::Payout => "PAYOUT",
            LedgerRowKind::Charge => "CHARGE",
            LedgerRowKind::Discount => "DISCOUNT",
            LedgerRowKind::Executive => "EXECUTIVE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SALE" => Some(LedgerRowKind::Sale),
            "PAYMENT" => Some(LedgerRowKind::Payment),
            "PAYOUT" => Some(LedgerRowKind::Payout),
            "CHARGE" => Some(LedgerRowKind::Charge),
            "DISCOUNT" => Some(LedgerRowKind::Discount),
            "EXECUTIVE" => Some(LedgerRowKind::Executive),
            _ => None,
        }
    }

    /// Counts toward a bill's net total.
    fn affects_net(&self) -> bool {
        matches!(
            self,
            LedgerRowKind::Sale | LedgerRowKind::Charge | LedgerRowKind::Discount
        )
    }

    /// Counts toward a bill's amount paid.
    fn affects_paid(&self) -> bool {
        matches!(self, LedgerRowKind::Payment | LedgerRowKind::Payout)
    }
}

/// One signed financial event as fetched from the ledger view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub bill_no: Option<String>,
    pub kind: LedgerRowKind,
    pub amount: Decimal,
    pub quantity: Option<Decimal>,
    pub price_per_unit: Option<Decimal>,
    pub detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl LedgerRow {
    /// Builds a row applying the coercion policy: a missing amount is zero,
    /// a blank bill number is no bill number.
    pub fn new(
        kind: LedgerRowKind,
        bill_no: Option<String>,
        amount: Option<Decimal>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            bill_no: normalize_bill_no(bill_no),
            kind,
            amount: amount_or_zero(amount),
            quantity: None,
            price_per_unit: None,
            detail: None,
            occurred_at,
        }
    }
}

/// Missing or absent amounts count as zero rather than failing the report.
pub fn amount_or_zero(amount: Option<Decimal>) -> Decimal {
    amount.unwrap_or(Decimal::ZERO)
}

fn normalize_bill_no(bill_no: Option<String>) -> Option<String> {
    bill_no
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// A bill: the ledger rows sharing one bill number, with derived totals.
/// Rows without a bill number form singleton groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillGroup {
    pub bill_no: Option<String>,
    pub items: Vec<LedgerRow>,
    pub executives: Vec<String>,
    pub net: Decimal,
    pub paid: Decimal,
    pub balance: Decimal,
}

impl BillGroup {
    fn empty(bill_no: Option<String>) -> Self {
        Self {
            bill_no,
            items: Vec::new(),
            executives: Vec::new(),
            net: Decimal::ZERO,
            paid: Decimal::ZERO,
            balance: Decimal::ZERO,
        }
    }

    fn push(&mut self, row: LedgerRow) {
        if row.kind == LedgerRowKind::Executive {
            if let Some(label) = row.detail.as_deref().map(str::trim) {
                if !label.is_empty() && !self.executives.iter().any(|known| known == label) {
                    self.executives.push(label.to_string());
                }
            }
            return;
        }

        if row.kind.affects_net() {
            self.net += row.amount;
        }
        if row.kind.affects_paid() {
            self.paid += row.amount.abs();
        }
        self.balance = self.net - self.paid;
        self.items.push(row);
    }
}

/// Groups rows by bill number, preserving first-seen group order and input
/// item order. Rows with no bill number each become their own group.
pub fn group_bills(rows: Vec<LedgerRow>) -> Vec<BillGroup> {
    let mut groups: Vec<BillGroup> = Vec::new();
    let mut index_by_bill: HashMap<String, usize> = HashMap::new();

    for row in rows {
        match row.bill_no.clone() {
            Some(bill_no) => {
                let index = *index_by_bill.entry(bill_no.clone()).or_insert_with(|| {
                    groups.push(BillGroup::empty(Some(bill_no)));
                    groups.len() - 1
                });
                groups[index].push(row);
            }
            None => {
                let mut group = BillGroup::empty(None);
                group.push(row);
                groups.push(group);
            }
        }
    }

    groups
}

/// One statement line: a ledger row and the customer's balance after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementLine {
    pub row: LedgerRow,
    pub running_balance: Decimal,
}

/// Builds the running-balance statement for one party. Rows are ordered by
/// date ascending; equal timestamps keep their source fetch order (stable
/// sort). The cumulative sum includes every row's signed amount, but
/// executive annotations produce no visible line.
pub fn statement(opening_balance: Decimal, mut rows: Vec<LedgerRow>) -> Vec<StatementLine> {
    rows.sort_by_key(|row| row.occurred_at);

    let mut lines = Vec::with_capacity(rows.len());
    let mut balance = opening_balance;
    for row in rows {
        balance += row.amount;
        if row.kind == LedgerRowKind::Executive {
            continue;
        }
        lines.push(StatementLine {
            running_balance: balance,
            row,
        });
    }
    lines
}

/// Running totals over an already-ordered sequence of signed amounts.
pub fn running_totals(
    opening_balance: Decimal,
    amounts: impl IntoIterator<Item = Decimal>,
) -> Vec<Decimal> {
    let mut balance = opening_balance;
    amounts
        .into_iter()
        .map(|amount| {
            balance += amount;
            balance
        })
        .collect()
}

/// The party's balance after all rows: opening balance plus the sum of
/// every signed amount.
pub fn closing_balance(opening_balance: Decimal, rows: &[LedgerRow]) -> Decimal {
    opening_balance + rows.iter().map(|row| row.amount).sum::<Decimal>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, minute, 0).unwrap()
    }

    fn row(kind: LedgerRowKind, bill_no: Option<&str>, amount: Decimal, minute: u32) -> LedgerRow {
        LedgerRow::new(
            kind,
            bill_no.map(str::to_string),
            Some(amount),
            at(minute),
        )
    }

    #[test]
    fn worked_example_single_bill() {
        // Opening 500; Sale +1000, Payment -400, Charge +50, all on bill A.
        let rows = vec![
            row(LedgerRowKind::Sale, Some("A"), dec!(1000), 0),
            row(LedgerRowKind::Payment, Some("A"), dec!(-400), 1),
            row(LedgerRowKind::Charge, Some("A"), dec!(50), 2),
        ];

        let groups = group_bills(rows.clone());
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.bill_no.as_deref(), Some("A"));
        assert_eq!(group.net, dec!(1050));
        assert_eq!(group.paid, dec!(400));
        assert_eq!(group.balance, dec!(650));
        assert_eq!(group.items.len(), 3);

        assert_eq!(closing_balance(dec!(500), &rows), dec!(1150));
        let lines = statement(dec!(500), rows);
        assert_eq!(lines.last().unwrap().running_balance, dec!(1150));
    }

    #[test]
    fn rows_without_bill_number_are_singleton_groups() {
        let rows = vec![
            row(LedgerRowKind::Sale, None, dec!(200), 0),
            row(LedgerRowKind::Payment, None, dec!(-50), 1),
        ];

        let groups = group_bills(rows);
        assert_eq!(groups.len(), 2);

        assert_eq!(groups[0].net, dec!(200));
        assert_eq!(groups[0].paid, dec!(0));
        assert_eq!(groups[0].balance, dec!(200));

        assert_eq!(groups[1].net, dec!(0));
        assert_eq!(groups[1].paid, dec!(50));
        assert_eq!(groups[1].balance, dec!(-50));
    }

    #[test]
    fn blank_bill_number_is_treated_as_absent() {
        let rows = vec![
            row(LedgerRowKind::Sale, Some("  "), dec!(100), 0),
            row(LedgerRowKind::Sale, Some(""), dec!(100), 1),
        ];
        let groups = group_bills(rows);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|group| group.bill_no.is_none()));
    }

    #[test]
    fn executive_rows_become_labels_not_items() {
        let mut annotation = row(LedgerRowKind::Executive, Some("B-7"), dec!(0), 0);
        annotation.detail = Some("Ravi".to_string());
        let mut duplicate = annotation.clone();
        duplicate.occurred_at = at(3);

        let rows = vec![
            row(LedgerRowKind::Sale, Some("B-7"), dec!(900), 1),
            annotation,
            duplicate,
            row(LedgerRowKind::Discount, Some("B-7"), dec!(-100), 2),
        ];

        let groups = group_bills(rows.clone());
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.executives, vec!["Ravi".to_string()]);
        assert_eq!(group.items.len(), 2);
        assert_eq!(group.net, dec!(800));
        assert_eq!(group.paid, dec!(0));

        // No statement line either, but the (zero) amount still sums.
        let lines = statement(dec!(0), rows);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines.last().unwrap().running_balance, dec!(800));
    }

    #[test]
    fn discount_lowers_net_rather_than_counting_as_paid() {
        let rows = vec![
            row(LedgerRowKind::Sale, Some("C"), dec!(500), 0),
            row(LedgerRowKind::Discount, Some("C"), dec!(-75), 1),
            row(LedgerRowKind::Payout, Some("C"), dec!(-25), 2),
        ];
        let group = group_bills(rows).remove(0);
        assert_eq!(group.net, dec!(425));
        assert_eq!(group.paid, dec!(25));
        assert_eq!(group.balance, dec!(400));
    }

    #[test]
    fn groups_keep_first_seen_order_across_interleaved_bills() {
        let rows = vec![
            row(LedgerRowKind::Sale, Some("X"), dec!(10), 0),
            row(LedgerRowKind::Sale, Some("Y"), dec!(20), 1),
            row(LedgerRowKind::Payment, Some("X"), dec!(-5), 2),
        ];
        let groups = group_bills(rows);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].bill_no.as_deref(), Some("X"));
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[1].bill_no.as_deref(), Some("Y"));
    }

    #[test]
    fn statement_sorts_by_date_with_stable_ties() {
        let rows = vec![
            row(LedgerRowKind::Payment, None, dec!(-30), 5),
            row(LedgerRowKind::Sale, Some("D"), dec!(100), 1),
            // Same timestamp as the payment above: fetch order wins.
            row(LedgerRowKind::Charge, Some("D"), dec!(10), 5),
        ];

        let lines = statement(dec!(0), rows);
        assert_eq!(lines[0].row.kind, LedgerRowKind::Sale);
        assert_eq!(lines[1].row.kind, LedgerRowKind::Payment);
        assert_eq!(lines[2].row.kind, LedgerRowKind::Charge);
        assert_eq!(
            lines.iter().map(|line| line.running_balance).collect::<Vec<_>>(),
            vec![dec!(100), dec!(70), dec!(80)]
        );
    }

    #[test]
    fn missing_amount_coerces_to_zero() {
        let rows = vec![
            LedgerRow::new(LedgerRowKind::Sale, Some("E".to_string()), None, at(0)),
            row(LedgerRowKind::Sale, Some("E"), dec!(40), 1),
        ];
        let group = group_bills(rows.clone()).remove(0);
        assert_eq!(group.net, dec!(40));
        assert_eq!(closing_balance(dec!(0), &rows), dec!(40));
    }

    #[test]
    fn running_totals_walks_left_to_right() {
        let totals = running_totals(dec!(500), [dec!(1000), dec!(-400), dec!(50)]);
        assert_eq!(totals, vec![dec!(1500), dec!(1100), dec!(1150)]);
        assert!(running_totals(dec!(7), []).is_empty());
    }

    fn kind_strategy() -> impl Strategy<Value = LedgerRowKind> {
        prop_oneof![
            Just(LedgerRowKind::Sale),
            Just(LedgerRowKind::Payment),
            Just(LedgerRowKind::Payout),
            Just(LedgerRowKind::Charge),
            Just(LedgerRowKind::Discount),
            Just(LedgerRowKind::Executive),
        ]
    }

    // Amounts signed the way the data source signs them; executives zero.
    fn row_strategy() -> impl Strategy<Value = LedgerRow> {
        (
            kind_strategy(),
            prop::option::of("[A-C]"),
            1i64..100_000i64,
            0u32..50u32,
        )
            .prop_map(|(kind, bill_no, magnitude, minute)| {
                let amount = match kind {
                    LedgerRowKind::Sale | LedgerRowKind::Charge => Decimal::new(magnitude, 2),
                    LedgerRowKind::Payment | LedgerRowKind::Payout | LedgerRowKind::Discount => {
                        -Decimal::new(magnitude, 2)
                    }
                    LedgerRowKind::Executive => Decimal::ZERO,
                };
                let mut row = LedgerRow::new(kind, bill_no, Some(amount), at(minute));
                if kind == LedgerRowKind::Executive {
                    row.detail = Some("exec".to_string());
                }
                row
            })
    }

    fn rows_strategy() -> impl Strategy<Value = Vec<LedgerRow>> {
        prop::collection::vec(row_strategy(), 0..40)
    }

    proptest! {
        /// Sum of group nets equals the signed sum of sale/charge/discount rows.
        #[test]
        fn prop_net_is_conserved(rows in rows_strategy()) {
            let expected: Decimal = rows
                .iter()
                .filter(|row| matches!(
                    row.kind,
                    LedgerRowKind::Sale | LedgerRowKind::Charge | LedgerRowKind::Discount
                ))
                .map(|row| row.amount)
                .sum();
            let total: Decimal = group_bills(rows).iter().map(|group| group.net).sum();
            prop_assert_eq!(total, expected);
        }

        /// Closing balance equals opening plus the sum of all signed amounts,
        /// however the rows are grouped or ordered.
        #[test]
        fn prop_closing_balance(rows in rows_strategy(), opening in -100_000i64..100_000i64) {
            let opening = Decimal::new(opening, 2);
            let expected = opening + rows.iter().map(|row| row.amount).sum::<Decimal>();
            prop_assert_eq!(closing_balance(opening, &rows), expected);

            let lines = statement(opening, rows);
            let last = lines.last().map(|line| line.running_balance).unwrap_or(opening);
            // Trailing executive rows sum to zero, so the last visible line
            // already carries the closing balance.
            prop_assert_eq!(last, expected);
        }

        /// Executive rows never show up as items and never move net or paid.
        #[test]
        fn prop_executives_are_inert(rows in rows_strategy()) {
            let without: Vec<LedgerRow> = rows
                .iter()
                .filter(|row| row.kind != LedgerRowKind::Executive)
                .cloned()
                .collect();

            let groups = group_bills(rows);
            for group in &groups {
                prop_assert!(group.items.iter().all(|item| item.kind != LedgerRowKind::Executive));
            }

            let net: Decimal = groups.iter().map(|group| group.net).sum();
            let paid: Decimal = groups.iter().map(|group| group.paid).sum();
            let stripped = group_bills(without);
            prop_assert_eq!(net, stripped.iter().map(|group| group.net).sum::<Decimal>());
            prop_assert_eq!(paid, stripped.iter().map(|group| group.paid).sum::<Decimal>());
        }

        /// Every row without a bill number produces exactly one group of its own.
        #[test]
        fn prop_billless_rows_are_singletons(rows in rows_strategy()) {
            let billless = rows.iter().filter(|row| row.bill_no.is_none()).count();
            let groups = group_bills(rows);
            let singleton = groups.iter().filter(|group| group.bill_no.is_none()).count();
            prop_assert_eq!(singleton, billless);
            for group in groups.iter().filter(|group| group.bill_no.is_none()) {
                prop_assert!(group.items.len() <= 1);
            }
        }

        /// Per group, balance is always net minus paid, and paid is non-negative.
        #[test]
        fn prop_group_balance_identity(rows in rows_strategy()) {
            for group in group_bills(rows) {
                prop_assert_eq!(group.balance, group.net - group.paid);
                prop_assert!(group.paid >= Decimal::ZERO);
            }
        }

        /// The statement walk is a single left-to-right pass: each line's
        /// balance is the previous line's balance plus its own amount, give
        /// or take interleaved executive (zero) rows.
        #[test]
        fn prop_statement_is_cumulative(rows in rows_strategy(), opening in -10_000i64..10_000i64) {
            let opening = Decimal::new(opening, 2);
            let lines = statement(opening, rows);
            let mut previous = opening;
            for line in &lines {
                prop_assert_eq!(line.running_balance, previous + line.row.amount);
                previous = line.running_balance;
            }
        }
    }
}
