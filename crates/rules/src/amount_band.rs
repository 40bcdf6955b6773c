use reconap_core::Money;

/// A named amount bracket, e.g. the `0-1000`, `1000-10000`, `10000+` tiers
/// most tenants configure distinct tolerances for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AmountBand {
    pub floor_cents: i64,
    pub label: String,
}

/// Classifies an amount into the highest band whose floor it meets or
/// exceeds. `bands` need not be sorted; this always scans for the max
/// matching floor.
pub fn classify(amount: Money, bands: &[AmountBand]) -> Option<&AmountBand> {
    let cents = (amount.as_decimal() * rust_decimal::Decimal::ONE_HUNDRED)
        .round()
        .to_string()
        .parse::<i64>()
        .unwrap_or(0);
    bands
        .iter()
        .filter(|b| cents >= b.floor_cents)
        .max_by_key(|b| b.floor_cents)
}

pub fn default_bands() -> Vec<AmountBand> {
    vec![
        AmountBand { floor_cents: 0, label: "0-1000".to_string() },
        AmountBand { floor_cents: 100_000, label: "1000-10000".to_string() },
        AmountBand { floor_cents: 1_000_000, label: "10000+".to_string() },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_picks_highest_matching_floor() {
        let bands = default_bands();
        let label = classify(Money::parse("5000.00").unwrap(), &bands).unwrap();
        assert_eq!(label.label, "1000-10000");
    }

    #[test]
    fn classify_falls_back_to_lowest_band() {
        let bands = default_bands();
        let label = classify(Money::parse("10.00").unwrap(), &bands).unwrap();
        assert_eq!(label.label, "0-1000");
    }
}
