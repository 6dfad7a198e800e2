//! Merge Engine
//!
//! The free tier accepts a single `convert` currency per request, so a
//! multi-currency view is stitched together from one partial result per fiat.

use std::collections::BTreeMap;

use crate::model::{AssetQuote, ExchangeRateSet};

/// Running per-symbol accumulator
pub type QuoteAccumulator = BTreeMap<String, Vec<AssetQuote>>;

/// Merge `partial` into `acc`.
///
/// New symbols are inserted verbatim. For known symbols each incoming quote is
/// matched by `external_id`: unmatched quotes are appended, matched ones are
/// replaced by a copy whose rates are the union of both (incoming wins).
pub fn merge_into(acc: &mut QuoteAccumulator, partial: &ExchangeRateSet) {
    for (symbol, incoming) in &partial.data {
        let Some(existing) = acc.get_mut(symbol) else {
            acc.insert(symbol.clone(), incoming.clone());
            continue;
        };

        for quote in incoming {
            match existing
                .iter()
                .position(|q| q.external_id == quote.external_id)
            {
                Some(index) => existing[index] = union(&existing[index], quote),
                None => existing.push(quote.clone()),
            }
        }
    }
}

fn union(existing: &AssetQuote, incoming: &AssetQuote) -> AssetQuote {
    let mut merged = existing.clone();
    merged.rates.extend(
        incoming
            .rates
            .iter()
            .map(|(fiat, rate)| (fiat.clone(), rate.clone())),
    );

    merged.name = merged.name.or_else(|| incoming.name.clone());
    merged.symbol = merged.symbol.or_else(|| incoming.symbol.clone());
    merged.slug = merged.slug.or_else(|| incoming.slug.clone());
    merged.platform = merged.platform.or_else(|| incoming.platform.clone());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn set(entries: Vec<(&str, AssetQuote)>) -> ExchangeRateSet {
        let mut data = QuoteAccumulator::new();
        for (symbol, quote) in entries {
            data.entry(symbol.to_string()).or_default().push(quote);
        }
        ExchangeRateSet::new(data)
    }

    fn usd() -> ExchangeRateSet {
        set(vec![
            ("BTC", AssetQuote::new(1).with_rate("USD", dec!(1.234))),
            ("ETH", AssetQuote::new(2).with_rate("USD", dec!(53.123))),
        ])
    }

    fn eur() -> ExchangeRateSet {
        set(vec![
            ("BTC", AssetQuote::new(1).with_rate("EUR", dec!(1.1))),
            ("ETH", AssetQuote::new(2).with_rate("EUR", dec!(48.0))),
        ])
    }

    #[test]
    fn test_merge_unions_rates_by_id() {
        let mut acc = QuoteAccumulator::new();
        merge_into(&mut acc, &usd());
        merge_into(&mut acc, &eur());

        assert_eq!(acc.len(), 2);
        let btc = &acc["BTC"];
        assert_eq!(btc.len(), 1);
        assert_eq!(btc[0].price("USD"), Some(dec!(1.234)));
        assert_eq!(btc[0].price("EUR"), Some(dec!(1.1)));

        let eth = &acc["ETH"];
        assert_eq!(eth.len(), 1);
        assert_eq!(eth[0].rates.len(), 2);
    }

    #[test]
    fn test_disjoint_merge_is_order_independent() {
        let mut forward = QuoteAccumulator::new();
        merge_into(&mut forward, &usd());
        merge_into(&mut forward, &eur());

        let mut backward = QuoteAccumulator::new();
        merge_into(&mut backward, &eur());
        merge_into(&mut backward, &usd());

        assert_eq!(forward, backward);
    }

    #[test]
    fn test_unknown_id_is_appended() {
        let mut acc = QuoteAccumulator::new();
        merge_into(&mut acc, &usd());
        merge_into(
            &mut acc,
            &set(vec![("BTC", AssetQuote::new(31469).with_rate("EUR", dec!(0.02)))]),
        );

        let btc = &acc["BTC"];
        assert_eq!(btc.len(), 2);
        assert_eq!(btc[1].external_id, 31469);
        assert_eq!(btc[0].price("EUR"), None);
    }

    #[test]
    fn test_incoming_rate_wins_on_collision() {
        let mut acc = QuoteAccumulator::new();
        merge_into(&mut acc, &usd());
        merge_into(
            &mut acc,
            &set(vec![("BTC", AssetQuote::new(1).with_rate("USD", dec!(2)))]),
        );

        assert_eq!(acc["BTC"][0].price("USD"), Some(dec!(2)));
    }

    #[test]
    fn test_merge_empty_partial_is_noop() {
        let mut acc = QuoteAccumulator::new();
        merge_into(&mut acc, &usd());
        let before = acc.clone();

        merge_into(&mut acc, &ExchangeRateSet::default());
        assert_eq!(acc, before);
    }
}
