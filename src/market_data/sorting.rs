use crate::market_data::quote::Quote;
use crate::types::SortOption;

/// Return a freshly ordered copy of `quotes`.
///
/// The sort is stable, so ties keep their input order (allow-list order when
/// the input is a feed snapshot).
pub fn sort_quotes(quotes: &[Quote], option: SortOption) -> Vec<Quote> {
    let mut sorted = quotes.to_vec();
    match option {
        SortOption::Name => sorted.sort_by(|a, b| a.symbol.cmp(&b.symbol)),
        SortOption::Price => sorted.sort_by(|a, b| b.price.total_cmp(&a.price)),
        SortOption::Change => sorted.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent)),
    }
    sorted
}
