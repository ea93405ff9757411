//! Display ordering for the analysis list.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use intrix_api_models::AnalysisSummary;

use crate::favorites::FavoriteSnapshot;

/// Order `analyses` for display.
///
/// Favorites come first; each group is sorted newest first. Rows whose date
/// cannot be parsed sort after dated rows of the same group, and ties keep
/// their input order. With `favorites_only`, non-favorites are dropped.
#[must_use]
pub fn arrange<'a>(
    analyses: &'a [AnalysisSummary],
    favorites: &FavoriteSnapshot,
    favorites_only: bool,
) -> Vec<&'a AnalysisSummary> {
    let mut rows: Vec<(&AnalysisSummary, bool, Option<DateTime<Utc>>)> = analyses
        .iter()
        .map(|analysis| {
            (
                analysis,
                favorites.is_favorite(&analysis.id),
                analysis.parsed_date(),
            )
        })
        .filter(|(_, favorited, _)| !favorites_only || *favorited)
        .collect();

    rows.sort_by(|(_, a_fav, a_date), (_, b_fav, b_date)| {
        b_fav.cmp(a_fav).then_with(|| newest_first(*a_date, *b_date))
    });
    rows.into_iter().map(|(analysis, _, _)| analysis).collect()
}

fn newest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    // `None < Some`, so comparing in reverse also pushes undated rows last.
    b.cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::summary;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn ids<'a>(rows: &[&'a AnalysisSummary]) -> Vec<&'a str> {
        rows.iter().map(|row| row.id.as_str()).collect()
    }

    fn snapshot(favorites: &[&str]) -> FavoriteSnapshot {
        favorites.iter().map(|id| ((*id).to_string(), true)).collect()
    }

    #[test]
    fn favorites_first_then_newest() {
        let analyses = vec![
            summary("old-fav", "2024-01-01"),
            summary("new", "2024-06-01T10:00:00"),
            summary("new-fav", "2024-05-01 09:00:00"),
            summary("older", "2023-12-31T23:59:59Z"),
        ];
        let favorites = snapshot(&["old-fav", "new-fav"]);

        assert_eq!(
            ids(&arrange(&analyses, &favorites, false)),
            vec!["new-fav", "old-fav", "new", "older"]
        );
        assert_eq!(
            ids(&arrange(&analyses, &favorites, true)),
            vec!["new-fav", "old-fav"]
        );
    }

    #[test]
    fn ties_keep_input_order_and_undated_rows_sink() {
        let analyses = vec![
            summary("undated", "not a date"),
            summary("b", "2024-02-02"),
            summary("a", "2024-02-02"),
            summary("c", "2024-03-03"),
        ];
        assert_eq!(
            ids(&arrange(&analyses, &FavoriteSnapshot::default(), false)),
            vec!["c", "b", "a", "undated"]
        );
    }

    #[test]
    fn empty_favorites_with_filter_yields_nothing() {
        let analyses = vec![summary("a", "2024-01-01")];
        assert!(arrange(&analyses, &FavoriteSnapshot::default(), true).is_empty());
    }

    #[test]
    fn randomized_lists_respect_partition_and_date_order() {
        let mut rng = StdRng::seed_from_u64(0x1d7_1c5);
        for _ in 0..200 {
            let len = rng.random_range(0..24);
            let analyses: Vec<AnalysisSummary> = (0..len)
                .map(|index| {
                    let day = rng.random_range(1..=28);
                    let month = rng.random_range(1..=12);
                    summary(&format!("id-{index}"), &format!("2024-{month:02}-{day:02}"))
                })
                .collect();
            let favorites: FavoriteSnapshot = analyses
                .iter()
                .map(|analysis| (analysis.id.clone(), rng.random_bool(0.4)))
                .collect();

            let all = arrange(&analyses, &favorites, false);
            assert_eq!(all.len(), analyses.len());
            let flags: Vec<bool> = all.iter().map(|row| favorites.is_favorite(&row.id)).collect();
            assert!(flags.windows(2).all(|pair| pair[0] || !pair[1]));
            for pair in all.windows(2) {
                if favorites.is_favorite(&pair[0].id) == favorites.is_favorite(&pair[1].id) {
                    assert!(pair[0].parsed_date() >= pair[1].parsed_date());
                }
            }

            let only = arrange(&analyses, &favorites, true);
            assert_eq!(only.len(), favorites.favorite_count());
            assert!(only.iter().all(|row| favorites.is_favorite(&row.id)));
            assert!(
                only.windows(2)
                    .all(|pair| pair[0].parsed_date() >= pair[1].parsed_date())
            );
        }
    }
}
