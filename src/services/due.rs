//! Due-Card Selector: the read path consulted when building a study session.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::db::Database;
use crate::error::CoreError;
use crate::model::{Card, Progress};
use crate::services::{catalog, progress};

/// Cards in the collection that are due for the user: never-studied cards
/// first, then studied-but-overdue cards by ascending `nextReviewDate`.
///
/// Strictly read-only; listing never materializes progress rows. Those are
/// created by the review processor (or an explicit `get_or_create`).
pub async fn get_due(
    db: &Database,
    collection_id: &str,
    user_id: &str,
    clock: &dyn Clock,
) -> Result<Vec<Card>, CoreError> {
    let cards = catalog::list_cards(db, collection_id).await?;
    let progress_rows = progress::list_progress(db, user_id, Some(collection_id)).await?;
    let by_card: HashMap<String, Progress> = progress_rows
        .into_iter()
        .map(|p| (p.card_id.clone(), p))
        .collect();

    Ok(select_due(cards, &by_card, clock.now()))
}

/// The selection policy itself, pure over its inputs.
///
/// A card is due when it has no progress row, a progress row that was never
/// scheduled (reset or pre-created), or `nextReviewDate <= now`. Unscheduled
/// cards sort first, then ascending `nextReviewDate`, ties broken by card
/// creation time.
fn select_due(
    cards: Vec<Card>,
    progress_by_card: &HashMap<String, Progress>,
    now: DateTime<Utc>,
) -> Vec<Card> {
    let mut due: Vec<(Option<DateTime<Utc>>, Card)> = cards
        .into_iter()
        .filter_map(|card| {
            match progress_by_card
                .get(&card.id)
                .and_then(|p| p.next_review_date)
            {
                None => Some((None, card)),
                Some(next) if next <= now => Some((Some(next), card)),
                Some(_) => None,
            }
        })
        .collect();

    // Option<DateTime> orders None first, which is exactly the
    // never-studied-first policy.
    due.sort_by(|(a_next, a_card), (b_next, b_card)| {
        (a_next, a_card.created_at).cmp(&(b_next, b_card.created_at))
    });

    due.into_iter().map(|(_, card)| card).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReviewOutcome;
    use crate::scheduler::apply_review;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 10, 0, 0).unwrap()
    }

    fn card(id: &str, created_offset_mins: i64) -> Card {
        Card {
            id: id.to_string(),
            collection_id: "col".to_string(),
            question: format!("q-{id}"),
            answer: format!("a-{id}"),
            created_at: now() - Duration::days(30) + Duration::minutes(created_offset_mins),
        }
    }

    fn progress_with_next(card_id: &str, next: Option<DateTime<Utc>>) -> Progress {
        let mut p = Progress::fresh("u1", card_id, now() - Duration::days(30));
        p.next_review_date = next;
        p
    }

    fn ids(cards: &[Card]) -> Vec<&str> {
        cards.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn never_studied_cards_come_before_overdue_ones() {
        let cards = vec![card("overdue", 0), card("new", 1)];
        let mut by_card = HashMap::new();
        by_card.insert(
            "overdue".to_string(),
            progress_with_next("overdue", Some(now() - Duration::days(2))),
        );

        let due = select_due(cards, &by_card, now());
        assert_eq!(ids(&due), vec!["new", "overdue"]);
    }

    #[test]
    fn overdue_cards_sort_by_ascending_next_review_date() {
        let cards = vec![card("late", 0), card("later", 1), card("latest", 2)];
        let mut by_card = HashMap::new();
        by_card.insert(
            "late".to_string(),
            progress_with_next("late", Some(now() - Duration::days(1))),
        );
        by_card.insert(
            "later".to_string(),
            progress_with_next("later", Some(now() - Duration::days(5))),
        );
        by_card.insert(
            "latest".to_string(),
            progress_with_next("latest", Some(now() - Duration::hours(1))),
        );

        let due = select_due(cards, &by_card, now());
        assert_eq!(ids(&due), vec!["later", "late", "latest"]);
    }

    #[test]
    fn a_card_due_exactly_now_is_included() {
        let cards = vec![card("edge", 0)];
        let mut by_card = HashMap::new();
        by_card.insert("edge".to_string(), progress_with_next("edge", Some(now())));

        let due = select_due(cards, &by_card, now());
        assert_eq!(ids(&due), vec!["edge"]);
    }

    #[test]
    fn correct_excludes_and_a_later_wrong_reincludes_the_card() {
        let cards = vec![card("c1", 0)];
        let fresh = Progress::fresh("u1", "c1", now());

        let after_correct = apply_review(&fresh, ReviewOutcome::Correct, now());
        let mut by_card = HashMap::new();
        by_card.insert("c1".to_string(), after_correct.clone());
        assert!(select_due(cards.clone(), &by_card, now()).is_empty());

        let later = now() + Duration::hours(2);
        let after_wrong = apply_review(&after_correct, ReviewOutcome::Wrong, later);
        by_card.insert("c1".to_string(), after_wrong);
        assert_eq!(ids(&select_due(cards, &by_card, later)), vec!["c1"]);
    }

    #[test]
    fn a_reset_progress_row_counts_as_never_studied() {
        let cards = vec![card("reset", 0), card("scheduled", 1)];
        let mut by_card = HashMap::new();
        by_card.insert("reset".to_string(), progress_with_next("reset", None));
        by_card.insert(
            "scheduled".to_string(),
            progress_with_next("scheduled", Some(now() - Duration::days(1))),
        );

        let due = select_due(cards, &by_card, now());
        assert_eq!(ids(&due), vec!["reset", "scheduled"]);
    }
}
