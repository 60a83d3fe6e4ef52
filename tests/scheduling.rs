//! End-to-end study sessions through the collection

use chrono::FixedOffset;
use tempfile::TempDir;

use mnemos_lib::card::{CardQueue, CardType, Due};
use mnemos_lib::collection::DEFAULT_DECK_ID;
use mnemos_lib::config::ConfigKey;
use mnemos_lib::decks::{DeckConfig, FilteredDeck, FilteredKind, FilteredSearch, LeechAction};
use mnemos_lib::notes::LEECH_TAG;
use mnemos_lib::storage::{RevlogKind, StorageError};
use mnemos_lib::timestamp::TimestampSecs;
use mnemos_lib::{Card, CardId, Collection, CollectionError, Grade, SchedulerError, SchedulerVersion, UndoResult};

// 2023-11-14 22:13:20 UTC; the next day starts at 04:00 UTC
const NOW: i64 = 1_700_000_000;
const NEXT_DAY: i64 = 1_700_020_800;

fn at(secs: i64) -> TimestampSecs {
    TimestampSecs(secs)
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

/// A fresh collection on the deterministic-fuzz scheduler, so learning dues
/// are exact.
fn create_collection() -> Collection {
    let mut col = Collection::open_in_memory_with(utc(), at(NOW)).unwrap();
    col.upgrade_scheduler_at(SchedulerVersion::V3, at(NOW)).unwrap();
    col
}

fn add_card(col: &mut Collection) -> CardId {
    let (_, cards) = col.add_note(DEFAULT_DECK_ID, 1, vec![]).unwrap();
    cards[0]
}

/// Turn a fresh card into a review card due today.
fn make_review(col: &Collection, id: CardId, interval: u32, lapses: u32) -> Card {
    let mut card = col.storage().get_card_required(id).unwrap();
    card.ctype = CardType::Review;
    card.queue = CardQueue::Review;
    card.due = Due::Day(0);
    card.interval = interval;
    card.ease_factor = 2500;
    card.lapses = lapses;
    col.storage().update_card(&card).unwrap();
    card
}

fn set_default_config(col: &mut Collection, edit: impl FnOnce(&mut DeckConfig)) {
    let mut config = DeckConfig::default();
    edit(&mut config);
    col.add_or_update_deck_config(&mut config, at(NOW)).unwrap();
    col.save().unwrap();
}

#[test]
fn test_new_card_graduates_through_steps() {
    let mut col = create_collection();
    let id = add_card(&mut col);
    col.set_config(ConfigKey::LearnAheadSecs, &1_200u32).unwrap();
    col.reset_at(at(NOW)).unwrap();

    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    assert_eq!(card.id, id);
    let outcome = col.answer_card_at(&card, Grade::Good, at(NOW)).unwrap();
    assert_eq!(outcome.card.queue, CardQueue::Learn);
    assert_eq!(outcome.card.due, Due::Timestamp(NOW + 60));
    assert!(!outcome.left_queue);

    // shown early when within the learn-ahead window
    assert_eq!(col.get_card_at(at(NOW + 30)).unwrap().map(|c| c.id), Some(id));

    let card = col.get_card_at(at(NOW + 60)).unwrap().unwrap();
    let outcome = col.answer_card_at(&card, Grade::Good, at(NOW + 60)).unwrap();
    assert_eq!(outcome.card.due, Due::Timestamp(NOW + 60 + 600));

    let card = col.get_card_at(at(NOW + 660)).unwrap().unwrap();
    let outcome = col.answer_card_at(&card, Grade::Good, at(NOW + 660)).unwrap();
    assert_eq!(outcome.card.ctype, CardType::Review);
    assert_eq!(outcome.card.queue, CardQueue::Review);
    assert_eq!(outcome.card.interval, 1);
    assert_eq!(outcome.card.ease_factor, 2500);
    assert_eq!(outcome.card.due, Due::Day(1));
    assert!(outcome.left_queue);

    assert!(col.get_card_at(at(NOW + 700)).unwrap().is_none());
    assert_eq!(col.storage().revlog_count().unwrap(), 3);
}

#[test]
fn test_learning_card_waits_without_learn_ahead() {
    let mut col = create_collection();
    let id = add_card(&mut col);
    assert_eq!(col.storage().learn_ahead_secs().unwrap(), 0);

    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    col.answer_card_at(&card, Grade::Good, at(NOW)).unwrap();
    assert!(col.get_card_at(at(NOW + 30)).unwrap().is_none());
    assert_eq!(col.counts_at(at(NOW + 30)).unwrap().learning, 0);
    assert_eq!(col.get_card_at(at(NOW + 60)).unwrap().map(|c| c.id), Some(id));
}

#[test]
fn test_single_card_answered_twice_then_done() {
    let mut col = create_collection();
    set_default_config(&mut col, |config| config.new.steps_mins = vec![1.0]);
    add_card(&mut col);

    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    col.answer_card_at(&card, Grade::Good, at(NOW)).unwrap();
    let card = col.get_card_at(at(NOW + 120)).unwrap().unwrap();
    let outcome = col.answer_card_at(&card, Grade::Good, at(NOW + 120)).unwrap();
    assert_eq!(outcome.card.queue, CardQueue::Review);
    assert!(col.get_card_at(at(NOW + 180)).unwrap().is_none());
}

#[test]
fn test_lapse_relearns_and_flags_leech() {
    let mut col = create_collection();
    let id = add_card(&mut col);
    col.save().unwrap();
    make_review(&col, id, 10, 7);
    col.reset_at(at(NOW)).unwrap();

    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    let outcome = col.answer_card_at(&card, Grade::Again, at(NOW)).unwrap();
    assert_eq!(outcome.card.ctype, CardType::Relearn);
    assert_eq!(outcome.card.queue, CardQueue::Learn);
    assert_eq!(outcome.card.interval, 1);
    assert_eq!(outcome.card.lapses, 8);
    assert_eq!(outcome.card.ease_factor, 2300);
    assert!(outcome.leech);
    assert!(!outcome.suspended);

    let note = col.storage().get_note_required(card.note_id).unwrap();
    assert!(note.has_tag(LEECH_TAG));
    let entry = col.storage().last_revlog_entry_for_card(id).unwrap().unwrap();
    assert_eq!(entry.review_kind, RevlogKind::Review);
    assert_eq!(entry.last_interval, 10);
}

#[test]
fn test_leech_suspend_action() {
    let mut col = create_collection();
    set_default_config(&mut col, |config| config.lapse.leech_action = Some(LeechAction::Suspend));
    let id = add_card(&mut col);
    col.save().unwrap();
    make_review(&col, id, 10, 7);

    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    let outcome = col.answer_card_at(&card, Grade::Again, at(NOW)).unwrap();
    assert!(outcome.leech);
    assert!(outcome.suspended);
    assert!(outcome.left_queue);
    assert_eq!(outcome.card.queue, CardQueue::Suspended);
    assert!(col.get_card_at(at(NOW)).unwrap().is_none());
}

#[test]
fn test_undo_restores_card_and_log() {
    let mut col = create_collection();
    let id = add_card(&mut col);
    col.save().unwrap();
    let before = make_review(&col, id, 10, 7);

    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    col.answer_card_at(&card, Grade::Again, at(NOW)).unwrap();
    assert_eq!(col.storage().revlog_count().unwrap(), 1);
    assert_eq!(col.undo_label().as_deref(), Some("Review"));

    match col.undo_at(at(NOW)).unwrap() {
        Some(UndoResult::Review(review)) => assert_eq!(review.card.id, id),
        other => panic!("unexpected undo result {:?}", other),
    }
    let restored = col.storage().get_card_required(id).unwrap();
    assert_eq!(restored, before);
    assert_eq!(col.storage().revlog_count().unwrap(), 0);
    let note = col.storage().get_note_required(restored.note_id).unwrap();
    assert!(!note.has_tag(LEECH_TAG));

    let deck = col.storage().get_deck_required(DEFAULT_DECK_ID).unwrap();
    assert_eq!(deck.today.review, 0);

    // the card is served again after the forced reset
    assert_eq!(col.get_card_at(at(NOW)).unwrap().map(|c| c.id), Some(id));
    assert_eq!(col.undo_at(at(NOW)).unwrap(), None);
}

#[test]
fn test_undo_batch_goes_back_one_answer_at_a_time() {
    let mut col = create_collection();
    let first = add_card(&mut col);
    let second = add_card(&mut col);

    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    assert_eq!(card.id, first);
    col.answer_card_at(&card, Grade::Good, at(NOW)).unwrap();
    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    assert_eq!(card.id, second);
    col.answer_card_at(&card, Grade::Good, at(NOW)).unwrap();

    col.undo_at(at(NOW)).unwrap();
    assert_eq!(col.storage().get_card_required(second).unwrap().queue, CardQueue::New);
    assert_eq!(col.storage().get_card_required(first).unwrap().queue, CardQueue::Learn);
    col.undo_at(at(NOW)).unwrap();
    assert_eq!(col.storage().get_card_required(first).unwrap().queue, CardQueue::New);
    assert_eq!(col.storage().revlog_count().unwrap(), 0);
}

#[test]
fn test_answer_commits_pending_checkpoint() {
    let mut col = create_collection();
    let kept = add_card(&mut col);
    let other = add_card(&mut col);
    col.suspend_cards(&[other], at(NOW)).unwrap();

    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    assert_eq!(card.id, kept);
    col.answer_card_at(&card, Grade::Good, at(NOW)).unwrap();

    assert!(matches!(col.undo_at(at(NOW)).unwrap(), Some(UndoResult::Review(_))));
    assert_eq!(col.undo_at(at(NOW)).unwrap(), None);
    assert_eq!(col.storage().get_card_required(other).unwrap().queue, CardQueue::Suspended);
}

#[test]
fn test_reset_is_idempotent() {
    let mut col = create_collection();
    for _ in 0..5 {
        add_card(&mut col);
    }
    col.reset_at(at(NOW)).unwrap();
    let counts = col.counts_at(at(NOW)).unwrap();
    let first = col.get_card_at(at(NOW)).unwrap().map(|c| c.id);

    col.reset_at(at(NOW)).unwrap();
    col.reset_at(at(NOW)).unwrap();
    assert_eq!(col.counts_at(at(NOW)).unwrap(), counts);
    assert_eq!(col.get_card_at(at(NOW)).unwrap().map(|c| c.id), first);
}

#[test]
fn test_counts_respect_deck_limits() {
    let mut col = create_collection();
    set_default_config(&mut col, |config| {
        config.new.per_day = 3;
        config.review.per_day = 2;
    });
    for _ in 0..5 {
        add_card(&mut col);
    }
    col.save().unwrap();
    for _ in 0..4 {
        let id = add_card(&mut col);
        col.save().unwrap();
        make_review(&col, id, 3, 0);
    }

    let counts = col.counts_at(at(NOW)).unwrap();
    assert_eq!(counts.new, 3);
    assert_eq!(counts.review, 2);
    assert_eq!(counts.learning, 0);

    // answering a new card uses up the allowance after a rebuild
    let mut seen_new = 0;
    while let Some(card) = col.get_card_at(at(NOW)).unwrap() {
        if card.queue == CardQueue::New {
            seen_new += 1;
        }
        col.answer_card_at(&card, Grade::Easy, at(NOW)).unwrap();
    }
    assert_eq!(seen_new, 3);
    col.reset_at(at(NOW)).unwrap();
    assert_eq!(col.counts_at(at(NOW)).unwrap().new, 0);
}

#[test]
fn test_collection_wide_new_cap() {
    let mut col = create_collection();
    for _ in 0..4 {
        add_card(&mut col);
    }
    col.set_config(ConfigKey::NewPerDay, &2u32).unwrap();
    assert_eq!(col.counts_at(at(NOW)).unwrap().new, 2);
}

#[test]
#[should_panic(expected = "is not the card last returned by get_card")]
fn test_answering_stale_card_panics() {
    let mut col = create_collection();
    add_card(&mut col);
    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    col.answer_card_at(&card, Grade::Good, at(NOW)).unwrap();
    let _ = col.answer_card_at(&card, Grade::Good, at(NOW));
}

#[test]
fn test_v1_rejects_hard_without_changes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("legacy.db");
    {
        let mut col = Collection::open_with(&path, utc(), at(NOW)).unwrap();
        add_card(&mut col);
        col.set_config(ConfigKey::SchedulerVersion, &1u8).unwrap();
        col.close().unwrap();
    }

    let mut col = Collection::open_with(&path, utc(), at(NOW)).unwrap();
    assert_eq!(col.scheduler_version(), SchedulerVersion::V1);
    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    assert_eq!(col.answer_buttons(&card).unwrap(), 2);

    let result = col.answer_card_at(&card, Grade::Hard, at(NOW));
    assert!(matches!(
        result,
        Err(CollectionError::Scheduler(SchedulerError::InvalidGrade {
            grade: 2,
            version: SchedulerVersion::V1
        }))
    ));
    assert_eq!(col.storage().get_card_required(card.id).unwrap(), card);
    assert_eq!(col.storage().revlog_count().unwrap(), 0);

    // the card is still current and can be answered properly
    let outcome = col.answer_card_at(&card, Grade::Good, at(NOW)).unwrap();
    assert_eq!(outcome.card.queue, CardQueue::Learn);
}

#[test]
fn test_storage_failure_rolls_back_answer() {
    let mut col = create_collection();
    let id = add_card(&mut col);
    col.save().unwrap();
    let before = col.storage().get_card_required(id).unwrap();
    col.storage().execute_raw("DROP TABLE revlog").unwrap();

    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    let result = col.answer_card_at(&card, Grade::Good, at(NOW));
    assert!(matches!(
        result,
        Err(CollectionError::Scheduler(SchedulerError::Storage(StorageError::Sqlite(_))))
    ));
    assert_eq!(col.storage().get_card_required(id).unwrap(), before);
    let deck = col.storage().get_deck_required(DEFAULT_DECK_ID).unwrap();
    assert_eq!(deck.today.new, 0);
    assert_eq!(col.undo_at(at(NOW)).unwrap(), None);
}

#[test]
fn test_siblings_buried_and_unburied_next_day() {
    let mut col = create_collection();
    set_default_config(&mut col, |config| config.new.bury_siblings = true);
    let (_, cards) = col.add_note(DEFAULT_DECK_ID, 2, vec![]).unwrap();

    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    assert_eq!(card.id, cards[0]);
    col.answer_card_at(&card, Grade::Good, at(NOW)).unwrap();
    assert_eq!(
        col.storage().get_card_required(cards[1]).unwrap().queue,
        CardQueue::SchedBuried
    );
    assert_eq!(col.counts_at(at(NOW + 30)).unwrap().new, 0);

    // a new day unburies
    col.get_card_at(at(NEXT_DAY + 10)).unwrap();
    assert_eq!(col.storage().get_card_required(cards[1]).unwrap().queue, CardQueue::New);
}

#[test]
fn test_undo_restores_buried_sibling() {
    let mut col = create_collection();
    set_default_config(&mut col, |config| config.new.bury_siblings = true);
    let (_, cards) = col.add_note(DEFAULT_DECK_ID, 2, vec![]).unwrap();

    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    col.answer_card_at(&card, Grade::Good, at(NOW)).unwrap();
    col.undo_at(at(NOW)).unwrap();
    assert_eq!(col.storage().get_card_required(cards[1]).unwrap().queue, CardQueue::New);
}

#[test]
fn test_preview_deck_returns_cards_home() {
    let mut col = create_collection();
    let id = add_card(&mut col);
    let cram = col
        .add_filtered_deck(
            "Preview",
            FilteredDeck {
                search: FilteredSearch {
                    kind: FilteredKind::New,
                    ..Default::default()
                },
                reschedule: false,
                preview_delay_mins: 5,
            },
        )
        .unwrap();
    col.build_filtered_deck(cram, at(NOW)).unwrap();
    col.set_current_deck(cram).unwrap();

    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    assert_eq!(card.id, id);
    let outcome = col.answer_card_at(&card, Grade::Again, at(NOW)).unwrap();
    assert_eq!(outcome.card.queue, CardQueue::Preview);
    assert_eq!(outcome.card.due, Due::Timestamp(NOW + 300));
    assert_eq!(outcome.card.reps, 0);
    assert!(!outcome.left_queue);

    let card = col.get_card_at(at(NOW + 300)).unwrap().unwrap();
    let outcome = col.answer_card_at(&card, Grade::Good, at(NOW + 300)).unwrap();
    assert_eq!(outcome.card.queue, CardQueue::New);
    assert_eq!(outcome.card.deck_id, DEFAULT_DECK_ID);
    assert!(!outcome.card.is_filtered());
    assert_eq!(
        col.storage().last_revlog_entry_for_card(id).unwrap().unwrap().review_kind,
        RevlogKind::Filtered
    );
}

#[test]
fn test_external_undo_takes_precedence() {
    use mnemos_lib::ExternalUndo;
    use mnemos_lib::storage::SqliteStorage;
    use std::cell::Cell;
    use std::rc::Rc;

    struct OneStep(Rc<Cell<bool>>);

    impl ExternalUndo for OneStep {
        fn undo_label(&self) -> Option<String> {
            (!self.0.get()).then(|| "Edit Note".to_string())
        }

        fn undo(&mut self, _storage: &SqliteStorage) -> Result<(), StorageError> {
            self.0.set(true);
            Ok(())
        }
    }

    let mut col = create_collection();
    add_card(&mut col);
    col.save().unwrap();
    let card = col.get_card_at(at(NOW)).unwrap().unwrap();
    col.answer_card_at(&card, Grade::Good, at(NOW)).unwrap();

    let used = Rc::new(Cell::new(false));
    col.attach_external_undo(Box::new(OneStep(used.clone())));
    assert_eq!(col.undo_label().as_deref(), Some("Edit Note"));
    assert_eq!(
        col.undo_at(at(NOW)).unwrap(),
        Some(UndoResult::External {
            name: "Edit Note".into()
        })
    );
    assert!(used.get());
    // the simple log was cleared
    assert_eq!(col.undo_at(at(NOW)).unwrap(), None);
}
