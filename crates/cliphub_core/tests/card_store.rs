use cliphub_core::db::open_db_in_memory;
use cliphub_core::{
    Card, CardFieldsUpdate, CardId, CardRepository, CardStore, ClipId, ClipItem, ClipKind,
    ClipRepository, ManualClock, RepoError, RepoResult, SqliteCardRepository,
    SqliteClipRepository, StoreError, UNTITLED_CARD_TITLE,
};
use rusqlite::Connection;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

/// Fault switches shared between a test and its repositories.
#[derive(Default)]
struct Faults {
    list: Cell<bool>,
    insert_card: Cell<bool>,
    update_card: Cell<bool>,
    insert_clip: Cell<bool>,
}

fn injected() -> RepoError {
    RepoError::InvalidData("injected failure".to_string())
}

struct FlakyCards<'conn> {
    inner: SqliteCardRepository<'conn>,
    faults: Rc<Faults>,
}

impl CardRepository for FlakyCards<'_> {
    fn insert_card(&self, card: &Card) -> RepoResult<()> {
        if self.faults.insert_card.get() {
            return Err(injected());
        }
        self.inner.insert_card(card)
    }

    fn list_cards(&self) -> RepoResult<Vec<Card>> {
        if self.faults.list.get() {
            return Err(injected());
        }
        self.inner.list_cards()
    }

    fn get_card(&self, id: CardId) -> RepoResult<Option<Card>> {
        self.inner.get_card(id)
    }

    fn update_card_fields(&self, id: CardId, fields: &CardFieldsUpdate) -> RepoResult<()> {
        if self.faults.update_card.get() {
            return Err(injected());
        }
        self.inner.update_card_fields(id, fields)
    }

    fn delete_card(&self, id: CardId) -> RepoResult<()> {
        self.inner.delete_card(id)
    }
}

struct FlakyClips<'conn> {
    inner: SqliteClipRepository<'conn>,
    faults: Rc<Faults>,
}

impl ClipRepository for FlakyClips<'_> {
    fn insert_clip(&self, clip: &ClipItem) -> RepoResult<()> {
        if self.faults.insert_clip.get() {
            return Err(injected());
        }
        self.inner.insert_clip(clip)
    }

    fn list_clips_for_card(&self, card_id: CardId) -> RepoResult<Vec<ClipItem>> {
        self.inner.list_clips_for_card(card_id)
    }

    fn delete_clip(&self, id: ClipId) -> RepoResult<bool> {
        self.inner.delete_clip(id)
    }
}

type TestStore<'conn> = CardStore<FlakyCards<'conn>, FlakyClips<'conn>>;

fn store_for<'conn>(
    conn: &'conn Connection,
    clock: &Arc<ManualClock>,
    faults: &Rc<Faults>,
) -> TestStore<'conn> {
    let mut store = CardStore::new(
        FlakyCards {
            inner: SqliteCardRepository::try_new(conn).unwrap(),
            faults: Rc::clone(faults),
        },
        FlakyClips {
            inner: SqliteClipRepository::try_new(conn).unwrap(),
            faults: Rc::clone(faults),
        },
        clock.clone(),
    );
    store.load_all().unwrap();
    store
}

fn titles(store: &TestStore<'_>) -> Vec<String> {
    store.cards().iter().map(|card| card.title.clone()).collect()
}

fn visible_titles(store: &TestStore<'_>) -> Vec<String> {
    store
        .visible_cards()
        .map(|card| card.title.clone())
        .collect()
}

#[test]
fn created_card_survives_reload_with_its_title() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let faults = Rc::new(Faults::default());

    let id = {
        let mut store = store_for(&conn, &clock, &faults);
        store.create_card(Some("My Title")).unwrap()
    };

    let reloaded = store_for(&conn, &clock, &faults);
    let card = reloaded.get_card(id).unwrap();
    assert_eq!(card.title, "My Title");
    assert_eq!(card.created_at, 1_000);
    assert_eq!(card.updated_at, 1_000);
    assert!(!card.pinned);
    assert!(!card.archived);
}

#[test]
fn blank_titles_become_untitled() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let faults = Rc::new(Faults::default());
    let mut store = store_for(&conn, &clock, &faults);

    let none = store.create_card(None).unwrap();
    let blank = store.create_card(Some("   ")).unwrap();

    assert_eq!(store.get_card(none).unwrap().title, UNTITLED_CARD_TITLE);
    assert_eq!(store.get_card(blank).unwrap().title, UNTITLED_CARD_TITLE);
}

#[test]
fn mutations_keep_pin_priority_order() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let faults = Rc::new(Faults::default());
    let mut store = store_for(&conn, &clock, &faults);

    let a = store.create_card(Some("A")).unwrap();
    clock.set(2_000);
    let b = store.create_card(Some("B")).unwrap();
    clock.set(3_000);
    let c = store.create_card(Some("C")).unwrap();
    assert_eq!(titles(&store), ["C", "B", "A"]);

    clock.set(4_000);
    store.toggle_pin(a).unwrap();
    assert_eq!(titles(&store), ["A", "C", "B"]);

    clock.set(5_000);
    store.rename_card(b, "B2").unwrap();
    assert_eq!(titles(&store), ["A", "B2", "C"]);

    clock.set(6_000);
    store.archive_card(c).unwrap();
    assert_eq!(titles(&store), ["A", "C", "B2"]);
    assert_eq!(visible_titles(&store), ["A", "B2"]);

    clock.set(7_000);
    store.toggle_pin(a).unwrap();
    assert_eq!(titles(&store), ["A", "C", "B2"]);
    assert!(!store.get_card(a).unwrap().pinned);

    // Persisted state matches the cache after a reload.
    let reloaded = store_for(&conn, &clock, &faults);
    assert_eq!(titles(&reloaded), titles(&store));
}

#[test]
fn equal_recency_breaks_ties_by_title() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let faults = Rc::new(Faults::default());
    let mut store = store_for(&conn, &clock, &faults);

    store.create_card(Some("beta")).unwrap();
    store.create_card(Some("alpha")).unwrap();

    assert_eq!(titles(&store), ["alpha", "beta"]);
}

#[test]
fn rename_to_same_normalized_title_does_not_touch_recency() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let faults = Rc::new(Faults::default());
    let mut store = store_for(&conn, &clock, &faults);
    let id = store.create_card(Some("Same")).unwrap();

    clock.set(9_000);
    store.rename_card(id, "  Same  ").unwrap();

    assert_eq!(store.get_card(id).unwrap().updated_at, 1_000);
}

#[test]
fn archive_is_one_way_and_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let faults = Rc::new(Faults::default());
    let mut store = store_for(&conn, &clock, &faults);
    let id = store.create_card(Some("Old")).unwrap();

    clock.set(2_000);
    store.archive_card(id).unwrap();
    clock.set(3_000);
    store.archive_card(id).unwrap();

    let card = store.get_card(id).unwrap();
    assert!(card.archived);
    assert_eq!(card.updated_at, 2_000);
}

#[test]
fn unknown_ids_are_no_ops() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let faults = Rc::new(Faults::default());
    let mut store = store_for(&conn, &clock, &faults);
    let ghost = Uuid::new_v4();

    store.toggle_pin(ghost).unwrap();
    store.archive_card(ghost).unwrap();
    store.rename_card(ghost, "x").unwrap();
    assert!(store.add_clip_item(ghost, "hello").unwrap().is_none());
    assert!(!store.remove_clip_item(ghost, Uuid::new_v4()).unwrap());
    assert!(store.load_clips(ghost).unwrap().is_empty());
    assert!(store.get_clip_items(ghost).is_empty());
    assert!(store.cards().is_empty());
}

#[test]
fn add_clip_prepends_and_refreshes_card_recency() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let faults = Rc::new(Faults::default());
    let mut store = store_for(&conn, &clock, &faults);
    let older = store.create_card(Some("older")).unwrap();
    clock.set(2_000);
    store.create_card(Some("newer")).unwrap();

    clock.set(3_000);
    let first = store.add_clip_item(older, "  first  ").unwrap().unwrap();
    clock.set(4_000);
    let second = store
        .add_clip_item(older, "https://example.com/page")
        .unwrap()
        .unwrap();

    assert_eq!(first.text, "first");
    assert_eq!(second.kind, ClipKind::Link);
    let cached: Vec<ClipId> = store.get_clip_items(older).iter().map(|c| c.id).collect();
    assert_eq!(cached, vec![second.id, first.id]);
    assert_eq!(titles(&store), ["older", "newer"]);
    assert_eq!(store.get_card(older).unwrap().updated_at, 4_000);

    assert!(store.add_clip_item(older, " \n\t ").unwrap().is_none());
    assert_eq!(store.get_clip_items(older).len(), 2);

    let mut reloaded = store_for(&conn, &clock, &faults);
    let persisted: Vec<ClipId> = reloaded
        .load_clips(older)
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(persisted, cached);
}

#[test]
fn remove_clip_updates_cache_and_storage() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let faults = Rc::new(Faults::default());
    let mut store = store_for(&conn, &clock, &faults);
    let card = store.create_card(None).unwrap();
    let clip = store.add_clip_item(card, "bye").unwrap().unwrap();

    assert!(store.remove_clip_item(card, clip.id).unwrap());
    assert!(store.get_clip_items(card).is_empty());
    assert!(!store.remove_clip_item(card, clip.id).unwrap());

    let mut reloaded = store_for(&conn, &clock, &faults);
    assert!(reloaded.load_clips(card).unwrap().is_empty());
}

#[test]
fn remove_clip_deletes_row_even_when_clips_were_not_loaded() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let faults = Rc::new(Faults::default());
    let (card, clip_id) = {
        let mut store = store_for(&conn, &clock, &faults);
        let card = store.create_card(None).unwrap();
        let clip = store.add_clip_item(card, "kept on disk").unwrap().unwrap();
        (card, clip.id)
    };

    let mut reloaded = store_for(&conn, &clock, &faults);
    assert!(reloaded.get_clip_items(card).is_empty());
    assert!(reloaded.remove_clip_item(card, clip_id).unwrap());
    assert!(reloaded.load_clips(card).unwrap().is_empty());
}

#[test]
fn failed_persist_leaves_cache_untouched() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let faults = Rc::new(Faults::default());
    let mut store = store_for(&conn, &clock, &faults);
    let id = store.create_card(Some("Stable")).unwrap();
    let before: Vec<Card> = store.cards().to_vec();

    clock.set(2_000);
    faults.insert_card.set(true);
    assert!(matches!(
        store.create_card(Some("Lost")).unwrap_err(),
        StoreError::Persistence(_)
    ));

    faults.update_card.set(true);
    assert!(store.toggle_pin(id).is_err());
    assert!(store.archive_card(id).is_err());
    assert!(store.rename_card(id, "Changed").is_err());

    faults.insert_clip.set(true);
    assert!(matches!(
        store.add_clip_item(id, "never saved").unwrap_err(),
        StoreError::Persistence(_)
    ));

    assert_eq!(store.cards(), before.as_slice());
    assert!(store.get_clip_items(id).is_empty());
}

#[test]
fn card_touch_failure_keeps_saved_clip_and_reports_stale_recency() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let faults = Rc::new(Faults::default());
    let mut store = store_for(&conn, &clock, &faults);
    let card = store.create_card(None).unwrap();

    clock.set(5_000);
    faults.update_card.set(true);
    let err = store.add_clip_item(card, "half written").unwrap_err();

    let (card_id, clip_id) = match &err {
        StoreError::StaleCardRecency {
            card_id, clip_id, ..
        } => (*card_id, *clip_id),
        other => panic!("unexpected error: {other}"),
    };
    assert_eq!(card_id, card);
    assert_eq!(store.get_clip_items(card)[0].id, clip_id);
    assert_eq!(store.get_card(card).unwrap().updated_at, 1_000);

    faults.update_card.set(false);
    let reloaded = store_for(&conn, &clock, &faults);
    assert_eq!(reloaded.get_card(card).unwrap().updated_at, 1_000);
}

#[test]
fn load_failure_reports_storage_unavailable_and_empties_cache() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let faults = Rc::new(Faults::default());
    let mut store = store_for(&conn, &clock, &faults);
    store.create_card(Some("Visible before")).unwrap();

    faults.list.set(true);
    assert!(matches!(
        store.load_all().unwrap_err(),
        StoreError::StorageUnavailable(_)
    ));
    assert!(store.cards().is_empty());

    faults.list.set(false);
    store.load_all().unwrap();
    assert_eq!(titles(&store), ["Visible before"]);
}
