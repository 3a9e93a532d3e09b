//! End-to-end flows: client state driven against the in-memory store.

use std::time::{Duration, Instant};

use rand::SeedableRng as _;
use rand::rngs::StdRng;
use twinshelf_application::{
    ApiRequest, FormField, Gate, PickPhase, PickStart, SessionState, SortColumn, SortState,
    ToastLevel,
};
use twinshelf_core::{BookId, Genre, ShelfId, TableTarget};

use crate::{Call, Op, RecordingApi, book, settle, signed_in};

fn brooke_and_crystal() -> RecordingApi {
    RecordingApi::new(
        vec![
            book(1, "Dune", "Frank Herbert", Genre::SciFi, false),
            book(2, "Beloved", "Toni Morrison", Genre::Fiction, true),
        ],
        vec![
            book(10, "Dune", "Frank Herbert", Genre::SciFi, false),
            book(11, "Emma", "Jane Austen", Genre::Classics, false),
        ],
    )
}

fn titles(ctx: &twinshelf_application::AppContext, shelf: ShelfId) -> Vec<String> {
    ctx.shelf(shelf)
        .books()
        .iter()
        .map(|book| book.title.clone())
        .collect()
}

#[test]
fn sign_in_verifies_token_then_loads_both_shelves() {
    let mut api = brooke_and_crystal().require_token("secret");
    let now = Instant::now();
    let ctx = signed_in(&mut api, now);

    assert_eq!(ctx.session, SessionState::Authenticated);
    assert_eq!(
        api.calls(),
        vec![
            Call::FetchShelf(ShelfId::First),
            Call::FetchShelf(ShelfId::First),
            Call::FetchShelf(ShelfId::Second),
        ]
    );
    assert_eq!(titles(&ctx, ShelfId::First), ["Dune", "Beloved"]);
    assert_eq!(titles(&ctx, ShelfId::Second), ["Dune", "Emma"]);
    assert_eq!(api.token().as_deref(), Some("secret"));
}

#[test]
fn rejected_token_returns_to_login_without_loading() {
    let mut api = brooke_and_crystal().require_token("secret");
    let now = Instant::now();
    let mut ctx = twinshelf_application::AppContext::new(crate::make_settings());
    ctx.sign_in("guess", now);
    settle(&mut ctx, &mut api, now);

    assert!(matches!(
        ctx.session,
        SessionState::Unauthenticated { reason: Some(_) }
    ));
    assert_eq!(api.calls(), vec![Call::FetchShelf(ShelfId::First)]);
    assert!(ctx.shelf(ShelfId::First).books().is_empty());
    assert!(api.token().is_none());
}

#[test]
fn adding_two_drafts_sends_one_batch_and_refetches_each_shelf_once() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);
    api.clear_calls();

    ctx.open_add_form();
    {
        let draft = ctx.add_form.current_mut();
        draft.title = "Circe".to_string();
        draft.author = "Madeline Miller".to_string();
        draft.genre = Some(Genre::Fiction);
        draft.table = Some(TableTarget::First);
    }
    ctx.add_form.add_draft();
    {
        let draft = ctx.add_form.current_mut();
        draft.title = "Heartstopper".to_string();
        draft.author = "Alice Oseman".to_string();
        draft.genre = Some(Genre::MangaComics);
        draft.tbr = true;
        draft.table = Some(TableTarget::Second);
    }
    ctx.submit_add_form(now);
    settle(&mut ctx, &mut api, now);

    let calls = api.calls();
    assert_eq!(calls.len(), 3);
    let Call::AddBooks(batch) = &calls[0] else {
        panic!("expected one batch add first, got {calls:?}");
    };
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].table, TableTarget::First);
    assert_eq!(batch[1].table, TableTarget::Second);
    assert_eq!(
        &calls[1..],
        &[
            Call::FetchShelf(ShelfId::First),
            Call::FetchShelf(ShelfId::Second),
        ]
    );

    assert!(!ctx.add_form.open);
    assert_eq!(ctx.add_form.drafts().len(), 1);
    assert_eq!(titles(&ctx, ShelfId::First), ["Dune", "Beloved", "Circe"]);
    assert_eq!(titles(&ctx, ShelfId::Second), ["Dune", "Emma", "Heartstopper"]);
    assert_eq!(
        ctx.notifications.latest().map(|t| t.level),
        Some(ToastLevel::Success)
    );
}

#[test]
fn invalid_draft_blocks_the_whole_batch() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);
    api.clear_calls();

    ctx.open_add_form();
    ctx.add_form.current_mut().title = "Circe".to_string();
    ctx.submit_add_form(now);
    assert_eq!(settle(&mut ctx, &mut api, now), 0);

    assert!(api.calls().is_empty());
    assert!(ctx.add_form.open);
    assert_eq!(ctx.add_form.field, FormField::Author);
    assert_eq!(ctx.add_form.current().title, "Circe");
}

#[test]
fn failed_add_keeps_drafts_for_retry() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);
    api.clear_calls();
    api.fail_next(Op::Add, 502);

    ctx.open_add_form();
    {
        let draft = ctx.add_form.current_mut();
        draft.title = "Circe".to_string();
        draft.author = "Madeline Miller".to_string();
        draft.genre = Some(Genre::Fiction);
        draft.table = Some(TableTarget::Both);
    }
    ctx.submit_add_form(now);
    settle(&mut ctx, &mut api, now);

    assert_eq!(api.calls().len(), 1);
    assert!(ctx.add_form.open);
    assert!(!ctx.add_form.submitting);
    assert_eq!(ctx.add_form.current().title, "Circe");
    assert_eq!(
        ctx.notifications.latest().map(|t| t.level),
        Some(ToastLevel::Error)
    );

    ctx.submit_add_form(now);
    settle(&mut ctx, &mut api, now);
    assert!(!ctx.add_form.open);
    assert_eq!(titles(&ctx, ShelfId::First).last().map(String::as_str), Some("Circe"));
    assert_eq!(titles(&ctx, ShelfId::Second).last().map(String::as_str), Some("Circe"));
}

#[test]
fn update_failure_keeps_form_then_success_closes_it() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);
    api.clear_calls();

    ctx.switch_shelf();
    ctx.select_next();
    ctx.open_update_form();
    {
        let form = ctx.update_form.as_mut().expect("update form opened");
        assert_eq!(form.id, BookId(11));
        form.title = "Emma (Annotated)".to_string();
        form.tbr = true;
    }

    api.fail_next(Op::Update, 500);
    ctx.submit_update_form(now);
    settle(&mut ctx, &mut api, now);

    let form = ctx.update_form.as_ref().expect("form stays open on failure");
    assert_eq!(form.title, "Emma (Annotated)");
    assert!(!form.submitting);
    assert_eq!(
        ctx.notifications.latest().map(|t| t.title.as_str()),
        Some("Error updating book.")
    );
    assert_eq!(titles(&ctx, ShelfId::Second), ["Dune", "Emma"]);

    api.clear_calls();
    ctx.submit_update_form(now);
    settle(&mut ctx, &mut api, now);

    assert!(ctx.update_form.is_none());
    assert_eq!(
        ctx.notifications.latest().map(|t| t.title.as_str()),
        Some("Book updated.")
    );
    let calls = api.calls();
    assert!(matches!(
        calls.as_slice(),
        [
            Call::UpdateBook {
                shelf: ShelfId::Second,
                id: BookId(11),
                ..
            },
            Call::FetchShelf(ShelfId::Second),
        ]
    ));
    let emma = ctx.shelf(ShelfId::Second).find(BookId(11)).cloned();
    assert_eq!(emma.map(|b| (b.title, b.tbr)), Some(("Emma (Annotated)".to_string(), true)));
}

#[test]
fn delete_requires_confirmation_and_targets_the_selected_id() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);
    api.clear_calls();

    ctx.select_next();
    ctx.request_delete();
    ctx.cancel_delete();
    assert_eq!(settle(&mut ctx, &mut api, now), 0);
    assert!(api.calls().is_empty());

    ctx.request_delete();
    ctx.confirm_delete();
    ctx.confirm_delete();
    settle(&mut ctx, &mut api, now);

    assert_eq!(
        api.calls(),
        vec![
            Call::DeleteBook(BookId(2)),
            Call::FetchShelf(ShelfId::First),
        ]
    );
    assert!(ctx.delete_confirm.is_none());
    assert_eq!(titles(&ctx, ShelfId::First), ["Dune"]);
}

#[test]
fn failed_delete_keeps_the_dialog() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);
    api.fail_next(Op::Delete, 500);

    ctx.request_delete();
    ctx.confirm_delete();
    settle(&mut ctx, &mut api, now);

    let confirm = ctx.delete_confirm.as_ref().expect("dialog stays open");
    assert!(!confirm.submitting);
    assert_eq!(titles(&ctx, ShelfId::First), ["Dune", "Beloved"]);
    assert_eq!(
        ctx.notifications.latest().map(|t| t.level),
        Some(ToastLevel::Error)
    );
}

#[test]
fn picker_for_both_tables_matches_shared_titles() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);

    ctx.open_picker();
    ctx.picker.cycle_table(true);
    ctx.picker.cycle_table(true);
    assert_eq!(ctx.picker.table(), TableTarget::Both);
    while ctx.picker.genre() != Some(&Genre::SciFi) {
        ctx.picker.cycle_genre(true);
    }

    let mut rng = StdRng::seed_from_u64(7);
    assert_eq!(ctx.start_pick(now, &mut rng), PickStart::Cycling { pool: 1 });
    assert_eq!(ctx.start_pick(now, &mut rng), PickStart::Busy);

    ctx.tick(now + Duration::from_millis(500));
    assert!(ctx.picker.is_cycling());
    ctx.tick(now + Duration::from_millis(1_000));
    let PickPhase::Settled(picked) = ctx.picker.phase() else {
        panic!("expected a settled pick, got {:?}", ctx.picker.phase());
    };
    assert_eq!(picked.title, "Dune");
    assert_eq!(picked.id, BookId(1));
}

#[test]
fn picker_without_candidates_never_cycles() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);

    ctx.open_picker();
    while ctx.picker.genre() != Some(&Genre::Horror) {
        ctx.picker.cycle_genre(true);
    }
    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(ctx.start_pick(now, &mut rng), PickStart::NoEligible);
    assert!(!ctx.picker.is_cycling());
    assert!(!ctx.tick(now + Duration::from_secs(5)));
    assert!(matches!(ctx.picker.phase(), PickPhase::NoEligible));
}

#[test]
fn third_sort_click_refetches_server_order() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);
    api.clear_calls();

    ctx.click_sort(SortColumn::Title);
    assert_eq!(titles(&ctx, ShelfId::First), ["Beloved", "Dune"]);
    ctx.click_sort(SortColumn::Title);
    assert_eq!(titles(&ctx, ShelfId::First), ["Dune", "Beloved"]);
    assert_eq!(settle(&mut ctx, &mut api, now), 0);

    ctx.click_sort(SortColumn::Tbr);
    assert_eq!(titles(&ctx, ShelfId::First), ["Dune", "Beloved"]);
    ctx.click_sort(SortColumn::Tbr);
    assert_eq!(titles(&ctx, ShelfId::First), ["Beloved", "Dune"]);
    ctx.click_sort(SortColumn::Tbr);
    settle(&mut ctx, &mut api, now);

    assert_eq!(api.calls(), vec![Call::FetchShelf(ShelfId::First)]);
    assert_eq!(ctx.shelf(ShelfId::First).sort(), SortState::Unsorted);
    assert_eq!(titles(&ctx, ShelfId::First), ["Dune", "Beloved"]);
    assert_eq!(titles(&ctx, ShelfId::Second), ["Dune", "Emma"]);
}

#[test]
fn stale_refetch_cannot_overwrite_a_newer_one() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);

    ctx.refetch(ShelfId::First);
    let older = ctx.take_requests();
    ctx.refetch(ShelfId::First);
    let newer = ctx.take_requests();
    assert!(matches!(older.as_slice(), [ApiRequest::FetchShelf { seq: 2, .. }]));

    let older_response = older
        .into_iter()
        .filter_map(|req| twinshelf_remote::execute(&mut api, req))
        .collect::<Vec<_>>();
    api.set_shelf(
        ShelfId::First,
        vec![book(5, "Piranesi", "Susanna Clarke", Genre::Fiction, false)],
    );
    for req in newer {
        if let Some(response) = twinshelf_remote::execute(&mut api, req) {
            ctx.apply_response(response, now);
        }
    }
    for response in older_response {
        ctx.apply_response(response, now);
    }

    assert_eq!(titles(&ctx, ShelfId::First), ["Piranesi"]);
    assert!(!ctx.shelf(ShelfId::First).is_loading());
}

#[test]
fn unauthorized_refetch_expires_the_session() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);
    api.fail_next(Op::Fetch, 401);

    ctx.refetch(ShelfId::Second);
    settle(&mut ctx, &mut api, now);

    assert!(matches!(
        ctx.session,
        SessionState::Unauthenticated { reason: Some(_) }
    ));
    assert!(ctx.token().is_none());
    assert!(api.token().is_none());
    assert!(titles(&ctx, ShelfId::Second).is_empty());
}

#[test]
fn fetch_in_flight_across_sign_out_never_resurfaces() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);

    ctx.refetch(ShelfId::First);
    let in_flight = ctx
        .take_requests()
        .into_iter()
        .filter_map(|req| twinshelf_remote::execute(&mut api, req))
        .collect::<Vec<_>>();
    assert_eq!(in_flight.len(), 1);

    ctx.sign_out();
    settle(&mut ctx, &mut api, now);
    for response in in_flight.iter().cloned() {
        ctx.apply_response(response, now);
    }
    assert!(titles(&ctx, ShelfId::First).is_empty());
    assert!(!ctx.shelf(ShelfId::First).has_loaded());

    api.set_shelf(
        ShelfId::First,
        vec![book(5, "Piranesi", "Susanna Clarke", Genre::Fiction, false)],
    );
    ctx.sign_in("secret", now);
    settle(&mut ctx, &mut api, now);
    assert_eq!(titles(&ctx, ShelfId::First), ["Piranesi"]);

    for response in in_flight {
        ctx.apply_response(response, now);
    }
    assert_eq!(titles(&ctx, ShelfId::First), ["Piranesi"]);
    assert!(!ctx.shelf(ShelfId::First).is_loading());
}

#[test]
fn unauthorized_update_expires_the_session_and_drops_its_state() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);

    ctx.open_update_form();
    assert!(ctx.update_form.is_some());
    api.fail_next(Op::Update, 401);
    ctx.submit_update_form(now);
    settle(&mut ctx, &mut api, now);

    assert!(matches!(
        ctx.session,
        SessionState::Unauthenticated { reason: Some(_) }
    ));
    assert!(ctx.update_form.is_none());
    assert!(ctx.token().is_none());
    assert!(api.token().is_none());
    assert!(titles(&ctx, ShelfId::First).is_empty());

    ctx.sign_in("secret", now);
    settle(&mut ctx, &mut api, now);
    assert_eq!(ctx.session, SessionState::Authenticated);
    assert!(ctx.update_form.is_none());
    assert_eq!(titles(&ctx, ShelfId::First), ["Dune", "Beloved"]);
}

#[test]
fn forbidden_delete_and_add_also_expire_the_session() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);
    api.fail_next(Op::Delete, 403);
    ctx.request_delete();
    ctx.confirm_delete();
    settle(&mut ctx, &mut api, now);
    assert_eq!(ctx.session.gate(), Gate::Login);
    assert!(ctx.delete_confirm.is_none());
    assert!(api.token().is_none());

    let mut ctx = signed_in(&mut api, now);
    ctx.open_add_form();
    {
        let draft = ctx.add_form.current_mut();
        draft.title = "Circe".to_string();
        draft.author = "Madeline Miller".to_string();
        draft.genre = Some(Genre::Classics);
        draft.table = Some(TableTarget::Second);
    }
    api.fail_next(Op::Add, 401);
    ctx.submit_add_form(now);
    settle(&mut ctx, &mut api, now);
    assert_eq!(ctx.session.gate(), Gate::Login);
    assert!(!ctx.add_form.open);
    assert!(api.token().is_none());
}

#[test]
fn sign_out_clears_the_client_token() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);
    assert!(api.token().is_some());

    ctx.sign_out();
    settle(&mut ctx, &mut api, now);

    assert!(api.token().is_none());
    assert_eq!(ctx.session, SessionState::default());
    assert!(ctx.shelf(ShelfId::First).books().is_empty());
}

#[test]
fn search_projection_narrows_both_shelves() {
    let mut api = brooke_and_crystal();
    let now = Instant::now();
    let mut ctx = signed_in(&mut api, now);

    ctx.search.genre = Some(Genre::SciFi);
    ctx.normalize_selection();
    assert_eq!(ctx.visible_books(ShelfId::First).len(), 1);
    assert_eq!(ctx.visible_books(ShelfId::Second).len(), 1);

    ctx.search.author = "  austen ".to_string();
    assert!(ctx.visible_books(ShelfId::Second).is_empty());
    ctx.search.genre = None;
    assert_eq!(
        ctx.visible_books(ShelfId::Second)
            .iter()
            .map(|book| book.id)
            .collect::<Vec<_>>(),
        [BookId(11)]
    );
}
