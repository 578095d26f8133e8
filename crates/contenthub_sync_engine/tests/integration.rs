//! Integration tests for the sync engine.

use contenthub_state::{EntityTypeConfig, MemoryStateStore, SyncStatus, TrackedEntity};
use contenthub_sync_engine::{
    ChangeAction, ConnectionSettings, DependencyKind, EntityChange, ExportOutcome, Field,
    GatewayCall, HubConfig, ImportSkip, ImportState, LocalEntity, LocalEntityStore,
    MemoryEntityStore, MemoryGateway, SaveMode, SkipReason, SyncEngine, SyncError,
    TransportErrorKind, WebhookAction, WebhookPayload,
};
use contenthub_testkit::{
    article_document, chain_document, fixture_uuid, timestamp, RecordBuilder, TempStateStore,
    LOCAL_ORIGIN, REMOTE_ORIGIN,
};
use serde_json::json;
use uuid::Uuid;

type Engine = SyncEngine<MemoryGateway, MemoryEntityStore>;

fn config() -> HubConfig {
    HubConfig::new(ConnectionSettings::new(
        "hub.example.com",
        "api-key",
        "secret",
        LOCAL_ORIGIN,
    ))
    .with_resource_base_url("https://site.example")
}

fn engine_with(config: HubConfig) -> Engine {
    SyncEngine::new(
        config,
        Box::new(MemoryStateStore::new()),
        MemoryGateway::new(),
        MemoryEntityStore::new(),
    )
    .unwrap()
}

fn engine() -> Engine {
    engine_with(config())
}

/// Saves `entity` as a local edit and discards the change notification.
fn save(engine: &Engine, mut entity: LocalEntity) -> LocalEntity {
    let id = engine.store().save(entity.clone(), SaveMode::Local).unwrap();
    engine.store().drain_changes();
    entity.id = Some(id);
    entity
}

fn reference(uuids: &[Uuid]) -> Vec<serde_json::Value> {
    uuids.iter().map(|u| json!(u.to_string())).collect()
}

/// Article 1 with tag 2 (independent) and paragraph 4 (dependent).
fn local_article(engine: &Engine) -> LocalEntity {
    save(
        engine,
        LocalEntity::new("taxonomy_term", "tags", fixture_uuid(2))
            .with_field("name", Field::new("string").with_value("en", json!("rust"))),
    );
    save(
        engine,
        LocalEntity::new("paragraph", "text", fixture_uuid(4))
            .with_field("field_text", Field::new("text_long").with_value("en", json!("Body"))),
    );
    save(
        engine,
        LocalEntity::new("node", "article", fixture_uuid(1))
            .with_field("title", Field::new("string").with_value("en", json!("Hello")))
            .with_field(
                "field_tags",
                Field::multiple("entity_reference").with_values("en", reference(&[fixture_uuid(2)])),
            )
            .with_field(
                "field_body",
                Field::multiple("entity_reference_revisions")
                    .with_values("en", reference(&[fixture_uuid(4)])),
            ),
    )
}

fn webhook(initiator: Uuid, crud: &str, assets: &[Uuid]) -> WebhookPayload {
    let assets: Vec<_> = assets
        .iter()
        .map(|u| json!({"uuid": u.to_string(), "type": "node"}))
        .collect();
    serde_json::from_value(json!({
        "status": "successful",
        "crud": crud,
        "uuid": Uuid::from_u128(0xfff).to_string(),
        "initiator": initiator.to_string(),
        "assets": assets,
    }))
    .unwrap()
}

#[test]
fn engine_requires_complete_configuration() {
    let mut config = config();
    config.connection.api_key.clear();
    let result = SyncEngine::new(
        config,
        Box::new(MemoryStateStore::new()),
        MemoryGateway::new(),
        MemoryEntityStore::new(),
    );
    assert!(matches!(result, Err(SyncError::Configuration(_))));
}

#[test]
fn export_publishes_dependencies_in_one_batch() {
    let engine = engine();
    let article = local_article(&engine);

    let outcome = engine.on_entity_change(&EntityChange::local(article, ChangeAction::Insert));
    let batch = match outcome {
        ExportOutcome::Exported(batch) => batch,
        other => panic!("expected export, got {other:?}"),
    };

    let mut uuids = batch.uuids();
    uuids.sort();
    assert_eq!(uuids, vec![fixture_uuid(1), fixture_uuid(2), fixture_uuid(4)]);
    assert_eq!(batch.roots, vec![fixture_uuid(1)]);
    assert_eq!(batch.kind(fixture_uuid(2)), Some(DependencyKind::Independent));
    assert_eq!(batch.kind(fixture_uuid(4)), Some(DependencyKind::Dependent));
    assert!(batch.resource.url.starts_with("https://site.example/contenthub/cdf/node/"));
    assert_eq!(engine.gateway().calls().len(), 1);
    assert!(matches!(engine.gateway().calls()[0], GatewayCall::Create(_)));

    for uuid in [fixture_uuid(1), fixture_uuid(2), fixture_uuid(4)] {
        let row = engine.tracker().load_exported_by_uuid(uuid).unwrap().unwrap();
        assert_eq!(row.status, SyncStatus::Initiated);
        assert_eq!(row.origin, LOCAL_ORIGIN);
    }
    assert_eq!(
        engine.gateway().record(fixture_uuid(1)).unwrap().origin(),
        LOCAL_ORIGIN
    );
}

#[test]
fn second_export_updates() {
    let engine = engine();
    let article = local_article(&engine);
    assert!(engine
        .on_entity_change(&EntityChange::local(article.clone(), ChangeAction::Insert))
        .is_success());

    let outcome = engine.on_entity_change(&EntityChange::local(article, ChangeAction::Update));
    assert!(outcome.is_success());
    assert!(matches!(
        engine.gateway().calls()[1],
        GatewayCall::Update(uuid, _) if uuid == fixture_uuid(1)
    ));
}

#[test]
fn synchronized_changes_are_not_exported() {
    let engine = engine();
    let article = local_article(&engine);
    let outcome =
        engine.on_entity_change(&EntityChange::synchronized(article, ChangeAction::Update));
    assert!(matches!(
        outcome,
        ExportOutcome::Skipped(SkipReason::Synchronized)
    ));
    assert!(engine.gateway().calls().is_empty());
}

#[test]
fn transport_failure_is_reported_not_raised() {
    let engine = engine();
    let article = local_article(&engine);
    engine.gateway().fail_next(TransportErrorKind::Server(503));

    let outcome = engine.on_entity_change(&EntityChange::local(article, ChangeAction::Insert));
    match outcome {
        ExportOutcome::Failed(e) => {
            assert!(e.is_retryable());
            assert_eq!(e.status_code(), 502);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(engine
        .tracker()
        .load_exported_by_uuid(fixture_uuid(1))
        .unwrap()
        .is_none());
    assert_eq!(engine.stats().exports_failed, 1);
    assert!(engine.stats().last_error.is_some());
}

#[test]
fn delete_removes_remote_entity_and_row() {
    let engine = engine();
    let article = local_article(&engine);
    engine.on_entity_change(&EntityChange::local(article, ChangeAction::Insert));

    engine
        .store()
        .delete(fixture_uuid(1), SaveMode::Local)
        .unwrap();
    let outcomes = engine.process_changes();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].1, ExportOutcome::Deleted(uuid) if uuid == fixture_uuid(1)));
    assert!(engine.gateway().record(fixture_uuid(1)).is_none());
    assert!(engine
        .tracker()
        .load_exported_by_uuid(fixture_uuid(1))
        .unwrap()
        .is_none());

    save(&engine, LocalEntity::new("node", "page", fixture_uuid(7)));
    engine
        .store()
        .delete(fixture_uuid(7), SaveMode::Local)
        .unwrap();
    let outcomes = engine.process_changes();
    assert!(matches!(
        outcomes[0].1,
        ExportOutcome::Skipped(SkipReason::NotExported)
    ));
}

#[test]
fn webhook_confirms_own_export() {
    let engine = engine();
    let article = local_article(&engine);
    engine.on_entity_change(&EntityChange::local(article, ChangeAction::Insert));

    let outcomes = engine.handle_webhook(&webhook(
        LOCAL_ORIGIN,
        "create",
        &[fixture_uuid(1), fixture_uuid(99)],
    ));
    assert!(matches!(outcomes[0].action, WebhookAction::ExportConfirmed));
    assert!(matches!(outcomes[1].action, WebhookAction::NotTracked));
    assert_eq!(
        engine
            .tracker()
            .load_exported_by_uuid(fixture_uuid(1))
            .unwrap()
            .unwrap()
            .status,
        SyncStatus::Exported
    );
}

#[test]
fn import_materializes_in_dependency_order() {
    let engine = engine();
    engine.gateway().insert_document(article_document());

    let report = engine.import_entity(fixture_uuid(1)).unwrap();
    assert_eq!(
        report.materialized_uuids(),
        vec![
            fixture_uuid(3),
            fixture_uuid(2),
            fixture_uuid(1),
            fixture_uuid(4),
            fixture_uuid(5)
        ]
    );
    assert_eq!(
        report.trace,
        vec![
            ImportState::Fetched,
            ImportState::PreDependenciesResolved,
            ImportState::SelfMaterialized,
            ImportState::PostDependenciesResolved,
            ImportState::Done
        ]
    );

    let store = engine.store();
    let article = store.load_by_uuid(fixture_uuid(1)).unwrap().unwrap();
    let section = store.load_by_uuid(fixture_uuid(4)).unwrap().unwrap();
    let text = store.load_by_uuid(fixture_uuid(5)).unwrap().unwrap();
    assert_eq!(article.bundle, "article");
    assert_eq!(article.fields["title"].values["und"], vec![json!("Hello")]);
    assert_eq!(section.host.as_ref().unwrap().uuid, fixture_uuid(1));
    assert_eq!(section.host.as_ref().unwrap().entity_id, article.id.unwrap());
    assert_eq!(text.host.as_ref().unwrap().uuid, fixture_uuid(4));

    for uuid in report.materialized_uuids() {
        let row = engine.tracker().load_imported_by_uuid(uuid).unwrap().unwrap();
        assert_eq!(row.status, SyncStatus::AutoUpdateEnabled);
        assert_eq!(row.origin, REMOTE_ORIGIN);
    }
}

#[test]
fn imported_entities_are_never_re_exported() {
    let engine = engine();
    engine.gateway().insert_document(article_document());
    engine.import_entity(fixture_uuid(1)).unwrap();
    engine.gateway().clear_calls();

    let outcomes = engine.process_changes();
    assert_eq!(outcomes.len(), 5);
    assert!(outcomes
        .iter()
        .all(|(_, o)| matches!(o, ExportOutcome::Skipped(SkipReason::Synchronized))));

    // A local edit is still not exported: the entity came from elsewhere.
    let article = engine.store().load_by_uuid(fixture_uuid(1)).unwrap().unwrap();
    engine.store().save(article, SaveMode::Local).unwrap();
    let outcomes = engine.process_changes();
    assert!(matches!(
        outcomes[0].1,
        ExportOutcome::Skipped(SkipReason::NotEligible)
    ));
    assert!(engine.gateway().calls().is_empty());
}

#[test]
fn self_origin_import_is_refused() {
    let engine = engine();
    engine.gateway().insert(
        RecordBuilder::new(fixture_uuid(1), "node")
            .origin(LOCAL_ORIGIN)
            .build(),
    );

    let err = engine.import_entity(fixture_uuid(1)).unwrap_err();
    assert!(matches!(err, SyncError::SelfOrigin { .. }));
    assert_eq!(err.status_code(), 403);
    assert!(engine.store().is_empty());
    assert!(engine.tracker().imported_rows().unwrap().is_empty());
}

#[test]
fn missing_root_is_not_found() {
    let engine = engine();
    let err = engine.import_entity(fixture_uuid(42)).unwrap_err();
    assert!(matches!(err, SyncError::NotFound { uuid } if uuid == fixture_uuid(42)));
    assert_eq!(err.status_code(), 404);
    assert_eq!(engine.stats().imports_failed, 1);
}

#[test]
fn import_depth_limits_dependencies() {
    let engine = engine_with(config().with_dependency_depth(3));
    engine.gateway().insert_document(chain_document(6));

    let report = engine.import_entity(fixture_uuid(0)).unwrap();
    let mut uuids = report.materialized_uuids();
    uuids.sort();
    assert_eq!(
        uuids,
        vec![fixture_uuid(0), fixture_uuid(1), fixture_uuid(2), fixture_uuid(3)]
    );
    assert!(engine.store().load_by_uuid(fixture_uuid(4)).unwrap().is_none());
}

#[test]
fn missing_and_local_dependencies_are_skipped() {
    let engine = engine();
    engine.gateway().insert(
        RecordBuilder::new(fixture_uuid(1), "node")
            .references("field_refs", &[fixture_uuid(2), fixture_uuid(99)])
            .build(),
    );
    engine.gateway().insert(
        RecordBuilder::new(fixture_uuid(2), "taxonomy_term")
            .origin(LOCAL_ORIGIN)
            .build(),
    );

    let report = engine.import_entity(fixture_uuid(1)).unwrap();
    assert_eq!(report.materialized_uuids(), vec![fixture_uuid(1)]);
    assert_eq!(report.skip_reason(fixture_uuid(99)), Some(&ImportSkip::Missing));
    assert_eq!(
        report.skip_reason(fixture_uuid(2)),
        Some(&ImportSkip::LocalOrigin)
    );
}

#[test]
fn reimport_skips_unchanged_and_updates_newer() {
    let engine = engine();
    engine.gateway().insert_document(article_document());
    let first = engine.import_entity(fixture_uuid(1)).unwrap();
    let article_id = engine
        .store()
        .load_by_uuid(fixture_uuid(1))
        .unwrap()
        .unwrap()
        .id;

    let again = engine.import_entity(fixture_uuid(1)).unwrap();
    assert!(again.materialized.is_empty());
    assert_eq!(again.skip_reason(fixture_uuid(1)), Some(&ImportSkip::UpToDate));
    assert!(!again.root_materialized());

    engine.gateway().insert(
        RecordBuilder::new(fixture_uuid(1), "node")
            .string("bundle", "article")
            .string("title", "Hello again")
            .references("field_tags", &[fixture_uuid(2)])
            .references("field_body", &[fixture_uuid(4)])
            .modified(10)
            .build(),
    );
    let updated = engine.import_entity(fixture_uuid(1)).unwrap();
    assert_eq!(updated.materialized.len(), 1);
    assert_eq!(updated.materialized[0].action, ChangeAction::Update);

    let article = engine.store().load_by_uuid(fixture_uuid(1)).unwrap().unwrap();
    assert_eq!(article.id, article_id);
    assert_eq!(article.fields["title"].values["und"], vec![json!("Hello again")]);
    assert_eq!(first.materialized.len(), 5);
}

#[test]
fn local_change_pauses_automatic_updates() {
    let engine = engine();
    engine.gateway().insert_document(article_document());
    engine.import_entity(fixture_uuid(1)).unwrap();
    engine.process_changes();

    let article = engine.store().load_by_uuid(fixture_uuid(1)).unwrap().unwrap();
    engine.store().save(article, SaveMode::Local).unwrap();
    engine.process_changes();
    assert!(engine.tracker().has_local_change(fixture_uuid(1)).unwrap());

    engine.gateway().insert(
        RecordBuilder::new(fixture_uuid(1), "node")
            .string("bundle", "article")
            .string("title", "Remote edit")
            .modified(20)
            .build(),
    );
    let outcomes = engine.handle_webhook(&webhook(REMOTE_ORIGIN, "update", &[fixture_uuid(1)]));
    match &outcomes[0].action {
        WebhookAction::Imported(report) => {
            assert_eq!(
                report.skip_reason(fixture_uuid(1)),
                Some(&ImportSkip::LocalChange)
            );
        }
        other => panic!("expected import, got {other:?}"),
    }

    // An explicit import still goes through.
    let report = engine.import_entity(fixture_uuid(1)).unwrap();
    assert!(report.root_materialized());
}

#[test]
fn webhook_imports_remote_entities() {
    let engine = engine();
    engine.gateway().insert_document(article_document());

    let outcomes = engine.handle_webhook(&webhook(REMOTE_ORIGIN, "create", &[fixture_uuid(1)]));
    assert!(matches!(outcomes[0].action, WebhookAction::Imported(_)));
    assert_eq!(engine.store().len(), 5);
    assert_eq!(engine.stats().webhooks_handled, 1);

    let deleted = engine.handle_webhook(&webhook(REMOTE_ORIGIN, "delete", &[fixture_uuid(1)]));
    assert!(matches!(deleted[0].action, WebhookAction::Ignored));
    assert_eq!(engine.store().len(), 5);
}

#[test]
fn local_save_failure_is_returned() {
    let engine = engine();
    engine.gateway().insert_document(article_document());
    engine.store().reject_type("taxonomy_term");

    let err = engine.import_entity(fixture_uuid(1)).unwrap_err();
    assert!(matches!(err, SyncError::LocalStore(_)));
    assert_eq!(err.status_code(), 500);
}

#[test]
fn root_without_bundle_cannot_be_denormalized() {
    let engine = engine();
    engine
        .gateway()
        .insert(contenthub_cdf::CdfRecord::new(fixture_uuid(1), "node", REMOTE_ORIGIN));

    let err = engine.import_entity(fixture_uuid(1)).unwrap_err();
    assert!(matches!(err, SyncError::Denormalize { .. }));
    assert_eq!(err.status_code(), 400);
}

#[test]
fn disconnect_purges_state() {
    let engine = engine();
    engine.gateway().insert_document(article_document());
    engine.import_entity(fixture_uuid(1)).unwrap();

    assert_eq!(engine.disconnect().unwrap(), 5);
    assert!(engine.tracker().imported_rows().unwrap().is_empty());
}

#[test]
fn state_survives_restart_with_file_store() {
    let temp = TempStateStore::new();
    {
        let engine = SyncEngine::new(
            config(),
            Box::new(temp.open()),
            MemoryGateway::new(),
            MemoryEntityStore::new(),
        )
        .unwrap();
        engine.gateway().insert_document(article_document());
        engine.import_entity(fixture_uuid(1)).unwrap();
    }

    let tracker = temp.tracker();
    assert_eq!(tracker.imported_rows().unwrap().len(), 5);
    assert!(tracker.is_auto_update(fixture_uuid(1)).unwrap());
}

#[test]
fn batch_export_leaves_out_unmappable_roots() {
    let engine = engine();
    let good = save(
        &engine,
        LocalEntity::new("node", "page", fixture_uuid(10))
            .with_field("title", Field::new("string").with_value("en", json!("Good"))),
    );
    let bad = save(
        &engine,
        LocalEntity::new("node", "page", fixture_uuid(11))
            .with_field("field_geo", Field::new("geofield").with_value("en", json!("POINT(0 0)"))),
    );

    let report = engine.export_entities(&[good, bad]);
    assert_eq!(report.exported(), vec![fixture_uuid(10)]);
    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].uuid, fixture_uuid(11));
    assert!(report.excluded[0].reason.contains("geofield"));
    assert_eq!(engine.gateway().calls().len(), 1);
    assert_eq!(engine.stats().exports_sent, 1);
}

#[test]
fn unmappable_entity_fails_with_mapping_error() {
    let engine = engine();
    let page = save(
        &engine,
        LocalEntity::new("node", "page", fixture_uuid(12))
            .with_field("field_geo", Field::new("geofield").with_value("en", json!("POINT(0 0)"))),
    );

    let outcome = engine.on_entity_change(&EntityChange::local(page, ChangeAction::Insert));
    match outcome {
        ExportOutcome::Failed(e) => {
            assert!(matches!(e, SyncError::Mapping { ref field, .. } if field == "field_geo"));
            assert_eq!(e.status_code(), 422);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(engine.gateway().calls().is_empty());
    assert!(engine
        .tracker()
        .load_exported_by_uuid(fixture_uuid(12))
        .unwrap()
        .is_none());
}

#[test]
fn batch_export_excludes_ineligible_dependencies() {
    let engine = engine_with(
        config().with_entity_types(
            EntityTypeConfig::new()
                .enable_type("node")
                .enable_bundle("taxonomy_term", "tags"),
        ),
    );
    let imported = save(&engine, LocalEntity::new("taxonomy_term", "tags", fixture_uuid(20)));
    engine
        .tracker()
        .record_import(
            &TrackedEntity::new("taxonomy_term", imported.id.unwrap(), fixture_uuid(20)),
            SyncStatus::AutoUpdateEnabled,
            timestamp(0),
            REMOTE_ORIGIN,
        )
        .unwrap();
    save(&engine, LocalEntity::new("taxonomy_term", "private", fixture_uuid(21)));
    let page = save(
        &engine,
        LocalEntity::new("node", "page", fixture_uuid(22)).with_field(
            "field_tags",
            Field::multiple("entity_reference")
                .with_values("en", reference(&[fixture_uuid(20), fixture_uuid(21)])),
        ),
    );

    let report = engine.export_entities(&[page]);
    assert!(report.failure.is_none());
    assert_eq!(report.exported(), vec![fixture_uuid(22)]);
    let excluded: Vec<Uuid> = report.excluded.iter().map(|x| x.uuid).collect();
    assert_eq!(excluded, vec![fixture_uuid(20), fixture_uuid(21)]);

    let batch = report.batch.as_ref().unwrap();
    assert!(!batch.contains(fixture_uuid(20)));
    assert!(!batch.contains(fixture_uuid(21)));
    assert_eq!(batch.excluded, report.excluded);
    assert!(engine
        .tracker()
        .load_exported_by_uuid(fixture_uuid(21))
        .unwrap()
        .is_none());
    assert!(matches!(engine.gateway().calls()[0], GatewayCall::Create(_)));
}

#[test]
fn batch_export_sends_shared_dependencies_once() {
    let engine = engine();
    save(&engine, LocalEntity::new("taxonomy_term", "tags", fixture_uuid(30)));
    let first = save(
        &engine,
        LocalEntity::new("node", "page", fixture_uuid(31)).with_field(
            "field_tags",
            Field::multiple("entity_reference").with_values("en", reference(&[fixture_uuid(30)])),
        ),
    );
    let second = save(
        &engine,
        LocalEntity::new("node", "page", fixture_uuid(32)).with_field(
            "field_related",
            Field::multiple("entity_reference")
                .with_values("en", reference(&[fixture_uuid(30), fixture_uuid(31)])),
        ),
    );

    let report = engine.export_entities(&[first, second]);
    let batch = report.batch.as_ref().unwrap();
    let mut uuids = batch.uuids();
    assert_eq!(uuids.len(), 3);
    uuids.sort();
    assert_eq!(uuids, vec![fixture_uuid(30), fixture_uuid(31), fixture_uuid(32)]);
    assert_eq!(batch.roots, vec![fixture_uuid(31), fixture_uuid(32)]);
    assert_eq!(batch.kind(fixture_uuid(30)), Some(DependencyKind::Independent));
    assert_eq!(batch.kind(fixture_uuid(31)), None);
    assert!(report.excluded.is_empty());
    assert_eq!(engine.gateway().calls().len(), 1);
    assert_eq!(
        engine
            .tracker()
            .load_exported_by_uuid(fixture_uuid(30))
            .unwrap()
            .unwrap()
            .status,
        SyncStatus::Initiated
    );
}

#[test]
fn import_creates_sibling_dependency_first() {
    // root 1 -> [3, 2], 2 -> [3]
    let engine = engine();
    engine.gateway().insert_document(contenthub_cdf::CdfDocument::from_records(vec![
        RecordBuilder::new(fixture_uuid(1), "node")
            .references("field_refs", &[fixture_uuid(3), fixture_uuid(2)])
            .build(),
        RecordBuilder::new(fixture_uuid(2), "taxonomy_term")
            .references("field_parent", &[fixture_uuid(3)])
            .build(),
        RecordBuilder::new(fixture_uuid(3), "taxonomy_term").build(),
    ]));

    let report = engine.import_entity(fixture_uuid(1)).unwrap();
    assert_eq!(
        report.materialized_uuids(),
        vec![fixture_uuid(3), fixture_uuid(2), fixture_uuid(1)]
    );
    let parent = engine.store().load_by_uuid(fixture_uuid(3)).unwrap().unwrap();
    let child = engine.store().load_by_uuid(fixture_uuid(2)).unwrap().unwrap();
    assert!(parent.id.unwrap() < child.id.unwrap());
}
