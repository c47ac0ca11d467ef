#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Arc;

use permissions_sdk::{
    ActorContext, DefaultTemplates, EntityQualifier, PermissionGrant, PermissionTemplate,
    PermissionsClientV1, PermissionsError, Subject, TemplateGrant, TemplateSubject, Visibility,
    permission,
};
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::local_client::PermissionsLocalClient;
use crate::domain::service::TemplateService;
use crate::infra::storage::InMemoryPermissionStore;
use crate::test_support::{
    entity, failing_harness, harness, private_project, public_project, seed_group, seed_user,
};

fn template(name: &str, key_pattern: Option<&str>, grants: Vec<TemplateGrant>) -> PermissionTemplate {
    PermissionTemplate {
        uuid: Uuid::new_v4(),
        name: name.to_owned(),
        key_pattern: key_pattern.map(str::to_owned),
        grants,
    }
}

fn grants_on(store: &InMemoryPermissionStore, entity: Uuid) -> HashSet<PermissionGrant> {
    store
        .grants()
        .into_iter()
        .filter(|g| g.entity_uuid == Some(entity))
        .collect()
}

// =========================================================================
// apply
// =========================================================================

#[tokio::test]
async fn apply_replaces_the_entity_acl_only() {
    let h = harness(InMemoryPermissionStore::new());
    let (old, new) = (seed_user(&h.store), seed_user(&h.store));
    let target = private_project("target");
    let other = private_project("other");
    h.store.add_entity(target.clone());
    h.store.add_entity(other.clone());
    let untouched = [
        PermissionGrant::global(Subject::User(old), permission::ADMIN),
        PermissionGrant::on_entity(Subject::User(old), permission::USER, other.uuid),
    ];
    for grant in &untouched {
        h.store.insert_raw_grant(grant.clone());
    }
    h.store.insert_raw_grant(PermissionGrant::on_entity(
        Subject::User(old),
        permission::ADMIN,
        target.uuid,
    ));
    let tpl = template("devs", None, vec![
        TemplateGrant::new(TemplateSubject::User(new), permission::USER),
        TemplateGrant::new(TemplateSubject::User(new), permission::ADMIN),
    ]);
    h.store.add_template(tpl.clone());
    let actor = ActorContext::user(new);

    h.services
        .templates
        .apply(actor, tpl.uuid, target.uuid)
        .await
        .unwrap();

    assert_eq!(
        grants_on(&h.store, target.uuid),
        HashSet::from([
            PermissionGrant::on_entity(Subject::User(new), permission::USER, target.uuid),
            PermissionGrant::on_entity(Subject::User(new), permission::ADMIN, target.uuid),
        ])
    );
    let remaining = h.store.grants();
    assert!(untouched.iter().all(|g| remaining.contains(g)));

    let events = h.audit.events();
    assert_eq!(events.len(), 3);
    assert!(events[0].before.is_some());
    assert!(events[1..].iter().all(|e| e.after.is_some() && e.actor == actor));
}

#[tokio::test]
async fn reapplying_a_template_audits_only_real_changes() {
    let h = harness(InMemoryPermissionStore::new());
    let user = seed_user(&h.store);
    let project = private_project("p");
    h.store.add_entity(project.clone());
    let tpl = template("devs", None, vec![
        TemplateGrant::new(TemplateSubject::User(user), permission::USER),
        TemplateGrant::new(TemplateSubject::User(user), permission::SCAN),
    ]);
    h.store.add_template(tpl.clone());
    let templates = &h.services.templates;

    templates
        .apply(ActorContext::system(), tpl.uuid, project.uuid)
        .await
        .unwrap();
    assert_eq!(h.audit.events().len(), 2);

    templates
        .apply(ActorContext::system(), tpl.uuid, project.uuid)
        .await
        .unwrap();

    assert_eq!(h.audit.events().len(), 2);
    assert_eq!(grants_on(&h.store, project.uuid).len(), 2);
}

#[tokio::test]
async fn public_entity_skips_browse_and_private_entity_skips_anyone() {
    let h = harness(InMemoryPermissionStore::new());
    let user = seed_user(&h.store);
    let public = public_project("pub");
    let private = private_project("priv");
    h.store.add_entity(public.clone());
    h.store.add_entity(private.clone());
    let tpl = template("mixed", None, vec![
        TemplateGrant::new(TemplateSubject::Anyone, permission::USER),
        TemplateGrant::new(TemplateSubject::Anyone, permission::ISSUE_ADMIN),
        TemplateGrant::new(TemplateSubject::User(user), permission::CODEVIEWER),
        TemplateGrant::new(TemplateSubject::User(user), permission::SCAN),
    ]);
    h.store.add_template(tpl.clone());
    let templates = &h.services.templates;

    templates
        .apply(ActorContext::system(), tpl.uuid, public.uuid)
        .await
        .unwrap();
    templates
        .apply(ActorContext::system(), tpl.uuid, private.uuid)
        .await
        .unwrap();

    assert_eq!(
        grants_on(&h.store, public.uuid),
        HashSet::from([
            PermissionGrant::on_entity(Subject::Anyone, permission::ISSUE_ADMIN, public.uuid),
            PermissionGrant::on_entity(Subject::User(user), permission::SCAN, public.uuid),
        ])
    );
    assert_eq!(
        grants_on(&h.store, private.uuid),
        HashSet::from([
            PermissionGrant::on_entity(Subject::User(user), permission::CODEVIEWER, private.uuid),
            PermissionGrant::on_entity(Subject::User(user), permission::SCAN, private.uuid),
        ])
    );
}

#[tokio::test]
async fn references_to_deleted_users_and_groups_are_dropped() {
    let h = harness(InMemoryPermissionStore::new());
    let user = seed_user(&h.store);
    let group = seed_group(&h.store, &[user]);
    let project = private_project("p");
    h.store.add_entity(project.clone());
    let tpl = template("stale", None, vec![
        TemplateGrant::new(TemplateSubject::User(Uuid::new_v4()), permission::ADMIN),
        TemplateGrant::new(TemplateSubject::Group(Uuid::new_v4()), permission::ADMIN),
        TemplateGrant::new(TemplateSubject::Group(group), permission::USER),
    ]);
    h.store.add_template(tpl.clone());

    h.services
        .templates
        .apply(ActorContext::system(), tpl.uuid, project.uuid)
        .await
        .unwrap();

    assert_eq!(
        grants_on(&h.store, project.uuid),
        HashSet::from([PermissionGrant::on_entity(
            Subject::Group(group),
            permission::USER,
            project.uuid
        )])
    );
}

#[tokio::test]
async fn unknown_template_or_entity_changes_nothing() {
    let h = harness(InMemoryPermissionStore::new());
    let project = private_project("p");
    h.store.add_entity(project.clone());
    let existing = PermissionGrant::on_entity(Subject::Anyone, permission::SCAN, project.uuid);
    h.store.insert_raw_grant(existing.clone());
    let tpl = template("t", None, vec![]);
    h.store.add_template(tpl.clone());
    let templates = &h.services.templates;

    let missing_template = Uuid::new_v4();
    let err = templates
        .apply(ActorContext::system(), missing_template, project.uuid)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::TemplateNotFound { uuid } if uuid == missing_template));

    let missing_entity = Uuid::new_v4();
    let err = templates
        .apply(ActorContext::system(), tpl.uuid, missing_entity)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::EntityNotFound { uuid } if uuid == missing_entity));

    assert_eq!(h.store.grants(), vec![existing]);
    assert!(h.audit.events().is_empty());
}

#[tokio::test]
async fn failed_replacement_leaves_the_acl_intact() {
    let store = InMemoryPermissionStore::new();
    let project = private_project("p");
    store.add_entity(project.clone());
    let existing = PermissionGrant::on_entity(Subject::Anyone, permission::SCAN, project.uuid);
    store.insert_raw_grant(existing.clone());
    let tpl = template("t", None, vec![TemplateGrant::new(
        TemplateSubject::ProjectCreator,
        permission::ADMIN,
    )]);
    store.add_template(tpl.clone());
    let h = failing_harness(store);

    let res = h
        .services
        .templates
        .apply(ActorContext::system(), tpl.uuid, project.uuid)
        .await;

    assert!(matches!(res, Err(DomainError::Storage(_))));
    assert_eq!(h.store.inner.grants(), vec![existing]);
    assert!(h.audit.events().is_empty());
}

// =========================================================================
// apply_default_to_new_entity
// =========================================================================

#[tokio::test]
async fn key_pattern_match_wins_over_default() {
    let h = harness(InMemoryPermissionStore::new());
    let creator = seed_user(&h.store);
    let matching = template("mobile", Some("mobile\\..*"), vec![TemplateGrant::new(
        TemplateSubject::ProjectCreator,
        permission::ADMIN,
    )]);
    let fallback = template("default", None, vec![TemplateGrant::new(
        TemplateSubject::ProjectCreator,
        permission::USER,
    )]);
    h.store.add_template(matching);
    h.store.add_template(fallback.clone());
    h.store.set_default_templates(DefaultTemplates {
        project: Some(fallback.uuid),
        ..DefaultTemplates::default()
    });
    let project = private_project("mobile.ios");
    h.store.add_entity(project.clone());

    h.services
        .templates
        .apply_default_to_new_entity(ActorContext::user(creator), project.uuid, Some(creator))
        .await
        .unwrap();

    assert_eq!(
        grants_on(&h.store, project.uuid),
        HashSet::from([PermissionGrant::on_entity(
            Subject::User(creator),
            permission::ADMIN,
            project.uuid
        )])
    );
}

#[tokio::test]
async fn key_pattern_must_match_the_whole_key() {
    let h = harness(InMemoryPermissionStore::new());
    let partial = template("partial", Some("mobile"), vec![TemplateGrant::new(
        TemplateSubject::Anyone,
        permission::SCAN,
    )]);
    let fallback = template("default", None, vec![]);
    h.store.add_template(partial);
    h.store.add_template(fallback.clone());
    h.store.set_default_templates(DefaultTemplates {
        project: Some(fallback.uuid),
        ..DefaultTemplates::default()
    });
    let project = public_project("mobile.ios");
    h.store.add_entity(project.clone());

    h.services
        .templates
        .apply_default_to_new_entity(ActorContext::system(), project.uuid, None)
        .await
        .unwrap();

    assert!(grants_on(&h.store, project.uuid).is_empty());
}

#[tokio::test]
async fn several_matching_patterns_are_reported_sorted() {
    let h = harness(InMemoryPermissionStore::new());
    h.store.add_template(template("beta", Some("proj.*"), vec![]));
    h.store.add_template(template("Alpha", Some(".*-core"), vec![]));
    let project = private_project("proj-core");
    h.store.add_entity(project.clone());

    let err = h
        .services
        .templates
        .apply_default_to_new_entity(ActorContext::system(), project.uuid, None)
        .await
        .unwrap_err();

    match err {
        DomainError::TemplateMatchingKey { key, templates } => {
            assert_eq!(key, "proj-core");
            assert_eq!(templates, vec!["Alpha", "beta"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.store.grants().is_empty());
}

#[tokio::test]
async fn invalid_key_pattern_is_ignored() {
    let h = harness(InMemoryPermissionStore::new());
    h.store.add_template(template("broken", Some("(unclosed"), vec![]));
    let fallback = template("default", None, vec![TemplateGrant::new(
        TemplateSubject::Anyone,
        permission::SCAN,
    )]);
    h.store.add_template(fallback.clone());
    h.store.set_default_templates(DefaultTemplates {
        project: Some(fallback.uuid),
        ..DefaultTemplates::default()
    });
    let project = public_project("(unclosed");
    h.store.add_entity(project.clone());

    h.services
        .templates
        .apply_default_to_new_entity(ActorContext::system(), project.uuid, None)
        .await
        .unwrap();

    assert_eq!(grants_on(&h.store, project.uuid).len(), 1);
}

#[tokio::test]
async fn applications_fall_back_to_the_project_default() {
    let h = harness(InMemoryPermissionStore::new());
    let group = seed_group(&h.store, &[]);
    let project_default = template("projects", None, vec![TemplateGrant::new(
        TemplateSubject::Group(group),
        permission::ADMIN,
    )]);
    let portfolio_default = template("portfolios", None, vec![TemplateGrant::new(
        TemplateSubject::Group(group),
        permission::USER,
    )]);
    h.store.add_template(project_default.clone());
    h.store.add_template(portfolio_default.clone());
    h.store.set_default_templates(DefaultTemplates {
        project: Some(project_default.uuid),
        application: None,
        portfolio: Some(portfolio_default.uuid),
    });
    let app = entity("app", EntityQualifier::Application, Visibility::Private);
    let portfolio = entity("pf", EntityQualifier::Portfolio, Visibility::Private);
    h.store.add_entity(app.clone());
    h.store.add_entity(portfolio.clone());
    let templates = &h.services.templates;

    templates
        .apply_default_to_new_entity(ActorContext::system(), app.uuid, None)
        .await
        .unwrap();
    templates
        .apply_default_to_new_entity(ActorContext::system(), portfolio.uuid, None)
        .await
        .unwrap();

    assert_eq!(
        grants_on(&h.store, app.uuid),
        HashSet::from([PermissionGrant::on_entity(
            Subject::Group(group),
            permission::ADMIN,
            app.uuid
        )])
    );
    assert_eq!(
        grants_on(&h.store, portfolio.uuid),
        HashSet::from([PermissionGrant::on_entity(
            Subject::Group(group),
            permission::USER,
            portfolio.uuid
        )])
    );
}

#[tokio::test]
async fn missing_default_template_is_an_error() {
    let h = harness(InMemoryPermissionStore::new());
    let project = private_project("p");
    h.store.add_entity(project.clone());

    let err = h
        .services
        .templates
        .apply_default_to_new_entity(ActorContext::system(), project.uuid, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DomainError::NoDefaultTemplate {
            qualifier: EntityQualifier::Project
        }
    ));
}

#[tokio::test]
async fn creator_grants_merge_with_explicit_ones() {
    let h = harness(InMemoryPermissionStore::new());
    let creator = seed_user(&h.store);
    let tpl = template("default", None, vec![
        TemplateGrant::new(TemplateSubject::ProjectCreator, permission::ADMIN),
        TemplateGrant::new(TemplateSubject::User(creator), permission::ADMIN),
        TemplateGrant::new(TemplateSubject::ProjectCreator, permission::SCAN),
    ]);
    h.store.add_template(tpl.clone());
    h.store.set_default_templates(DefaultTemplates {
        project: Some(tpl.uuid),
        ..DefaultTemplates::default()
    });
    let with_creator = private_project("a");
    let without_creator = private_project("b");
    h.store.add_entity(with_creator.clone());
    h.store.add_entity(without_creator.clone());
    let templates = &h.services.templates;

    templates
        .apply_default_to_new_entity(ActorContext::system(), with_creator.uuid, Some(creator))
        .await
        .unwrap();
    templates
        .apply_default_to_new_entity(ActorContext::system(), without_creator.uuid, None)
        .await
        .unwrap();

    assert_eq!(
        grants_on(&h.store, with_creator.uuid),
        HashSet::from([
            PermissionGrant::on_entity(Subject::User(creator), permission::ADMIN, with_creator.uuid),
            PermissionGrant::on_entity(Subject::User(creator), permission::SCAN, with_creator.uuid),
        ])
    );
    assert_eq!(
        grants_on(&h.store, without_creator.uuid),
        HashSet::from([PermissionGrant::on_entity(
            Subject::User(creator),
            permission::ADMIN,
            without_creator.uuid
        )])
    );
}

// =========================================================================
// would_user_have_scan_permission_with_default_template
// =========================================================================

#[tokio::test]
async fn scan_permission_is_predicted_from_the_applicable_template() {
    let h = harness(InMemoryPermissionStore::new());
    let (member, stranger) = (seed_user(&h.store), seed_user(&h.store));
    let scanners = seed_group(&h.store, &[member]);
    let ci = template("ci", Some("ci-.*"), vec![TemplateGrant::new(
        TemplateSubject::Group(scanners),
        permission::SCAN,
    )]);
    let creators = template("default", None, vec![TemplateGrant::new(
        TemplateSubject::ProjectCreator,
        permission::SCAN,
    )]);
    h.store.add_template(ci);
    h.store.add_template(creators.clone());
    h.store.set_default_templates(DefaultTemplates {
        project: Some(creators.uuid),
        ..DefaultTemplates::default()
    });
    let templates = &h.services.templates;

    assert!(predict_scan(templates, Some(member), "ci-build").await);
    assert!(!predict_scan(templates, Some(stranger), "ci-build").await);
    assert!(predict_scan(templates, Some(stranger), "web").await);
    assert!(!predict_scan(templates, None, "web").await);
}

async fn predict_scan(
    templates: &TemplateService<InMemoryPermissionStore>,
    user: Option<Uuid>,
    key: &str,
) -> bool {
    templates
        .would_user_have_scan_permission_with_default_template(user, key)
        .await
        .unwrap()
}

#[tokio::test]
async fn no_applicable_template_predicts_no_scan() {
    let h = harness(InMemoryPermissionStore::new());
    let user = seed_user(&h.store);

    let predicted = h
        .services
        .templates
        .would_user_have_scan_permission_with_default_template(Some(user), "web")
        .await
        .unwrap();
    assert!(!predicted);
}

// =========================================================================
// local client
// =========================================================================

#[tokio::test]
async fn local_client_maps_domain_errors() {
    let h = harness(InMemoryPermissionStore::new());
    h.store.add_template(template("a", Some("x.*"), vec![]));
    h.store.add_template(template("b", Some(".*y"), vec![]));
    let project = private_project("xy");
    h.store.add_entity(project.clone());
    let client = PermissionsLocalClient::new(Arc::new(h.services));

    let missing = Uuid::new_v4();
    let err = client
        .apply_template(&ActorContext::system(), missing, project.uuid)
        .await
        .unwrap_err();
    assert!(matches!(err, PermissionsError::TemplateNotFound(uuid) if uuid == missing));

    let err = client
        .apply_default_template(&ActorContext::system(), project.uuid, None)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"The "xy" key matches multiple permission templates: "a", "b"."#
    );
}
