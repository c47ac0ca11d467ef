//! Grant and membership filters compiled to `SeaORM` conditions.

use permissions_sdk::{Subject, SubjectKind};
use sea_orm::{ColumnTrait, Condition, sea_query::Expr};
use uuid::Uuid;

use crate::domain::store::{GrantFilter, MembershipFilter, ScopeMatch, SubjectMatch};

use super::entity::{grant, group_member};

/// Build a deny-all condition (`WHERE false`).
fn deny_all() -> Condition {
    Condition::all().add(Expr::value(false))
}

/// Filters are AND-ed; an empty id list denies everything.
///
/// | Filter | SQL |
/// |--------|-----|
/// | `SubjectMatch::OneOf` | OR of per-kind `subject_kind = ? AND subject_uuid IN (...)` |
/// | `ScopeMatch::Global` | `entity_uuid IS NULL` |
/// | `ScopeMatch::Entities` | `entity_uuid IN (...)` |
pub fn grant_condition(filter: &GrantFilter) -> Condition {
    Condition::all()
        .add(subject_condition(&filter.subjects))
        .add_option(
            filter
                .permission
                .as_deref()
                .map(|p| grant::Column::Permission.eq(p)),
        )
        .add(scope_condition(&filter.scope))
}

fn subject_condition(subjects: &SubjectMatch) -> Condition {
    match subjects {
        SubjectMatch::Any => Condition::all(),
        SubjectMatch::Kind(kind) => {
            Condition::all().add(grant::Column::SubjectKind.eq(kind.as_str()))
        }
        SubjectMatch::OneOf(subjects) => one_of_subjects(subjects),
    }
}

fn one_of_subjects(subjects: &[Subject]) -> Condition {
    let mut anyone = false;
    let mut users = Vec::new();
    let mut groups = Vec::new();
    for subject in subjects {
        match subject {
            Subject::Anyone => anyone = true,
            Subject::User(uuid) => users.push(*uuid),
            Subject::Group(uuid) => groups.push(*uuid),
        }
    }
    if !anyone && users.is_empty() && groups.is_empty() {
        return deny_all();
    }

    let mut or_cond = Condition::any();
    if anyone {
        or_cond = or_cond.add(grant::Column::SubjectKind.eq(SubjectKind::Anyone.as_str()));
    }
    for (kind, uuids) in [(SubjectKind::User, users), (SubjectKind::Group, groups)] {
        if !uuids.is_empty() {
            or_cond = or_cond.add(
                Condition::all()
                    .add(grant::Column::SubjectKind.eq(kind.as_str()))
                    .add(grant::Column::SubjectUuid.is_in(uuids)),
            );
        }
    }
    or_cond
}

fn scope_condition(scope: &ScopeMatch) -> Condition {
    match scope {
        ScopeMatch::Any => Condition::all(),
        ScopeMatch::Global => Condition::all().add(grant::Column::EntityUuid.is_null()),
        ScopeMatch::AnyEntity => Condition::all().add(grant::Column::EntityUuid.is_not_null()),
        ScopeMatch::Entity(uuid) => Condition::all().add(grant::Column::EntityUuid.eq(*uuid)),
        ScopeMatch::Entities(uuids) => in_list(grant::Column::EntityUuid, uuids),
    }
}

pub fn membership_condition(filter: &MembershipFilter) -> Condition {
    let mut cond = Condition::all();
    if let Some(groups) = &filter.groups {
        cond = cond.add(in_list(group_member::Column::GroupUuid, groups));
    }
    if let Some(users) = &filter.users {
        cond = cond.add(in_list(group_member::Column::UserUuid, users));
    }
    cond
}

fn in_list<C: ColumnTrait>(column: C, uuids: &[Uuid]) -> Condition {
    if uuids.is_empty() {
        return deny_all();
    }
    Condition::all().add(column.is_in(uuids.iter().copied()))
}
