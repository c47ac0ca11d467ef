//! Row <-> model conversions.

use permissions_sdk::{
    Entity, EntityQualifier, PermissionGrant, Subject, SubjectKind, TemplateGrant,
    TemplateSubject, Visibility,
};
use sea_orm::ActiveValue::Set;
use uuid::Uuid;

use crate::domain::error::StoreError;

use super::entity::{component, grant, template_grant};

const CREATOR_KIND: &str = "creator";

impl TryFrom<component::Model> for Entity {
    type Error = StoreError;

    fn try_from(row: component::Model) -> Result<Self, Self::Error> {
        let qualifier = EntityQualifier::from_code(&row.qualifier).ok_or_else(|| {
            StoreError::malformed(format!(
                "entity {} has unknown qualifier '{}'",
                row.uuid, row.qualifier
            ))
        })?;
        Ok(Self {
            uuid: row.uuid,
            key: row.entity_key,
            qualifier,
            visibility: if row.private {
                Visibility::Private
            } else {
                Visibility::Public
            },
        })
    }
}

pub fn component_active_model(entity: &Entity) -> component::ActiveModel {
    component::ActiveModel {
        uuid: Set(entity.uuid),
        entity_key: Set(entity.key.clone()),
        qualifier: Set(entity.qualifier.code().to_owned()),
        private: Set(!entity.is_public()),
    }
}

impl TryFrom<grant::Model> for PermissionGrant {
    type Error = StoreError;

    fn try_from(row: grant::Model) -> Result<Self, Self::Error> {
        let subject = SubjectKind::parse(&row.subject_kind)
            .and_then(|kind| Subject::from_parts(kind, row.subject_uuid))
            .ok_or_else(|| {
                StoreError::malformed(format!(
                    "grant {} has invalid subject '{}'/{:?}",
                    row.uuid, row.subject_kind, row.subject_uuid
                ))
            })?;
        Ok(Self {
            subject,
            permission: row.permission,
            entity_uuid: row.entity_uuid,
        })
    }
}

pub fn grant_active_model(grant: &PermissionGrant) -> grant::ActiveModel {
    grant::ActiveModel {
        uuid: Set(Uuid::now_v7()),
        subject_kind: Set(grant.subject.kind().as_str().to_owned()),
        subject_uuid: Set(grant.subject.uuid()),
        permission: Set(grant.permission.clone()),
        entity_uuid: Set(grant.entity_uuid),
    }
}

impl TryFrom<template_grant::Model> for TemplateGrant {
    type Error = StoreError;

    fn try_from(row: template_grant::Model) -> Result<Self, Self::Error> {
        let subject = match (row.subject_kind.as_str(), row.subject_uuid) {
            ("user", Some(uuid)) => TemplateSubject::User(uuid),
            ("group", Some(uuid)) => TemplateSubject::Group(uuid),
            ("anyone", None) => TemplateSubject::Anyone,
            (CREATOR_KIND, None) => TemplateSubject::ProjectCreator,
            (kind, uuid) => {
                return Err(StoreError::malformed(format!(
                    "template grant {} has invalid subject '{kind}'/{uuid:?}",
                    row.uuid
                )));
            }
        };
        Ok(Self {
            subject,
            permission: row.permission,
        })
    }
}

pub fn template_grant_active_model(
    template_uuid: Uuid,
    grant: &TemplateGrant,
) -> template_grant::ActiveModel {
    let (kind, subject_uuid) = match grant.subject {
        TemplateSubject::User(uuid) => (SubjectKind::User.as_str(), Some(uuid)),
        TemplateSubject::Group(uuid) => (SubjectKind::Group.as_str(), Some(uuid)),
        TemplateSubject::Anyone => (SubjectKind::Anyone.as_str(), None),
        TemplateSubject::ProjectCreator => (CREATOR_KIND, None),
    };
    template_grant::ActiveModel {
        uuid: Set(Uuid::now_v7()),
        template_uuid: Set(template_uuid),
        subject_kind: Set(kind.to_owned()),
        subject_uuid: Set(subject_uuid),
        permission: Set(grant.permission.clone()),
    }
}
