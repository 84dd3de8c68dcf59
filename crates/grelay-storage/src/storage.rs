#![allow(clippy::needless_update)]

use std::collections::HashMap;

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue, Database, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, Schema};
use time::OffsetDateTime;

use grelay_core::{AuthKeyEntry, AuthSnapshot, UsageRecord};

use crate::entities;

/// SQLite-backed persistence for downstream keys and usage records.
#[derive(Clone)]
pub struct UsageStorage {
    db: DatabaseConnection,
}

impl UsageStorage {
    pub async fn connect(database_url: &str) -> Result<Self, DbErr> {
        let db = Database::connect(database_url).await?;
        Ok(Self { db })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn sync(&self) -> Result<(), DbErr> {
        Schema::new(self.db.get_database_backend())
            .builder()
            .register(entities::Users)
            .register(entities::ApiKeys)
            .register(entities::UsageRecords)
            .sync(&self.db)
            .await
    }

    pub async fn health(&self) -> Result<(), DbErr> {
        entities::Users::find().one(&self.db).await?;
        Ok(())
    }

    /// Upserts the bootstrap user (id 0) and its API key (id 0). Identity
    /// issuance beyond this belongs to the hosting platform.
    pub async fn ensure_default_key(&self, api_key: &str) -> Result<(), DbErr> {
        let now = OffsetDateTime::now_utc();

        let user_active = entities::users::ActiveModel {
            id: ActiveValue::Set(0),
            name: ActiveValue::Set(Some("default".to_string())),
            created_at: ActiveValue::Set(now),
            ..Default::default()
        };

        entities::Users::insert(user_active)
            .on_conflict(
                OnConflict::column(entities::users::Column::Id)
                    .update_columns([entities::users::Column::Name])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        let key_active = entities::api_keys::ActiveModel {
            id: ActiveValue::Set(0),
            user_id: ActiveValue::Set(0),
            key_value: ActiveValue::Set(api_key.to_string()),
            enabled: ActiveValue::Set(true),
            created_at: ActiveValue::Set(now),
            ..Default::default()
        };

        entities::ApiKeys::insert(key_active)
            .on_conflict(
                OnConflict::column(entities::api_keys::Column::Id)
                    .update_columns([
                        entities::api_keys::Column::UserId,
                        entities::api_keys::Column::KeyValue,
                        entities::api_keys::Column::Enabled,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(())
    }

    /// Enabled-key lookup state for `MemoryAuth`.
    pub async fn load_auth_snapshot(&self) -> Result<AuthSnapshot, DbErr> {
        let keys = entities::ApiKeys::find().all(&self.db).await?;

        let mut keys_by_value = HashMap::new();
        for key in keys {
            keys_by_value.insert(
                key.key_value.clone(),
                AuthKeyEntry {
                    key_id: key.id,
                    user_id: key.user_id,
                    enabled: key.enabled,
                },
            );
        }

        Ok(AuthSnapshot { keys_by_value })
    }

    pub async fn insert_usage(&self, record: UsageRecord) -> Result<(), DbErr> {
        let now = OffsetDateTime::now_utc();
        let mut active: entities::usage_records::ActiveModel = record.into();
        active.created_at = ActiveValue::Set(now);
        entities::UsageRecords::insert(active).exec(&self.db).await?;
        Ok(())
    }

    pub async fn count_usage(&self) -> Result<u64, DbErr> {
        entities::UsageRecords::find().count(&self.db).await
    }
}

impl From<UsageRecord> for entities::usage_records::ActiveModel {
    fn from(record: UsageRecord) -> Self {
        entities::usage_records::ActiveModel {
            id: ActiveValue::NotSet,
            // Assigned by the writer at insert time.
            created_at: ActiveValue::NotSet,
            user_id: ActiveValue::Set(record.user_id),
            model: ActiveValue::Set(record.model),
            message_chars: ActiveValue::Set(record.message_chars),
            response_chars: ActiveValue::Set(record.response_chars),
        }
    }
}
