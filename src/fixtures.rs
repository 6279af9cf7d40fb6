//! Entities shared by unit tests

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::BuilderConfig;
use crate::registry::BuilderRegistry;
use crate::schema::{Entity, EntitySchema, RelationDefinition};
use crate::types::{ColumnType, SqlValue};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    fn schema() -> EntitySchema {
        EntitySchema::new("users")
            .column("id,pk", ColumnType::Uuid)
            .column("email", ColumnType::String)
            .column("name", ColumnType::String)
            .column("created_at,auto", ColumnType::Timestamp)
            .column("updated_at,auto", ColumnType::Timestamp)
            .relation(
                "teams",
                RelationDefinition::to_many("id", "id", "teams")
                    .through("team_members,user_id,team_id"),
            )
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            self.email.clone().into(),
            self.name.clone().into(),
            self.created_at.into(),
            self.updated_at.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
}

impl Entity for Team {
    fn schema() -> EntitySchema {
        EntitySchema::new("teams")
            .column("id,pk", ColumnType::Uuid)
            .column("name", ColumnType::String)
            .relation(
                "members",
                RelationDefinition::to_many("id", "id", "users")
                    .through("team_members,team_id,user_id"),
            )
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![self.id.into(), self.name.clone().into()]
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub done: bool,
    pub assignee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Task {
    fn schema() -> EntitySchema {
        EntitySchema::new("tasks")
            .column("id,pk", ColumnType::Uuid)
            .column("title", ColumnType::String)
            .column("done", ColumnType::Boolean)
            .column("assignee_id", ColumnType::Uuid)
            .column("created_at,auto", ColumnType::Timestamp)
            .relation("assignee", RelationDefinition::to_one("assignee_id", "id", "users"))
            .relation(
                "tags",
                RelationDefinition::to_many("id", "id", "tags").through("task_tags,task_id,tag_id"),
            )
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            self.title.clone().into(),
            self.done.into(),
            self.assignee_id.into(),
            self.created_at.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

impl Entity for Tag {
    fn schema() -> EntitySchema {
        EntitySchema::new("tags")
            .column("id,pk", ColumnType::Integer)
            .column("name", ColumnType::String)
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![self.id.into(), self.name.clone().into()]
    }
}

pub fn registry() -> Arc<BuilderRegistry> {
    BuilderRegistry::builder()
        .register::<User>(BuilderConfig::default())
        .register::<Team>(BuilderConfig::default())
        .register::<Task>(BuilderConfig::builder().uuid_v7_keys().build())
        .register::<Tag>(BuilderConfig::default())
        .build()
        .expect("fixture registry")
}
