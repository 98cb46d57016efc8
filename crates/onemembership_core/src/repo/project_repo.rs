//! Project and project chat-link persistence.
//!
//! # Invariants
//! - Ids are minted as `Pr-<7 random><row count + 1>`.
//! - Chat links cascade away with their project.

use super::{mint_id, query_one, query_rows, text, RepoError, RepoResult};
use crate::model::catalog::{ChatLinkKey, Project, ProjectChatLink, ProjectStatus};
use crate::util::now_epoch_ms;
use crate::validation::is_blank;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub const PROJECT_ID_PREFIX: &str = "Pr-";
const PROJECT_ID_RANDOM_CHARS: usize = 7;

const PROJECT_SELECT_SQL: &str = "SELECT
    id,
    provider_id,
    name,
    description,
    project_link,
    status,
    created_at,
    updated_at
FROM projects";

const CHAT_LINK_SELECT_SQL: &str = "SELECT project_id, chat_id, type FROM project_chat_links";

pub trait ProjectRepository {
    fn create_project(&self, project: &Project) -> RepoResult<Project>;
    /// Matches the project id or its public link.
    fn find_project(&self, identifier: &str) -> RepoResult<Option<Project>>;
    fn find_projects_by_provider(&self, provider_id: &str) -> RepoResult<Vec<Project>>;
    /// Returns whether another project of `provider_id` already uses `name`.
    fn project_name_taken(
        &self,
        provider_id: &str,
        name: &str,
        excluding_id: Option<&str>,
    ) -> RepoResult<bool>;
    fn update_project(&self, project: &Project) -> RepoResult<Project>;
    fn delete_project(&self, id: &str) -> RepoResult<()>;
    fn delete_projects_by_provider(&self, provider_id: &str) -> RepoResult<usize>;
}

pub trait ProjectChatLinkRepository {
    fn create_project_chat_link(&self, link: &ProjectChatLink) -> RepoResult<()>;
    fn find_project_chat_link(
        &self,
        project_id: &str,
        chat_id: i64,
    ) -> RepoResult<Option<ProjectChatLink>>;
    /// Accepts [`ChatLinkKey::Project`] and [`ChatLinkKey::Chat`].
    fn find_project_chat_links(&self, key: &ChatLinkKey) -> RepoResult<Vec<ProjectChatLink>>;
    fn delete_project_chat_link(&self, project_id: &str, chat_id: i64) -> RepoResult<()>;
    fn delete_project_chat_links(&self, key: &ChatLinkKey) -> RepoResult<usize>;
}

pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, project: &Project) -> RepoResult<Project> {
        let mut stored = project.clone();
        stored.id = mint_id(
            self.conn,
            "projects",
            PROJECT_ID_PREFIX,
            PROJECT_ID_RANDOM_CHARS,
        )?;
        stored.created_at = now_epoch_ms();
        stored.updated_at = stored.created_at;

        self.conn.execute(
            "INSERT INTO projects (
                id,
                provider_id,
                name,
                description,
                project_link,
                status,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                stored.id.as_str(),
                stored.provider_id.as_str(),
                stored.name.as_str(),
                stored.description.as_str(),
                stored.project_link.as_str(),
                stored.status.as_str(),
                stored.created_at,
                stored.updated_at,
            ],
        )?;

        Ok(stored)
    }

    fn find_project(&self, identifier: &str) -> RepoResult<Option<Project>> {
        if is_blank(identifier) {
            return Ok(None);
        }
        query_one(
            self.conn,
            &format!("{PROJECT_SELECT_SQL} WHERE id = ?1 OR project_link = ?1 LIMIT 1"),
            vec![text(identifier)],
            parse_project_row,
        )
    }

    fn find_projects_by_provider(&self, provider_id: &str) -> RepoResult<Vec<Project>> {
        query_rows(
            self.conn,
            &format!("{PROJECT_SELECT_SQL} WHERE provider_id = ?1 ORDER BY created_at ASC, id ASC"),
            vec![text(provider_id)],
            parse_project_row,
        )
    }

    fn project_name_taken(
        &self,
        provider_id: &str,
        name: &str,
        excluding_id: Option<&str>,
    ) -> RepoResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM projects
                 WHERE provider_id = ?1 AND name = ?2 AND (?3 IS NULL OR id <> ?3)
                 LIMIT 1;",
                params![provider_id, name, excluding_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn update_project(&self, project: &Project) -> RepoResult<Project> {
        let changed = self.conn.execute(
            "UPDATE projects
             SET
                name = ?1,
                description = ?2,
                project_link = ?3,
                status = ?4,
                updated_at = ?5
             WHERE id = ?6;",
            params![
                project.name.as_str(),
                project.description.as_str(),
                project.project_link.as_str(),
                project.status.as_str(),
                now_epoch_ms(),
                project.id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(project.id.clone()));
        }

        self.find_project(&project.id)?
            .ok_or_else(|| RepoError::NotFound(project.id.clone()))
    }

    fn delete_project(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_projects_by_provider(&self, provider_id: &str) -> RepoResult<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE provider_id = ?1;", [provider_id])?;
        Ok(changed)
    }
}

pub struct SqliteProjectChatLinkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectChatLinkRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProjectChatLinkRepository for SqliteProjectChatLinkRepository<'_> {
    fn create_project_chat_link(&self, link: &ProjectChatLink) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO project_chat_links (project_id, chat_id, type) VALUES (?1, ?2, ?3);",
            params![link.project_id.as_str(), link.chat_id, link.kind.as_str()],
        )?;
        Ok(())
    }

    fn find_project_chat_link(
        &self,
        project_id: &str,
        chat_id: i64,
    ) -> RepoResult<Option<ProjectChatLink>> {
        query_one(
            self.conn,
            &format!("{CHAT_LINK_SELECT_SQL} WHERE project_id = ?1 AND chat_id = ?2"),
            vec![text(project_id), Value::Integer(chat_id)],
            parse_chat_link_row,
        )
    }

    fn find_project_chat_links(&self, key: &ChatLinkKey) -> RepoResult<Vec<ProjectChatLink>> {
        let (column, value) = chat_link_filter(key)?;
        query_rows(
            self.conn,
            &format!("{CHAT_LINK_SELECT_SQL} WHERE {column} = ?1 ORDER BY project_id, chat_id"),
            vec![value],
            parse_chat_link_row,
        )
    }

    fn delete_project_chat_link(&self, project_id: &str, chat_id: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM project_chat_links WHERE project_id = ?1 AND chat_id = ?2;",
            params![project_id, chat_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("{project_id}/{chat_id}")));
        }
        Ok(())
    }

    fn delete_project_chat_links(&self, key: &ChatLinkKey) -> RepoResult<usize> {
        let (column, value) = chat_link_filter(key)?;
        let changed = self.conn.execute(
            &format!("DELETE FROM project_chat_links WHERE {column} = ?1;"),
            [value],
        )?;
        Ok(changed)
    }
}

fn chat_link_filter(key: &ChatLinkKey) -> RepoResult<(&'static str, Value)> {
    match key {
        ChatLinkKey::Project(id) => Ok(("project_id", text(id))),
        ChatLinkKey::Chat(chat_id) => Ok(("chat_id", Value::Integer(*chat_id))),
        ChatLinkKey::Plan(_) => Err(RepoError::InvalidColumn("plan_id".to_string())),
        ChatLinkKey::User(_) => Err(RepoError::InvalidColumn("user_id".to_string())),
    }
}

fn parse_chat_link_row(row: &Row<'_>) -> RepoResult<ProjectChatLink> {
    Ok(ProjectChatLink {
        project_id: row.get(0)?,
        chat_id: row.get(1)?,
        kind: row.get(2)?,
    })
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let status_raw: String = row.get(5)?;
    let status = ProjectStatus::parse(&status_raw).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid projects.status `{status_raw}`"))
    })?;

    Ok(Project {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        project_link: row.get(4)?,
        status,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
