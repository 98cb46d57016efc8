//! Projects and the chats they are linked to.
//!
//! # Invariants
//! - Project names are unique per provider, project links globally.
//! - A chat is linked to a project at most once.

use super::common_service::{canonical_choice, valid_chat_types, CommonService};
use super::{log_failure, map_repo_error, ServiceError, ServiceResult};
use crate::logging::PROJECT_LOG;
use crate::model::catalog::{ChatLinkKey, Project, ProjectChatLink};
use crate::repo::project_repo::{
    ProjectChatLinkRepository, ProjectRepository, SqliteProjectChatLinkRepository,
    SqliteProjectRepository,
};
use crate::validation::{char_len, is_blank, is_word, ErrMap};
use log::{info, warn};
use rusqlite::Connection;

const MODULE: &str = "project";

pub const MAX_PROJECT_NAME_CHARS: usize = 1000;
pub const MAX_PROJECT_DESCRIPTION_CHARS: usize = 2000;
pub const MAX_PROJECT_LINK_CHARS: usize = 20;

pub struct ProjectService<'conn> {
    projects: SqliteProjectRepository<'conn>,
    chat_links: SqliteProjectChatLinkRepository<'conn>,
    common: CommonService<'conn>,
}

impl<'conn> ProjectService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            projects: SqliteProjectRepository::new(conn),
            chat_links: SqliteProjectChatLinkRepository::new(conn),
            common: CommonService::new(conn),
        }
    }

    pub fn add_project(&self, project: &Project) -> ServiceResult<Project> {
        info!(
            target: PROJECT_LOG,
            "event=project_add module={} status=start provider_id={}",
            MODULE,
            project.provider_id
        );
        let stored = self
            .projects
            .create_project(project)
            .map_err(|err| {
                log_failure(MODULE, "project_add", "unable to add new project", &err)
            })?;
        info!(
            target: PROJECT_LOG,
            "event=project_add module={} status=ok id={}", MODULE, stored.id
        );
        Ok(stored)
    }

    /// Validates `project`, lowercasing its link in place.
    pub fn validate_project(&self, project: &mut Project) -> ErrMap {
        let mut errors = ErrMap::new();

        if is_blank(&project.name) {
            errors.insert("name", "project name can not be empty");
        } else if char_len(&project.name) > MAX_PROJECT_NAME_CHARS {
            errors.insert(
                "name",
                "project name should not be longer than 1000 characters",
            );
        } else {
            let excluding = (!is_blank(&project.id)).then_some(project.id.as_str());
            match self
                .projects
                .project_name_taken(&project.provider_id, &project.name, excluding)
            {
                Ok(false) => {}
                Ok(true) => {
                    errors.insert("name", "project name already exists in your project list")
                }
                Err(err) => {
                    log_failure(MODULE, "project_validate", "name lookup failed", &err);
                    errors.insert("name", "project name already exists in your project list");
                }
            }
        }

        if char_len(&project.description) > MAX_PROJECT_DESCRIPTION_CHARS {
            errors.insert(
                "description",
                "project description should not be longer than 2000 characters",
            );
        }

        project.project_link = project.project_link.to_lowercase();
        if is_blank(&project.project_link) {
            project.project_link.clear();
            return errors;
        }
        if !is_word(&project.project_link) {
            errors.insert(
                "project_link",
                "project link shouldn't contain space or any special characters",
            );
        } else if char_len(&project.project_link) > MAX_PROJECT_LINK_CHARS {
            errors.insert(
                "project_link",
                "project link should not be longer than 20 characters",
            );
        } else if self.project_link_changed(project)
            && !self
                .common
                .is_unique("project_link", &project.project_link, "projects")
        {
            errors.insert("project_link", "project link is taken, link should be unique");
        }
        errors
    }

    fn project_link_changed(&self, project: &Project) -> bool {
        if is_blank(&project.id) {
            return true;
        }
        match self.projects.find_project(&project.id) {
            Ok(Some(previous)) => previous.project_link != project.project_link,
            Ok(None) => false,
            Err(err) => {
                warn!(
                    target: PROJECT_LOG,
                    "event=project_validate module={} status=error id={} error={}",
                    MODULE,
                    project.id,
                    err
                );
                false
            }
        }
    }

    /// Finds a project by id or public link.
    pub fn find_project(&self, identifier: &str) -> ServiceResult<Project> {
        if is_blank(identifier) {
            return Err(ServiceError::not_found("no project found"));
        }
        match self.projects.find_project(identifier) {
            Ok(Some(project)) => Ok(project),
            Ok(None) => Err(ServiceError::not_found("no project found")),
            Err(err) => Err(log_failure(MODULE, "project_find", "no project found", &err)),
        }
    }

    pub fn find_multiple_projects(&self, provider_id: &str) -> Vec<Project> {
        self.projects
            .find_projects_by_provider(provider_id)
            .unwrap_or_else(|err| {
                log_failure(MODULE, "project_find_multiple", "no project found", &err);
                Vec::new()
            })
    }

    pub fn update_project(&self, project: &Project) -> ServiceResult<Project> {
        let updated = self.projects.update_project(project).map_err(|err| {
            map_repo_error(
                MODULE,
                "project_update",
                "no project found",
                "unable to update project",
                err,
            )
        })?;
        info!(
            target: PROJECT_LOG,
            "event=project_update module={} status=ok id={}", MODULE, updated.id
        );
        Ok(updated)
    }

    pub fn delete_project(&self, id: &str) -> ServiceResult<Project> {
        let project = self.find_project(id)?;
        self.projects.delete_project(&project.id).map_err(|err| {
            map_repo_error(
                MODULE,
                "project_delete",
                "no project found",
                "unable to delete project",
                err,
            )
        })?;
        info!(
            target: PROJECT_LOG,
            "event=project_delete module={} status=ok id={}", MODULE, project.id
        );
        Ok(project)
    }

    pub fn delete_multiple_projects(&self, provider_id: &str) -> Vec<Project> {
        let projects = self.find_multiple_projects(provider_id);
        match self.projects.delete_projects_by_provider(provider_id) {
            Ok(deleted) => {
                info!(
                    target: PROJECT_LOG,
                    "event=project_delete_multiple module={} status=ok provider_id={} deleted={}",
                    MODULE,
                    provider_id,
                    deleted
                );
                projects
            }
            Err(err) => {
                log_failure(
                    MODULE,
                    "project_delete_multiple",
                    "unable to delete projects",
                    &err,
                );
                Vec::new()
            }
        }
    }

    pub fn add_project_chat_link(&self, link: &ProjectChatLink) -> ServiceResult<()> {
        self.chat_links.create_project_chat_link(link).map_err(|err| {
            log_failure(
                MODULE,
                "project_chat_link_add",
                "unable to add new project to chat link",
                &err,
            )
        })?;
        info!(
            target: PROJECT_LOG,
            "event=project_chat_link_add module={} status=ok project_id={} chat_id={}",
            MODULE,
            link.project_id,
            link.chat_id
        );
        Ok(())
    }

    /// Validates a chat link, normalizing its type to the canonical spelling.
    pub fn validate_project_chat_link(&self, link: &mut ProjectChatLink) -> ErrMap {
        let mut errors = ErrMap::new();
        match canonical_choice(&link.kind, valid_chat_types()) {
            Some(kind) => link.kind = kind.to_string(),
            None => errors.insert("type", "invalid chat type selected"),
        }

        // Zero means the chat could not be resolved.
        if link.chat_id == 0 {
            errors.insert("chat_id", "invalid chat id used");
        } else if self
            .find_project_chat_link(&link.project_id, link.chat_id)
            .is_ok()
        {
            errors.insert("chat_id", "chat already linked to the project");
        }

        if self.find_project(&link.project_id).is_err() {
            errors.insert("project_id", "no project found");
        }
        errors
    }

    pub fn find_project_chat_link(
        &self,
        project_id: &str,
        chat_id: i64,
    ) -> ServiceResult<ProjectChatLink> {
        match self.chat_links.find_project_chat_link(project_id, chat_id) {
            Ok(Some(link)) => Ok(link),
            Ok(None) => Err(ServiceError::not_found("no project to chat link found")),
            Err(err) => Err(log_failure(
                MODULE,
                "project_chat_link_find",
                "no project to chat link found",
                &err,
            )),
        }
    }

    /// Lists chat links of a project ([`ChatLinkKey::Project`]) or of a chat
    /// ([`ChatLinkKey::Chat`]).
    pub fn find_multiple_project_chat_links(&self, key: &ChatLinkKey) -> Vec<ProjectChatLink> {
        self.chat_links
            .find_project_chat_links(key)
            .unwrap_or_else(|err| {
                log_failure(
                    MODULE,
                    "project_chat_link_find_multiple",
                    "no project to chat link found",
                    &err,
                );
                Vec::new()
            })
    }

    pub fn delete_project_chat_link(
        &self,
        project_id: &str,
        chat_id: i64,
    ) -> ServiceResult<ProjectChatLink> {
        let link = self.find_project_chat_link(project_id, chat_id)?;
        self.chat_links
            .delete_project_chat_link(project_id, chat_id)
            .map_err(|err| {
                map_repo_error(
                    MODULE,
                    "project_chat_link_delete",
                    "no project to chat link found",
                    "unable to delete project to chat link",
                    err,
                )
            })?;
        info!(
            target: PROJECT_LOG,
            "event=project_chat_link_delete module={} status=ok project_id={} chat_id={}",
            MODULE,
            project_id,
            chat_id
        );
        Ok(link)
    }

    pub fn delete_multiple_project_chat_links(&self, key: &ChatLinkKey) -> Vec<ProjectChatLink> {
        let links = self.find_multiple_project_chat_links(key);
        match self.chat_links.delete_project_chat_links(key) {
            Ok(deleted) => {
                info!(
                    target: PROJECT_LOG,
                    "event=project_chat_link_delete_multiple module={} status=ok deleted={}",
                    MODULE,
                    deleted
                );
                links
            }
            Err(err) => {
                log_failure(
                    MODULE,
                    "project_chat_link_delete_multiple",
                    "unable to delete project to chat links",
                    &err,
                );
                Vec::new()
            }
        }
    }
}
