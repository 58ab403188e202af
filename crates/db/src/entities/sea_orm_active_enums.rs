//! PostgreSQL enum types and their domain counterparts.

use ragvault_core::document::DocumentStatus as DomainStatus;
use ragvault_shared::Role;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `plan_tier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "plan_tier")]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// Free tier.
    #[sea_orm(string_value = "free")]
    Free,
    /// Pro tier.
    #[sea_orm(string_value = "pro")]
    Pro,
    /// Enterprise tier.
    #[sea_orm(string_value = "enterprise")]
    Enterprise,
}

/// `user_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "user_role")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Owner.
    #[sea_orm(string_value = "owner")]
    Owner,
    /// Admin.
    #[sea_orm(string_value = "admin")]
    Admin,
    /// Member.
    #[sea_orm(string_value = "member")]
    Member,
    /// Viewer.
    #[sea_orm(string_value = "viewer")]
    Viewer,
}

impl From<UserRole> for Role {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Owner => Self::Owner,
            UserRole::Admin => Self::Admin,
            UserRole::Member => Self::Member,
            UserRole::Viewer => Self::Viewer,
        }
    }
}

impl From<Role> for UserRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Owner => Self::Owner,
            Role::Admin => Self::Admin,
            Role::Member => Self::Member,
            Role::Viewer => Self::Viewer,
        }
    }
}

/// `document_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "document_status")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Stored, waiting for processing.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Being chunked and embedded.
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Searchable.
    #[sea_orm(string_value = "ready")]
    Ready,
    /// Processing failed.
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Soft-deleted.
    #[sea_orm(string_value = "deleted")]
    Deleted,
}

impl From<DocumentStatus> for DomainStatus {
    fn from(status: DocumentStatus) -> Self {
        match status {
            DocumentStatus::Pending => Self::Pending,
            DocumentStatus::Processing => Self::Processing,
            DocumentStatus::Ready => Self::Ready,
            DocumentStatus::Failed => Self::Failed,
            DocumentStatus::Deleted => Self::Deleted,
        }
    }
}

impl From<DomainStatus> for DocumentStatus {
    fn from(status: DomainStatus) -> Self {
        match status {
            DomainStatus::Pending => Self::Pending,
            DomainStatus::Processing => Self::Processing,
            DomainStatus::Ready => Self::Ready,
            DomainStatus::Failed => Self::Failed,
            DomainStatus::Deleted => Self::Deleted,
        }
    }
}
