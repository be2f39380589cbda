//! Role-based permissions.
//!
//! Every principal carries one [`Role`], and each role maps to a fixed set of
//! [`Permission`]s. Handlers call [`require`] or [`require_admin`] with the
//! permissions their operation needs before doing any work.

use crate::error::PermissionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    ProjectManager,
    MedicalWriter,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ProjectManager => "project_manager",
            Role::MedicalWriter => "medical_writer",
        }
    }

    /// Parse a role from its wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "project_manager" => Some(Role::ProjectManager),
            "medical_writer" => Some(Role::MedicalWriter),
            _ => None,
        }
    }

    /// Permissions granted to this role.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Admin => Permission::ALL,
            Role::ProjectManager => PROJECT_MANAGER,
            Role::MedicalWriter => MEDICAL_WRITER,
        }
    }

    /// Whether this role grants `permission`.
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single capability checked by route guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageUsers,
    ManageCompanies,
    ManageProducts,
    ViewCompanies,
    ManageMediaTypes,
    ViewMediaTypes,
    AssignProducts,
    ManagePriceTables,
    ViewPriceTables,
    CreateQuotation,
    EditQuotation,
    ViewQuotation,
    DeleteQuotation,
    ShareQuotation,
}

impl Permission {
    /// Every permission, in declaration order.
    pub const ALL: &'static [Permission] = &[
        Permission::ManageUsers,
        Permission::ManageCompanies,
        Permission::ManageProducts,
        Permission::ViewCompanies,
        Permission::ManageMediaTypes,
        Permission::ViewMediaTypes,
        Permission::AssignProducts,
        Permission::ManagePriceTables,
        Permission::ViewPriceTables,
        Permission::CreateQuotation,
        Permission::EditQuotation,
        Permission::ViewQuotation,
        Permission::DeleteQuotation,
        Permission::ShareQuotation,
    ];

    /// Wire name of the permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "manage_users",
            Permission::ManageCompanies => "manage_companies",
            Permission::ManageProducts => "manage_products",
            Permission::ViewCompanies => "view_companies",
            Permission::ManageMediaTypes => "manage_media_types",
            Permission::ViewMediaTypes => "view_media_types",
            Permission::AssignProducts => "assign_products",
            Permission::ManagePriceTables => "manage_price_tables",
            Permission::ViewPriceTables => "view_price_tables",
            Permission::CreateQuotation => "create_quotation",
            Permission::EditQuotation => "edit_quotation",
            Permission::ViewQuotation => "view_quotation",
            Permission::DeleteQuotation => "delete_quotation",
            Permission::ShareQuotation => "share_quotation",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PROJECT_MANAGER: &[Permission] = &[
    Permission::ManageCompanies,
    Permission::ViewCompanies,
    Permission::ManageProducts,
    Permission::ManagePriceTables,
    Permission::ViewPriceTables,
    Permission::CreateQuotation,
    Permission::EditQuotation,
    Permission::ViewQuotation,
    Permission::DeleteQuotation,
    Permission::ShareQuotation,
];

const MEDICAL_WRITER: &[Permission] = &[
    Permission::ViewCompanies,
    Permission::ViewPriceTables,
    Permission::ViewQuotation,
    Permission::EditQuotation,
];

/// The authenticated actor behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Whether this principal's role grants `permission`.
    pub fn can(&self, permission: Permission) -> bool {
        self.role.grants(permission)
    }
}

/// Check that `principal` holds every permission in `required`.
pub fn require(principal: &Principal, required: &[Permission]) -> Result<(), PermissionError> {
    let missing: Vec<Permission> = required
        .iter()
        .copied()
        .filter(|p| !principal.can(*p))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        tracing::debug!(
            principal = %principal.id,
            role = %principal.role,
            ?missing,
            "Permission denied"
        );
        Err(PermissionError::Denied {
            principal_id: principal.id.clone(),
            missing,
        })
    }
}

/// Check that `principal` is an administrator.
pub fn require_admin(principal: &Principal) -> Result<(), PermissionError> {
    if principal.role == Role::Admin {
        Ok(())
    } else {
        Err(PermissionError::AdminRequired {
            principal_id: principal.id.clone(),
        })
    }
}
