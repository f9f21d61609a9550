//! Role to permission mapping.

use crate::Role;

/// Wildcard permission that satisfies every check.
pub const ALL: &str = "all";

/// Permission names used by the case-management API.
pub mod names {
    pub const EXPEDIENTES_READ: &str = "expedientes.read";
    pub const EXPEDIENTES_WRITE: &str = "expedientes.write";
    pub const DOCUMENTOS_READ: &str = "documentos.read";
    pub const DOCUMENTOS_WRITE: &str = "documentos.write";
    pub const DOCUMENTOS_UPLOAD: &str = "documentos.upload";
    pub const FIRMAS_READ: &str = "firmas.read";
    pub const FIRMAS_SIGN: &str = "firmas.sign";
    pub const AUDIENCIAS_READ: &str = "audiencias.read";
    pub const AUDIENCIAS_WRITE: &str = "audiencias.write";
    pub const USUARIOS_READ: &str = "usuarios.read";
    pub const USUARIOS_WRITE: &str = "usuarios.write";
}

use names::*;

const ADMIN_PERMISSIONS: &[&str] = &[ALL];

const JUDGE_PERMISSIONS: &[&str] = &[
    EXPEDIENTES_READ,
    EXPEDIENTES_WRITE,
    DOCUMENTOS_READ,
    DOCUMENTOS_WRITE,
    FIRMAS_READ,
    FIRMAS_SIGN,
    AUDIENCIAS_READ,
    AUDIENCIAS_WRITE,
];

const CLERK_PERMISSIONS: &[&str] = &[
    EXPEDIENTES_READ,
    EXPEDIENTES_WRITE,
    DOCUMENTOS_READ,
    DOCUMENTOS_WRITE,
    DOCUMENTOS_UPLOAD,
    FIRMAS_READ,
    AUDIENCIAS_READ,
];

const OPERATOR_PERMISSIONS: &[&str] = &[EXPEDIENTES_READ, DOCUMENTOS_READ, DOCUMENTOS_UPLOAD];

/// Pure role/permission lookup.
pub struct PermissionEvaluator;

impl PermissionEvaluator {
    /// Permissions granted to `role`.
    pub fn permissions(role: Role) -> &'static [&'static str] {
        match role {
            Role::Admin => ADMIN_PERMISSIONS,
            Role::Judge => JUDGE_PERMISSIONS,
            Role::Clerk => CLERK_PERMISSIONS,
            Role::Operator => OPERATOR_PERMISSIONS,
        }
    }

    pub fn evaluate(role: Role, permission: &str) -> bool {
        let granted = Self::permissions(role);
        granted.contains(&ALL) || granted.contains(&permission)
    }
}
