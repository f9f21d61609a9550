//! User profile and its wire representation.

use crate::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Normalized profile of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
}

/// User id as sent by the server, numeric or textual.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Number(serde_json::Number),
    Text(String),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Number(n) => n.to_string(),
            WireId::Text(s) => s,
        }
    }
}

/// User object as sent by the server.
///
/// Field names may be Spanish or English, and some servers send both. Each
/// spelling is its own field; the English one wins when both are non-empty.
#[derive(Debug, Clone, Deserialize)]
pub struct WireUser {
    pub id: WireId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    nombre: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    correo: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    rol: Option<String>,
    /// Either a plain name or an object carrying one.
    #[serde(default)]
    institution: Option<Value>,
    #[serde(default)]
    institucion: Option<Value>,
}

fn either(english: Option<String>, spanish: Option<String>) -> Option<String> {
    english
        .filter(|v| !v.trim().is_empty())
        .or(spanish.filter(|v| !v.trim().is_empty()))
}

impl UserProfile {
    /// Normalize a server user. `fallback_email` fills a missing email, which
    /// some login responses omit.
    pub fn from_wire(wire: WireUser, fallback_email: Option<&str>) -> Self {
        let id = wire.id.into_string();
        let raw_role = either(wire.role, wire.rol);
        let role = match raw_role.as_deref() {
            Some(raw) => Role::normalize(raw).unwrap_or_else(|| {
                warn!(user_id = %id, role = raw, "unknown role, granting least privilege");
                Role::Operator
            }),
            None => {
                warn!(user_id = %id, "profile carries no role, granting least privilege");
                Role::Operator
            }
        };
        let email = either(wire.email, wire.correo)
            .or_else(|| fallback_email.map(str::to_string))
            .unwrap_or_default();

        Self {
            name: either(wire.name, wire.nombre).unwrap_or_else(|| email.clone()),
            email,
            role,
            institution: wire
                .institution
                .and_then(institution_name)
                .or_else(|| wire.institucion.and_then(institution_name)),
            id,
        }
    }
}

fn institution_name(value: Value) -> Option<String> {
    match value {
        Value::String(name) if !name.trim().is_empty() => Some(name),
        Value::Object(map) => ["nombre", "name"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}
