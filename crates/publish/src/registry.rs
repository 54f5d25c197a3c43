//! Schema registry boundary and the in-memory registry.
//!
//! The pipeline only ever asks one question of a registry: "which version id
//! does this definition have under this key?" [`SchemaRegistry`] is that
//! question as a trait so a hosted registry client can replace
//! [`InMemoryRegistry`] without touching the handler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use encode::{DataFormat, SchemaFingerprint};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::RegistryError;

/// Namespace for deterministic schema version ids.
const VERSION_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2d0e_94a3_5b7e_8c41_d2f0_0a9b_3e57);

/// A request to resolve (and possibly register) a schema definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub registry_name: String,
    /// Registry key, `<stream>.<schema name>`.
    pub schema_name: String,
    pub data_format: DataFormat,
    pub definition: String,
    pub auto_register: bool,
}

/// One registered version of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub version_id: Uuid,
    pub version_number: u32,
    pub registry_name: String,
    pub schema_name: String,
    pub data_format: DataFormat,
    pub definition: String,
}

/// Registry boundary used by [`RegistryPublisher`](crate::RegistryPublisher).
pub trait SchemaRegistry: Send + Sync {
    /// Resolve the definition to a version, registering it when allowed.
    ///
    /// Must be idempotent: the same definition under the same key always
    /// yields the same version id.
    fn get_or_register(&self, request: &RegistrationRequest) -> Result<SchemaVersion, RegistryError>;

    /// Look a version up by id, as a consumer reading the record header would.
    fn get_schema_version(&self, version_id: Uuid) -> Result<SchemaVersion, RegistryError>;
}

/// Evolution rule applied when a new definition is registered under an
/// existing key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compatibility {
    None,
    /// New versions may add optional fields only; existing fields keep their
    /// type and required fields are never removed.
    #[default]
    Backward,
}

#[derive(Debug, Clone)]
struct StoredVersion {
    version: SchemaVersion,
    fingerprint: SchemaFingerprint,
}

#[derive(Debug, Default)]
struct RegistryState {
    by_key: HashMap<(String, String), Vec<StoredVersion>>,
    by_id: HashMap<Uuid, SchemaVersion>,
}

/// Process-local registry with deterministic version ids.
///
/// Version ids are UUIDv5 over registry name, schema key and definition
/// fingerprint, so two processes registering the same definition agree on
/// the id. Availability can be switched off to exercise failure handling.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: RwLock<RegistryState>,
    unavailable: AtomicBool,
    compatibility: Compatibility,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compatibility(compatibility: Compatibility) -> Self {
        Self {
            compatibility,
            ..Self::default()
        }
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    /// All versions registered under `schema_name`, oldest first.
    pub fn versions(&self, registry_name: &str, schema_name: &str) -> Vec<SchemaVersion> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .by_key
            .get(&(registry_name.to_string(), schema_name.to_string()))
            .map(|versions| versions.iter().map(|v| v.version.clone()).collect())
            .unwrap_or_default()
    }

    fn check_available(&self, registry_name: &str) -> Result<(), RegistryError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(RegistryError::Unavailable {
                registry: registry_name.to_string(),
                reason: "registry endpoint not reachable".to_string(),
            })
        }
    }
}

impl SchemaRegistry for InMemoryRegistry {
    fn get_or_register(&self, request: &RegistrationRequest) -> Result<SchemaVersion, RegistryError> {
        if request.registry_name.trim().is_empty() {
            return Err(RegistryError::EmptyRegistryName);
        }
        self.check_available(&request.registry_name)?;

        let fingerprint = SchemaFingerprint::compute(&request.definition);
        let key = (request.registry_name.clone(), request.schema_name.clone());

        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = state
                .by_key
                .get(&key)
                .and_then(|versions| versions.iter().find(|v| v.fingerprint == fingerprint))
            {
                debug!(
                    schema = %request.schema_name,
                    version = existing.version.version_number,
                    "schema_version_reused"
                );
                return Ok(existing.version.clone());
            }
        }

        if !request.auto_register {
            return Err(RegistryError::SchemaNotFound {
                registry: request.registry_name.clone(),
                schema: request.schema_name.clone(),
            });
        }

        let fields = top_level_fields(&request.schema_name, &request.definition)?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let versions = state.by_key.entry(key).or_default();
        // Another writer may have registered the same definition meanwhile.
        if let Some(existing) = versions.iter().find(|v| v.fingerprint == fingerprint) {
            return Ok(existing.version.clone());
        }
        if let (Compatibility::Backward, Some(latest)) = (self.compatibility, versions.last()) {
            let previous = top_level_fields(&request.schema_name, &latest.version.definition)?;
            check_backward(&previous, &fields).map_err(|reason| RegistryError::Incompatible {
                schema: request.schema_name.clone(),
                latest_version: latest.version.version_number,
                reason,
            })?;
        }

        let version_number = versions.len() as u32 + 1;
        let version = SchemaVersion {
            version_id: version_id(&request.registry_name, &request.schema_name, &fingerprint),
            version_number,
            registry_name: request.registry_name.clone(),
            schema_name: request.schema_name.clone(),
            data_format: request.data_format,
            definition: request.definition.clone(),
        };
        versions.push(StoredVersion {
            version: version.clone(),
            fingerprint,
        });
        state.by_id.insert(version.version_id, version.clone());

        info!(
            registry = %version.registry_name,
            schema = %version.schema_name,
            version = version.version_number,
            version_id = %version.version_id,
            "schema_registered"
        );
        Ok(version)
    }

    fn get_schema_version(&self, version_id: Uuid) -> Result<SchemaVersion, RegistryError> {
        if !self.is_available() {
            return Err(RegistryError::Unavailable {
                registry: "in-memory".to_string(),
                reason: "registry endpoint not reachable".to_string(),
            });
        }
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .by_id
            .get(&version_id)
            .cloned()
            .ok_or(RegistryError::VersionNotFound(version_id))
    }
}

fn version_id(registry: &str, schema: &str, fingerprint: &SchemaFingerprint) -> Uuid {
    let mut material = Vec::with_capacity(registry.len() + schema.len() + 34);
    material.extend_from_slice(registry.as_bytes());
    material.push(0);
    material.extend_from_slice(schema.as_bytes());
    material.push(0);
    material.extend_from_slice(&fingerprint.0);
    Uuid::new_v5(&VERSION_ID_NAMESPACE, &material)
}

#[derive(Debug, Clone, PartialEq)]
struct FieldShape {
    name: String,
    ty: JsonValue,
    optional: bool,
}

fn top_level_fields(schema: &str, definition: &str) -> Result<Vec<FieldShape>, RegistryError> {
    let invalid = |reason: String| RegistryError::InvalidDefinition {
        schema: schema.to_string(),
        reason,
    };
    let json: JsonValue =
        serde_json::from_str(definition).map_err(|err| invalid(err.to_string()))?;
    let fields = json
        .get("fields")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| invalid("definition is not a record with fields".to_string()))?;
    fields
        .iter()
        .map(|field| {
            let name = field
                .get("name")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| invalid("field without a name".to_string()))?;
            let ty = field.get("type").cloned().unwrap_or(JsonValue::Null);
            let optional = ty
                .as_array()
                .is_some_and(|branches| branches.iter().any(|b| b.as_str() == Some("null")));
            Ok(FieldShape {
                name: name.to_string(),
                ty,
                optional,
            })
        })
        .collect()
}

fn check_backward(previous: &[FieldShape], next: &[FieldShape]) -> Result<(), String> {
    for old in previous {
        match next.iter().find(|f| f.name == old.name) {
            Some(new) if new.ty != old.ty => {
                return Err(format!("field `{}` changed type", old.name));
            }
            Some(_) => {}
            None if !old.optional => {
                return Err(format!("required field `{}` was removed", old.name));
            }
            None => {}
        }
    }
    for new in next {
        if !new.optional && !previous.iter().any(|f| f.name == new.name) {
            return Err(format!("new field `{}` must be optional", new.name));
        }
    }
    Ok(())
}
