//! Turning stored payloads into units.
//!
//! The [`Materializer`] is the host runtime's loader primitive. The local
//! source treats any failure here as "no match" so the chain can continue.

use crate::model::{ClassKind, ResourceEntry, Unit, UnitShape};
use ristretto_classfile::{ClassAccessFlags, ClassFile};
use std::io::Cursor;

/// Error type for materialization
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub trait Materializer: Send + Sync {
    /// Build a unit for `name` from its stored entry.
    fn materialize(&self, name: &str, entry: &ResourceEntry) -> Result<Unit, BoxError>;

    /// Eagerly link a freshly materialized unit.
    fn link(&self, unit: &Unit) -> Result<(), BoxError> {
        unit.mark_linked();
        Ok(())
    }
}

/// Accepts any payload as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpaqueMaterializer;

impl Materializer for OpaqueMaterializer {
    fn materialize(&self, name: &str, entry: &ResourceEntry) -> Result<Unit, BoxError> {
        Ok(Unit::from_entry(name, entry, UnitShape::Opaque))
    }
}

/// Parses JVM class files.
///
/// Materialization records the class kind and its method names; linking
/// checks that every method's name and descriptor resolve in the constant
/// pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassFileMaterializer;

impl ClassFileMaterializer {
    fn parse(name: &str, payload: &[u8]) -> Result<ClassFile, BoxError> {
        ClassFile::from_bytes(&mut Cursor::new(payload.to_vec()))
            .map_err(|e| format!("Failed to parse class {name}: {e:?}").into())
    }
}

impl Materializer for ClassFileMaterializer {
    fn materialize(&self, name: &str, entry: &ResourceEntry) -> Result<Unit, BoxError> {
        let class = Self::parse(name, entry.bytes())?;

        let kind = if class.access_flags.contains(ClassAccessFlags::ANNOTATION) {
            ClassKind::Annotation
        } else if class.access_flags.contains(ClassAccessFlags::INTERFACE) {
            ClassKind::Interface
        } else if class.access_flags.contains(ClassAccessFlags::ENUM) {
            ClassKind::Enum
        } else {
            ClassKind::Class
        };

        let mut methods = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            let method_name = class
                .constant_pool
                .try_get_utf8(method.name_index)
                .map_err(|e| format!("Failed to parse method name in {name}: {e:?}"))?;
            methods.push(method_name.to_string());
        }

        Ok(Unit::from_entry(name, entry, UnitShape::Class { kind, methods }))
    }

    fn link(&self, unit: &Unit) -> Result<(), BoxError> {
        let class = Self::parse(unit.name(), unit.payload())?;
        for method in &class.methods {
            class
                .constant_pool
                .try_get_utf8(method.name_index)
                .map_err(|e| format!("Unresolved method name in {}: {e:?}", unit.name()))?;
            class
                .constant_pool
                .try_get_utf8(method.descriptor_index)
                .map_err(|e| format!("Unresolved method descriptor in {}: {e:?}", unit.name()))?;
        }
        unit.mark_linked();
        Ok(())
    }
}
