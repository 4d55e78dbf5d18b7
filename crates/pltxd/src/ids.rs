//! Random correlation id generation.

use pltx_core::identity::CORRELATION_ID_BYTES;
use pltx_core::{CorrelationId, CorrelationIds};
use uuid::Uuid;

/// Source of the `emi`/`pli` ids generated on every `ready`.
pub trait IdSource: Send + Sync {
    fn correlation_id(&self) -> CorrelationId;

    /// Two independent ids for a new session.
    fn correlation_ids(&self) -> CorrelationIds {
        CorrelationIds {
            session: self.correlation_id(),
            play_session: self.correlation_id(),
        }
    }
}

/// Ids drawn from the OS random generator.
///
/// Uses the leading bytes of a v4 UUID, which are fully random (the
/// version and variant bits live further in).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn correlation_id(&self) -> CorrelationId {
        let uuid = Uuid::new_v4();
        let bytes = uuid.as_bytes().get(..CORRELATION_ID_BYTES).unwrap_or_default();
        CorrelationId::from_bytes(bytes)
    }
}
