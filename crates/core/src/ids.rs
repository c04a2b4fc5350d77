// Identifier generation for fields that are never read from cells.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::error::GenerationError;
use crate::schema::GenerationStrategy;
use crate::value::{FieldValue, ValueType};

/// Source of generated identifiers.
pub trait IdGenerator: Send + Sync {
    /// A random UUID in text form.
    fn uuid(&self) -> Result<String, GenerationError>;

    /// A unique, roughly time-ordered 64-bit identifier.
    fn sequence_id(&self) -> Result<i64, GenerationError>;
}

/// 2015-01-01T00:00:00Z
const EPOCH_MS: u64 = 1_420_070_400_000;
const WORKER_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_WORKER: u16 = (1 << WORKER_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// UUID v4 (simple form) plus Snowflake-style sequence ids:
/// 41 bits of milliseconds since 2015, 10 bits of worker id, 12 bits of
/// per-millisecond sequence.
pub struct DefaultIdGenerator {
    worker: u16,
    state: Mutex<SequenceState>,
}

#[derive(Default)]
struct SequenceState {
    last_ms: u64,
    sequence: u64,
}

impl DefaultIdGenerator {
    pub fn new(worker: u16) -> Self {
        Self {
            worker: worker & MAX_WORKER,
            state: Mutex::new(SequenceState::default()),
        }
    }

    fn now_ms() -> Result<u64, GenerationError> {
        let since_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| GenerationError::Failed(e.to_string()))?;
        (since_unix.as_millis() as u64)
            .checked_sub(EPOCH_MS)
            .ok_or_else(|| GenerationError::Failed("system clock is before the id epoch".into()))
    }
}

impl Default for DefaultIdGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl IdGenerator for DefaultIdGenerator {
    fn uuid(&self) -> Result<String, GenerationError> {
        Ok(uuid::Uuid::new_v4().simple().to_string())
    }

    fn sequence_id(&self) -> Result<i64, GenerationError> {
        let mut state = self.state.lock();
        let mut now = Self::now_ms()?;
        if now < state.last_ms {
            return Err(GenerationError::Failed(format!(
                "clock moved backwards by {}ms",
                state.last_ms - now
            )));
        }
        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond.
                while now <= state.last_ms {
                    now = Self::now_ms()?;
                }
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = now;

        let id = (now << (WORKER_BITS + SEQUENCE_BITS))
            | ((self.worker as u64) << SEQUENCE_BITS)
            | state.sequence;
        Ok(id as i64)
    }
}

/// Produce a generated value shaped for a field of `value_type`.
pub fn generate(
    generator: &dyn IdGenerator,
    strategy: GenerationStrategy,
    value_type: &ValueType,
    field: &str,
) -> Result<Option<FieldValue>, GenerationError> {
    let incompatible = || GenerationError::Incompatible {
        field: field.to_string(),
        strategy,
        value_type: value_type.to_string(),
    };
    match (strategy, value_type) {
        (GenerationStrategy::None, _) => Ok(None),
        (GenerationStrategy::Uuid, ValueType::Text) => generator.uuid().map(|id| Some(FieldValue::Text(id))),
        (GenerationStrategy::SequenceId, ValueType::Long) => {
            generator.sequence_id().map(|id| Some(FieldValue::Long(id)))
        }
        (GenerationStrategy::SequenceId, ValueType::Text) => {
            generator.sequence_id().map(|id| Some(FieldValue::Text(id.to_string())))
        }
        _ => Err(incompatible()),
    }
}
