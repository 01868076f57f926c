use serde::{Deserialize, Serialize};

/// The five memory blob kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// The agent profile — who the agent is. Read-only at runtime.
    Identity,
    /// Long-term facts and preferences about the user.
    User,
    /// The agent's own persona, emotional state, and internal rules.
    Personality,
    /// Ideas, error patterns, lessons learned, experimental plans.
    Subconscious,
    /// Time-bounded current focus with TIMESTAMP/DURATION header.
    Conscious,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 5] = [
        MemoryKind::Identity,
        MemoryKind::User,
        MemoryKind::Personality,
        MemoryKind::Subconscious,
        MemoryKind::Conscious,
    ];

    /// File name of this blob under the configs directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            MemoryKind::Identity => "AGENT.md",
            MemoryKind::User => "SOUL.md",
            MemoryKind::Personality => "PERSONALITY.md",
            MemoryKind::Subconscious => "SUBCONSCIOUS.md",
            MemoryKind::Conscious => "CONSCIOUS.md",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            MemoryKind::Identity => 0,
            MemoryKind::User => 1,
            MemoryKind::Personality => 2,
            MemoryKind::Subconscious => 3,
            MemoryKind::Conscious => 4,
        }
    }
}
