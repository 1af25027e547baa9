use serde::{Deserialize, Serialize};

/// A named version of the gas schedule and opcode availability set (§6.2).
///
/// Variants are declared oldest-first; comparison operators follow
/// declaration order so `revision >= Revision::Byzantium` reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Revision {
    Frontier,
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    Berlin,
}

impl Revision {
    /// The most recent revision this workspace implements.
    pub const LATEST: Revision = Revision::Berlin;
}

impl Default for Revision {
    fn default() -> Self {
        Revision::LATEST
    }
}
