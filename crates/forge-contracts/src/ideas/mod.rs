mod config;
mod records;

pub use config::{
    degen_label, ForgeConfig, ForgeMode, Language, ECOSYSTEMS, MAX_DEGEN_LEVEL, MAX_QUANTITY,
    MIN_QUANTITY, SECTORS,
};
pub use records::{
    Blueprint, Idea, IdeaBatch, IdeaStatus, SimilarProject, StatusEvent, TranslatedFields,
    VerificationResult, DEFAULT_DEGEN_SCORE,
};
