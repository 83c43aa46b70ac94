pub mod config;
pub mod error;
pub mod mappers;
pub mod recovery;
pub mod session;
pub mod transport;

pub use config::{ProviderConfig, ProviderEnv, ProviderResolver, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::AiError;
pub use mappers::{ForgeClient, VerificationPolicy};
pub use recovery::{recover, recover_json, recover_json_with_strategy, RecoveryStrategy};
pub use session::{ForgeSession, SessionError};
pub use transport::{ChatMessage, ChatRole, ChatTransport, CompletionParams, HttpChatTransport};
