//! Provider contract re-exports used by `codybot`.

pub use chat_provider::{
    CancelSignal, ChatMessage, ProviderInitError, ProviderProfile, Role, RunEvent, RunId,
    RunProvider, RunRequest,
};
