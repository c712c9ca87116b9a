pub mod api_keys;
pub mod chatrooms;
pub mod db;
pub mod error;
pub mod messages;
pub mod personas;
pub mod types;

pub use api_keys::ApiKeyRepo;
pub use chatrooms::ChatroomRepo;
pub use error::StoreError;
pub use messages::MessageRepo;
pub use personas::PersonaRepo;
