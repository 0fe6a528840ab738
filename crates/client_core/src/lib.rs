pub mod auth;
pub mod collection;
pub mod controller;
pub mod forms;
pub mod phone;
pub mod records;
pub mod session;
pub mod transport;
pub mod views;

pub use auth::{AuthClient, SignupError, SignupOutcome};
pub use collection::{Collection, RecordKey};
pub use controller::{CollectionController, MutationError, MutationEvent, MutationKind};
pub use session::Session;
pub use transport::{RecordApi, RemoteRecord, RestTransport};
