mod character;
mod user;

pub use character::{ChangeEvent, ChangeKind, CharacterFields, CharacterRecord, NewCharacter};
pub use user::UserRecord;
