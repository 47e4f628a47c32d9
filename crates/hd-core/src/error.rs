use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown locale: {tag} (expected en-au, en-us or en-uk)")]
    UnknownLocale { tag: String },
}
