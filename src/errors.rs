use crate::ecs::Entity;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(
        display = "Too many component types registered in one domain (capacity: {}).",
        _0
    )]
    ComponentCapacityExceeded(usize),
    #[fail(display = "{} is invalid.", _0)]
    InvalidEntity(Entity),
    #[fail(display = "Malformed settings: {}.", _0)]
    MalformedSettings(String),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl From<::serde_json::Error> for Error {
    fn from(err: ::serde_json::Error) -> Self {
        Error::MalformedSettings(err.to_string())
    }
}
