mod errors;

pub use errors::Error;

pub type FlixpostResult<T> = Result<T, Error>;
