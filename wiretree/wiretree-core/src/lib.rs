//! Format-independent core for the wiretree codecs: the generic message/value
//! tree that every parser produces and every serializer consumes, plus the
//! shared error taxonomy and JSON/YAML rendering.

mod error;
mod render;
mod value;

pub use error::{
    locate, source_window, CoercionError, ParseError, SerializationError, ValidationError,
    ValueTypeError,
};
pub use value::{Field, Message, Scalar, Value};
